//! Logging bring-up. Configures the tracing subscriber from config:
//! stdout and/or rolling-file sinks, plain or JSON lines.

use anyhow::{Error, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Daily,
    Hourly,
    Never,
}

impl Default for FileRotation {
    fn default() -> Self {
        FileRotation::Daily
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogSink {
    Stdout {
        #[serde(default = "default_color")]
        color: bool,
        #[serde(default)]
        json: bool,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        json: bool,
        #[serde(default)]
        rotation: FileRotation,
    },
}

fn default_color() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: String,
    /// Fraction of requests which get a root span
    #[serde(default)]
    pub span_sample_rate: f32,
    #[serde(default)]
    pub sinks: Vec<LogSink>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            span_sample_rate: 0.01,
            sinks: vec![LogSink::Stdout {
                color: true,
                json: false,
            }],
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.sinks.is_empty() {
            bail!("At least one logging sink must be configured");
        }

        self.level.parse::<tracing::Level>().map_err(|_| {
            anyhow::anyhow!(
                "Invalid log level: '{}'. Valid levels: trace, debug, info, warn, error",
                self.level
            )
        })?;

        if !(0.0..=1.0).contains(&self.span_sample_rate) {
            bail!(
                "span_sample_rate must be between 0.0 and 1.0, got {}",
                self.span_sample_rate
            );
        }

        Ok(())
    }
}

/// Keeps the non-blocking appender workers alive; dropping this
/// flushes and stops file logging
pub struct ObservabilityGuards {
    _guards: Vec<WorkerGuard>,
}

/// Installs the global subscriber. Call once at startup, before
/// anything worth logging happens.
pub fn init_logging(cfg: &LoggingConfig) -> Result<ObservabilityGuards, Error> {
    cfg.validate()?;

    let filter = EnvFilter::try_new(&cfg.level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(Error::from)?;

    let mut layers = Vec::new();
    let mut guards = Vec::new();

    for sink in &cfg.sinks {
        match sink {
            LogSink::Stdout { color, json } => {
                let layer = tracing_subscriber::fmt::layer().with_ansi(*color);

                if *json {
                    layers.push(layer.json().boxed());
                } else {
                    layers.push(layer.boxed());
                }
            }
            LogSink::File {
                path,
                json,
                rotation,
            } => {
                let dir = path.parent().unwrap_or(std::path::Path::new("."));
                let file = path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_else(|| "arx.log".to_string());

                let appender = match rotation {
                    FileRotation::Daily => rolling::daily(dir, file),
                    FileRotation::Hourly => rolling::hourly(dir, file),
                    FileRotation::Never => rolling::never(dir, file),
                };

                let (writer, guard) = tracing_appender::non_blocking(appender);
                guards.push(guard);

                let layer = tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer);

                if *json {
                    layers.push(layer.json().boxed());
                } else {
                    layers.push(layer.boxed());
                }
            }
        }
    }

    // sink layers attach against the bare registry; the env filter
    // stacks on top since it is generic over the subscriber below it
    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed installing subscriber: {}", e))?;

    Ok(ObservabilityGuards { _guards: guards })
}
