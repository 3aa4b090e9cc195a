use crate::app::config::ArxConfig;
use crate::app::pipeline::events::win::context::WinEventContext;
use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::syncing::r#in::context::SyncInContext;
use crate::app::pipeline::syncing::out::context::SyncOutContext;
use crate::core::adapters::AdapterRegistry;
use crate::core::auth::AuthGuard;
use crate::core::breaker::BreakerBoard;
use crate::core::enrichment::{DeviceLookup, GeoLookup};
use crate::core::events::recorder::EventRecorder;
use crate::core::filters::IvtFilter;
use crate::core::managers::{PublisherManager, WinStats};
use crate::core::observability::ObservabilityGuards;
use crate::core::pipeline::Pipeline;
use crate::core::ratelimit::AdmissionLimiters;
use crate::core::usersync::SyncStore;
use actix_web::dev::ServerHandle;
use anyhow::Error;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

/// Carries everything startup builds, in the order it gets built.
/// Startup tasks fill slots; later tasks and the shutdown pipeline
/// read them.
#[derive(Default)]
pub struct StartupContext {
    /// Local config options
    pub config: OnceLock<ArxConfig>,
    /// Log sink guards, held so appenders flush at exit
    pub observability: OnceLock<ObservabilityGuards>,

    // Transient items, taken by the pipeline builders
    pub ivt_filter: Mutex<Option<IvtFilter>>,

    // Shared services
    pub device_lookup: OnceLock<Arc<DeviceLookup>>,
    pub geo_lookup: OnceLock<Option<Arc<GeoLookup>>>,
    pub registry: OnceLock<Arc<AdapterRegistry>>,
    pub publishers: OnceLock<Arc<PublisherManager>>,
    pub breakers: OnceLock<Arc<BreakerBoard>>,
    pub sync_store: OnceLock<Arc<dyn SyncStore>>,
    pub win_stats: OnceLock<Arc<WinStats>>,
    pub recorder: OnceLock<Arc<EventRecorder>>,
    pub flusher: Mutex<Option<JoinHandle<()>>>,
    pub limiters: OnceLock<Arc<AdmissionLimiters>>,
    pub auth: OnceLock<Arc<AuthGuard>>,

    // Request pipelines
    pub auction_pipeline: OnceLock<Arc<Pipeline<AuctionContext, Error>>>,
    pub sync_out_pipeline: OnceLock<Arc<Pipeline<SyncOutContext, Error>>>,
    pub sync_in_pipeline: OnceLock<Arc<Pipeline<SyncInContext, Error>>>,
    pub win_event_pipeline: OnceLock<Arc<Pipeline<WinEventContext, Error>>>,

    // The web server
    pub server_handle: OnceLock<ServerHandle>,
    pub server_task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}
