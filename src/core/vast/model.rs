use anyhow::{Error, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VastVersion {
    V2_0,
    V3_0,
    V4_0,
}

impl VastVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            VastVersion::V2_0 => "2.0",
            VastVersion::V3_0 => "3.0",
            VastVersion::V4_0 => "4.0",
        }
    }

    pub fn parse(raw: &str) -> Result<VastVersion, Error> {
        match raw {
            "2.0" => Ok(VastVersion::V2_0),
            "3.0" => Ok(VastVersion::V3_0),
            // minor 4.x revisions are wire-compatible for our subset
            v if v.starts_with("4.") => Ok(VastVersion::V4_0),
            other => bail!("Unsupported VAST version {:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingEvent {
    pub event: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    pub url: String,
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineAd {
    pub ad_system: String,
    pub ad_title: String,
    pub error_urls: Vec<String>,
    pub impressions: Vec<String>,
    pub duration_secs: u32,
    pub tracking: Vec<TrackingEvent>,
    pub click_through: Option<String>,
    pub click_tracking: Vec<String>,
    pub media_files: Vec<MediaFile>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrapperAd {
    pub ad_system: String,
    pub vast_ad_tag_uri: String,
    pub error_urls: Vec<String>,
    pub impressions: Vec<String>,
    pub tracking: Vec<TrackingEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VastAd {
    Inline(InlineAd),
    Wrapper(WrapperAd),
}

impl VastAd {
    pub fn impressions_mut(&mut self) -> &mut Vec<String> {
        match self {
            VastAd::Inline(ad) => &mut ad.impressions,
            VastAd::Wrapper(ad) => &mut ad.impressions,
        }
    }

    pub fn tracking_mut(&mut self) -> &mut Vec<TrackingEvent> {
        match self {
            VastAd::Inline(ad) => &mut ad.tracking,
            VastAd::Wrapper(ad) => &mut ad.tracking,
        }
    }

    pub fn error_urls_mut(&mut self) -> &mut Vec<String> {
        match self {
            VastAd::Inline(ad) => &mut ad.error_urls,
            VastAd::Wrapper(ad) => &mut ad.error_urls,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VastDocument {
    pub version: VastVersion,
    pub ad_id: String,
    pub ad: VastAd,
}

/// Serializes seconds as the VAST `HH:MM:SS` duration form
pub fn format_duration(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn parse_duration(raw: &str) -> Result<u32, Error> {
    let parts: Vec<&str> = raw.trim().split(':').collect();

    if parts.len() != 3 {
        bail!("Duration {:?} is not HH:MM:SS", raw);
    }

    let h: u32 = parts[0].parse()?;
    let m: u32 = parts[1].parse()?;
    let s: u32 = parts[2].parse()?;

    if m > 59 || s > 59 {
        bail!("Duration {:?} has out-of-range fields", raw);
    }

    Ok(h * 3600 + m * 60 + s)
}
