use anyhow::{Error, anyhow};
use fast_uaparser::{Device, OperatingSystem, ParserError};
use moka::sync::Cache;
use std::num::NonZeroU32;

/// OpenRTB devicetype codes we emit after classification
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DeviceType {
    #[default]
    Unknown,
    Bot,
    Desktop,
    Phone,
    Tablet,
    Tv,
    SetTop,
}

impl DeviceType {
    /// AdCOM / OpenRTB `device.devicetype` value
    pub fn ortb_code(&self) -> u32 {
        match self {
            DeviceType::Phone => 4,
            DeviceType::Tablet => 5,
            DeviceType::Desktop => 2,
            DeviceType::Tv => 3,
            DeviceType::SetTop => 7,
            DeviceType::Bot | DeviceType::Unknown => 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeviceInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub devtype: DeviceType,
}

/// User-Agent classification with a bounded cache in front. UA
/// cardinality is high but extremely repetitive per publisher.
pub struct DeviceLookup {
    cache: Cache<String, Option<DeviceInfo>>,
}

fn classify(device_family: &str, os_family: &str) -> DeviceType {
    match device_family {
        "iPad" => return DeviceType::Tablet,
        "iPhone" => return DeviceType::Phone,
        "AppleTV" => return DeviceType::Tv,
        "Spider" => return DeviceType::Bot,
        _ => {}
    }

    let device_lower = device_family.to_lowercase();

    if device_lower.contains("spider")
        || device_lower.contains("bot")
        || device_lower.contains("crawler")
    {
        return DeviceType::Bot;
    }

    if device_lower.contains("tv")
        || device_lower.contains("roku")
        || device_lower.contains("chromecast")
        || device_lower.contains("bravia")
    {
        return DeviceType::Tv;
    }

    if device_lower.contains("playstation")
        || device_lower.contains("xbox")
        || device_lower.contains("settop")
        || device_lower.contains("set-top")
    {
        return DeviceType::SetTop;
    }

    if device_lower.contains("tablet")
        || device_lower.contains("kindle")
        || device_lower.contains("surface")
    {
        return DeviceType::Tablet;
    }

    if device_lower.contains("phone")
        || device_lower.contains("mobile")
        || device_lower.contains("galaxy")
        || device_lower.contains("pixel")
    {
        return DeviceType::Phone;
    }

    match os_family {
        "iOS" | "Android" | "Fire OS" => return DeviceType::Phone,
        _ => {}
    }

    if !os_family.is_empty() {
        let os_lower = os_family.to_lowercase();
        if os_lower.contains("windows")
            || os_lower.contains("mac os")
            || os_lower.contains("linux")
            || os_lower.contains("chrome os")
        {
            return DeviceType::Desktop;
        }
    }

    DeviceType::Unknown
}

impl DeviceLookup {
    pub fn try_new(cache_sz: NonZeroU32) -> Result<Self, Error> {
        // loads the embedded ua regex set, only fails on a broken build
        fast_uaparser::init()
            .map(|_| DeviceLookup {
                cache: Cache::new(cache_sz.get() as u64),
            })
            .map_err(|e| anyhow!(e))
    }

    fn parse(user_agent: &str) -> Option<DeviceInfo> {
        let device: Result<Device, ParserError> = user_agent.parse();
        let os: Result<OperatingSystem, ParserError> = user_agent.parse();

        let (device, os) = match (device, os) {
            (Ok(device), Ok(os)) => (device, os),
            _ => return None,
        };

        let devtype = classify(&device.family, &os.family);

        Some(DeviceInfo {
            make: device.brand,
            model: device.model,
            os_version: os.major.clone(),
            os: Some(os.family),
            devtype,
        })
    }

    pub fn lookup_ua(&self, user_agent: &str) -> Option<DeviceInfo> {
        self.cache
            .get_with(user_agent.to_string(), || Self::parse(user_agent))
    }
}
