pub mod device;
pub mod geo;

pub use device::{DeviceInfo, DeviceLookup, DeviceType};
pub use geo::{GeoInfo, GeoLookup};
