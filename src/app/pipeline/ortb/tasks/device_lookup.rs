use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::enrichment::DeviceLookup;
use crate::core::pipeline::BlockingTask;
use std::sync::Arc;
use tracing::debug;

/// Fills device make/model/os/devicetype from the User-Agent.
/// Additive and idempotent: fields the request already carries are
/// left alone.
pub struct DeviceLookupTask {
    lookup: Arc<DeviceLookup>,
}

impl DeviceLookupTask {
    pub fn new(lookup: Arc<DeviceLookup>) -> Self {
        Self { lookup }
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for DeviceLookupTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let _span = child_span_info!("device_lookup_task").entered();

        let mut req = context.req.write();

        let device = match req.device.as_mut() {
            Some(device) => device,
            None => return Ok(()),
        };

        if device.ua.is_empty() {
            return Ok(());
        }

        let info = match self.lookup.lookup_ua(&device.ua) {
            Some(info) => info,
            None => {
                debug!("UA did not classify, leaving device as-is");
                return Ok(());
            }
        };

        if device.make.is_empty() {
            if let Some(make) = info.make {
                device.make = make;
            }
        }
        if device.model.is_empty() {
            if let Some(model) = info.model {
                device.model = model;
            }
        }
        if device.os.is_empty() {
            if let Some(os) = info.os {
                device.os = os;
            }
        }
        if device.osv.is_empty() {
            if let Some(osv) = info.os_version {
                device.osv = osv;
            }
        }
        if device.devicetype == 0 {
            device.devicetype = info.devtype.ortb_code();
        }

        Ok(())
    }
}
