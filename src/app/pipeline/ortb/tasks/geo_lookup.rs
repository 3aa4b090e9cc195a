use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::enrichment::GeoLookup;
use crate::core::ortb::Geo;
use crate::core::pipeline::BlockingTask;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Resolves the client IP to coarse geo when the request arrived
/// without one. Optional - without a table the task is not wired in.
pub struct GeoLookupTask {
    geo: Arc<GeoLookup>,
}

impl GeoLookupTask {
    pub fn new(geo: Arc<GeoLookup>) -> Self {
        Self { geo }
    }
}

impl BlockingTask<AuctionContext, anyhow::Error> for GeoLookupTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let _span = child_span_info!("geo_lookup_task").entered();

        let mut req = context.req.write();

        let device = match req.device.as_mut() {
            Some(device) => device,
            None => return Ok(()),
        };

        let already_resolved = device
            .geo
            .as_ref()
            .map(|g| !g.country.is_empty())
            .unwrap_or(false);

        if already_resolved {
            return Ok(());
        }

        let ip: Option<IpAddr> = device
            .ip
            .parse()
            .ok()
            .or_else(|| device.ipv6.parse().ok());

        let ip = match ip {
            Some(ip) => ip,
            None => return Ok(()),
        };

        let info = match self.geo.lookup(ip) {
            Some(info) => info,
            None => {
                debug!("No geo match for client ip");
                return Ok(());
            }
        };

        let geo = device.geo.get_or_insert_with(Geo::default);
        geo.country = info.country;
        geo.region = info.region;
        geo.city = info.city;
        geo.zip = info.zip;
        geo.metro = info.metro;
        geo.lat = info.lat;
        geo.lon = info.lon;

        Ok(())
    }
}
