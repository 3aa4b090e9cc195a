use anyhow::{Error, bail};
use arc_swap::ArcSwap;
use ip_network::IpNetwork;
use ip_network_table::IpNetworkTable;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolved location for a client IP
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    pub country: String,
    pub region: String,
    pub city: String,
    pub zip: String,
    pub metro: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Longest-prefix-match geo table loaded from a local CSV of
/// `cidr,country[,region[,city[,zip[,metro[,lat,lon]]]]]` rows.
/// The table swaps atomically on reload so lookups never block.
pub struct GeoLookup {
    table: ArcSwap<IpNetworkTable<GeoInfo>>,
}

fn parse_line(line: &str) -> Option<(IpNetwork, GeoInfo)> {
    let mut cols = line.trim().split(',').map(str::trim);

    let network = cols.next()?.parse::<IpNetwork>().ok()?;
    let country = cols.next()?.to_uppercase();

    if country.is_empty() {
        return None;
    }

    let mut info = GeoInfo {
        country,
        region: cols.next().unwrap_or_default().to_uppercase(),
        city: cols.next().unwrap_or_default().to_string(),
        zip: cols.next().unwrap_or_default().to_string(),
        metro: cols.next().unwrap_or_default().to_string(),
        ..Default::default()
    };

    info.lat = cols.next().and_then(|v| v.parse().ok());
    info.lon = cols.next().and_then(|v| v.parse().ok());

    Some((network, info))
}

impl GeoLookup {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed reading geo table {}: {}", path.display(), e))?;

        let mut table = IpNetworkTable::new();
        let mut loaded = 0usize;
        let mut skipped = 0usize;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match parse_line(trimmed) {
                Some((network, info)) => {
                    table.insert(network, info);
                    loaded += 1;
                }
                None => skipped += 1,
            }
        }

        if loaded == 0 {
            bail!("Geo table {} contained no usable rows", path.display());
        }

        if skipped > 0 {
            warn!("Geo table load skipped {} unparseable rows", skipped);
        }

        info!("Loaded {} geo ranges from {}", loaded, path.display());

        Ok(Self {
            table: ArcSwap::new(Arc::new(table)),
        })
    }

    /// Resolves a client IP. Private and loopback ranges are never
    /// resolved - they would only ever match junk data.
    pub fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
        if is_private(ip) {
            debug!("Skipping geo lookup for private ip");
            return None;
        }

        self.table
            .load()
            .longest_match(ip)
            .map(|(_, info)| info.clone())
    }
}

pub fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(rows: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("arx-geo-{}.csv", uuid::Uuid::new_v4()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(rows.as_bytes()).unwrap();
        path
    }

    #[test]
    fn longest_match_wins() {
        let path = write_table(
            "203.0.113.0/24,US,CA,San Jose,95101,807,37.33,-121.89\n203.0.0.0/16,US\n",
        );
        let geo = GeoLookup::load(&path).unwrap();

        let hit = geo.lookup("203.0.113.9".parse().unwrap()).unwrap();
        assert_eq!(hit.region, "CA");
        assert_eq!(hit.city, "San Jose");
        assert_eq!(hit.lat, Some(37.33));

        let broader = geo.lookup("203.0.5.1".parse().unwrap()).unwrap();
        assert_eq!(broader.country, "US");
        assert!(broader.region.is_empty());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn private_ips_never_resolve() {
        let path = write_table("10.0.0.0/8,XX\n");
        let geo = GeoLookup::load(&path).unwrap();

        assert!(geo.lookup("10.1.2.3".parse().unwrap()).is_none());
        assert!(geo.lookup("127.0.0.1".parse().unwrap()).is_none());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn empty_table_is_a_startup_error() {
        let path = write_table("# comments only\n");
        assert!(GeoLookup::load(&path).is_err());
        std::fs::remove_file(path).ok();
    }
}
