use crate::core::adapters::adapter::BidderAdapter;
use crate::core::models::bidder::Bidder;
use crate::core::ortb::MediaType;
use ahash::AHashMap;
use std::sync::Arc;
use tracing::info;

/// A demand source as registered: its config plus the adapter that
/// speaks its wire format
#[derive(Clone)]
pub struct RegisteredBidder {
    pub bidder: Arc<Bidder>,
    pub adapter: Arc<dyn BidderAdapter>,
}

/// Name -> adapter lookup. Populated once at startup via explicit
/// registration and never modified after - readers take no locks.
pub struct AdapterRegistry {
    bidders: AHashMap<String, RegisteredBidder>,
}

impl AdapterRegistry {
    pub fn build(entries: Vec<(Bidder, Arc<dyn BidderAdapter>)>) -> AdapterRegistry {
        let mut bidders = AHashMap::with_capacity(entries.len());

        for (bidder, adapter) in entries {
            info!(
                "Registered bidder {} (enabled={}, gvl={:?})",
                bidder.code, bidder.info.enabled, bidder.info.gvl_id
            );

            bidders.insert(
                bidder.code.clone(),
                RegisteredBidder {
                    bidder: Arc::new(bidder),
                    adapter,
                },
            );
        }

        AdapterRegistry { bidders }
    }

    pub fn get(&self, code: &str) -> Option<&RegisteredBidder> {
        self.bidders.get(code)
    }

    pub fn list(&self) -> impl Iterator<Item = &RegisteredBidder> {
        self.bidders.values()
    }

    pub fn len(&self) -> usize {
        self.bidders.len()
    }

    /// Enabled bidders supporting the media type in the given
    /// inventory context
    pub fn filter_by_capability(
        &self,
        media: MediaType,
        is_app: bool,
    ) -> Vec<&RegisteredBidder> {
        self.bidders
            .values()
            .filter(|entry| {
                entry.bidder.info.enabled
                    && entry.bidder.media_for_channel(is_app).contains(&media)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapters::standard::StandardAdapter;
    use crate::core::models::bidder::BidderInfo;

    fn bidder(code: &str, site_media: Vec<MediaType>) -> Bidder {
        Bidder {
            code: code.to_string(),
            endpoint: format!("https://{}.example/rtb", code),
            info: BidderInfo {
                enabled: true,
                site_media,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn capability_filter_respects_media_and_enabled() {
        let adapter: Arc<dyn BidderAdapter> = Arc::new(StandardAdapter);

        let mut video_only = bidder("video-dsp", vec![MediaType::Video]);
        video_only.info.enabled = true;

        let mut disabled = bidder("gone-dsp", vec![MediaType::Banner]);
        disabled.info.enabled = false;

        let registry = AdapterRegistry::build(vec![
            (bidder("banner-dsp", vec![MediaType::Banner]), adapter.clone()),
            (video_only, adapter.clone()),
            (disabled, adapter),
        ]);

        let banner = registry.filter_by_capability(MediaType::Banner, false);
        assert_eq!(banner.len(), 1);
        assert_eq!(banner[0].bidder.code, "banner-dsp");

        assert!(registry.get("video-dsp").is_some());
        assert!(registry.get("unknown").is_none());
    }
}
