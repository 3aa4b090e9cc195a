use crate::app::pipeline::ortb::AuctionContext;
use crate::child_span_info;
use crate::core::pipeline::BlockingTask;
use tracing::debug;

/// Normalizes the site url/domain pair: domains are lowercased with
/// any scheme/port debris stripped, and a missing domain is recovered
/// from the page url. Additive and idempotent like the other
/// enrichment stages.
pub struct NormalizeRequestTask;

fn clean_domain(raw: &str) -> String {
    let host = raw
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");

    let host = host.split(['/', '?', ':']).next().unwrap_or(host);

    host.trim_start_matches("www.").to_lowercase()
}

impl BlockingTask<AuctionContext, anyhow::Error> for NormalizeRequestTask {
    fn run(&self, context: &AuctionContext) -> Result<(), anyhow::Error> {
        let _span = child_span_info!("normalize_request_task").entered();

        let mut req = context.req.write();

        let site = match req.site.as_mut() {
            Some(site) => site,
            None => return Ok(()),
        };

        site.page = site.page.trim().to_string();

        if site.domain.is_empty() && !site.page.is_empty() {
            if let Ok(page) = url::Url::parse(&site.page) {
                if let Some(host) = page.host_str() {
                    site.domain = host.trim_start_matches("www.").to_lowercase();
                    debug!("Recovered site domain {} from page url", site.domain);
                }
            }
        } else if !site.domain.is_empty() {
            site.domain = clean_domain(&site.domain);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ortb::{BidRequestBuilder, Site};

    fn normalize(site: Site) -> Site {
        let req = BidRequestBuilder::default()
            .id("r1".to_string())
            .site(Some(site))
            .build()
            .unwrap();

        let ctx = AuctionContext::new("test".to_string(), "pub-1".to_string(), req);
        NormalizeRequestTask.run(&ctx).unwrap();

        let site = ctx.req.read().site.clone().unwrap();
        site
    }

    #[test]
    fn domain_recovered_from_page() {
        let site = normalize(Site {
            page: "https://www.News.Example/story?id=4".to_string(),
            ..Default::default()
        });

        assert_eq!(site.domain, "news.example");
    }

    #[test]
    fn dirty_domains_are_cleaned() {
        let site = normalize(Site {
            domain: "https://WWW.Pub.Example:8443/section".to_string(),
            ..Default::default()
        });

        assert_eq!(site.domain, "pub.example");
    }

    #[test]
    fn idempotent_on_clean_input() {
        let site = normalize(Site {
            domain: "pub.example".to_string(),
            page: "https://pub.example/a".to_string(),
            ..Default::default()
        });

        assert_eq!(site.domain, "pub.example");
    }
}
