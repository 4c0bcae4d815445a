//! Source discovery fan-out
//!
//! Every claim is looked up concurrently; a claim whose lookup fails is
//! still keyed in the result, with no sources.

use crate::fan_out::TaskGroup;
use crate::types::{Claim, SourceMap, Stage};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};
use truthlens_common::metrics::StageTimer;
use truthlens_common::SourceLookup;

pub struct SourceDiscoverer {
    lookup: Arc<dyn SourceLookup>,
    group: TaskGroup,
    max_results: usize,
}

impl SourceDiscoverer {
    pub fn new(lookup: Arc<dyn SourceLookup>, concurrency: usize, max_results: usize) -> Self {
        Self {
            lookup,
            group: TaskGroup::new(Stage::Discovery, concurrency),
            max_results: max_results.max(1),
        }
    }

    #[instrument(skip_all, fields(claim_count = claims.len()))]
    pub async fn discover(&self, claims: &[Claim]) -> SourceMap {
        let timer = StageTimer::start(Stage::Discovery.as_str());

        // Identical claims share one key and one lookup
        let unique: Vec<&Claim> = claims.iter().collect::<BTreeSet<_>>().into_iter().collect();

        let fan_in = self
            .group
            .run(unique.clone(), move |claim| {
                self.lookup.lookup(claim, self.max_results)
            })
            .await;

        let mut sources: SourceMap = fan_in
            .completed
            .into_iter()
            .map(|(claim, urls)| (claim.clone(), urls))
            .collect();
        for failure in fan_in.failures {
            sources.insert(failure.key.clone(), Vec::new());
        }

        timer.finish(unique.len());
        info!(
            claims = sources.len(),
            claims_with_sources = sources.claims_with_sources(),
            total_links = sources.total_links(),
            "Source discovery complete"
        );

        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MapLookup;

    fn claims(items: &[&str]) -> Vec<Claim> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_every_claim_is_keyed() {
        let lookup = Arc::new(
            MapLookup::new()
                .with("c1", &["u1", "u2"])
                .with("c2", &["u2", "u3"])
                .failing("c3"),
        );
        let discoverer = SourceDiscoverer::new(lookup, 10, 3);

        let sources = discoverer.discover(&claims(&["c1", "c2", "c3", "c4"])).await;

        assert_eq!(sources.len(), 4);
        assert_eq!(sources.get("c1"), ["u1", "u2"]);
        assert!(sources.contains("c3"));
        assert!(sources.get("c3").is_empty());
        assert!(sources.get("c4").is_empty());
        assert_eq!(sources.unique_urls(), vec!["u1", "u2", "u3"]);
    }

    #[tokio::test]
    async fn test_lookups_request_max_results() {
        let lookup = Arc::new(MapLookup::new().with("c1", &["u1", "u2", "u3", "u4"]));
        let discoverer = SourceDiscoverer::new(lookup.clone(), 10, 3);

        let sources = discoverer.discover(&claims(&["c1", "c1"])).await;

        assert_eq!(sources.get("c1").len(), 3);
        assert_eq!(lookup.queries(), vec![("c1".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_no_claims_means_no_sources() {
        let discoverer = SourceDiscoverer::new(Arc::new(MapLookup::new()), 10, 3);
        assert!(discoverer.discover(&[]).await.is_empty());
    }
}
