//! Evidence fan-out
//!
//! Each source URL is retrieved and its content mined for claims related to
//! the user's claims. Retrieval is the slow part, so this pool is the
//! smallest of the three.

use crate::errors::TaskError;
use crate::extraction::request_claim_list;
use crate::fan_out::TaskGroup;
use crate::prompts;
use crate::types::{Claim, EvidenceMap, Stage};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use truthlens_common::metrics::StageTimer;
use truthlens_common::{ContentRetriever, RetryPolicy, TextUnderstanding};

/// Per-URL evidence plus how many sources produced nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceBatch {
    pub evidence: EvidenceMap,
    pub failed_sources: usize,
}

pub struct EvidenceCollector {
    retriever: Arc<dyn ContentRetriever>,
    llm: Arc<dyn TextUnderstanding>,
    group: TaskGroup,
    char_limit: usize,
    retry: RetryPolicy,
}

impl EvidenceCollector {
    pub fn new(
        retriever: Arc<dyn ContentRetriever>,
        llm: Arc<dyn TextUnderstanding>,
        concurrency: usize,
        char_limit: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            retriever,
            llm,
            group: TaskGroup::new(Stage::Evidence, concurrency),
            char_limit,
            retry,
        }
    }

    /// Collect evidence for every URL; failed URLs map to an empty list
    #[instrument(skip_all, fields(url_count = urls.len(), claim_count = claims.len()))]
    pub async fn collect(&self, urls: &[String], claims: &[Claim]) -> EvidenceBatch {
        let timer = StageTimer::start(Stage::Evidence.as_str());
        let numbered = prompts::numbered(claims);
        let original_claims = numbered.as_str();

        let fan_in = self
            .group
            .run(urls.iter().collect(), move |url| self.collect_one(url, original_claims))
            .await;

        let failed_sources = fan_in.failures.len();
        let mut evidence: EvidenceMap = fan_in
            .completed
            .into_iter()
            .map(|(url, found)| (url.clone(), found))
            .collect();
        for failure in fan_in.failures {
            evidence.insert(failure.key.clone(), Vec::new());
        }

        timer.finish(urls.len());
        info!(
            sources = evidence.len(),
            failed_sources,
            evidence_claims = evidence.total_claims(),
            "Evidence collection complete"
        );

        EvidenceBatch {
            evidence,
            failed_sources,
        }
    }

    async fn collect_one(&self, url: &str, original_claims: &str) -> Result<Vec<Claim>, TaskError> {
        let page = self.retriever.retrieve(url).await;
        if page.is_empty() {
            return Err(TaskError::NoContent {
                url: url.to_string(),
            });
        }

        let content = truncate_chars(&page.body_text, self.char_limit);
        debug!(
            url,
            chars = content.chars().count(),
            truncated = content.len() < page.body_text.len(),
            "Page retrieved"
        );

        let prompt = prompts::evidence_extraction(original_claims, content);
        request_claim_list(
            self.llm.as_ref(),
            &self.retry,
            "evidence_extraction",
            prompts::EVIDENCE_SYSTEM,
            &prompt,
        )
        .await
    }
}

/// First `limit` characters of `text`
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
