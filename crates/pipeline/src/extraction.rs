//! Claim extraction fan-out
//!
//! One capability call per chunk, run through a bounded pool. A chunk whose
//! call fails or returns a malformed list contributes nothing.

use crate::claim_list::parse_claim_list;
use crate::errors::TaskError;
use crate::fan_out::TaskGroup;
use crate::prompts;
use crate::types::{Chunk, Claim, Stage};
use std::sync::Arc;
use tracing::{info, instrument};
use truthlens_common::metrics::StageTimer;
use truthlens_common::retry::RetryError;
use truthlens_common::{RetryPolicy, TextUnderstanding};

/// Claims gathered from a set of chunks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimBatch {
    /// Claims in chunk completion order
    pub claims: Vec<Claim>,
    pub chunk_count: usize,
    pub failed_chunks: usize,
}

impl ClaimBatch {
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Ask the capability for a claim list, retrying failed calls and malformed lists
pub(crate) async fn request_claim_list(
    llm: &dyn TextUnderstanding,
    retry: &RetryPolicy,
    operation: &str,
    system: &str,
    prompt: &str,
) -> Result<Vec<Claim>, TaskError> {
    let outcome = retry
        .run(
            operation,
            move |_| async move {
                let response = llm.understand(system, prompt).await?;
                Ok::<_, TaskError>(parse_claim_list(&response)?)
            },
            |_| true,
        )
        .await;

    match outcome {
        Ok(retried) => Ok(retried.value),
        Err(RetryError::Rejected { last, .. }) => Ok(last),
        Err(RetryError::Failed { error, .. }) => Err(error),
    }
}

pub struct ClaimExtractor {
    llm: Arc<dyn TextUnderstanding>,
    group: TaskGroup,
    retry: RetryPolicy,
}

impl ClaimExtractor {
    pub fn new(llm: Arc<dyn TextUnderstanding>, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            llm,
            group: TaskGroup::new(Stage::Extraction, concurrency),
            retry,
        }
    }

    /// Extract claims from every chunk concurrently
    #[instrument(skip_all, fields(chunk_count = chunks.len(), model = %self.llm.model_name()))]
    pub async fn extract_all(&self, chunks: &[Chunk]) -> ClaimBatch {
        let timer = StageTimer::start(Stage::Extraction.as_str());

        let fan_in = self
            .group
            .run(chunks.iter().collect(), move |chunk| self.extract_chunk(chunk))
            .await;

        let failed_chunks = fan_in.failures.len();
        let claims: Vec<Claim> = fan_in
            .completed
            .into_iter()
            .flat_map(|(_, claims)| claims)
            .collect();

        timer.finish(chunks.len());
        info!(
            claims = claims.len(),
            failed_chunks,
            "Claim extraction complete"
        );

        ClaimBatch {
            claims,
            chunk_count: chunks.len(),
            failed_chunks,
        }
    }

    async fn extract_chunk(&self, chunk: &Chunk) -> Result<Vec<Claim>, TaskError> {
        let prompt = prompts::claim_extraction(&chunk.content);
        request_claim_list(
            self.llm.as_ref(),
            &self.retry,
            "claim_extraction",
            prompts::CLAIM_EXTRACTION_SYSTEM,
            &prompt,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedUnderstanding;
    use std::time::Duration;
    use truthlens_common::AppError;

    fn chunk(index: usize, content: &str) -> Chunk {
        Chunk {
            index,
            content: content.to_string(),
            token_count: 1,
        }
    }

    #[tokio::test]
    async fn test_claims_from_all_chunks_are_concatenated() {
        let llm = Arc::new(ScriptedUnderstanding::new(|_, _, prompt| {
            if prompt.contains("first chunk") {
                Ok(r#"["a", "b"]"#.to_string())
            } else {
                Ok("```json\n[\"c\"]\n```".to_string())
            }
        }));
        let extractor = ClaimExtractor::new(llm, 10, RetryPolicy::once());

        let batch = extractor
            .extract_all(&[chunk(0, "first chunk"), chunk(1, "second chunk")])
            .await;

        let mut claims = batch.claims.clone();
        claims.sort();
        assert_eq!(claims, vec!["a", "b", "c"]);
        assert_eq!(batch.chunk_count, 2);
        assert_eq!(batch.failed_chunks, 0);
    }

    #[tokio::test]
    async fn test_failed_chunks_contribute_nothing() {
        let llm = Arc::new(ScriptedUnderstanding::new(|_, _, prompt| {
            if prompt.contains("broken") {
                Err(AppError::Capability {
                    message: "rate limited".to_string(),
                })
            } else if prompt.contains("garbled") {
                Ok("Sure! The claims are a and b.".to_string())
            } else {
                Ok(r#"["ok"]"#.to_string())
            }
        }));
        let extractor = ClaimExtractor::new(llm, 2, RetryPolicy::once());

        let batch = extractor
            .extract_all(&[
                chunk(0, "broken"),
                chunk(1, "garbled"),
                chunk(2, "fine"),
            ])
            .await;

        assert_eq!(batch.claims, vec!["ok"]);
        assert_eq!(batch.failed_chunks, 2);
    }

    #[tokio::test]
    async fn test_malformed_list_is_retried() {
        let llm = Arc::new(ScriptedUnderstanding::new(|call, _, _| {
            if call == 1 {
                Ok("not a list".to_string())
            } else {
                Ok(r#"["recovered"]"#.to_string())
            }
        }));
        let extractor = ClaimExtractor::new(
            llm.clone(),
            1,
            RetryPolicy::fixed(2, Duration::ZERO),
        );

        let batch = extractor.extract_all(&[chunk(0, "text")]).await;

        assert_eq!(batch.claims, vec!["recovered"]);
        assert_eq!(llm.calls(), 2);
    }
}
