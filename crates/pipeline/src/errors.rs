//! Pipeline error types
//!
//! Only batch-level conditions are errors. Isolated per-item failures are
//! absorbed by the stage that hit them.

use crate::claim_list::ListParseError;
use crate::types::Stage;
use thiserror::Error;
use truthlens_common::AppError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No text to process")]
    EmptyInput,

    #[error("Content could not be retrieved from {url}")]
    ContentUnavailable { url: String },

    #[error("No claims extracted from {chunk_count} chunk(s) ({failed_chunks} failed)")]
    NoClaimsExtracted {
        chunk_count: usize,
        failed_chunks: usize,
    },

    #[error("No sources discovered for {claim_count} claim(s)")]
    NoSourcesDiscovered { claim_count: usize },

    #[error("No credible evidence in {url_count} source(s) ({failed_sources} failed)")]
    NoCredibleEvidence {
        url_count: usize,
        failed_sources: usize,
    },

    #[error("Verification exceeded its deadline of {timeout_ms}ms")]
    DeadlineExceeded { timeout_ms: u64 },
}

impl PipelineError {
    /// Stage at which the pipeline halted
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::EmptyInput => Some(Stage::Chunking),
            PipelineError::ContentUnavailable { .. } => Some(Stage::Retrieval),
            PipelineError::NoClaimsExtracted { .. } => Some(Stage::Extraction),
            PipelineError::NoSourcesDiscovered { .. } => Some(Stage::Discovery),
            PipelineError::NoCredibleEvidence { .. } => Some(Stage::Aggregation),
            PipelineError::DeadlineExceeded { .. } => None,
        }
    }

    /// Stable identifier for metrics and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "empty_input",
            PipelineError::ContentUnavailable { .. } => "content_unavailable",
            PipelineError::NoClaimsExtracted { .. } => "no_claims_extracted",
            PipelineError::NoSourcesDiscovered { .. } => "no_sources_discovered",
            PipelineError::NoCredibleEvidence { .. } => "no_credible_evidence",
            PipelineError::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }

    /// What the operator should look at
    pub fn remediation(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "Provide non-empty text or a URL.",
            PipelineError::ContentUnavailable { .. } => {
                "The page could not be fetched; check the URL and the retrieval API key."
            }
            PipelineError::NoClaimsExtracted { .. } => {
                "The content may hold no checkable claims, or the understanding capability is failing; check the LLM API key and model."
            }
            PipelineError::NoSourcesDiscovered { .. } => {
                "The source lookup returned nothing for every claim; check the search API key and quota."
            }
            PipelineError::NoCredibleEvidence { .. } => {
                "Sources were found but none yielded usable evidence; check retrieval and try again later."
            }
            PipelineError::DeadlineExceeded { .. } => {
                "Raise pipeline.request_timeout_secs or retry when collaborators are less loaded."
            }
        }
    }
}

/// Failure of a single fan-out task; logged and absorbed, never propagated
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Capability(#[from] AppError),

    #[error("malformed claim list: {0}")]
    Malformed(#[from] ListParseError),

    #[error("no content retrieved from {url}")]
    NoContent { url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_sources_and_no_evidence_are_distinct() {
        let no_sources = PipelineError::NoSourcesDiscovered { claim_count: 4 };
        let no_evidence = PipelineError::NoCredibleEvidence {
            url_count: 6,
            failed_sources: 6,
        };

        assert_ne!(no_sources.stage(), no_evidence.stage());
        assert_ne!(no_sources.kind(), no_evidence.kind());
        assert_ne!(no_sources.remediation(), no_evidence.remediation());
    }

    #[test]
    fn test_error_messages_carry_counts() {
        let err = PipelineError::NoClaimsExtracted {
            chunk_count: 3,
            failed_chunks: 2,
        };
        assert_eq!(err.to_string(), "No claims extracted from 3 chunk(s) (2 failed)");
        assert_eq!(err.stage(), Some(Stage::Extraction));
    }
}
