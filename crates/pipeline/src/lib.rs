//! Truth Lens verification pipeline
//!
//! Turns free text (or the text behind a URL) into a verdict:
//! - Chunking under a token budget
//! - Claim extraction, source discovery and evidence collection, each a
//!   bounded concurrent fan-out that absorbs per-item failures
//! - Evidence aggregation and verdict reasoning
//! - Headline and category enrichment for reports

pub mod aggregator;
pub mod chunker;
pub mod claim_list;
pub mod discovery;
pub mod enrich;
pub mod errors;
pub mod evidence;
pub mod extraction;
pub mod fan_out;
pub mod orchestrator;
pub mod prompts;
pub mod reasoner;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::{Chunker, Cl100kCounter, TokenCounter};
pub use enrich::{Categorizer, Category, HeadlineGenerator};
pub use errors::PipelineError;
pub use orchestrator::{MonitoredOutcome, Pipeline, PipelineDeps, VerificationReport};
pub use types::{
    Chunk, Claim, EvidenceMap, SourceMap, Verdict, VerificationInput, VerificationResult,
};
