//! Pipeline orchestrator
//!
//! Runs chunking, extraction, discovery, evidence collection, aggregation and
//! reasoning in order. Each boundary checks for an empty batch and halts with
//! a `PipelineError` before later stages see incomplete data.

use crate::aggregator::flatten;
use crate::chunker::{Chunker, TokenCounter};
use crate::discovery::SourceDiscoverer;
use crate::errors::PipelineError;
use crate::evidence::EvidenceCollector;
use crate::extraction::{ClaimBatch, ClaimExtractor};
use crate::reasoner::Reasoner;
use crate::types::{
    Claim, EvidenceMap, SourceMap, Stage, VerificationInput, VerificationResult,
};
use serde::Serialize;
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};
use truthlens_common::config::{AppConfig, PipelineConfig, RetryConfig};
use truthlens_common::metrics::{record_pipeline_failure, record_verdict, StageTimer};
use truthlens_common::retry::RetryError;
use truthlens_common::{
    ContentRetriever, RetryPolicy, SourceLookup, TextUnderstanding,
};

/// Reasoning recorded for an item that never produced a claim
pub const NO_CLAIMS_REASONING: &str = "No claims could be extracted from this content.";

/// Collaborators the pipeline calls out to
#[derive(Clone)]
pub struct PipelineDeps {
    /// Used for claim extraction from chunks and from source pages
    pub extraction_llm: Arc<dyn TextUnderstanding>,
    /// Used for the verdict call
    pub reasoning_llm: Arc<dyn TextUnderstanding>,
    pub lookup: Arc<dyn SourceLookup>,
    pub retriever: Arc<dyn ContentRetriever>,
    pub token_counter: Arc<dyn TokenCounter>,
}

/// Item counts gathered along the way
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub chunk_count: usize,
    pub failed_chunks: usize,
    pub claim_count: usize,
    pub source_count: usize,
    pub failed_sources: usize,
    pub credible_sources: usize,
    pub elapsed_ms: u64,
}

/// Everything a completed verification produced
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub claims: Vec<Claim>,
    pub sources: SourceMap,
    /// Sources that yielded evidence, and what they said
    pub evidence: EvidenceMap,
    pub result: VerificationResult,
    pub stats: PipelineStats,
}

/// Terminal state of a monitored verification
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MonitoredOutcome {
    Verified {
        report: VerificationReport,
        extraction_attempts: u32,
    },
    /// Every extraction attempt came back empty
    NoClaims {
        attempts: u32,
        last_error: Option<String>,
    },
}

pub struct Pipeline {
    chunker: Chunker,
    extractor: ClaimExtractor,
    discoverer: SourceDiscoverer,
    collector: EvidenceCollector,
    reasoner: Reasoner,
    retriever: Arc<dyn ContentRetriever>,
    monitored_retry: RetryPolicy,
    deadline: Duration,
}

impl Pipeline {
    pub fn new(
        deps: PipelineDeps,
        pipeline: &PipelineConfig,
        retry: &RetryConfig,
        max_results: usize,
    ) -> Self {
        let task_retry = RetryPolicy::fixed(
            retry.task_attempts,
            Duration::from_millis(retry.task_delay_ms),
        );

        Self {
            chunker: Chunker::new(deps.token_counter, pipeline.max_tokens_per_chunk),
            extractor: ClaimExtractor::new(
                deps.extraction_llm.clone(),
                pipeline.extraction_concurrency,
                task_retry,
            ),
            discoverer: SourceDiscoverer::new(
                deps.lookup,
                pipeline.discovery_concurrency,
                max_results,
            ),
            collector: EvidenceCollector::new(
                deps.retriever.clone(),
                deps.extraction_llm,
                pipeline.evidence_concurrency,
                pipeline.evidence_char_limit,
                task_retry,
            ),
            reasoner: Reasoner::new(
                deps.reasoning_llm,
                pipeline.reasoning_policy,
                RetryPolicy::fixed(
                    retry.reasoning_attempts,
                    Duration::from_millis(retry.reasoning_delay_ms),
                ),
            ),
            retriever: deps.retriever,
            monitored_retry: RetryPolicy::fixed(
                retry.extraction_attempts,
                Duration::from_millis(retry.extraction_delay_ms),
            ),
            deadline: Duration::from_secs(pipeline.request_timeout_secs),
        }
    }

    pub fn from_config(deps: PipelineDeps, config: &AppConfig) -> Self {
        Self::new(deps, &config.pipeline, &config.retry, config.search.max_results)
    }

    /// Configured caller-level deadline
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Retrieve (for URLs), chunk and extract claims
    pub async fn extract_claims(
        &self,
        input: &VerificationInput,
    ) -> Result<ClaimBatch, PipelineError> {
        let text = match input {
            VerificationInput::Text(text) => Cow::Borrowed(text.as_str()),
            VerificationInput::Url(url) => {
                let timer = StageTimer::start(Stage::Retrieval.as_str());
                let page = self.retriever.retrieve(url).await;
                timer.finish(1);
                if page.is_empty() {
                    return Err(PipelineError::ContentUnavailable { url: url.clone() });
                }
                info!(url = %url, title = %page.title, "Input page retrieved");
                Cow::Owned(page.body_text)
            }
        };

        let timer = StageTimer::start(Stage::Chunking.as_str());
        let chunks = self.chunker.split(&text)?;
        timer.finish(chunks.len());

        let batch = self.extractor.extract_all(&chunks).await;
        if batch.is_empty() {
            return Err(PipelineError::NoClaimsExtracted {
                chunk_count: batch.chunk_count,
                failed_chunks: batch.failed_chunks,
            });
        }
        Ok(batch)
    }

    /// Run the whole pipeline on one input
    #[instrument(skip_all, fields(input_type = input.kind()))]
    pub async fn verify(
        &self,
        input: &VerificationInput,
    ) -> Result<VerificationReport, PipelineError> {
        let started = Instant::now();
        let outcome = match self.extract_claims(input).await {
            Ok(batch) => self.verify_batch(batch, started).await,
            Err(e) => Err(e),
        };
        observe(outcome)
    }

    /// Run discovery onward on claims obtained elsewhere
    #[instrument(skip_all, fields(claim_count = claims.len()))]
    pub async fn verify_claims(
        &self,
        claims: Vec<Claim>,
    ) -> Result<VerificationReport, PipelineError> {
        let started = Instant::now();
        let outcome = if claims.is_empty() {
            Err(PipelineError::NoClaimsExtracted {
                chunk_count: 0,
                failed_chunks: 0,
            })
        } else {
            let batch = ClaimBatch {
                claims,
                ..ClaimBatch::default()
            };
            self.verify_batch(batch, started).await
        };
        observe(outcome)
    }

    /// Bound any pipeline future by the configured deadline
    pub async fn with_deadline<T, F>(&self, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        match tokio::time::timeout(self.deadline, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(halted(PipelineError::DeadlineExceeded {
                timeout_ms: self.deadline.as_millis() as u64,
            })),
        }
    }

    /// [`Pipeline::verify`] under the configured deadline
    pub async fn verify_with_deadline(
        &self,
        input: &VerificationInput,
    ) -> Result<VerificationReport, PipelineError> {
        self.with_deadline(self.verify(input)).await
    }

    /// Verification for unattended sources.
    ///
    /// Extraction is retried until it yields at least one claim. Running out
    /// of attempts is a terminal outcome, not an error; only empty input and
    /// failures after extraction are returned as errors.
    #[instrument(skip_all, fields(input_type = input.kind()))]
    pub async fn verify_monitored(
        &self,
        input: &VerificationInput,
    ) -> Result<MonitoredOutcome, PipelineError> {
        let started = Instant::now();

        let extraction = self
            .monitored_retry
            .run_when(
                "monitored_extraction",
                move |attempt| async move {
                    info!(attempt, "Extraction attempt");
                    self.extract_claims(input).await
                },
                |batch| !batch.is_empty(),
                |e| !matches!(e, PipelineError::EmptyInput),
            )
            .await;

        let (batch, extraction_attempts) = match extraction {
            Ok(retried) => (retried.value, retried.attempts),
            Err(RetryError::Failed {
                error: PipelineError::EmptyInput,
                ..
            }) => return Err(halted(PipelineError::EmptyInput)),
            Err(RetryError::Failed { error, attempts }) => {
                warn!(attempts, error = %error, "No claims after all extraction attempts");
                record_verdict("no_claims");
                return Ok(MonitoredOutcome::NoClaims {
                    attempts,
                    last_error: Some(error.to_string()),
                });
            }
            Err(RetryError::Rejected { attempts, .. }) => {
                warn!(attempts, "No claims after all extraction attempts");
                record_verdict("no_claims");
                return Ok(MonitoredOutcome::NoClaims {
                    attempts,
                    last_error: None,
                });
            }
        };

        let report = observe(self.verify_batch(batch, started).await)?;
        Ok(MonitoredOutcome::Verified {
            report,
            extraction_attempts,
        })
    }

    async fn verify_batch(
        &self,
        batch: ClaimBatch,
        started: Instant,
    ) -> Result<VerificationReport, PipelineError> {
        let mut stats = PipelineStats {
            chunk_count: batch.chunk_count,
            failed_chunks: batch.failed_chunks,
            claim_count: batch.claims.len(),
            ..PipelineStats::default()
        };
        let claims = batch.claims;

        let sources = self.discoverer.discover(&claims).await;
        let urls = sources.unique_urls();
        if urls.is_empty() {
            return Err(PipelineError::NoSourcesDiscovered {
                claim_count: sources.len(),
            });
        }
        stats.source_count = urls.len();

        let collected = self.collector.collect(&urls, &claims).await;
        stats.failed_sources = collected.failed_sources;

        let timer = StageTimer::start(Stage::Aggregation.as_str());
        let evidence = flatten(collected.evidence);
        timer.finish(evidence.len());
        if evidence.is_empty() {
            return Err(PipelineError::NoCredibleEvidence {
                url_count: urls.len(),
                failed_sources: collected.failed_sources,
            });
        }
        stats.credible_sources = evidence.len();

        let result = self.reasoner.reason(&claims, &evidence).await;
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        Ok(VerificationReport {
            claims,
            sources,
            evidence,
            result,
            stats,
        })
    }
}

/// Log and count the outcome of a run
fn observe(
    outcome: Result<VerificationReport, PipelineError>,
) -> Result<VerificationReport, PipelineError> {
    let report = outcome.map_err(halted)?;
    record_verdict(report.result.verdict.as_str());
    info!(
        verdict = report.result.verdict.as_str(),
        claims = report.stats.claim_count,
        sources = report.stats.source_count,
        credible_sources = report.stats.credible_sources,
        elapsed_ms = report.stats.elapsed_ms,
        "Verification complete"
    );
    Ok(report)
}

fn halted(err: PipelineError) -> PipelineError {
    record_pipeline_failure(err.kind());
    warn!(
        error = %err,
        stage = err.stage().map(|s| s.as_str()).unwrap_or("pipeline"),
        remediation = err.remediation(),
        "Verification halted"
    );
    err
}
