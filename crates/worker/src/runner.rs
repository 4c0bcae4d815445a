//! Verification runner
//!
//! Runs the pipeline for one item, enriches successful reports, and stores
//! every outcome as a verification record.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use truthlens_common::store::{fingerprint, NewVerification, RecordStore, VerificationRecord};
use truthlens_pipeline::orchestrator::{PipelineStats, NO_CLAIMS_REASONING};
use truthlens_pipeline::{
    Categorizer, HeadlineGenerator, MonitoredOutcome, Pipeline, PipelineError,
    VerificationInput, VerificationReport,
};

/// One line of worker output
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutput {
    Verified {
        record: VerificationRecord,
        stats: PipelineStats,
    },
    NoClaims {
        record: VerificationRecord,
        attempts: u32,
    },
    /// Input already verified; the stored record is returned as is
    Duplicate { record: VerificationRecord },
    Failed {
        record: VerificationRecord,
        kind: &'static str,
        stage: Option<&'static str>,
        remediation: &'static str,
    },
}

impl ItemOutput {
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutput::Failed { .. })
    }
}

pub struct Runner {
    pipeline: Pipeline,
    headlines: HeadlineGenerator,
    categorizer: Categorizer,
    store: Arc<dyn RecordStore>,
}

impl Runner {
    pub fn new(
        pipeline: Pipeline,
        headlines: HeadlineGenerator,
        categorizer: Categorizer,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            pipeline,
            headlines,
            categorizer,
            store,
        }
    }

    /// Verify a single item under the configured deadline
    #[instrument(skip_all, fields(input_type = input.kind()))]
    pub async fn verify(&self, input: &VerificationInput) -> Result<ItemOutput> {
        match self.pipeline.verify_with_deadline(input).await {
            Ok(report) => self.store_report(input, report).await,
            Err(e) => self.store_failure(input, &e).await,
        }
    }

    /// Verify an item from an unattended feed, skipping inputs seen before
    #[instrument(skip_all, fields(input_type = input.kind()))]
    pub async fn process_monitored(&self, input: &VerificationInput) -> Result<ItemOutput> {
        let fp = fingerprint(input.content());
        if let Some(record) = self.store.find_by_fingerprint(&fp).await? {
            info!(id = %record.id, "Input already verified, skipping");
            return Ok(ItemOutput::Duplicate { record });
        }

        let outcome = self
            .pipeline
            .with_deadline(self.pipeline.verify_monitored(input))
            .await;

        match outcome {
            Ok(MonitoredOutcome::Verified { report, .. }) => {
                self.store_report(input, report).await
            }
            Ok(MonitoredOutcome::NoClaims { attempts, .. }) => {
                let fields = base_fields(input, NO_CLAIMS_REASONING.to_string());
                let record = self.insert(fields).await?;
                Ok(ItemOutput::NoClaims { record, attempts })
            }
            Err(e) => self.store_failure(input, &e).await,
        }
    }

    async fn store_report(
        &self,
        input: &VerificationInput,
        report: VerificationReport,
    ) -> Result<ItemOutput> {
        let (headline, category) = tokio::join!(
            self.headlines.generate(&report.claims),
            self.categorizer.categorize(&report.claims)
        );

        let fields = NewVerification {
            verdict: report.result.verdict.as_bool(),
            claims: report.claims,
            sources: report.sources.into_inner(),
            headline: Some(headline),
            category: Some(category.to_string()),
            ..base_fields(input, report.result.reasoning)
        };
        let record = self.insert(fields).await?;

        Ok(ItemOutput::Verified {
            record,
            stats: report.stats,
        })
    }

    async fn store_failure(
        &self,
        input: &VerificationInput,
        err: &PipelineError,
    ) -> Result<ItemOutput> {
        let reasoning = format!("{}. {}", err, err.remediation());
        let record = self.insert(base_fields(input, reasoning)).await?;

        Ok(ItemOutput::Failed {
            record,
            kind: err.kind(),
            stage: err.stage().map(|s| s.as_str()),
            remediation: err.remediation(),
        })
    }

    async fn insert(&self, fields: NewVerification) -> Result<VerificationRecord> {
        let id = self.store.insert_verification(fields).await?;
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("verification {} missing right after insert", id))
    }
}

/// Record fields for an item with no verdict
fn base_fields(input: &VerificationInput, reasoning: String) -> NewVerification {
    NewVerification {
        input_content: input.content().to_string(),
        input_type: input.kind().to_string(),
        verdict: None,
        reasoning,
        claims: Vec::new(),
        sources: BTreeMap::new(),
        headline: None,
        category: None,
    }
}
