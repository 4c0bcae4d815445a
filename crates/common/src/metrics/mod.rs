//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for pipeline stages, per-task failures,
//! collaborator calls and verdict outcomes.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Truth Lens metrics
pub const METRICS_PREFIX: &str = "truthlens";

/// Buckets for stage latency (dominated by external calls)
pub const STAGE_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Pipeline metrics
    describe_counter!(
        format!("{}_verifications_total", METRICS_PREFIX),
        Unit::Count,
        "Total verifications that reached a verdict"
    );

    describe_counter!(
        format!("{}_pipeline_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Verifications halted by a batch-level failure"
    );

    // Stage metrics
    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Pipeline stage latency in seconds"
    );

    describe_counter!(
        format!("{}_stage_items_total", METRICS_PREFIX),
        Unit::Count,
        "Items fanned out per stage"
    );

    describe_counter!(
        format!("{}_task_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Isolated per-item task failures absorbed by a stage"
    );

    // Collaborator metrics
    describe_counter!(
        format!("{}_collaborator_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Requests made to external collaborators"
    );

    describe_histogram!(
        format!("{}_collaborator_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "External collaborator latency in seconds"
    );

    describe_counter!(
        format!("{}_retry_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Attempts made under a retry policy"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record stage timing
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
}

impl StageTimer {
    /// Start timing a stage
    pub fn start(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    /// Record stage completion with the number of items it fanned out
    pub fn finish(self, items: usize) -> f64 {
        let duration = self.start.elapsed().as_secs_f64();
        record_stage(self.stage, duration, items);
        duration
    }
}

/// Helper to record stage metrics
pub fn record_stage(stage: &str, duration_secs: f64, items: usize) {
    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .record(duration_secs);

    counter!(
        format!("{}_stage_items_total", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .increment(items as u64);
}

/// Helper to record an absorbed task failure
pub fn record_task_failure(stage: &str) {
    counter!(
        format!("{}_task_failures_total", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .increment(1);
}

/// Helper to record a batch-level failure
pub fn record_pipeline_failure(kind: &str) {
    counter!(
        format!("{}_pipeline_failures_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Helper to record a verdict outcome (true, false, unknown)
pub fn record_verdict(outcome: &str) {
    counter!(
        format!("{}_verifications_total", METRICS_PREFIX),
        "verdict" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record a collaborator request
pub fn record_collaborator_call(collaborator: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_collaborator_requests_total", METRICS_PREFIX),
        "collaborator" => collaborator.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_collaborator_duration_seconds", METRICS_PREFIX),
        "collaborator" => collaborator.to_string()
    )
    .record(duration_secs);
}

/// Helper to record the attempts a retry policy needed
pub fn record_retry_attempts(operation: &str, attempts: u32) {
    counter!(
        format!("{}_retry_attempts_total", METRICS_PREFIX),
        "operation" => operation.to_string()
    )
    .increment(attempts as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_buckets() {
        let mut prev = 0.0;
        for &bucket in STAGE_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start("discovery");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let elapsed = timer.finish(3);
        assert!(elapsed > 0.0);
    }
}
