//! Bounded fan-out
//!
//! Runs one task per item with at most `min(items, cap)` in flight and
//! collects results in completion order. A failed task is logged, counted
//! and handed back separately; it never aborts its siblings.

use crate::types::Stage;
use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};
use truthlens_common::metrics::record_task_failure;

/// A task that failed and was absorbed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure<K> {
    pub key: K,
    pub error: String,
}

/// Results of one fan-out, in completion order
#[derive(Debug)]
pub struct FanIn<K, T> {
    pub completed: Vec<(K, T)>,
    pub failures: Vec<TaskFailure<K>>,
}

impl<K, T> FanIn<K, T> {
    /// Items that went in
    pub fn total(&self) -> usize {
        self.completed.len() + self.failures.len()
    }
}

/// Worker pool for one stage
#[derive(Debug, Clone, Copy)]
pub struct TaskGroup {
    stage: Stage,
    cap: usize,
}

impl TaskGroup {
    pub fn new(stage: Stage, cap: usize) -> Self {
        Self {
            stage,
            cap: cap.max(1),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Number of tasks allowed in flight for `items` inputs
    pub fn pool_size(&self, items: usize) -> usize {
        items.min(self.cap).max(1)
    }

    pub async fn run<K, T, E, F, Fut>(&self, keys: Vec<K>, task: F) -> FanIn<K, T>
    where
        K: Clone + Display,
        F: Fn(K) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let total = keys.len();
        let pool = self.pool_size(total);
        debug!(stage = %self.stage, total, pool, "Fanning out");

        let results: Vec<(K, Result<T, E>)> = stream::iter(keys)
            .map(|key| {
                let pending = task(key.clone());
                async move { (key, pending.await) }
            })
            .buffer_unordered(pool)
            .collect()
            .await;

        let mut completed = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (key, result) in results {
            match result {
                Ok(value) => completed.push((key, value)),
                Err(e) => {
                    warn!(stage = %self.stage, item = %key, error = %e, "Task failed");
                    record_task_failure(self.stage.as_str());
                    failures.push(TaskFailure {
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            stage = %self.stage,
            completed = completed.len(),
            failed = failures.len(),
            "Fan-out finished"
        );

        FanIn {
            completed,
            failures,
        }
    }
}
