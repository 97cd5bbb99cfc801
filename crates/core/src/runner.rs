//! Bounded-parallel task runner with per-task failure isolation.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Default width of a worker pool.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// A task that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Key of the originating item (page number, item id, ...).
    pub key: String,
    pub error: String,
}

/// Outcome of a batch: every success and every failure.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<TaskFailure>,
}

impl<T> BatchReport<T> {
    pub fn failed_keys(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.key.as_str()).collect()
    }
}

/// Runs one task per item, at most `concurrency` at a time.
///
/// Every task is awaited. A failing or panicking task is logged and recorded
/// in the report; its siblings keep running.
#[derive(Debug, Clone)]
pub struct BoundedBatchRunner {
    stage: &'static str,
    concurrency: usize,
}

impl BoundedBatchRunner {
    pub fn new(stage: &'static str, concurrency: usize) -> Self {
        Self {
            stage,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run_all<I, K, T, E, F, Fut>(
        &self,
        items: Vec<I>,
        key_fn: impl Fn(&I) -> K,
        task: F,
    ) -> BatchReport<T>
    where
        I: Send + 'static,
        K: Display,
        T: Send + 'static,
        E: Display + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let task = Arc::new(task);
        let mut set = JoinSet::new();

        debug!(
            stage = self.stage,
            tasks = total,
            concurrency = self.concurrency,
            "Dispatching batch"
        );

        for item in items {
            let key = key_fn(&item).to_string();
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);

            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let result = AssertUnwindSafe(async move { task(item).await })
                            .catch_unwind()
                            .await;
                        drop(permit);
                        match result {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(e)) => Err(e.to_string()),
                            Err(panic) => Err(format!("task panicked: {}", panic_message(&*panic))),
                        }
                    }
                    Err(_) => Err("worker pool closed".to_string()),
                };
                (key, outcome)
            });
        }

        let mut succeeded = Vec::with_capacity(total);
        let mut failures = Vec::new();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(value))) => succeeded.push(value),
                Ok((key, Err(error))) => {
                    warn!(stage = self.stage, key = %key, error = %error, "Task failed");
                    failures.push(TaskFailure { key, error });
                }
                Err(e) => {
                    error!(stage = self.stage, error = %e, "Task aborted");
                    failures.push(TaskFailure {
                        key: "<unknown>".to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            stage = self.stage,
            succeeded = succeeded.len(),
            failed = failures.len(),
            "Batch complete"
        );

        BatchReport {
            succeeded,
            failures,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
