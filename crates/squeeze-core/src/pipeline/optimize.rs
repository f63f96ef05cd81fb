//! Optimize stage: re-encode cached downloads and measure the savings.
//!
//! Same bounded pool as the fetch stage, with the opposite failure policy:
//! a record that cannot be optimized keeps its default size fields and the
//! run continues.

use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::group_by_hash;
use super::observer::{PipelineObserver, Stage};
use crate::codec::Optimizer;
use crate::config::Config;
use crate::error::OptimizeError;
use crate::types::ImageRecord;

/// Settings for the optimize stage.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Maximum concurrent optimizations
    pub concurrency: usize,
    /// Per-image timeout in milliseconds
    pub timeout_ms: u64,
    /// Root of the hash-partitioned output tree
    pub output_dir: PathBuf,
}

impl OptimizeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.optimize.concurrency,
            timeout_ms: config.optimize.timeout_ms,
            output_dir: config.optimized_dir(),
        }
    }
}

/// Per-record counts for one optimize stage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    /// Records with a smaller optimized file
    pub optimized: usize,
    /// Records the optimizer produced nothing for
    pub no_gain: usize,
    /// Records whose optimization errored, timed out or panicked
    pub failed: usize,
    /// Records never dispatched (not fetched, or cancelled)
    pub skipped: usize,
}

#[derive(Debug, Clone)]
struct OptimizeJob {
    input: PathBuf,
    output_dir: PathBuf,
}

#[derive(Debug)]
enum OptimizeOutcome {
    Optimized { path: PathBuf, size: u64 },
    NoGain,
    Failed(OptimizeError),
}

/// Bounded-concurrency optimizer with per-record soft failures.
pub struct OptimizeStage {
    optimizer: Arc<dyn Optimizer>,
    options: Arc<OptimizeOptions>,
}

impl OptimizeStage {
    pub fn new(optimizer: Arc<dyn Optimizer>, options: OptimizeOptions) -> Self {
        Self {
            optimizer,
            options: Arc::new(options),
        }
    }

    /// Optimize every fetched record. Never fails.
    ///
    /// Cancellation stops dispatching; optimizations already running finish
    /// and are recorded.
    pub async fn run(
        &self,
        records: &mut [ImageRecord],
        cancel: &CancellationToken,
        observer: &dyn PipelineObserver,
    ) -> OptimizeStats {
        let mut stats = OptimizeStats::default();
        observer.stage_started(Stage::Optimize, records.len());

        let (fetched, unfetched): (Vec<usize>, Vec<usize>) =
            (0..records.len()).partition(|&idx| records[idx].is_fetched());
        for &idx in &unfetched {
            tracing::warn!(
                "Skipping optimization of {}: nothing was downloaded",
                records[idx].source_url
            );
            stats.skipped += 1;
            observer.item_finished(Stage::Optimize);
        }

        let eligible: Vec<ImageRecord> = fetched.iter().map(|&idx| records[idx].clone()).collect();
        let groups: Vec<Vec<usize>> = group_by_hash(&eligible)
            .into_iter()
            .map(|group| group.into_iter().map(|i| fetched[i]).collect())
            .collect();
        tracing::info!(
            "Optimizing {} record(s), {} unique image(s), via {} (concurrency {})",
            fetched.len(),
            groups.len(),
            self.optimizer.name(),
            self.options.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks: JoinSet<OptimizeOutcome> = JoinSet::new();
        // Task id -> group slot, so a task that dies still accounts for its owners
        let mut slots: HashMap<tokio::task::Id, usize> = HashMap::new();
        let mut queue = groups.iter().enumerate().peekable();

        while queue.peek().is_some() || !tasks.is_empty() {
            tokio::select! {
                biased;

                _ = cancel.cancelled(), if queue.peek().is_some() => {
                    let remaining: usize = queue.by_ref().map(|(_, owners)| owners.len()).sum();
                    tracing::warn!("Optimization cancelled, skipping {remaining} record(s)");
                    for _ in 0..remaining {
                        observer.item_finished(Stage::Optimize);
                    }
                    stats.skipped += remaining;
                }

                joined = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    let (id, outcome) = match joined {
                        Some(Ok((id, outcome))) => (id, outcome),
                        Some(Err(e)) => {
                            tracing::error!("Optimize task failed to join: {e}");
                            (e.id(), OptimizeOutcome::Failed(OptimizeError::Task(e.to_string())))
                        }
                        None => continue,
                    };
                    let Some(slot) = slots.remove(&id) else {
                        tracing::error!("Optimize task {id} has no owning records");
                        continue;
                    };
                    self.apply(records, &groups[slot], outcome, &mut stats);
                    for _ in &groups[slot] {
                        observer.item_finished(Stage::Optimize);
                    }
                }

                permit = semaphore.clone().acquire_owned(), if queue.peek().is_some() => {
                    let Ok(permit) = permit else {
                        tracing::error!("Optimize pool closed unexpectedly, stopping dispatch");
                        break;
                    };
                    let Some((slot, owners)) = queue.next() else { continue };

                    let job = self.job_for(&records[owners[0]]);
                    let optimizer = self.optimizer.clone();
                    let timeout_ms = self.options.timeout_ms;
                    let handle = tasks.spawn(async move {
                        let outcome = optimize_one(optimizer.as_ref(), &job, timeout_ms).await;
                        drop(permit);
                        outcome
                    });
                    slots.insert(handle.id(), slot);
                }
            }
        }

        tracing::info!(
            "Optimize complete: {} optimized, {} no gain, {} failed, {} skipped",
            stats.optimized,
            stats.no_gain,
            stats.failed,
            stats.skipped
        );
        stats
    }

    fn job_for(&self, record: &ImageRecord) -> OptimizeJob {
        OptimizeJob {
            input: record.cache_path.clone().unwrap_or_default(),
            output_dir: self.options.output_dir.join(&record.content_hash),
        }
    }

    fn apply(
        &self,
        records: &mut [ImageRecord],
        owners: &[usize],
        outcome: OptimizeOutcome,
        stats: &mut OptimizeStats,
    ) {
        match outcome {
            OptimizeOutcome::Optimized { path, size } => {
                for &idx in owners {
                    if records[idx].record_optimization(path.clone(), size) {
                        stats.optimized += 1;
                    } else {
                        stats.failed += 1;
                    }
                }
                let first = &records[owners[0]];
                tracing::debug!(
                    "Optimized {}: {:?} -> {size} bytes",
                    first.source_url,
                    first.original_size_bytes
                );
            }
            OptimizeOutcome::NoGain => {
                tracing::warn!(
                    "No optimized output for {}, keeping original size",
                    records[owners[0]].source_url
                );
                stats.no_gain += owners.len();
            }
            OptimizeOutcome::Failed(e) => {
                tracing::warn!(
                    "Optimization failed for {}: {e}",
                    records[owners[0]].source_url
                );
                stats.failed += owners.len();
            }
        }
    }
}

/// Run one optimization with a timeout, turning every failure into an outcome.
async fn optimize_one(optimizer: &dyn Optimizer, job: &OptimizeJob, timeout_ms: u64) -> OptimizeOutcome {
    if let Err(source) = tokio::fs::create_dir_all(&job.output_dir).await {
        return OptimizeOutcome::Failed(OptimizeError::Io {
            path: job.output_dir.clone(),
            source,
        });
    }

    let call = AssertUnwindSafe(optimizer.optimize(&job.input, &job.output_dir)).catch_unwind();
    let files = match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
        Ok(Ok(Ok(files))) => files,
        Ok(Ok(Err(e))) => return OptimizeOutcome::Failed(e),
        Ok(Err(_panic)) => {
            return OptimizeOutcome::Failed(OptimizeError::Panicked {
                path: job.input.clone(),
            })
        }
        Err(_) => {
            return OptimizeOutcome::Failed(OptimizeError::Timeout {
                path: job.input.clone(),
                timeout_ms,
            })
        }
    };

    // The first produced file is the one measured
    let Some(first) = files.into_iter().next() else {
        return OptimizeOutcome::NoGain;
    };
    match tokio::fs::metadata(&first.path).await {
        Ok(meta) => OptimizeOutcome::Optimized {
            path: first.path,
            size: meta.len(),
        },
        Err(source) => OptimizeOutcome::Failed(OptimizeError::Io {
            path: first.path,
            source,
        }),
    }
}
