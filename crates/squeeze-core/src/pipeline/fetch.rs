//! Fetch stage: download every record's image into the cache.
//!
//! Downloads run in a bounded pool (semaphore + `JoinSet`). Records sharing a
//! content hash are downloaded once and the result is applied to all of
//! them. The first error aborts the whole stage: downloads still in flight
//! are dropped and nothing is reported.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::observer::{PipelineObserver, Stage};
use super::{group_by_hash, retry};
use crate::config::Config;
use crate::error::FetchError;
use crate::remote::Fetcher;
use crate::types::ImageRecord;

/// Settings for the fetch stage.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum concurrent downloads
    pub concurrency: usize,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries after the first attempt for transient failures
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
    /// Use an existing non-empty cache file instead of downloading
    pub reuse_cached: bool,
    /// Root of the hash-partitioned download tree
    pub download_dir: PathBuf,
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.fetch.concurrency,
            timeout_ms: config.fetch.timeout_ms,
            retry_attempts: config.fetch.retry_attempts,
            retry_delay_ms: config.fetch.retry_delay_ms,
            reuse_cached: config.fetch.reuse_cached,
            download_dir: config.download_dir(),
        }
    }
}

/// Counts for one fetch stage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Distinct URLs in the input
    pub unique: usize,
    /// URLs downloaded in this run
    pub downloaded: usize,
    /// URLs served from an existing cache file
    pub cache_hits: usize,
}

/// One download, shared by every record with the same hash.
#[derive(Debug, Clone)]
struct FetchJob {
    url: String,
    partition: PathBuf,
    dest: PathBuf,
}

#[derive(Debug)]
enum FetchOutcome {
    Downloaded { path: PathBuf, size: u64 },
    CacheHit { path: PathBuf, size: u64 },
}

/// Bounded-concurrency, fail-fast downloader.
pub struct FetchStage {
    fetcher: Arc<dyn Fetcher>,
    options: Arc<FetchOptions>,
}

impl FetchStage {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: FetchOptions) -> Self {
        Self {
            fetcher,
            options: Arc::new(options),
        }
    }

    /// Download all records, filling `cache_path` and `original_size_bytes`.
    ///
    /// Returns the first error encountered; records may be partially
    /// filled in that case and must not be reported.
    pub async fn run(
        &self,
        records: &mut [ImageRecord],
        cancel: &CancellationToken,
        observer: &dyn PipelineObserver,
    ) -> Result<FetchStats, FetchError> {
        let groups = group_by_hash(records);
        let mut stats = FetchStats {
            unique: groups.len(),
            ..FetchStats::default()
        };
        observer.stage_started(Stage::Fetch, records.len());
        tracing::info!(
            "Fetching {} record(s), {} unique URL(s), via {} (concurrency {})",
            records.len(),
            groups.len(),
            self.fetcher.name(),
            self.options.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        // Dropping the set on any early return aborts downloads still in flight.
        let mut tasks: JoinSet<(usize, Result<FetchOutcome, FetchError>)> = JoinSet::new();
        let mut queue = groups.iter().enumerate().peekable();

        while queue.peek().is_some() || !tasks.is_empty() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::warn!("Fetch cancelled with {} download(s) in flight", tasks.len());
                    return Err(FetchError::Cancelled);
                }

                joined = tasks.join_next(), if !tasks.is_empty() => {
                    let Some(joined) = joined else { continue };
                    let (slot, result) = joined.map_err(|e| FetchError::Task(e.to_string()))?;
                    let outcome = result?;

                    let (path, size) = match outcome {
                        FetchOutcome::Downloaded { path, size } => {
                            stats.downloaded += 1;
                            (path, size)
                        }
                        FetchOutcome::CacheHit { path, size } => {
                            stats.cache_hits += 1;
                            (path, size)
                        }
                    };
                    for &idx in &groups[slot] {
                        records[idx].record_fetch(path.clone(), size);
                        observer.item_finished(Stage::Fetch);
                    }
                }

                permit = semaphore.clone().acquire_owned(), if queue.peek().is_some() => {
                    let permit = permit
                        .map_err(|_| FetchError::Task("download pool closed".to_string()))?;
                    let Some((slot, owners)) = queue.next() else { continue };

                    let job = self.job_for(&records[owners[0]]);
                    let fetcher = self.fetcher.clone();
                    let options = self.options.clone();
                    tasks.spawn(async move {
                        let result = fetch_one(fetcher.as_ref(), &job, &options).await;
                        drop(permit);
                        (slot, result)
                    });
                }
            }
        }

        tracing::info!(
            "Fetch complete: {} downloaded, {} from cache",
            stats.downloaded,
            stats.cache_hits
        );
        Ok(stats)
    }

    fn job_for(&self, record: &ImageRecord) -> FetchJob {
        let partition = self.options.download_dir.join(&record.content_hash);
        let dest = partition.join(&record.file_name);
        FetchJob {
            url: record.source_url.clone(),
            partition,
            dest,
        }
    }
}

/// Ensure the partition exists, then download with timeout and retries.
async fn fetch_one(
    fetcher: &dyn Fetcher,
    job: &FetchJob,
    options: &FetchOptions,
) -> Result<FetchOutcome, FetchError> {
    // create_dir_all treats an existing directory as success
    tokio::fs::create_dir_all(&job.partition)
        .await
        .map_err(|source| FetchError::CacheDir {
            path: job.partition.clone(),
            source,
        })?;

    if options.reuse_cached {
        if let Ok(meta) = tokio::fs::metadata(&job.dest).await {
            if meta.is_file() && meta.len() > 0 {
                tracing::debug!("Cache hit for {}", job.url);
                return Ok(FetchOutcome::CacheHit {
                    path: job.dest.clone(),
                    size: meta.len(),
                });
            }
        }
    }

    let timeout = Duration::from_millis(options.timeout_ms);
    let mut last_error = None;

    for attempt in 0..=options.retry_attempts {
        if attempt > 0 {
            let delay = retry::backoff_duration(attempt - 1, options.retry_delay_ms);
            tracing::debug!(
                "Retry {attempt}/{} for {} after {delay:?}",
                options.retry_attempts,
                job.url
            );
            tokio::time::sleep(delay).await;
        }

        let error = match tokio::time::timeout(timeout, download(fetcher, &job.url, &job.dest)).await
        {
            Ok(Ok(size)) => {
                tracing::debug!("Downloaded {} ({size} bytes)", job.url);
                return Ok(FetchOutcome::Downloaded {
                    path: job.dest.clone(),
                    size,
                });
            }
            Ok(Err(e)) => e,
            Err(_) => FetchError::Timeout {
                url: job.url.clone(),
                timeout_ms: options.timeout_ms,
            },
        };

        if !retry::is_retryable(&error) {
            return Err(error);
        }
        tracing::warn!("Attempt {} for {} failed: {error}", attempt + 1, job.url);
        last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| FetchError::Task(format!("no attempt made for {}", job.url))))
}

/// Stream the body into a sibling `.part` file, then move it into place.
///
/// A cache file therefore only ever holds a complete download.
async fn download(fetcher: &dyn Fetcher, url: &str, dest: &Path) -> Result<u64, FetchError> {
    let mut stream = fetcher.fetch(url).await?;

    let mut partial = PartialFile::new(partial_path(dest));
    let mut file = tokio::fs::File::create(partial.path())
        .await
        .map_err(write_error(partial.path()))?;
    let mut size = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(write_error(partial.path()))?;
        size += chunk.len() as u64;
    }
    file.flush().await.map_err(write_error(partial.path()))?;
    drop(file);

    tokio::fs::rename(partial.path(), dest)
        .await
        .map_err(write_error(dest))?;
    partial.keep();
    Ok(size)
}

/// Removes an unfinished `.part` file when dropped, including when the
/// download future is dropped by a timeout or an aborted task.
struct PartialFile {
    path: PathBuf,
    done: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, done: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(&mut self) {
        self.done = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.done {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!("Could not remove {:?}: {e}", self.path);
                }
            }
        }
    }
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> FetchError {
    let path = path.to_path_buf();
    move |source| FetchError::Write { path, source }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
