//! Mock collaborators shared by the pipeline tests.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::observer::{PipelineObserver, PipelineState, Stage};
use crate::codec::Optimizer;
use crate::error::{FetchError, InputError, OptimizeError, ReportError};
use crate::remote::{ByteStream, Fetcher};
use crate::tabular::{RawRow, TableReader, TableRow, TableWriter};
use crate::types::{ImageRecord, OptimizedFile};

/// Tracks concurrent calls. The counter drops when the guard does, so
/// aborted calls are accounted for too.
#[derive(Debug, Default, Clone)]
pub(crate) struct InFlight {
    pub current: Arc<AtomicU32>,
    pub max: Arc<AtomicU32>,
    pub calls: Arc<AtomicU32>,
}

pub(crate) struct InFlightGuard(Arc<AtomicU32>);

impl InFlight {
    pub fn enter(&self) -> InFlightGuard {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self.current.clone())
    }

    pub fn max(&self) -> u32 {
        self.max.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serves canned bodies by URL. Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub(crate) struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    /// Serve the first chunk, then never finish the body
    stall: bool,
    /// Calls that fail with HTTP 503 before the body is served
    transient_failures: AtomicU32,
    pub in_flight: InFlight,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, size: usize) -> Self {
        self.bodies.insert(url.to_string(), vec![0xAB; size]);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError> {
        let _guard = self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(FetchError::Network {
                url: url.to_string(),
                message: "HTTP 503 Service Unavailable".to_string(),
                status_code: Some(503),
            });
        }

        let Some(body) = self.bodies.get(url) else {
            return Err(FetchError::Network {
                url: url.to_string(),
                message: "connect error: host unreachable".to_string(),
                status_code: None,
            });
        };

        // Two chunks so the writer sees a real stream
        let mid = body.len() / 2;
        if self.stall {
            let first = futures_util::stream::iter(vec![Ok(body[..mid].to_vec())]);
            return Ok(first.chain(futures_util::stream::pending()).boxed());
        }
        let chunks = vec![Ok(body[..mid].to_vec()), Ok(body[mid..].to_vec())];
        Ok(futures_util::stream::iter(chunks).boxed())
    }
}

/// What the mock optimizer does for a given input file name.
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    /// Write an output of this many bytes
    Shrink(u64),
    /// Produce nothing
    NoGain,
    /// Return a decode error
    Fail,
    /// Never finish
    Hang,
}

pub(crate) struct MockOptimizer {
    by_name: HashMap<String, Behavior>,
    default: Behavior,
    delay: Option<Duration>,
    pub in_flight: InFlight,
}

impl MockOptimizer {
    pub fn new(default: Behavior) -> Self {
        Self {
            by_name: HashMap::new(),
            default,
            delay: None,
            in_flight: InFlight::default(),
        }
    }

    pub fn with(mut self, file_name: &str, behavior: Behavior) -> Self {
        self.by_name.insert(file_name.to_string(), behavior);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Optimizer for MockOptimizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn optimize(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<Vec<OptimizedFile>, OptimizeError> {
        let _guard = self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let behavior = self.by_name.get(&file_name).unwrap_or(&self.default);

        match behavior {
            Behavior::Shrink(size) => {
                let path = output_dir.join(&file_name);
                tokio::fs::write(&path, vec![0u8; *size as usize])
                    .await
                    .map_err(|source| OptimizeError::Io {
                        path: path.clone(),
                        source,
                    })?;
                Ok(vec![OptimizedFile { path, size: *size }])
            }
            Behavior::NoGain => Ok(vec![]),
            Behavior::Fail => Err(OptimizeError::Decode {
                path: input.to_path_buf(),
                message: "corrupt data".to_string(),
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(vec![])
            }
        }
    }
}

/// Records every event it receives.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    State(PipelineState),
    Started(Stage, usize),
    Finished(Stage),
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl PipelineObserver for RecordingObserver {
    fn state_changed(&self, state: PipelineState) {
        self.events.lock().unwrap().push(Event::State(state));
    }

    fn stage_started(&self, stage: Stage, total: usize) {
        self.events.lock().unwrap().push(Event::Started(stage, total));
    }

    fn item_finished(&self, stage: Stage) {
        self.events.lock().unwrap().push(Event::Finished(stage));
    }
}

/// Serves fixed rows regardless of path.
pub(crate) struct StaticReader(pub Vec<RawRow>);

impl TableReader for StaticReader {
    fn read_table(&self, _path: &Path) -> Result<Vec<RawRow>, InputError> {
        Ok(self.0.clone())
    }
}

/// Keeps written tables in memory.
#[derive(Default)]
pub(crate) struct MemoryWriter {
    pub tables: Mutex<Vec<(PathBuf, Vec<TableRow>)>>,
}

impl TableWriter for MemoryWriter {
    fn write_table(
        &self,
        path: &Path,
        rows: &[TableRow],
        _columns: &[&str],
    ) -> Result<(), ReportError> {
        self.tables
            .lock()
            .unwrap()
            .push((path.to_path_buf(), rows.to_vec()));
        Ok(())
    }
}

/// Always fails to write.
pub(crate) struct FailingWriter;

impl TableWriter for FailingWriter {
    fn write_table(
        &self,
        path: &Path,
        _rows: &[TableRow],
        _columns: &[&str],
    ) -> Result<(), ReportError> {
        Err(ReportError::Write {
            path: path.to_path_buf(),
            message: "disk full".to_string(),
        })
    }
}

/// Build a raw input row with the default column names.
pub(crate) fn input_row(id: &str, template: &str, url: &str) -> RawRow {
    [
        ("content_id", id),
        ("type", "hero"),
        ("template", template),
        ("location", url),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// A record for `url` with filler metadata.
pub(crate) fn record(id: &str, url: &str) -> ImageRecord {
    ImageRecord::new(id, "hero", "Hero", "gloBnHeroImage", url)
}
