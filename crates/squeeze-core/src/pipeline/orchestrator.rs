//! Pipeline orchestration - sequences the stages of one analysis run.
//!
//! ```text
//! Extracting -> Fetching -> Optimizing -> Reporting -> Done
//!      \____________\___________________________\____> Failed
//! ```
//!
//! Each stage finishes for every record before the next one starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::extract::RowExtractor;
use super::fetch::{FetchOptions, FetchStage};
use super::observer::{NoopObserver, PipelineObserver, PipelineState};
use super::optimize::{OptimizeOptions, OptimizeStage};
use crate::codec::{ImageOptimizer, Optimizer};
use crate::config::Config;
use crate::error::{InputError, ReportError, Result, SqueezeError};
use crate::remote::{Fetcher, HttpFetcher};
use crate::report::ReportWriter;
use crate::tabular::{FileTable, TableReader, TableWriter};
use crate::types::{ImageRecord, RunSummary};

/// Wires collaborators into a [`Pipeline`]. Anything not injected gets the
/// file/HTTP/image implementation built from the config.
pub struct PipelineBuilder {
    config: Config,
    fetcher: Option<Arc<dyn Fetcher>>,
    optimizer: Option<Arc<dyn Optimizer>>,
    reader: Option<Arc<dyn TableReader>>,
    writer: Option<Arc<dyn TableWriter>>,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl PipelineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            fetcher: None,
            optimizer: None,
            reader: None,
            writer: None,
            observer: None,
        }
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn reader(mut self, reader: Arc<dyn TableReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn writer(mut self, writer: Arc<dyn TableWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate the config and assemble the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&self.config.fetch)?),
        };
        let optimizer = self
            .optimizer
            .unwrap_or_else(|| Arc::new(ImageOptimizer::new(&self.config.optimize)));
        let reader = self.reader.unwrap_or_else(|| Arc::new(FileTable));
        let writer = self.writer.unwrap_or_else(|| Arc::new(FileTable));
        let observer = self.observer.unwrap_or_else(|| Arc::new(NoopObserver));

        tracing::debug!(
            "Pipeline: fetcher={}, optimizer={}, cache={:?}",
            fetcher.name(),
            optimizer.name(),
            self.config.cache_dir()
        );

        Ok(Pipeline {
            extractor: RowExtractor::new(self.config.input.clone()),
            fetch: FetchStage::new(fetcher, FetchOptions::from_config(&self.config)),
            optimize: OptimizeStage::new(optimizer, OptimizeOptions::from_config(&self.config)),
            reader,
            report: ReportWriter::new(writer),
            observer,
            state: PipelineState::Extracting,
            history: Vec::new(),
        })
    }
}

/// One analysis run: input table in, report table out.
pub struct Pipeline {
    extractor: RowExtractor,
    fetch: FetchStage,
    optimize: OptimizeStage,
    reader: Arc<dyn TableReader>,
    report: ReportWriter,
    observer: Arc<dyn PipelineObserver>,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl Pipeline {
    /// Build a pipeline with the default collaborators.
    pub fn from_config(config: Config) -> Result<Self> {
        PipelineBuilder::new(config).build()
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// States entered during the last run, in order.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Run every stage and write the report to `output`.
    ///
    /// On failure the report is not written and the first error is returned.
    pub async fn run(
        &mut self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        self.history.clear();

        self.enter(PipelineState::Extracting);
        let extracted = self.extract(input).await;
        let mut records = match extracted {
            Ok(records) => records,
            Err(e) => return Err(self.fail(e)),
        };

        self.enter(PipelineState::Fetching);
        let fetched = self
            .fetch
            .run(&mut records, cancel, self.observer.as_ref())
            .await;
        let fetch_stats = match fetched {
            Ok(stats) => stats,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.enter(PipelineState::Optimizing);
        let optimize_stats = self
            .optimize
            .run(&mut records, cancel, self.observer.as_ref())
            .await;

        self.enter(PipelineState::Reporting);
        let mut summary = RunSummary {
            fetched: fetch_stats.downloaded,
            cache_hits: fetch_stats.cache_hits,
            optimized: optimize_stats.optimized,
            no_gain: optimize_stats.no_gain,
            failed: optimize_stats.failed + optimize_stats.skipped,
            ..RunSummary::default()
        };
        summary.tally(&records);

        let written = self.write_report(output, records).await;
        if let Err(e) = written {
            return Err(self.fail(e.into()));
        }

        summary.elapsed = start.elapsed();
        self.enter(PipelineState::Done);
        tracing::info!(
            "Analysis complete: {} record(s) in {:?}",
            summary.records,
            summary.elapsed
        );
        Ok(summary)
    }

    /// Read and extract on a blocking thread; table parsing is synchronous.
    async fn extract(&self, input: &Path) -> Result<Vec<ImageRecord>> {
        let reader = self.reader.clone();
        let path = input.to_path_buf();
        let rows = tokio::task::spawn_blocking(move || reader.read_table(&path))
            .await
            .map_err(|e| InputError::Read {
                path: input.to_path_buf(),
                message: format!("Reader task failed: {e}"),
            })??;

        Ok(self.extractor.extract(input, &rows)?)
    }

    async fn write_report(
        &self,
        output: &Path,
        records: Vec<ImageRecord>,
    ) -> std::result::Result<(), ReportError> {
        let report = self.report.clone();
        let path: PathBuf = output.to_path_buf();
        tokio::task::spawn_blocking(move || report.write(&path, &records))
            .await
            .map_err(|e| ReportError::Write {
                path: output.to_path_buf(),
                message: format!("Writer task failed: {e}"),
            })?
    }

    fn enter(&mut self, state: PipelineState) {
        tracing::debug!("Pipeline state: {} -> {}", self.state, state);
        self.state = state;
        self.history.push(state);
        self.observer.state_changed(state);
    }

    fn fail(&mut self, error: SqueezeError) -> SqueezeError {
        tracing::error!("Pipeline failed while {}: {error}", self.state);
        self.enter(PipelineState::Failed);
        error
    }
}
