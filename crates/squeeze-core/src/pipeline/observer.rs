//! Progress hooks for pipeline runs.

use std::fmt;

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Extracting,
    Fetching,
    Optimizing,
    Reporting,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extracting => "extracting",
            Self::Fetching => "fetching",
            Self::Optimizing => "optimizing",
            Self::Reporting => "reporting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A concurrent stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Fetch,
    Optimize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Optimize => f.write_str("optimize"),
        }
    }
}

/// Receives pipeline events. Every method defaults to a no-op.
///
/// Calls come from the task driving the pipeline, never concurrently.
pub trait PipelineObserver: Send + Sync {
    /// The orchestrator entered `state`.
    fn state_changed(&self, _state: PipelineState) {}

    /// `stage` is about to process `total` records.
    fn stage_started(&self, _stage: Stage, _total: usize) {}

    /// One record of `stage` is finished, whatever the outcome.
    fn item_finished(&self, _stage: Stage) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
