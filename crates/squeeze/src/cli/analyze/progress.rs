//! Progress bars driven by pipeline events.

use indicatif::{ProgressBar, ProgressStyle};
use squeeze_core::{PipelineObserver, PipelineState, Stage};
use std::sync::Mutex;

/// Shows one progress bar per concurrent stage on stderr.
pub struct ProgressObserver {
    enabled: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressObserver {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            bar: Mutex::new(None),
        }
    }

    /// Finish whatever bar is still shown.
    pub fn finish(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(bar) = bar.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn create_bar(&self, stage: Stage, total: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} {prefix:>8} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        pb.set_style(style);
        pb.set_prefix(stage.to_string());
        pb
    }
}

impl PipelineObserver for ProgressObserver {
    fn state_changed(&self, state: PipelineState) {
        if state.is_terminal() {
            self.finish();
        }
    }

    fn stage_started(&self, stage: Stage, total: usize) {
        let next = self.create_bar(stage, total as u64);
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(previous) = bar.replace(next) {
                previous.finish();
            }
        }
    }

    fn item_finished(&self, _stage: Stage) {
        if let Ok(bar) = self.bar.lock() {
            if let Some(bar) = bar.as_ref() {
                bar.inc(1);
            }
        }
    }
}
