//! Analysis pipeline components.
//!
//! This module contains the stages of a run:
//! - **extract**: Turn raw table rows into image records
//! - **fetch**: Download images into the content-addressed cache (fail-fast)
//! - **optimize**: Re-encode cached images and measure savings (soft-fail)
//! - **orchestrator**: Sequence the stages with a barrier between them
//! - **hash**: URL hashing for cache partitioning and dedup
//! - **retry**: Backoff and retry classification for downloads
//! - **observer**: Progress and state-change hooks

pub mod extract;
pub mod fetch;
pub mod hash;
pub mod observer;
pub mod optimize;
pub mod orchestrator;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient access
pub use extract::{normalize_location, template_category, RowExtractor};
pub use fetch::{FetchOptions, FetchStage, FetchStats};
pub use hash::Hasher;
pub use observer::{NoopObserver, PipelineObserver, PipelineState, Stage};
pub use optimize::{OptimizeOptions, OptimizeStage, OptimizeStats};
pub use orchestrator::{Pipeline, PipelineBuilder};

use std::collections::HashMap;

use crate::types::ImageRecord;

/// Group record indices by content hash, in order of first appearance.
///
/// Each group is processed once and its result applied to every index in it.
pub(crate) fn group_by_hash(records: &[ImageRecord]) -> Vec<Vec<usize>> {
    let mut slots: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        match slots.get(record.content_hash.as_str()) {
            Some(&slot) => groups[slot].push(idx),
            None => {
                slots.insert(record.content_hash.as_str(), groups.len());
                groups.push(vec![idx]);
            }
        }
    }

    groups
}
