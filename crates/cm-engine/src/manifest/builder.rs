//! Creating and finalizing manifest entries for one page of source items.

use std::sync::Arc;

use cm_core::{ContentLocation, MigrationStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::partition::ManifestPartition;
use crate::content::{ContentItem, ContentMigrationItem};
use crate::error::EngineError;
use crate::result::BatchResult;
use crate::stats::MigrationStats;

/// Pairs source items with manifest entries of one partition.
///
/// The content migrator creates one builder per content type per run.
#[derive(Debug, Clone)]
pub struct ManifestEntryBuilder {
    partition: Arc<ManifestPartition>,
}

impl ManifestEntryBuilder {
    /// Creates a builder over `partition`.
    #[must_use]
    pub const fn new(partition: Arc<ManifestPartition>) -> Self {
        Self { partition }
    }

    /// Pre-sizes the partition for `total` source items.
    ///
    /// Entries already in the partition (seeded from a previous run) are
    /// not counted twice.
    #[must_use]
    pub fn with_capacity(self, total: usize) -> Self {
        let additional = total.saturating_sub(self.partition.len());
        if additional > 0 {
            self.partition.reserve(additional);
        }
        self
    }

    /// The partition entries are created in.
    #[inline]
    #[must_use]
    pub fn partition(&self) -> &Arc<ManifestPartition> {
        &self.partition
    }

    /// Creates or reuses one entry per item.
    #[must_use]
    pub fn create_entries<T: ContentItem>(&self, items: Vec<T>) -> Vec<ContentMigrationItem<T>> {
        items
            .into_iter()
            .map(|item| {
                let entry = self.partition.get_or_create(item.reference());
                ContentMigrationItem::new(Arc::new(item), entry)
            })
            .collect()
    }

    /// Sets the destination location of one item, replacing any previous
    /// mapping.
    pub fn map_entry<T: ContentItem>(&self, item: &ContentMigrationItem<T>, location: ContentLocation) {
        item.manifest_entry.map_to(location);
    }

    /// Finalizes the entries of a batch once the batch migrator returned.
    ///
    /// Entries the batch migrator left pending become canceled when the run
    /// was canceled, otherwise they fail with the batch's errors (or a
    /// generic "not processed" error). Every item's final status is counted
    /// in `stats`.
    pub fn batch_completed<T: ContentItem>(
        &self,
        items: &[ContentMigrationItem<T>],
        result: &BatchResult,
        stats: &MigrationStats,
        cancel: &CancellationToken,
    ) {
        let canceled = result.canceled || cancel.is_cancelled();
        let mut unfinished = 0usize;

        for item in items {
            if item.manifest_entry.status() == MigrationStatus::Pending {
                unfinished += 1;
                if canceled {
                    item.manifest_entry.set_canceled();
                } else {
                    let location = item.source_reference().location.clone();
                    let mut errors: Vec<EngineError> = result
                        .errors
                        .iter()
                        .filter(|e| !e.is_cancellation())
                        .cloned()
                        .collect();
                    if errors.is_empty() {
                        errors.push(EngineError::item(
                            location,
                            "batch finished without processing the item",
                        ));
                    }
                    item.manifest_entry.set_failed(&errors);
                }
            }
            stats.record(item.manifest_entry.status());
        }

        if unfinished > 0 {
            if canceled {
                debug!(
                    content_type = %T::CONTENT_TYPE,
                    count = unfinished,
                    "Marked unfinished items as canceled"
                );
            } else {
                warn!(
                    content_type = %T::CONTENT_TYPE,
                    count = unfinished,
                    "Batch left items unprocessed"
                );
            }
        }
    }
}
