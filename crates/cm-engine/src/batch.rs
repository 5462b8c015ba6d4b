//! Batch migration.
//!
//! The content migrator hands each filtered page to a [`BatchMigrator`].
//! Batch migrators are type specific and live outside the engine; the engine
//! provides [`ItemBatchMigrator`], which publishes items one by one through
//! an [`ItemMigrator`] with bounded concurrency.
//!
//! A failed item never fails its batch: the error is recorded on the item's
//! manifest entry. Items are not retried within a run; a later run seeded
//! from the manifest picks them up again.

use std::sync::Arc;

use async_trait::async_trait;
use cm_core::ContentReference;
use futures_util::StreamExt;
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::content::{ContentItem, ContentMigrationItem};
use crate::error::{EngineError, EngineResult};
use crate::hooks::TransformerRunner;
use crate::result::BatchResult;
use crate::scope::MigrationScope;

/// One batch of items to migrate.
pub struct MigrationBatch<T> {
    /// Items that passed filtering, with their mapped manifest entries.
    pub items: Vec<ContentMigrationItem<T>>,

    /// Transformers to apply before publishing.
    pub transformers: Arc<TransformerRunner<T>>,

    /// The run's scope.
    pub scope: MigrationScope,
}

/// Migrates batches of one content type.
///
/// Implementations record each item's outcome on its manifest entry. Items
/// left pending are finalized by the content migrator once the batch
/// returns.
#[async_trait]
pub trait BatchMigrator<T: ContentItem>: Send + Sync {
    /// Migrates `batch`.
    async fn migrate_batch(&self, batch: MigrationBatch<T>, cancel: &CancellationToken)
    -> BatchResult;
}

/// Publishes one item to the destination.
#[async_trait]
pub trait ItemMigrator<T: ContentItem>: Send + Sync {
    /// Publishes `publishable`, the transformed form of `item`, and returns
    /// the destination reference.
    async fn migrate_item(
        &self,
        item: &ContentMigrationItem<T>,
        publishable: Arc<T>,
        scope: &MigrationScope,
        cancel: &CancellationToken,
    ) -> EngineResult<ContentReference>;
}

/// A [`BatchMigrator`] that publishes items independently.
///
/// Up to `migration.item_concurrency` items are in flight at once.
pub struct ItemBatchMigrator<M> {
    item_migrator: M,
}

impl<M> ItemBatchMigrator<M> {
    /// Publishes items through `item_migrator`.
    pub const fn new(item_migrator: M) -> Self {
        Self { item_migrator }
    }

    async fn migrate_one<T>(
        &self,
        item: &ContentMigrationItem<T>,
        transformers: &TransformerRunner<T>,
        scope: &MigrationScope,
        cancel: &CancellationToken,
    ) -> EngineResult<ContentReference>
    where
        T: ContentItem,
        M: ItemMigrator<T>,
    {
        if cancel.is_cancelled() {
            return Err(EngineError::Canceled);
        }
        let publishable = transformers
            .execute(Arc::clone(&item.source_item), cancel)
            .await?;
        self.item_migrator
            .migrate_item(item, publishable, scope, cancel)
            .await
    }
}

#[async_trait]
impl<T, M> BatchMigrator<T> for ItemBatchMigrator<M>
where
    T: ContentItem,
    M: ItemMigrator<T>,
{
    async fn migrate_batch(
        &self,
        batch: MigrationBatch<T>,
        cancel: &CancellationToken,
    ) -> BatchResult {
        if cancel.is_cancelled() {
            return BatchResult::canceled();
        }

        let MigrationBatch {
            items,
            transformers,
            scope,
        } = batch;
        let concurrency = scope.config().migration.item_concurrency.max(1);
        let transformers = transformers.as_ref();
        let scope = &scope;

        let outcomes: Vec<_> = stream::iter(items.iter().cloned())
            .map(|item| async move {
                let outcome = self.migrate_one(&item, transformers, scope, cancel).await;
                (item, outcome)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut failed = 0usize;
        for (item, outcome) in outcomes {
            match outcome {
                Ok(destination) => {
                    item.manifest_entry.set_migrated(destination);
                }
                Err(e) if e.is_cancellation() => {
                    item.manifest_entry.set_canceled();
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        content_type = %T::CONTENT_TYPE,
                        item = %item.source_reference(),
                        error = %e,
                        "Item migration failed"
                    );
                    item.manifest_entry.set_failed(&[e]);
                }
            }
        }

        debug!(
            content_type = %T::CONTENT_TYPE,
            items = items.len(),
            failed,
            "Batch migrated"
        );

        if cancel.is_cancelled() {
            BatchResult::canceled()
        } else {
            BatchResult::succeeded()
        }
    }
}
