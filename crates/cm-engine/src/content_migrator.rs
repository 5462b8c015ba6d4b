//! Migration of one content type.
//!
//! [`ContentMigrator`] drives the page loop of one content type:
//!
//! 1. Fetch a page from the source
//! 2. Create or reuse a manifest entry per item
//! 3. Map every item to its destination location
//! 4. Filter; removed items are marked skipped
//! 5. Hand the survivors to the batch migrator
//! 6. Finalize the batch's entries, run the batch completed hooks and fold
//!    the adjusted batch result
//! 7. Continue while the batch migrator allows it and pages remain
//!
//! Cancellation is checked between steps and ends the loop without being
//! recorded as an error.

use std::sync::Arc;

use cm_core::{ContentId, FxHashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::{BatchMigrator, MigrationBatch};
use crate::content::{ContentItem, ContentMigrationItem};
use crate::error::EngineError;
use crate::hooks::{BatchCompletedRunner, FilterRunner, MappingRunner, TransformerRunner};
use crate::manifest::ManifestEntryBuilder;
use crate::pager::{ContentPagerFactory, HierarchyPager, Pager};
use crate::result::{ContentMigrationResult, ResultBuilder};
use crate::scope::MigrationScope;
use crate::stats::MigrationStats;

/// Migrates every item of content type `T`.
pub struct ContentMigrator<T: ContentItem> {
    pagers: Arc<dyn ContentPagerFactory<T>>,
    batch_migrator: Arc<dyn BatchMigrator<T>>,
}

impl<T: ContentItem> Clone for ContentMigrator<T> {
    fn clone(&self) -> Self {
        Self {
            pagers: Arc::clone(&self.pagers),
            batch_migrator: Arc::clone(&self.batch_migrator),
        }
    }
}

/// The per-run hook runners of one content type.
struct Runners<T: ContentItem> {
    mappings: MappingRunner<T>,
    filters: FilterRunner<T>,
    transformers: Arc<TransformerRunner<T>>,
    batch_completed: BatchCompletedRunner<T>,
}

impl<T: ContentItem> ContentMigrator<T> {
    /// Creates a migrator reading pages from `pagers` and migrating batches
    /// through `batch_migrator`.
    #[must_use]
    pub fn new(
        pagers: Arc<dyn ContentPagerFactory<T>>,
        batch_migrator: Arc<dyn BatchMigrator<T>>,
    ) -> Self {
        Self {
            pagers,
            batch_migrator,
        }
    }

    fn pager(&self, scope: &MigrationScope) -> Box<dyn Pager<T>> {
        let batch_size = scope.config().batch.size_for(T::CONTENT_TYPE);
        let pager = self.pagers.pager(batch_size);
        if scope.config().migration.is_hierarchical(T::CONTENT_TYPE) {
            Box::new(HierarchyPager::new(pager, batch_size))
        } else {
            pager
        }
    }

    /// Migrates every item of `T` within `scope`.
    pub async fn migrate(
        &self,
        scope: &MigrationScope,
        cancel: &CancellationToken,
    ) -> ContentMigrationResult {
        let content_type = T::CONTENT_TYPE;
        let mut pager = self.pager(scope);
        let runners = Runners {
            mappings: MappingRunner::resolve(scope),
            filters: FilterRunner::resolve(scope),
            transformers: Arc::new(TransformerRunner::resolve(scope)),
            batch_completed: BatchCompletedRunner::resolve(scope),
        };
        let mut builder = ManifestEntryBuilder::new(scope.manifest().partition(content_type));
        let stats = MigrationStats::new();
        let mut result = ResultBuilder::new();
        let mut canceled = false;
        let mut sized = false;

        info!(%content_type, "Migrating content type");

        loop {
            if cancel.is_cancelled() {
                canceled = true;
                break;
            }

            let page = pager.next_page(cancel).await;
            if !page.success() {
                if page.errors.iter().all(EngineError::is_cancellation) {
                    canceled = true;
                } else {
                    warn!(%content_type, page = page.page_number, "Page fetch failed");
                    result.add_errors(page.errors);
                }
                break;
            }
            if page.items.is_empty() {
                break;
            }

            let last_page = page.fetched_all_pages;
            if !sized {
                builder = builder.with_capacity(page.total_count);
                sized = true;
            }
            let items = builder.create_entries(page.items);

            if cancel.is_cancelled() {
                Self::cancel_items(&items, &stats);
                canceled = true;
                break;
            }

            let items =
                Self::map_items(items, &runners, &builder, &stats, &mut result, cancel).await;

            if cancel.is_cancelled() {
                Self::cancel_items(&items, &stats);
                canceled = true;
                break;
            }

            let items = match Self::filter_items(items, &runners, &stats, cancel).await {
                Ok(items) => items,
                Err(FilterFailure::Canceled(items)) => {
                    Self::cancel_items(&items, &stats);
                    canceled = true;
                    break;
                }
                Err(FilterFailure::Failed(error)) => {
                    result.add_error(error);
                    if last_page || pager.fetched_all_pages() {
                        break;
                    }
                    continue;
                }
            };

            if cancel.is_cancelled() {
                Self::cancel_items(&items, &stats);
                canceled = true;
                break;
            }

            if items.is_empty() {
                debug!(%content_type, "Every item of the page was filtered out");
                if last_page || pager.fetched_all_pages() {
                    break;
                }
                continue;
            }

            let batch = MigrationBatch {
                items: items.clone(),
                transformers: Arc::clone(&runners.transformers),
                scope: scope.clone(),
            };
            let batch_result = self.batch_migrator.migrate_batch(batch, cancel).await;
            builder.batch_completed(&items, &batch_result, &stats, cancel);
            let batch_result = runners
                .batch_completed
                .execute(&items, batch_result, cancel)
                .await;
            result.add_batch(&batch_result);

            let progress = stats.snapshot();
            info!(
                %content_type,
                batch_size = items.len(),
                migrated = progress.migrated,
                skipped = progress.skipped,
                errors = progress.errors,
                total = page.total_count,
                "Batch completed"
            );

            if batch_result.canceled || cancel.is_cancelled() {
                canceled = true;
                break;
            }
            if !batch_result.perform_next_batch {
                debug!(%content_type, "Batch migrator stopped paging");
                break;
            }
            if last_page || pager.fetched_all_pages() {
                break;
            }
        }

        let result = result.into_result();
        let perform_next_action =
            !canceled && result.errors.iter().all(EngineError::is_recoverable);
        info!(
            %content_type,
            success = result.success,
            canceled,
            errors = result.errors.len(),
            "Content type finished"
        );
        ContentMigrationResult {
            result,
            perform_next_action,
            canceled,
        }
    }

    /// Runs the mappings for every item and records the final locations.
    ///
    /// Items whose mapping fails are marked failed and dropped. An entry that
    /// cannot take the failure (already migrated by a previous run) keeps its
    /// status; the error goes to `result` instead.
    async fn map_items(
        items: Vec<ContentMigrationItem<T>>,
        runners: &Runners<T>,
        builder: &ManifestEntryBuilder,
        stats: &MigrationStats,
        result: &mut ResultBuilder,
        cancel: &CancellationToken,
    ) -> Vec<ContentMigrationItem<T>> {
        let mut mapped = Vec::with_capacity(items.len());
        for item in items {
            match runners
                .mappings
                .execute(Arc::clone(&item.source_item), cancel)
                .await
            {
                Ok(context) => {
                    builder.map_entry(&item, context.mapped_location);
                    mapped.push(item);
                }
                // The item stays in the list so the caller can cancel it.
                Err(e) if e.is_cancellation() => mapped.push(item),
                Err(e) => {
                    if !item.manifest_entry.set_failed(std::slice::from_ref(&e)) {
                        warn!(
                            content_type = %T::CONTENT_TYPE,
                            item = %item.source_reference(),
                            status = item.manifest_entry.status().label(),
                            error = %e,
                            "Mapping failed for an entry that keeps its status"
                        );
                        result.add_error(e);
                    }
                    stats.record(item.manifest_entry.status());
                }
            }
        }
        mapped
    }

    /// Runs the filters and marks the removed items skipped.
    async fn filter_items(
        items: Vec<ContentMigrationItem<T>>,
        runners: &Runners<T>,
        stats: &MigrationStats,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentMigrationItem<T>>, FilterFailure<T>> {
        let all = items.clone();
        let kept = match runners.filters.execute(items, cancel).await {
            Ok(kept) => kept,
            Err(e) if e.is_cancellation() => return Err(FilterFailure::Canceled(all)),
            Err(e) => {
                for item in &all {
                    item.manifest_entry.set_failed(std::slice::from_ref(&e));
                    stats.record(item.manifest_entry.status());
                }
                return Err(FilterFailure::Failed(e));
            }
        };

        let kept_ids: FxHashSet<ContentId> =
            kept.iter().map(|item| item.source_reference().id).collect();
        for item in all.iter().filter(|i| !kept_ids.contains(&i.source_reference().id)) {
            item.manifest_entry.set_skipped();
            stats.record(item.manifest_entry.status());
        }
        Ok(kept)
    }

    fn cancel_items(items: &[ContentMigrationItem<T>], stats: &MigrationStats) {
        for item in items {
            item.manifest_entry.set_canceled();
            stats.record(item.manifest_entry.status());
        }
    }
}

enum FilterFailure<T> {
    Canceled(Vec<ContentMigrationItem<T>>),
    Failed(EngineError),
}

#[cfg(test)]
mod tests {
    use cm_core::{Config, ContentType, MigrationStatus};

    use super::*;
    use crate::hooks::{BatchCompletedBuilder, FilterBuilder, HookRegistry, MappingBuilder};
    use crate::test_support::{
        RecordingBatchMigrator, TestEndpoint, TestProject, TestUser, test_scope_with,
    };

    fn users(names: &[&str]) -> Vec<TestUser> {
        names.iter().map(|n| TestUser::named(n)).collect()
    }

    fn scope_with_batch_size(hooks: HookRegistry, size: usize) -> MigrationScope {
        let mut config = Config::default();
        config.batch.default_size = size;
        test_scope_with(hooks).with_config(config)
    }

    #[tokio::test]
    async fn test_batches_follow_batch_size() {
        let source = Arc::new(TestEndpoint::new().with_users(users(&["a", "b", "c", "d", "e"])));
        let batches = Arc::new(RecordingBatchMigrator::new());
        let migrator: ContentMigrator<TestUser> =
            ContentMigrator::new(source, Arc::clone(&batches) as _);
        let scope = scope_with_batch_size(HookRegistry::default(), 2);

        let result = migrator.migrate(&scope, &CancellationToken::new()).await;

        assert!(result.success());
        assert!(result.perform_next_action);
        assert_eq!(batches.batch_sizes(), vec![2, 2, 1]);
        assert_eq!(scope.manifest().summary().migrated, 5);
    }

    #[tokio::test]
    async fn test_filtered_items_are_skipped() {
        let source = Arc::new(TestEndpoint::new().with_users(users(&["alice", "svc_bot", "bob"])));
        let batches = Arc::new(RecordingBatchMigrator::new());
        let mut filters = FilterBuilder::new();
        filters.add_fn::<TestUser>(|item| !item.source_reference().name.starts_with("svc_"));
        let scope = scope_with_batch_size(filters.build(), 10);

        ContentMigrator::<TestUser>::new(source, Arc::clone(&batches) as _)
            .migrate(&scope, &CancellationToken::new())
            .await;

        assert_eq!(batches.migrated_names(), vec!["alice", "bob"]);
        let partition = scope.manifest().partition(ContentType::User);
        let bot = partition.by_location(&"svc_bot".into()).unwrap();
        assert_eq!(bot.status(), MigrationStatus::Skipped);
    }

    #[tokio::test]
    async fn test_stop_paging_when_batch_migrator_says_so() {
        let source = Arc::new(TestEndpoint::new().with_users(users(&["a", "b", "c", "d", "e", "f"])));
        let batches = Arc::new(RecordingBatchMigrator::new().stop_after_first_batch());
        let scope = scope_with_batch_size(HookRegistry::default(), 2);

        let result = ContentMigrator::<TestUser>::new(Arc::clone(&source) as _, Arc::clone(&batches) as _)
            .migrate(&scope, &CancellationToken::new())
            .await;

        assert!(result.success());
        assert_eq!(source.page_fetches(), 1);
        assert_eq!(batches.batch_sizes(), vec![2]);
    }

    #[tokio::test]
    async fn test_mapping_overwrites_previous_location() {
        let source = Arc::new(TestEndpoint::new().with_users(users(&["alice"])));
        let batches = Arc::new(RecordingBatchMigrator::new());
        let mut mappings = MappingBuilder::new();
        mappings.add_fn::<TestUser>(|ctx| Some(ctx.mapped_location.rename("alice@dest")));
        let scope = scope_with_batch_size(mappings.build(), 10);

        let entry = scope
            .manifest()
            .partition(ContentType::User)
            .get_or_create(&TestUser::named("alice").reference);
        entry.map_to("stale".into());

        ContentMigrator::<TestUser>::new(source, Arc::clone(&batches) as _)
            .migrate(&scope, &CancellationToken::new())
            .await;

        assert_eq!(entry.mapped_location().to_string(), "alice@dest");
    }

    #[tokio::test]
    async fn test_batch_completed_hook_adjusts_result() {
        let source = Arc::new(TestEndpoint::new().with_users(users(&["a", "b", "c", "d"])));
        let batches = Arc::new(RecordingBatchMigrator::new());
        let mut hooks = BatchCompletedBuilder::new();
        hooks.add_fn::<TestUser>(|items, result| {
            assert!(items.iter().all(|i| i.manifest_entry.status() == MigrationStatus::Migrated));
            result.success = false;
            result.errors.push(EngineError::batch(ContentType::User, "quota exceeded"));
            result.perform_next_batch = false;
        });
        let scope = scope_with_batch_size(hooks.build(), 2);

        let result = ContentMigrator::<TestUser>::new(Arc::clone(&source) as _, Arc::clone(&batches) as _)
            .migrate(&scope, &CancellationToken::new())
            .await;

        assert!(!result.success());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(batches.batch_sizes(), vec![2]);
        assert_eq!(source.page_fetches(), 1);
    }

    #[tokio::test]
    async fn test_mapping_failure_on_migrated_entry_is_reported() {
        let source = Arc::new(TestEndpoint::new().with_users(users(&["alice"])));
        let batches = Arc::new(RecordingBatchMigrator::new());
        let mut mappings = MappingBuilder::new();
        mappings.add_async_fn::<TestUser, _, _>(|ctx, _cancel| async move {
            Err(EngineError::item(ctx.mapped_location.clone(), "no target site"))
        });
        let scope = scope_with_batch_size(mappings.build(), 10);

        let alice = TestUser::named("alice");
        let entry = scope
            .manifest()
            .partition(ContentType::User)
            .get_or_create(&alice.reference);
        entry.set_migrated(alice.reference.clone());

        let result = ContentMigrator::<TestUser>::new(source, Arc::clone(&batches) as _)
            .migrate(&scope, &CancellationToken::new())
            .await;

        assert!(!result.success());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(entry.status(), MigrationStatus::Migrated);
        assert!(batches.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_page_failure_is_recorded() {
        let source = Arc::new(TestEndpoint::new().failing_pages("HTTP 500"));
        let batches = Arc::new(RecordingBatchMigrator::new());
        let scope = scope_with_batch_size(HookRegistry::default(), 10);

        let result = ContentMigrator::<TestUser>::new(source, Arc::clone(&batches) as _)
            .migrate(&scope, &CancellationToken::new())
            .await;

        assert!(!result.success());
        assert_eq!(result.errors().len(), 1);
        assert!(result.perform_next_action);
        assert!(batches.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_is_not_an_error() {
        let source = Arc::new(TestEndpoint::new().with_users(users(&["a", "b"])));
        let batches = Arc::new(RecordingBatchMigrator::new());
        let scope = scope_with_batch_size(HookRegistry::default(), 10);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ContentMigrator::<TestUser>::new(source, Arc::clone(&batches) as _)
            .migrate(&scope, &cancel)
            .await;

        assert!(result.canceled);
        assert!(result.success());
        assert!(result.errors().is_empty());
        assert!(!result.perform_next_action);
    }

    #[tokio::test]
    async fn test_hierarchical_types_migrate_parents_first() {
        let source = Arc::new(TestEndpoint::new().with_projects(vec![
            TestProject::at("a/b"),
            TestProject::at("a"),
            TestProject::at("c"),
        ]));
        let batches = Arc::new(RecordingBatchMigrator::new());
        let scope = scope_with_batch_size(HookRegistry::default(), 2);

        ContentMigrator::<TestProject>::new(source, Arc::clone(&batches) as _)
            .migrate(&scope, &CancellationToken::new())
            .await;

        assert_eq!(batches.migrated_names(), vec!["a", "c", "b"]);
    }
}
