//! Built-in hooks.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use cm_core::ContentLocation;
use tokio_util::sync::CancellationToken;

use super::filter::{ContentFilter, GenericFilter};
use super::mapping::{ContentMapping, ContentMappingContext, GenericMapping, MappingResult};
use crate::content::{ContentItem, ContentMigrationItem};
use crate::error::EngineResult;
use crate::scope::MigrationScope;

/// Skips items a previous run already migrated.
///
/// Only entries seeded from a previous manifest can be migrated before the
/// filter runs, so on a fresh run this filter keeps everything. Disabled when
/// `migration.skip_previously_migrated` is off.
pub struct PreviouslyMigratedFilter<T> {
    enabled: bool,
    _item: PhantomData<fn(&T)>,
}

impl<T: ContentItem> PreviouslyMigratedFilter<T> {
    /// Creates the filter for the run in `scope`.
    #[must_use]
    pub fn new(scope: &MigrationScope) -> Self {
        Self {
            enabled: scope.config().migration.skip_previously_migrated,
            _item: PhantomData,
        }
    }
}

#[async_trait]
impl<T: ContentItem> ContentFilter<T> for PreviouslyMigratedFilter<T> {
    fn name(&self) -> &str {
        "PreviouslyMigratedFilter"
    }

    fn is_disabled(&self) -> bool {
        !self.enabled
    }

    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        _cancel: &CancellationToken,
    ) -> EngineResult<Vec<ContentMigrationItem<T>>> {
        Ok(items
            .into_iter()
            .filter(|item| !item.manifest_entry.status().is_migrated())
            .collect())
    }
}

/// Registers [`PreviouslyMigratedFilter`] for several types at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipPreviouslyMigrated;

impl GenericFilter for SkipPreviouslyMigrated {
    fn create<T: ContentItem>(&self, scope: &MigrationScope) -> Arc<dyn ContentFilter<T>> {
        Arc::new(PreviouslyMigratedFilter::<T>::new(scope))
    }
}

/// Moves items under a new location prefix.
///
/// Items whose mapped location starts with `from` get `from` replaced by
/// `to`; other items are left unchanged.
///
/// # Examples
///
/// ```ignore
/// mappings.add_generic::<(Project, Workbook), _>(LocationPrefixMapping::new(
///     ContentLocation::from_path("Finance"),
///     ContentLocation::from_path("Imported/Finance"),
/// ));
/// ```
#[derive(Debug, Clone)]
pub struct LocationPrefixMapping {
    from: ContentLocation,
    to: ContentLocation,
}

impl LocationPrefixMapping {
    /// Maps locations under `from` to the same relative location under `to`.
    #[must_use]
    pub const fn new(from: ContentLocation, to: ContentLocation) -> Self {
        Self { from, to }
    }
}

#[async_trait]
impl<T: ContentItem> ContentMapping<T> for LocationPrefixMapping {
    fn name(&self) -> &str {
        "LocationPrefixMapping"
    }

    async fn map(
        &self,
        context: &ContentMappingContext<T>,
        _cancel: &CancellationToken,
    ) -> EngineResult<MappingResult<T>> {
        Ok(context
            .mapped_location
            .replace_prefix(&self.from, &self.to)
            .map_or(MappingResult::Unchanged, |location| {
                MappingResult::Replaced(context.map_to(location))
            }))
    }
}

impl GenericMapping for LocationPrefixMapping {
    fn create<T: ContentItem>(&self, _scope: &MigrationScope) -> Arc<dyn ContentMapping<T>> {
        Arc::new(self.clone())
    }
}
