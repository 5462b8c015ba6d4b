//! The migration manifest.
//!
//! The manifest is the resumable record of a migration run: one
//! [`ManifestPartition`] per content type holding a [`ManifestEntry`] for
//! every source item the run has seen, plus run-level errors.
//!
//! - [`MigrationManifest`] - the live, concurrently updated manifest
//! - [`ManifestEntryBuilder`] - creates and finalizes entries for a page
//! - [`ManifestDocument`] - the versioned, serializable form
//!
//! A run can be seeded from the document of a previous run. Seeded entries
//! that were migrated stay migrated; every other entry goes back to pending
//! and keeps its error history.

mod builder;
mod entry;
mod partition;
mod schema;

use std::sync::Arc;

use cm_core::hash::fx_hash_map_with_capacity;
use cm_core::{ContentType, FxHashMap};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

pub use builder::ManifestEntryBuilder;
pub use entry::{ManifestEntry, ManifestEntryHandle, ManifestError};
pub use partition::ManifestPartition;
pub use schema::{MANIFEST_SCHEMA_VERSION, ManifestDocument};

use crate::error::EngineError;
use crate::stats::StatsSnapshot;

/// The live manifest of one migration run.
///
/// Safe for concurrent use: the partition table has its own lock, and each
/// partition locks independently.
///
/// # Examples
///
/// ```
/// use cm_core::{ContentId, ContentLocation, ContentReference, ContentType};
/// use cm_engine::MigrationManifest;
/// use uuid::Uuid;
///
/// let manifest = MigrationManifest::new(Uuid::new_v4());
/// let users = manifest.partition(ContentType::User);
/// let entry = users.get_or_create(&ContentReference::from_location(
///     ContentId::random(),
///     ContentLocation::from_path("alice"),
/// ));
/// entry.set_skipped();
///
/// assert_eq!(manifest.summary().skipped, 1);
/// ```
#[derive(Debug)]
pub struct MigrationManifest {
    plan_id: Uuid,
    migration_id: Uuid,
    errors: Mutex<Vec<ManifestError>>,
    partitions: RwLock<FxHashMap<ContentType, Arc<ManifestPartition>>>,
}

impl MigrationManifest {
    /// Creates an empty manifest for a new run of plan `plan_id`.
    #[must_use]
    pub fn new(plan_id: Uuid) -> Self {
        Self::with_ids(plan_id, Uuid::new_v4())
    }

    /// Creates an empty manifest with explicit identifiers.
    #[must_use]
    pub fn with_ids(plan_id: Uuid, migration_id: Uuid) -> Self {
        Self {
            plan_id,
            migration_id,
            errors: Mutex::new(Vec::new()),
            partitions: RwLock::new(fx_hash_map_with_capacity(ContentType::migration_order().len())),
        }
    }

    /// Creates a manifest for a new run of `plan_id`, seeded from a previous
    /// run's document.
    ///
    /// The new manifest gets a fresh migration id. Run-level errors of the
    /// previous run are not carried over.
    #[must_use]
    pub fn seeded_from(plan_id: Uuid, previous: &ManifestDocument) -> Self {
        if previous.plan_id != plan_id {
            warn!(
                previous_plan = %previous.plan_id,
                plan = %plan_id,
                "Seeding manifest from a different plan"
            );
        }

        let manifest = Self::new(plan_id);
        for (&content_type, entries) in &previous.partitions {
            let partition = manifest.partition(content_type);
            partition.reserve(entries.len());
            for entry in entries {
                let mut entry = entry.clone();
                entry.reset_for_rerun();
                partition.insert(entry);
            }
        }
        debug!(
            previous_migration = %previous.migration_id,
            migration_id = %manifest.migration_id,
            entries = previous.entry_count(),
            "Seeded manifest from previous run"
        );
        manifest
    }

    /// Restores a manifest exactly as persisted, statuses included.
    #[must_use]
    pub fn from_document(document: &ManifestDocument) -> Self {
        let manifest = Self::with_ids(document.plan_id, document.migration_id);
        manifest.errors.lock().extend(document.errors.iter().cloned());
        for (&content_type, entries) in &document.partitions {
            let partition = manifest.partition(content_type);
            for entry in entries {
                partition.insert(entry.clone());
            }
        }
        manifest
    }

    /// The plan this manifest belongs to.
    #[inline]
    #[must_use]
    pub const fn plan_id(&self) -> Uuid {
        self.plan_id
    }

    /// The run this manifest records.
    #[inline]
    #[must_use]
    pub const fn migration_id(&self) -> Uuid {
        self.migration_id
    }

    /// Returns the partition for `content_type`, creating it if needed.
    pub fn partition(&self, content_type: ContentType) -> Arc<ManifestPartition> {
        if let Some(partition) = self.partitions.read().get(&content_type) {
            return Arc::clone(partition);
        }
        let mut partitions = self.partitions.write();
        Arc::clone(
            partitions
                .entry(content_type)
                .or_insert_with(|| Arc::new(ManifestPartition::new(content_type))),
        )
    }

    /// Returns the partition for `content_type` if one exists.
    #[must_use]
    pub fn existing_partition(&self, content_type: ContentType) -> Option<Arc<ManifestPartition>> {
        self.partitions.read().get(&content_type).map(Arc::clone)
    }

    /// Returns every partition in migration order.
    #[must_use]
    pub fn partitions(&self) -> Vec<Arc<ManifestPartition>> {
        let partitions = self.partitions.read();
        ContentType::migration_order()
            .iter()
            .filter_map(|t| partitions.get(t).map(Arc::clone))
            .collect()
    }

    /// Records a run-level error. Cancellations are not recorded.
    pub fn add_error(&self, error: &EngineError) {
        if error.is_cancellation() {
            return;
        }
        self.errors.lock().push(ManifestError::from(error));
    }

    /// Records several run-level errors.
    pub fn add_errors<'a>(&self, errors: impl IntoIterator<Item = &'a EngineError>) {
        for error in errors {
            self.add_error(error);
        }
    }

    /// Returns the run-level errors.
    #[must_use]
    pub fn errors(&self) -> Vec<ManifestError> {
        self.errors.lock().clone()
    }

    /// Counts entries per status across all partitions.
    #[must_use]
    pub fn summary(&self) -> StatsSnapshot {
        let mut total = StatsSnapshot::default();
        for partition in self.partitions() {
            total.merge(&partition.summary());
        }
        total
    }

    /// Counts entries per status for each partition, in migration order.
    #[must_use]
    pub fn summary_by_type(&self) -> Vec<(ContentType, StatsSnapshot)> {
        self.partitions()
            .iter()
            .map(|p| (p.content_type(), p.summary()))
            .collect()
    }

    /// Returns the serializable form of the manifest.
    #[must_use]
    pub fn to_document(&self) -> ManifestDocument {
        ManifestDocument {
            schema_version: MANIFEST_SCHEMA_VERSION,
            plan_id: self.plan_id,
            migration_id: self.migration_id,
            errors: self.errors(),
            partitions: self
                .partitions()
                .iter()
                .map(|p| (p.content_type(), p.snapshot()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_core::{ContentId, ContentLocation, ContentReference, MigrationStatus};

    fn reference(path: &str) -> ContentReference {
        ContentReference::from_location(ContentId::random(), ContentLocation::from_path(path))
    }

    #[test]
    fn test_partition_is_created_once() {
        let manifest = MigrationManifest::new(Uuid::new_v4());
        let first = manifest.partition(ContentType::Project);
        let second = manifest.partition(ContentType::Project);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(manifest.existing_partition(ContentType::User).is_none());
    }

    #[test]
    fn test_cancellation_is_not_recorded() {
        let manifest = MigrationManifest::new(Uuid::new_v4());
        manifest.add_error(&EngineError::Canceled);
        manifest.add_error(&EngineError::Manifest("corrupt".to_owned()));

        let errors = manifest.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, "manifest");
    }

    #[test]
    fn test_seeding_resets_unfinished_entries() {
        let plan_id = Uuid::new_v4();
        let previous = MigrationManifest::new(plan_id);
        let partition = previous.partition(ContentType::Workbook);

        let done = reference("Finance/Revenue");
        partition
            .get_or_create(&done)
            .set_migrated(reference("Imported/Revenue"));

        let failed = reference("Finance/Costs");
        partition
            .get_or_create(&failed)
            .set_failed(&[EngineError::item(failed.location.clone(), "rejected")]);

        let document = previous.to_document();
        let seeded = MigrationManifest::seeded_from(plan_id, &document);
        assert_ne!(seeded.migration_id(), previous.migration_id());

        let seeded_partition = seeded.partition(ContentType::Workbook);
        let done_entry = seeded_partition.by_id(done.id).expect("migrated entry");
        assert_eq!(done_entry.status(), MigrationStatus::Migrated);

        let failed_entry = seeded_partition.by_id(failed.id).expect("failed entry");
        assert_eq!(failed_entry.status(), MigrationStatus::Pending);
        assert_eq!(failed_entry.snapshot().errors().len(), 1);
    }

    #[test]
    fn test_document_round_trip_keeps_statuses() {
        let manifest = MigrationManifest::new(Uuid::new_v4());
        manifest
            .partition(ContentType::User)
            .get_or_create(&reference("alice"))
            .set_skipped();
        manifest.add_error(&EngineError::Batch {
            content_type: ContentType::User,
            message: "throttled".to_owned(),
        });

        let restored = MigrationManifest::from_document(&manifest.to_document());
        assert_eq!(restored.migration_id(), manifest.migration_id());
        assert_eq!(restored.summary().skipped, 1);
        assert_eq!(restored.errors().len(), 1);
    }

    #[test]
    fn test_summary_by_type_follows_migration_order() {
        let manifest = MigrationManifest::new(Uuid::new_v4());
        manifest.partition(ContentType::Workbook).get_or_create(&reference("w"));
        manifest.partition(ContentType::User).get_or_create(&reference("u"));

        let types: Vec<_> = manifest
            .summary_by_type()
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(types, vec![ContentType::User, ContentType::Workbook]);
    }
}
