//! Per-content-type manifest partitions.

use cm_core::{ContentId, ContentLocation, ContentReference, ContentType, FxHashMap};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::entry::{ManifestEntry, ManifestEntryHandle};
use crate::stats::StatsSnapshot;

/// The manifest entries of one content type.
///
/// Entries are kept in insertion order and indexed by source id and by
/// source location. Both indices are updated under the same lock as the
/// entry list, so they never disagree. Each partition has its own lock.
#[derive(Debug)]
pub struct ManifestPartition {
    content_type: ContentType,
    inner: RwLock<PartitionIndex>,
}

#[derive(Debug, Default)]
struct PartitionIndex {
    entries: Vec<ManifestEntryHandle>,
    by_id: FxHashMap<ContentId, usize>,
    by_location: FxHashMap<ContentLocation, usize>,
}

impl PartitionIndex {
    /// Adds `handle`, replacing an entry with the same source id in place.
    fn upsert(&mut self, handle: ManifestEntryHandle, content_type: ContentType) -> ManifestEntryHandle {
        let source = handle.source();
        if let Some(&index) = self.by_id.get(&source.id) {
            let previous = self.entries[index].source();
            if self.by_location.get(&previous.location) == Some(&index) {
                self.by_location.remove(&previous.location);
            }
            self.claim_location(source.location, index, content_type);
            self.entries[index] = handle.clone();
            return handle;
        }

        let index = self.entries.len();
        self.by_id.insert(source.id, index);
        self.claim_location(source.location, index, content_type);
        self.entries.push(handle.clone());
        handle
    }

    /// Points `location` at `index`. The latest source listing wins; an
    /// entry that loses its location stays reachable by id.
    fn claim_location(&mut self, location: ContentLocation, index: usize, content_type: ContentType) {
        if let Some(other) = self.by_location.insert(location.clone(), index) {
            if other != index {
                let displaced = self.entries[other].source();
                warn!(
                    %content_type,
                    %location,
                    displaced = %displaced,
                    "Manifest location reassigned to another entry"
                );
            }
        }
    }
}

impl ManifestPartition {
    /// Creates an empty partition.
    #[must_use]
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            inner: RwLock::new(PartitionIndex::default()),
        }
    }

    /// The content type of every entry in this partition.
    #[inline]
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns `true` if the partition has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserves room for `additional` more entries.
    pub fn reserve(&self, additional: usize) {
        let mut inner = self.inner.write();
        inner.entries.reserve(additional);
        inner.by_id.reserve(additional);
        inner.by_location.reserve(additional);
    }

    /// Looks up an entry by source id.
    #[must_use]
    pub fn by_id(&self, id: ContentId) -> Option<ManifestEntryHandle> {
        let inner = self.inner.read();
        inner.by_id.get(&id).map(|&i| inner.entries[i].clone())
    }

    /// Looks up an entry by source location.
    #[must_use]
    pub fn by_location(&self, location: &ContentLocation) -> Option<ManifestEntryHandle> {
        let inner = self.inner.read();
        inner.by_location.get(location).map(|&i| inner.entries[i].clone())
    }

    /// Returns the entry for `source`, creating a pending one if needed.
    ///
    /// An existing entry is found by id first, then by location. When the
    /// item moved or was re-created on the source, the entry's source
    /// reference and the indices are updated to match.
    pub fn get_or_create(&self, source: &ContentReference) -> ManifestEntryHandle {
        let mut inner = self.inner.write();

        let existing = inner
            .by_id
            .get(&source.id)
            .or_else(|| inner.by_location.get(&source.location))
            .copied();

        let Some(index) = existing else {
            let handle = ManifestEntryHandle::new(ManifestEntry::new(source.clone()));
            return inner.upsert(handle, self.content_type);
        };

        let handle = inner.entries[index].clone();
        let previous = handle.source();
        if previous != *source {
            debug!(
                content_type = %self.content_type,
                from = %previous,
                to = %source,
                "Source reference changed for existing manifest entry"
            );
            if inner.by_id.get(&previous.id) == Some(&index) {
                inner.by_id.remove(&previous.id);
            }
            if inner.by_location.get(&previous.location) == Some(&index) {
                inner.by_location.remove(&previous.location);
            }
            inner.by_id.insert(source.id, index);
            inner.claim_location(source.location.clone(), index, self.content_type);
            handle.update(|e| e.update_source(source.clone()));
        }
        handle
    }

    /// Inserts a fully formed entry, e.g. when seeding from a previous run.
    ///
    /// An entry with the same source id is replaced. An entry of another id
    /// at the same location keeps its id but loses the location.
    pub fn insert(&self, entry: ManifestEntry) -> ManifestEntryHandle {
        self.inner
            .write()
            .upsert(ManifestEntryHandle::new(entry), self.content_type)
    }

    /// Returns every entry handle in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<ManifestEntryHandle> {
        self.inner.read().entries.clone()
    }

    /// Returns a copy of every entry in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ManifestEntry> {
        self.inner
            .read()
            .entries
            .iter()
            .map(ManifestEntryHandle::snapshot)
            .collect()
    }

    /// Counts entries per status.
    #[must_use]
    pub fn summary(&self) -> StatsSnapshot {
        let mut summary = StatsSnapshot::default();
        for entry in &self.inner.read().entries {
            summary.record(entry.status());
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_core::MigrationStatus;

    fn reference(path: &str) -> ContentReference {
        ContentReference::from_location(ContentId::random(), ContentLocation::from_path(path))
    }

    #[test]
    fn test_get_or_create_reuses_entry() {
        let partition = ManifestPartition::new(ContentType::Workbook);
        let source = reference("Finance/Revenue");

        let first = partition.get_or_create(&source);
        let second = partition.get_or_create(&source);

        assert!(first.ptr_eq(&second));
        assert_eq!(partition.len(), 1);
    }

    #[test]
    fn test_indices_point_at_same_entry() {
        let partition = ManifestPartition::new(ContentType::Workbook);
        let source = reference("Finance/Revenue");
        let handle = partition.get_or_create(&source);

        let by_id = partition.by_id(source.id).expect("by id");
        let by_location = partition.by_location(&source.location).expect("by location");
        assert!(handle.ptr_eq(&by_id));
        assert!(handle.ptr_eq(&by_location));
    }

    #[test]
    fn test_moved_item_reindexes_location() {
        let partition = ManifestPartition::new(ContentType::Workbook);
        let source = reference("Old/Revenue");
        let handle = partition.get_or_create(&source);

        let moved = ContentReference::from_location(source.id, "New/Revenue".into());
        let again = partition.get_or_create(&moved);

        assert!(handle.ptr_eq(&again));
        assert!(partition.by_location(&source.location).is_none());
        assert!(partition.by_location(&moved.location).is_some());
        assert_eq!(handle.source().location.to_string(), "New/Revenue");
    }

    #[test]
    fn test_move_onto_taken_location_keeps_both_entries() {
        let partition = ManifestPartition::new(ContentType::Workbook);
        let revenue = reference("Finance/Revenue");
        let forecast = reference("Finance/Forecast");
        let revenue_entry = partition.get_or_create(&revenue);
        let forecast_entry = partition.get_or_create(&forecast);

        let moved = ContentReference::from_location(forecast.id, revenue.location.clone());
        partition.get_or_create(&moved);

        let at_location = partition.by_location(&revenue.location).expect("by location");
        assert!(at_location.ptr_eq(&forecast_entry));
        assert!(partition.by_id(revenue.id).expect("by id").ptr_eq(&revenue_entry));
        assert!(partition.by_location(&forecast.location).is_none());
        assert_eq!(partition.len(), 2);
    }

    #[test]
    fn test_insert_replaces_entry_with_same_id() {
        let partition = ManifestPartition::new(ContentType::User);
        let alice = reference("alice");
        partition.insert(ManifestEntry::new(alice.clone()));

        let renamed = ContentReference::from_location(alice.id, "alice.smith".into());
        let replacement = partition.insert(ManifestEntry::new(renamed.clone()));

        assert_eq!(partition.len(), 1);
        assert!(partition.by_id(alice.id).expect("by id").ptr_eq(&replacement));
        assert!(partition.by_location(&alice.location).is_none());
        assert!(partition.by_location(&renamed.location).is_some());
    }

    #[test]
    fn test_summary_counts_statuses() {
        let partition = ManifestPartition::new(ContentType::User);
        partition.get_or_create(&reference("alice")).set_skipped();
        partition.get_or_create(&reference("bob"));

        let summary = partition.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.count(MigrationStatus::Skipped), 1);
        assert_eq!(summary.pending, 1);
    }
}
