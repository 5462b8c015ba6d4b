//! Manifest entries.
//!
//! A [`ManifestEntry`] records what happened to one source item: where it was
//! mapped to, what it became on the destination, and its status. Entries are
//! shared between the partition indices and the in-flight migration items
//! through a [`ManifestEntryHandle`].
//!
//! # Status transitions
//!
//! ```text
//! Pending ──► Migrated | Skipped | Error | Canceled
//! Migrated ──► Migrated   (destination refreshed)
//! ```
//!
//! Any other transition is refused and reported as `false`. Re-mapping the
//! destination location is always allowed. Errors are append-only.

use std::sync::Arc;

use cm_core::{ContentLocation, ContentReference, MigrationStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// An error persisted on a manifest entry or on the manifest itself.
///
/// Engine errors are flattened to a stable kind label and their message so
/// that the manifest stays serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestError {
    /// Error category, see [`EngineError::kind_label`].
    pub kind: String,

    /// Human-readable error message.
    pub message: String,
}

impl ManifestError {
    /// Creates a new manifest error.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&EngineError> for ManifestError {
    fn from(error: &EngineError) -> Self {
        Self::new(error.kind_label(), error.to_string())
    }
}

/// The migration record of one source item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    source: ContentReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination: Option<ContentReference>,

    mapped_location: ContentLocation,

    status: MigrationStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ManifestError>,

    #[serde(default)]
    has_migrated: bool,
}

impl ManifestEntry {
    /// Creates a pending entry mapped to the source location.
    #[must_use]
    pub fn new(source: ContentReference) -> Self {
        let mapped_location = source.location.clone();
        Self {
            source,
            destination: None,
            mapped_location,
            status: MigrationStatus::Pending,
            errors: Vec::new(),
            has_migrated: false,
        }
    }

    /// The source item's reference.
    #[inline]
    #[must_use]
    pub const fn source(&self) -> &ContentReference {
        &self.source
    }

    /// The destination reference, once the item has been migrated.
    #[inline]
    #[must_use]
    pub const fn destination(&self) -> Option<&ContentReference> {
        self.destination.as_ref()
    }

    /// Where the item will be (or was) published on the destination.
    #[inline]
    #[must_use]
    pub const fn mapped_location(&self) -> &ContentLocation {
        &self.mapped_location
    }

    /// The current status.
    #[inline]
    #[must_use]
    pub const fn status(&self) -> MigrationStatus {
        self.status
    }

    /// Every error recorded for the item, oldest first.
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[ManifestError] {
        &self.errors
    }

    /// Returns `true` if the item reached the destination in this run or any
    /// run this entry was seeded from.
    #[inline]
    #[must_use]
    pub const fn has_migrated(&self) -> bool {
        self.has_migrated
    }

    /// Sets the destination location.
    pub fn map_to(&mut self, location: ContentLocation) {
        self.mapped_location = location;
    }

    /// Replaces the source reference, e.g. after the item moved on the source.
    pub(crate) fn update_source(&mut self, source: ContentReference) {
        self.source = source;
    }

    /// Records a successful publish.
    pub fn set_migrated(&mut self, destination: ContentReference) -> bool {
        if !matches!(
            self.status,
            MigrationStatus::Pending | MigrationStatus::Migrated
        ) {
            return false;
        }
        self.destination = Some(destination);
        self.status = MigrationStatus::Migrated;
        self.has_migrated = true;
        true
    }

    /// Marks the item as excluded by a filter.
    pub fn set_skipped(&mut self) -> bool {
        self.transition(MigrationStatus::Skipped)
    }

    /// Marks the item as failed and appends `errors`.
    pub fn set_failed(&mut self, errors: impl IntoIterator<Item = ManifestError>) -> bool {
        if !self.transition(MigrationStatus::Error) {
            return false;
        }
        self.errors.extend(errors);
        true
    }

    /// Marks the item as not finished because the run was canceled.
    pub fn set_canceled(&mut self) -> bool {
        self.transition(MigrationStatus::Canceled)
    }

    /// Prepares a seeded entry for another run.
    ///
    /// Migrated entries are kept so the run can skip or refresh them. Every
    /// other entry returns to pending with its error history intact.
    pub(crate) fn reset_for_rerun(&mut self) {
        if self.status != MigrationStatus::Migrated {
            self.status = MigrationStatus::Pending;
        }
    }

    fn transition(&mut self, to: MigrationStatus) -> bool {
        if self.status != MigrationStatus::Pending {
            return false;
        }
        self.status = to;
        true
    }
}

/// A shared, lockable handle to a [`ManifestEntry`].
///
/// Cloning the handle shares the entry. Locks are held only for the duration
/// of one accessor call.
#[derive(Debug, Clone)]
pub struct ManifestEntryHandle(Arc<Mutex<ManifestEntry>>);

impl ManifestEntryHandle {
    /// Wraps `entry` in a new handle.
    #[must_use]
    pub fn new(entry: ManifestEntry) -> Self {
        Self(Arc::new(Mutex::new(entry)))
    }

    /// Runs `f` with shared access to the entry.
    pub fn read<R>(&self, f: impl FnOnce(&ManifestEntry) -> R) -> R {
        f(&self.0.lock())
    }

    /// Runs `f` with exclusive access to the entry.
    pub fn update<R>(&self, f: impl FnOnce(&mut ManifestEntry) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// Returns a copy of the entry.
    #[must_use]
    pub fn snapshot(&self) -> ManifestEntry {
        self.0.lock().clone()
    }

    /// The current status.
    #[must_use]
    pub fn status(&self) -> MigrationStatus {
        self.read(ManifestEntry::status)
    }

    /// The source reference.
    #[must_use]
    pub fn source(&self) -> ContentReference {
        self.read(|e| e.source.clone())
    }

    /// The mapped destination location.
    #[must_use]
    pub fn mapped_location(&self) -> ContentLocation {
        self.read(|e| e.mapped_location.clone())
    }

    /// The destination reference, if migrated.
    #[must_use]
    pub fn destination(&self) -> Option<ContentReference> {
        self.read(|e| e.destination.clone())
    }

    /// See [`ManifestEntry::map_to`].
    pub fn map_to(&self, location: ContentLocation) {
        self.update(|e| e.map_to(location));
    }

    /// See [`ManifestEntry::set_migrated`].
    pub fn set_migrated(&self, destination: ContentReference) -> bool {
        self.update(|e| e.set_migrated(destination))
    }

    /// See [`ManifestEntry::set_skipped`].
    pub fn set_skipped(&self) -> bool {
        self.update(ManifestEntry::set_skipped)
    }

    /// See [`ManifestEntry::set_failed`]. Engine errors are flattened.
    pub fn set_failed(&self, errors: &[EngineError]) -> bool {
        self.update(|e| e.set_failed(errors.iter().map(ManifestError::from)))
    }

    /// See [`ManifestEntry::set_canceled`].
    pub fn set_canceled(&self) -> bool {
        self.update(ManifestEntry::set_canceled)
    }

    /// Returns `true` if both handles share the same entry.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<ManifestEntry> for ManifestEntryHandle {
    fn from(entry: ManifestEntry) -> Self {
        Self::new(entry)
    }
}
