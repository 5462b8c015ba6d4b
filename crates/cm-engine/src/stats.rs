//! Migration statistics with atomic counters.
//!
//! This module provides [`MigrationStats`] for tracking progress while
//! batches run and [`StatsSnapshot`] for point-in-time views, both of the
//! live counters and of a manifest partition.
//!
//! # Thread Safety
//!
//! All counters use [`AtomicU64`] with [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering. Statistics are informational and don't require strict ordering.
//!
//! # Examples
//!
//! ```
//! use cm_core::MigrationStatus;
//! use cm_engine::MigrationStats;
//!
//! let stats = MigrationStats::new();
//! stats.record(MigrationStatus::Migrated);
//! stats.record(MigrationStatus::Error);
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.total, 2);
//! assert_eq!(snapshot.errors, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use cm_core::MigrationStatus;
use serde::{Deserialize, Serialize};

/// Atomic counters of item outcomes.
#[derive(Debug, Default)]
pub struct MigrationStats {
    pending: AtomicU64,
    migrated: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
    canceled: AtomicU64,
}

impl MigrationStats {
    /// Creates a new [`MigrationStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one item with `status`.
    #[inline]
    pub fn record(&self, status: MigrationStatus) {
        self.counter(status).fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let pending = self.pending.load(Ordering::Relaxed);
        let migrated = self.migrated.load(Ordering::Relaxed);
        let skipped = self.skipped.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let canceled = self.canceled.load(Ordering::Relaxed);
        StatsSnapshot {
            total: pending + migrated + skipped + errors + canceled,
            pending,
            migrated,
            skipped,
            errors,
            canceled,
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for status in MigrationStatus::ALL {
            self.counter(status).store(0, Ordering::Relaxed);
        }
    }

    const fn counter(&self, status: MigrationStatus) -> &AtomicU64 {
        match status {
            MigrationStatus::Pending => &self.pending,
            MigrationStatus::Migrated => &self.migrated,
            MigrationStatus::Skipped => &self.skipped,
            MigrationStatus::Error => &self.errors,
            MigrationStatus::Canceled => &self.canceled,
        }
    }
}

/// A point-in-time count of items per status.
///
/// # Examples
///
/// ```
/// use cm_engine::StatsSnapshot;
///
/// let snap = StatsSnapshot {
///     total: 10,
///     pending: 2,
///     migrated: 6,
///     skipped: 1,
///     errors: 1,
///     canceled: 0,
/// };
///
/// assert!((snap.progress_percent() - 80.0).abs() < 0.1);
/// assert_eq!(snap.processed(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Number of items counted.
    pub total: u64,
    /// Items not processed yet.
    pub pending: u64,
    /// Items published to the destination.
    pub migrated: u64,
    /// Items excluded by a filter.
    pub skipped: u64,
    /// Items that failed.
    pub errors: u64,
    /// Items left unfinished by a cancellation.
    pub canceled: u64,
}

impl StatsSnapshot {
    /// Counts one item with `status`.
    pub const fn record(&mut self, status: MigrationStatus) {
        self.total += 1;
        match status {
            MigrationStatus::Pending => self.pending += 1,
            MigrationStatus::Migrated => self.migrated += 1,
            MigrationStatus::Skipped => self.skipped += 1,
            MigrationStatus::Error => self.errors += 1,
            MigrationStatus::Canceled => self.canceled += 1,
        }
    }

    /// Returns the count for `status`.
    #[must_use]
    pub const fn count(&self, status: MigrationStatus) -> u64 {
        match status {
            MigrationStatus::Pending => self.pending,
            MigrationStatus::Migrated => self.migrated,
            MigrationStatus::Skipped => self.skipped,
            MigrationStatus::Error => self.errors,
            MigrationStatus::Canceled => self.canceled,
        }
    }

    /// Returns the number of items that reached a terminal status.
    #[inline]
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.migrated + self.skipped + self.errors + self.canceled
    }

    /// Returns the progress as a percentage of `total`.
    ///
    /// Returns 100.0 if there are no items.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Acceptable for statistics display
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }

        (self.processed() as f64 / self.total as f64) * 100.0
    }

    /// Adds another snapshot's counts to this one.
    pub const fn merge(&mut self, other: &Self) {
        self.total += other.total;
        self.pending += other.pending;
        self.migrated += other.migrated;
        self.skipped += other.skipped;
        self.errors += other.errors;
        self.canceled += other.canceled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_stats_new() {
        let snap = MigrationStats::new().snapshot();
        assert_eq!(snap, StatsSnapshot::default());
    }

    #[test]
    fn test_migration_stats_record_and_reset() {
        let stats = MigrationStats::new();
        stats.record(MigrationStatus::Migrated);
        stats.record(MigrationStatus::Migrated);
        stats.record(MigrationStatus::Skipped);
        stats.record(MigrationStatus::Canceled);

        let snap = stats.snapshot();
        assert_eq!(snap.total, 4);
        assert_eq!(snap.migrated, 2);
        assert_eq!(snap.count(MigrationStatus::Canceled), 1);

        stats.reset();
        assert_eq!(stats.snapshot().total, 0);
    }

    #[test]
    fn test_stats_snapshot_progress_percent() {
        assert!((StatsSnapshot::default().progress_percent() - 100.0).abs() < f64::EPSILON);

        let mut snap = StatsSnapshot::default();
        snap.record(MigrationStatus::Migrated);
        snap.record(MigrationStatus::Pending);
        assert!((snap.progress_percent() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_items_count_as_processed() {
        let mut snap = StatsSnapshot::default();
        snap.record(MigrationStatus::Migrated);
        snap.record(MigrationStatus::Skipped);
        snap.record(MigrationStatus::Error);
        snap.record(MigrationStatus::Canceled);

        assert_eq!(snap.processed(), 4);
        assert!((snap.progress_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_snapshot_merge() {
        let mut left = StatsSnapshot::default();
        left.record(MigrationStatus::Pending);
        let mut right = StatsSnapshot::default();
        right.record(MigrationStatus::Skipped);

        left.merge(&right);
        assert_eq!(left.total, 2);
        assert_eq!(left.pending, 1);
        assert_eq!(left.skipped, 1);
    }

    #[test]
    fn test_stats_snapshot_serialization() {
        let snap = StatsSnapshot {
            total: 3,
            migrated: 3,
            ..Default::default()
        };
        let json = serde_json::to_string(&snap).expect("Serialization failed");
        let parsed: StatsSnapshot = serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(snap, parsed);
    }
}
