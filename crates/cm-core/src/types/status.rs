//! Migration status types.
//!
//! This module provides [`MigrationStatus`] for tracking one manifest entry
//! and [`CompletionStatus`] for classifying a whole migration run.

use serde::{Deserialize, Serialize};

/// The migration status of one source content item.
///
/// Every entry starts [`Pending`](Self::Pending) and moves to exactly one
/// terminal status during a run.
///
/// # Examples
///
/// ```
/// use cm_core::MigrationStatus;
///
/// assert!(!MigrationStatus::Pending.is_terminal());
/// assert!(MigrationStatus::Migrated.is_terminal());
/// assert!(MigrationStatus::Error.is_failure());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// The item has not been processed yet.
    #[default]
    Pending,

    /// The item was published to the destination.
    Migrated,

    /// The item was excluded by a filter.
    Skipped,

    /// Migrating the item failed.
    Error,

    /// The run was canceled before the item finished.
    Canceled,
}

impl MigrationStatus {
    /// All statuses, in display order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Migrated,
        Self::Skipped,
        Self::Error,
        Self::Canceled,
    ];

    /// Returns `true` for every status except [`Pending`](Self::Pending).
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns `true` if the item reached the destination.
    #[inline]
    #[must_use]
    pub const fn is_migrated(self) -> bool {
        matches!(self, Self::Migrated)
    }

    /// Returns `true` if the item failed.
    #[inline]
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Returns a human-readable label for this status.
    ///
    /// # Examples
    ///
    /// ```
    /// use cm_core::MigrationStatus;
    ///
    /// assert_eq!(MigrationStatus::Skipped.label(), "Skipped");
    /// ```
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Migrated => "Migrated",
            Self::Skipped => "Skipped",
            Self::Error => "Error",
            Self::Canceled => "Canceled",
        }
    }
}

/// The outcome of a whole migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// The pipeline ran to completion. Individual items may still have failed.
    Completed,

    /// The run was stopped through its cancellation token.
    Canceled,

    /// The run could not continue, e.g. an endpoint failed to initialize.
    FatalError,
}

impl CompletionStatus {
    /// Returns a human-readable label for this status.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Canceled => "Canceled",
            Self::FatalError => "Fatal Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_status_default_is_pending() {
        assert_eq!(MigrationStatus::default(), MigrationStatus::Pending);
    }

    #[test]
    fn test_migration_status_terminal() {
        for status in MigrationStatus::ALL {
            assert_eq!(status.is_terminal(), status != MigrationStatus::Pending);
        }
    }

    #[test]
    fn test_migration_status_serialization() {
        assert_eq!(
            serde_json::to_string(&MigrationStatus::Canceled).unwrap(),
            r#""canceled""#
        );
        let status: MigrationStatus = serde_json::from_str(r#""error""#).unwrap();
        assert_eq!(status, MigrationStatus::Error);
    }

    #[test]
    fn test_completion_status_serialization() {
        assert_eq!(
            serde_json::to_string(&CompletionStatus::FatalError).unwrap(),
            r#""fatal_error""#
        );
        assert_eq!(CompletionStatus::Completed.label(), "Completed");
    }
}
