//! Migratable content categories.
//!
//! This module provides the [`ContentType`] enum. Each content type is
//! migrated by its own content migrator and owns one manifest partition.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A category of migratable content.
///
/// The serialized form is a stable snake_case identifier (`"data_source"`),
/// which is also the key of the content type's manifest partition.
///
/// # Examples
///
/// ```
/// use cm_core::ContentType;
///
/// assert_eq!(ContentType::DataSource.identifier(), "data_source");
/// assert_eq!("workbook".parse::<ContentType>().unwrap(), ContentType::Workbook);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Site users.
    User,
    /// User groups.
    Group,
    /// Projects (nested folders that own other content).
    Project,
    /// Published data sources.
    DataSource,
    /// Workbooks.
    Workbook,
    /// Extract refresh schedules.
    Schedule,
    /// Saved custom views of workbook views.
    CustomView,
}

impl ContentType {
    /// All content types in the order a migration plan processes them.
    ///
    /// Content that is referenced by other content comes first: users and
    /// groups own permissions, projects contain data sources and workbooks,
    /// and schedules and custom views point at both.
    pub const MIGRATION_ORDER: [Self; 7] = [
        Self::User,
        Self::Group,
        Self::Project,
        Self::DataSource,
        Self::Workbook,
        Self::Schedule,
        Self::CustomView,
    ];

    /// Returns the content types in the required migration order.
    #[inline]
    #[must_use]
    pub const fn migration_order() -> &'static [Self] {
        &Self::MIGRATION_ORDER
    }

    /// Returns this type's position in [`migration_order`](Self::migration_order).
    #[must_use]
    pub fn order_index(self) -> usize {
        Self::MIGRATION_ORDER
            .iter()
            .position(|t| *t == self)
            .unwrap_or(Self::MIGRATION_ORDER.len())
    }

    /// Returns the stable identifier used as the manifest partition key.
    #[inline]
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Project => "project",
            Self::DataSource => "data_source",
            Self::Workbook => "workbook",
            Self::Schedule => "schedule",
            Self::CustomView => "custom_view",
        }
    }

    /// Returns a human-readable plural label.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "Users",
            Self::Group => "Groups",
            Self::Project => "Projects",
            Self::DataSource => "Data Sources",
            Self::Workbook => "Workbooks",
            Self::Schedule => "Schedules",
            Self::CustomView => "Custom Views",
        }
    }

    /// Returns `true` if items of this type nest inside each other and must
    /// be published parents-first.
    #[inline]
    #[must_use]
    pub const fn is_hierarchical(self) -> bool {
        matches!(self, Self::Project)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Error returned when parsing an unknown content type identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content type '{0}'")]
pub struct UnknownContentType(pub String);

impl FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::MIGRATION_ORDER
            .into_iter()
            .find(|t| t.identifier() == s)
            .ok_or_else(|| UnknownContentType(s.to_owned()))
    }
}
