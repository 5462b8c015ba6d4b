//! Content identity types.
//!
//! This module provides [`ContentId`] and [`ContentReference`], the
//! lightweight, immutable identity of a content item on a site.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::ContentLocation;

/// The unique identifier of a content item on one site.
///
/// Uses a newtype pattern for type safety - prevents accidentally passing a
/// plan or migration identifier where a content identifier is expected.
///
/// # Examples
///
/// ```
/// use cm_core::ContentId;
/// use uuid::Uuid;
///
/// let id = ContentId::new(Uuid::nil());
/// assert_eq!(id.as_uuid(), Uuid::nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub Uuid);

impl ContentId {
    /// Creates a content ID from a UUID.
    #[inline]
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Creates a random content ID.
    #[inline]
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for ContentId {
    #[inline]
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The immutable identity of a content item.
///
/// References are produced by endpoints and never mutated after creation.
/// They are cheap to clone and are what the manifest and the reference cache
/// store instead of full content items.
///
/// # Examples
///
/// ```
/// use cm_core::{ContentId, ContentLocation, ContentReference};
///
/// let reference = ContentReference::new(
///     ContentId::random(),
///     ContentLocation::from_path("Finance/Revenue"),
///     "Revenue",
/// );
/// assert_eq!(reference.location.depth(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentReference {
    /// Unique identifier on the owning site.
    pub id: ContentId,

    /// Hierarchical location on the owning site.
    pub location: ContentLocation,

    /// Display name.
    pub name: String,
}

impl ContentReference {
    /// Creates a new content reference.
    #[must_use]
    pub fn new(id: ContentId, location: ContentLocation, name: impl Into<String>) -> Self {
        Self {
            id,
            location,
            name: name.into(),
        }
    }

    /// Creates a reference whose display name is the last location segment.
    #[must_use]
    pub fn from_location(id: ContentId, location: ContentLocation) -> Self {
        let name = location.name().unwrap_or_default().to_owned();
        Self { id, location, name }
    }
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.location, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_display_matches_uuid() {
        let uuid = Uuid::from_u128(42);
        assert_eq!(ContentId::new(uuid).to_string(), uuid.to_string());
    }

    #[test]
    fn test_reference_from_location_uses_last_segment() {
        let reference =
            ContentReference::from_location(ContentId::random(), ContentLocation::from_path("a/b"));
        assert_eq!(reference.name, "b");
    }

    #[test]
    fn test_reference_serialization() {
        let reference = ContentReference::new(
            ContentId::new(Uuid::from_u128(7)),
            ContentLocation::from_path("Sales/Pipeline"),
            "Pipeline",
        );
        let json = serde_json::to_string(&reference).unwrap();
        assert!(json.contains(r#""location":"Sales/Pipeline""#));
        let parsed: ContentReference = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reference);
    }
}
