//! Hierarchical content locations.
//!
//! This module provides [`ContentLocation`], the slash-delimited path that
//! identifies where a content item lives on a site (for example
//! `Finance/Quarterly/Revenue`).

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The separator between location segments.
pub const PATH_SEPARATOR: char = '/';

/// A hierarchical location made of ordered path segments.
///
/// Locations are compared segment by segment, and the textual form joins the
/// segments with [`PATH_SEPARATOR`]. Empty segments are dropped when parsing,
/// so `"/a//b/"` and `"a/b"` are the same location.
///
/// Most locations are shallow, so segments are stored inline for up to four
/// levels before spilling to the heap.
///
/// # Examples
///
/// ```
/// use cm_core::ContentLocation;
///
/// let location = ContentLocation::from_path("Finance/Quarterly/Revenue");
/// assert_eq!(location.depth(), 2);
/// assert_eq!(location.name(), Some("Revenue"));
/// assert_eq!(location.to_string(), "Finance/Quarterly/Revenue");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContentLocation {
    segments: SmallVec<[String; 4]>,
}

impl ContentLocation {
    /// Creates a location from its segments.
    ///
    /// Empty segments are discarded.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// Parses a slash-delimited path.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        Self::new(path.split(PATH_SEPARATOR))
    }

    /// Returns the path segments.
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` if the location has no segments.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the nesting depth: the number of separators in the path.
    ///
    /// Top-level items have depth 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use cm_core::ContentLocation;
    ///
    /// assert_eq!(ContentLocation::from_path("Finance").depth(), 0);
    /// assert_eq!(ContentLocation::from_path("Finance/Quarterly").depth(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// Returns the last segment, which is the item's own name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the containing location, or `None` for top-level and empty
    /// locations.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// Returns a new location with `segment` appended.
    #[must_use]
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        let segment = segment.into();
        if !segment.is_empty() {
            segments.push(segment);
        }
        Self { segments }
    }

    /// Returns a new location with the last segment replaced by `name`.
    #[must_use]
    pub fn rename(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        let name = name.into();
        if !name.is_empty() {
            segments.push(name);
        }
        Self { segments }
    }

    /// Returns `true` if `prefix` is an ancestor of, or equal to, this location.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Replaces the leading `from` segments with `to`.
    ///
    /// Returns `None` when this location does not start with `from`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cm_core::ContentLocation;
    ///
    /// let location = ContentLocation::from_path("Legacy/Finance/Revenue");
    /// let moved = location
    ///     .replace_prefix(
    ///         &ContentLocation::from_path("Legacy"),
    ///         &ContentLocation::from_path("Archive/2024"),
    ///     )
    ///     .unwrap();
    /// assert_eq!(moved.to_string(), "Archive/2024/Finance/Revenue");
    /// ```
    #[must_use]
    pub fn replace_prefix(&self, from: &Self, to: &Self) -> Option<Self> {
        if !self.starts_with(from) {
            return None;
        }
        let segments = to
            .segments
            .iter()
            .chain(self.segments.iter().skip(from.segments.len()))
            .cloned()
            .collect();
        Some(Self { segments })
    }
}

impl fmt::Display for ContentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<&str> for ContentLocation {
    fn from(path: &str) -> Self {
        Self::from_path(path)
    }
}

impl From<String> for ContentLocation {
    fn from(path: String) -> Self {
        Self::from_path(&path)
    }
}

impl From<ContentLocation> for String {
    fn from(location: ContentLocation) -> Self {
        location.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_path_drops_empty_segments() {
        let location = ContentLocation::from_path("/Finance//Quarterly/");
        assert_eq!(location.segments(), ["Finance", "Quarterly"]);
        assert_eq!(location, ContentLocation::from_path("Finance/Quarterly"));
    }

    #[test]
    fn test_location_depth() {
        assert_eq!(ContentLocation::default().depth(), 0);
        assert_eq!(ContentLocation::from_path("a").depth(), 0);
        assert_eq!(ContentLocation::from_path("a/b/c").depth(), 2);
    }

    #[test]
    fn test_location_parent_and_append() {
        let location = ContentLocation::from_path("a/b");
        assert_eq!(location.parent(), Some(ContentLocation::from_path("a")));
        assert_eq!(ContentLocation::from_path("a").parent(), None);
        assert_eq!(location.append("c").to_string(), "a/b/c");
    }

    #[test]
    fn test_location_rename() {
        let location = ContentLocation::from_path("a/b");
        assert_eq!(location.rename("z").to_string(), "a/z");
    }

    #[test]
    fn test_location_replace_prefix() {
        let location = ContentLocation::from_path("a/b/c");
        let from = ContentLocation::from_path("a/b");
        let to = ContentLocation::from_path("x");
        assert_eq!(
            location.replace_prefix(&from, &to),
            Some(ContentLocation::from_path("x/c"))
        );
        assert_eq!(location.replace_prefix(&to, &from), None);
    }

    #[test]
    fn test_location_serializes_as_path() {
        let location = ContentLocation::from_path("a/b");
        let json = serde_json::to_string(&location).unwrap();
        assert_eq!(json, r#""a/b""#);
        let parsed: ContentLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, location);
    }
}
