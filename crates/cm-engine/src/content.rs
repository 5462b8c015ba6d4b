//! Content items and their per-run migration wrapper.

use std::sync::Arc;

use cm_core::{ContentReference, ContentType};

use crate::manifest::ManifestEntryHandle;

/// A source or destination content item the engine can migrate.
///
/// The engine never looks inside an item beyond its identity; batch
/// migrators, hooks and publishers are typed on the concrete item.
///
/// # Examples
///
/// ```
/// use cm_core::{ContentId, ContentLocation, ContentReference, ContentType};
/// use cm_engine::ContentItem;
///
/// struct Workbook {
///     reference: ContentReference,
/// }
///
/// impl ContentItem for Workbook {
///     const CONTENT_TYPE: ContentType = ContentType::Workbook;
///
///     fn reference(&self) -> &ContentReference {
///         &self.reference
///     }
/// }
///
/// let workbook = Workbook {
///     reference: ContentReference::from_location(
///         ContentId::random(),
///         ContentLocation::from_path("Finance/Revenue"),
///     ),
/// };
/// assert_eq!(workbook.reference().name, "Revenue");
/// ```
pub trait ContentItem: Send + Sync + 'static {
    /// The manifest partition this item belongs to.
    const CONTENT_TYPE: ContentType;

    /// The item's identity on its owning site.
    fn reference(&self) -> &ContentReference;
}

/// A source item paired with its manifest entry for the current run.
///
/// Created once per item per content type per run. The entry handle is
/// shared with the manifest partition, so status changes made through it
/// are visible in the manifest immediately.
#[derive(Debug)]
pub struct ContentMigrationItem<T> {
    /// The item as read from the source.
    pub source_item: Arc<T>,

    /// The item's manifest entry.
    pub manifest_entry: ManifestEntryHandle,
}

impl<T> Clone for ContentMigrationItem<T> {
    fn clone(&self) -> Self {
        Self {
            source_item: Arc::clone(&self.source_item),
            manifest_entry: self.manifest_entry.clone(),
        }
    }
}

impl<T: ContentItem> ContentMigrationItem<T> {
    /// Pairs `source_item` with `manifest_entry`.
    #[must_use]
    pub const fn new(source_item: Arc<T>, manifest_entry: ManifestEntryHandle) -> Self {
        Self {
            source_item,
            manifest_entry,
        }
    }

    /// The source item's reference.
    #[inline]
    #[must_use]
    pub fn source_reference(&self) -> &ContentReference {
        self.source_item.reference()
    }
}
