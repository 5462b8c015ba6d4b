//! Source-to-destination reference resolution.

use std::sync::Arc;

use async_trait::async_trait;
use cm_core::{ContentId, ContentLocation, ContentReference, ContentType};
use tokio_util::sync::CancellationToken;

use super::ContentReferenceFinder;
use crate::error::EngineResult;
use crate::manifest::{ManifestEntryHandle, MigrationManifest};

/// Finds the destination counterpart of a source reference.
///
/// Lookups take source ids and locations. The manifest is consulted first:
/// a migrated entry already knows its destination reference. Otherwise the
/// entry's mapped location is looked up on the destination, which finds
/// content that exists there but was not migrated by this run.
pub struct DestinationReferenceFinder {
    content_type: ContentType,
    manifest: Arc<MigrationManifest>,
    destination: Arc<dyn ContentReferenceFinder>,
}

impl DestinationReferenceFinder {
    /// Creates a finder for `content_type` over `manifest`, falling back to
    /// `destination`.
    #[must_use]
    pub fn new(
        content_type: ContentType,
        manifest: Arc<MigrationManifest>,
        destination: Arc<dyn ContentReferenceFinder>,
    ) -> Self {
        Self {
            content_type,
            manifest,
            destination,
        }
    }

    async fn resolve(
        &self,
        entry: Option<ManifestEntryHandle>,
        cancel: &CancellationToken,
    ) -> EngineResult<Option<Arc<ContentReference>>> {
        let Some(entry) = entry else {
            return Ok(None);
        };
        if let Some(destination) = entry.destination() {
            return Ok(Some(Arc::new(destination)));
        }
        let mapped = entry.mapped_location();
        self.destination.find_by_location(&mapped, cancel).await
    }
}

#[async_trait]
impl ContentReferenceFinder for DestinationReferenceFinder {
    async fn find_by_id(
        &self,
        id: ContentId,
        cancel: &CancellationToken,
    ) -> EngineResult<Option<Arc<ContentReference>>> {
        let entry = self
            .manifest
            .existing_partition(self.content_type)
            .and_then(|p| p.by_id(id));
        self.resolve(entry, cancel).await
    }

    async fn find_by_location(
        &self,
        location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> EngineResult<Option<Arc<ContentReference>>> {
        let entry = self
            .manifest
            .existing_partition(self.content_type)
            .and_then(|p| p.by_location(location));
        self.resolve(entry, cancel).await
    }
}
