//! The execution scope of one migration run.

use std::fmt;
use std::sync::Arc;

use cm_core::{Config, ContentType, FxHashMap};

use crate::cache::ContentReferenceFinder;
use crate::hooks::HookRegistry;
use crate::manifest::MigrationManifest;

/// Reference finders available to the hooks of a run, per content type.
#[derive(Clone, Default)]
pub struct ReferenceFinders {
    source: FxHashMap<ContentType, Arc<dyn ContentReferenceFinder>>,
    destination: FxHashMap<ContentType, Arc<dyn ContentReferenceFinder>>,
}

impl ReferenceFinders {
    /// Creates an empty set of finders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the finder of source references of `content_type`.
    pub fn insert_source(
        &mut self,
        content_type: ContentType,
        finder: Arc<dyn ContentReferenceFinder>,
    ) {
        self.source.insert(content_type, finder);
    }

    /// Sets the finder of destination references of `content_type`.
    pub fn insert_destination(
        &mut self,
        content_type: ContentType,
        finder: Arc<dyn ContentReferenceFinder>,
    ) {
        self.destination.insert(content_type, finder);
    }

    /// The finder of source references of `content_type`, if registered.
    #[must_use]
    pub fn source(&self, content_type: ContentType) -> Option<Arc<dyn ContentReferenceFinder>> {
        self.source.get(&content_type).map(Arc::clone)
    }

    /// The finder of destination references of `content_type`, if
    /// registered.
    #[must_use]
    pub fn destination(
        &self,
        content_type: ContentType,
    ) -> Option<Arc<dyn ContentReferenceFinder>> {
        self.destination.get(&content_type).map(Arc::clone)
    }
}

impl fmt::Debug for ReferenceFinders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceFinders")
            .field("source", &self.source.keys().collect::<Vec<_>>())
            .field("destination", &self.destination.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Everything a run shares with its steps and hooks.
///
/// A fresh scope is created for every run. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct MigrationScope {
    config: Arc<Config>,
    manifest: Arc<MigrationManifest>,
    hooks: Arc<HookRegistry>,
    references: Arc<ReferenceFinders>,
}

impl MigrationScope {
    /// Creates a scope.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        manifest: Arc<MigrationManifest>,
        hooks: Arc<HookRegistry>,
        references: ReferenceFinders,
    ) -> Self {
        Self {
            config,
            manifest,
            hooks,
            references: Arc::new(references),
        }
    }

    /// Returns this scope with a different configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// The run's configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The run's manifest.
    #[inline]
    #[must_use]
    pub const fn manifest(&self) -> &Arc<MigrationManifest> {
        &self.manifest
    }

    /// The plan's hook registrations.
    #[inline]
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The run's reference finders.
    #[inline]
    #[must_use]
    pub fn references(&self) -> &ReferenceFinders {
        &self.references
    }
}
