//! Error types for the cm-engine crate.
//!
//! This module provides [`EngineError`], the single error type carried by
//! pages, batches, hooks, endpoints and the manifest.
//!
//! # Error Recovery Strategy
//!
//! Errors are contained at the smallest scope that can continue:
//!
//! - **Item errors** ([`EngineError::Item`]): recorded on the manifest entry, the batch continues
//! - **Batch errors** ([`EngineError::Batch`]): folded into the content type result
//! - **Page fetch errors** ([`EngineError::PageFetch`]): stop the content type's loop
//! - **Endpoint errors** ([`EngineError::EndpointInit`]): fatal for the run
//! - **Cancellation** ([`EngineError::Canceled`]): never recorded as a failure
//!
//! `EngineError` is [`Clone`] so that result types can carry error lists;
//! foreign error sources are held behind [`Arc`].

use std::sync::Arc;

use camino::Utf8PathBuf;
use cm_core::{ConfigError, ContentLocation, ContentType};

use crate::endpoint::EndpointKind;
use crate::hooks::HookKind;

/// Errors produced by the migration engine.
///
/// # Examples
///
/// ```
/// use cm_engine::EngineError;
/// use cm_core::ContentType;
///
/// let err = EngineError::page_fetch(ContentType::User, 2, "HTTP 503");
/// assert!(err.to_string().contains("page 2"));
/// assert!(!err.is_cancellation());
/// assert!(EngineError::Canceled.is_cancellation());
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The operation observed its cancellation token.
    #[error("operation was canceled")]
    Canceled,

    /// A source page could not be fetched.
    #[error("failed to fetch page {page} of {content_type}: {message}")]
    PageFetch {
        /// The content type being paged.
        content_type: ContentType,
        /// The 1-based page number that failed.
        page: usize,
        /// Description of the failure.
        message: String,
    },

    /// An endpoint failed to initialize.
    #[error("{endpoint} endpoint failed to initialize: {message}")]
    EndpointInit {
        /// Which endpoint failed.
        endpoint: EndpointKind,
        /// Description of the failure.
        message: String,
    },

    /// A content reference search failed.
    #[error("content reference search for {key} failed: {message}")]
    Search {
        /// The key being resolved.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// A filter, mapping or transformer hook failed.
    #[error("{kind} hook for {content_type} failed: {message}")]
    Hook {
        /// The kind of hook.
        kind: HookKind,
        /// The content type the hook ran for.
        content_type: ContentType,
        /// Description of the failure.
        message: String,
    },

    /// A whole batch failed.
    #[error("batch of {content_type} failed: {message}")]
    Batch {
        /// The content type of the batch.
        content_type: ContentType,
        /// Description of the failure.
        message: String,
    },

    /// A single item failed to migrate.
    #[error("failed to migrate {location}: {message}")]
    Item {
        /// Source location of the item.
        location: ContentLocation,
        /// Description of the failure.
        message: String,
    },

    /// The manifest is inconsistent or cannot be seeded.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Reading or writing a manifest file failed.
    #[error("manifest I/O failed for {path}: {source}")]
    ManifestIo {
        /// The manifest file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A manifest file is not valid JSON for the schema.
    #[error("invalid manifest document: {0}")]
    ManifestFormat(#[source] Arc<serde_json::Error>),

    /// A manifest file was written by a newer schema.
    #[error("unsupported manifest schema version {found} (supported up to {supported})")]
    UnsupportedSchema {
        /// Version found in the document.
        found: u32,
        /// Newest version this build reads.
        supported: u32,
    },

    /// The engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[source] Arc<ConfigError>),

    /// A migration task panicked.
    #[error("migration task panicked: {0}")]
    Panicked(String),

    /// An error from an external collaborator (transport, publisher, ...).
    #[error(transparent)]
    External(Arc<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Creates a new [`EngineError::PageFetch`] error.
    #[inline]
    pub fn page_fetch(content_type: ContentType, page: usize, message: impl Into<String>) -> Self {
        Self::PageFetch {
            content_type,
            page,
            message: message.into(),
        }
    }

    /// Creates a new [`EngineError::EndpointInit`] error.
    #[inline]
    pub fn endpoint(endpoint: EndpointKind, message: impl Into<String>) -> Self {
        Self::EndpointInit {
            endpoint,
            message: message.into(),
        }
    }

    /// Creates a new [`EngineError::Search`] error.
    #[inline]
    pub fn search(key: impl ToString, message: impl Into<String>) -> Self {
        Self::Search {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Creates a new [`EngineError::Hook`] error.
    #[inline]
    pub fn hook(kind: HookKind, content_type: ContentType, message: impl Into<String>) -> Self {
        Self::Hook {
            kind,
            content_type,
            message: message.into(),
        }
    }

    /// Creates a new [`EngineError::Batch`] error.
    #[inline]
    pub fn batch(content_type: ContentType, message: impl Into<String>) -> Self {
        Self::Batch {
            content_type,
            message: message.into(),
        }
    }

    /// Creates a new [`EngineError::Item`] error.
    #[inline]
    pub fn item(location: ContentLocation, message: impl Into<String>) -> Self {
        Self::Item {
            location,
            message: message.into(),
        }
    }

    /// Creates a new [`EngineError::ManifestIo`] error.
    #[inline]
    pub fn manifest_io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::ManifestIo {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Wraps an error from an external collaborator.
    #[inline]
    pub fn external(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::External(Arc::new(error))
    }

    /// Returns `true` if this error only reports a cancellation.
    #[inline]
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Returns `true` if processing can continue at an outer scope.
    ///
    /// Item, batch and hook errors leave the run usable; endpoint, manifest,
    /// configuration and panic errors do not.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Item { .. }
                | Self::Batch { .. }
                | Self::Hook { .. }
                | Self::PageFetch { .. }
                | Self::Search { .. }
                | Self::External(_)
        )
    }

    /// Returns a short, stable label for the error category.
    ///
    /// Used as the `kind` of errors persisted in the manifest.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Canceled => "canceled",
            Self::PageFetch { .. } => "page_fetch",
            Self::EndpointInit { .. } => "endpoint_init",
            Self::Search { .. } => "search",
            Self::Hook { .. } => "hook",
            Self::Batch { .. } => "batch",
            Self::Item { .. } => "item",
            Self::Manifest(_) | Self::ManifestIo { .. } | Self::ManifestFormat(_) => "manifest",
            Self::UnsupportedSchema { .. } => "schema",
            Self::Config(_) => "config",
            Self::Panicked(_) => "panic",
            Self::External(_) => "external",
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(error: ConfigError) -> Self {
        Self::Config(Arc::new(error))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        Self::ManifestFormat(Arc::new(error))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
