//! Core types, errors, and configuration for the content migration engine.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Error types for configuration handling ([`ConfigError`])
//! - Configuration structures ([`Config`] and its sections)
//! - Domain types ([`ContentReference`], [`ContentLocation`], [`ContentType`],
//!   [`MigrationStatus`], [`CompletionStatus`])
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::{BatchConfig, Config, ManifestConfig, MigrationConfig};
pub use error::ConfigError;
pub use hash::{FxBuildHasher, FxHashMap, FxHashSet, fx_hash_map, fx_hash_set};
pub use types::{
    CompletionStatus, ContentId, ContentLocation, ContentReference, ContentType, MigrationStatus,
};
