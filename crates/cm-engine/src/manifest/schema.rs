//! Versioned on-disk manifest schema.
//!
//! A persisted manifest is a JSON document:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "planId": "…",
//!   "migrationId": "…",
//!   "errors": [],
//!   "partitions": { "user": [ …entries… ], "project": [ … ] }
//! }
//! ```
//!
//! Partitions are keyed by content type identifier and hold their entries
//! in insertion order. Documents with a newer `schemaVersion` are rejected.

use std::collections::BTreeMap;

use camino::Utf8Path;
use cm_core::ContentType;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::entry::{ManifestEntry, ManifestError};
use crate::error::{EngineError, EngineResult};

/// The newest schema version this build reads and the one it writes.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// The serializable form of a [`MigrationManifest`](super::MigrationManifest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDocument {
    /// Schema version of this document.
    pub schema_version: u32,

    /// The plan the manifest was produced for.
    pub plan_id: Uuid,

    /// The run that produced the manifest.
    pub migration_id: Uuid,

    /// Run-level errors.
    #[serde(default)]
    pub errors: Vec<ManifestError>,

    /// Entries per content type.
    #[serde(default)]
    pub partitions: BTreeMap<ContentType, Vec<ManifestEntry>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaHeader {
    schema_version: u32,
}

impl ManifestDocument {
    /// Parses a document from JSON, checking the schema version first.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let header: SchemaHeader = serde_json::from_str(json)?;
        if header.schema_version > MANIFEST_SCHEMA_VERSION {
            return Err(EngineError::UnsupportedSchema {
                found: header.schema_version,
                supported: MANIFEST_SCHEMA_VERSION,
            });
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the document to JSON.
    pub fn to_json(&self, pretty: bool) -> EngineResult<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    /// Reads a document from `path`.
    pub fn load(path: &Utf8Path) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path.as_std_path())
            .map_err(|e| EngineError::manifest_io(path, e))?;
        let document = Self::from_json(&json)?;
        debug!(path = %path, migration_id = %document.migration_id, "Loaded manifest");
        Ok(document)
    }

    /// Writes the document to `path`, creating parent directories.
    pub fn save(&self, path: &Utf8Path, pretty: bool) -> EngineResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent.as_std_path())
                .map_err(|e| EngineError::manifest_io(parent, e))?;
        }
        let json = self.to_json(pretty)?;
        std::fs::write(path.as_std_path(), json).map_err(|e| EngineError::manifest_io(path, e))?;
        debug!(path = %path, migration_id = %self.migration_id, "Saved manifest");
        Ok(())
    }

    /// Number of entries across all partitions.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }
}
