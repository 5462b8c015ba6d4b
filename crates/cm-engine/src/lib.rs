//! Resumable content migration engine.
//!
//! This crate moves typed content (users, groups, projects, workbooks, ...)
//! from a source site to a destination site, one content type at a time,
//! recording the outcome of every item in a persistable manifest.
//!
//! # Overview
//!
//! The main entry point is [`Migrator`], which runs a [`MigrationPlan`]:
//!
//! - [`Endpoint`]: source and destination sites, initialized concurrently
//! - [`MigrationPipeline`]: one [`ContentMigrator`] per content type, in
//!   dependency order
//! - [`Pager`]: forward-only paged listing of source content
//! - [`hooks`]: filters, mappings and transformers registered per type
//! - [`BatchMigrator`]: publishes one page of items to the destination
//! - [`MigrationManifest`]: per-item status, errors and destinations
//! - [`ContentReferenceCache`]: single-flight cache of cross-references
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use cm_engine::{ItemBatchMigrator, MigrationPlanBuilder, Migrator};
//! use tokio_util::sync::CancellationToken;
//!
//! let plan = MigrationPlanBuilder::new(Arc::new(source), Arc::new(destination))
//!     .with_config(config)
//!     .migrate::<User>(ItemBatchMigrator::new(UserPublisher::new()))
//!     .migrate::<Project>(ItemBatchMigrator::new(ProjectPublisher::new()))
//!     .cache_destination_references::<Project>()
//!     .build()?;
//!
//! let outcome = Migrator::new(Arc::new(plan))
//!     .execute(previous.as_ref(), &CancellationToken::new())
//!     .await;
//! println!("{}: {} migrated", outcome.status.label(), outcome.summary().migrated);
//! ```
//!
//! # Architecture
//!
//! ```text
//! Migrator (one run)
//!     │
//!     ├── Endpoint::initialize (source + destination, joined)
//!     │
//!     └── MigrationPipeline (content types in migration order)
//!             │
//!             └── ContentMigrator<T> (per page)
//!                     │
//!                     ├── Pager / HierarchyPager
//!                     ├── MappingRunner → FilterRunner
//!                     ├── BatchMigrator (TransformerRunner + ItemMigrator)
//!                     └── ManifestEntryBuilder → MigrationManifest
//! ```
//!
//! # Cancellation
//!
//! One [`CancellationToken`](tokio_util::sync::CancellationToken) is threaded
//! through every call. Cancellation is reported as
//! [`EngineError::Canceled`] and never recorded as a failure.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod cache;
pub mod hooks;
pub mod manifest;
pub mod pager;

mod batch;
mod content;
mod content_migrator;
mod endpoint;
mod error;
mod migrator;
mod pipeline;
mod plan;
mod result;
mod scope;
mod stats;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::{BatchMigrator, ItemBatchMigrator, ItemMigrator, MigrationBatch};
pub use cache::{CacheKey, ContentReferenceCache, ContentReferenceFinder, ReferenceSearch};
pub use content::{ContentItem, ContentMigrationItem};
pub use content_migrator::ContentMigrator;
pub use endpoint::{Endpoint, EndpointKind};
pub use error::{EngineError, EngineResult};
pub use hooks::{HookKind, HookRegistry};
pub use manifest::{ManifestDocument, ManifestEntry, ManifestEntryHandle, MigrationManifest};
pub use migrator::{MigrationOutcome, Migrator};
pub use pager::{AllPagesResult, ContentPagerFactory, MemoryPager, PagedResult, Pager};
pub use pipeline::{ContentMigrationStep, MigrationPipeline, PipelineResult, PipelineStep};
pub use plan::{MigrationPlan, MigrationPlanBuilder};
pub use result::{ActionResult, BatchResult, ContentMigrationResult, ResultBuilder};
pub use scope::{MigrationScope, ReferenceFinders};
pub use stats::{MigrationStats, StatsSnapshot};
