//! Domain types for the content migration engine.
//!
//! # Module Organization
//!
//! - [`content_type`] - Migratable content categories
//! - [`location`] - Hierarchical content locations
//! - [`reference`] - Content identifiers and references
//! - [`status`] - Entry and run status tracking
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use cm_core::{ContentId, ContentLocation, ContentReference, ContentType, MigrationStatus};
//! ```

pub mod content_type;
pub mod location;
pub mod reference;
pub mod status;

pub use content_type::{ContentType, UnknownContentType};
pub use location::{ContentLocation, PATH_SEPARATOR};
pub use reference::{ContentId, ContentReference};
pub use status::{CompletionStatus, MigrationStatus};
