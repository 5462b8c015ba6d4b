//! Pluggable migration hooks.
//!
//! Hooks customize a migration per content type without touching the
//! engine:
//!
//! - **Filters** ([`ContentFilter`]) decide which items of a batch migrate
//! - **Mappings** ([`ContentMapping`]) decide where items land
//! - **Transformers** ([`ContentTransformer`]) rewrite items before publishing
//! - **Batch completed** hooks ([`BatchCompletedHook`]) adjust a batch's result
//!
//! Each kind has a builder that accumulates registrations (fixed instances,
//! per-run factories, sync or async callbacks, generic definitions for
//! several types at once) and a runner that executes the hooks of one
//! content type in registration order. Builders produce an immutable
//! [`HookRegistry`] when the plan is built; runners resolve their hooks from
//! the registry once per run, wrapping each one in [`Logged`].

mod batch_completed;
mod builtin;
mod filter;
mod logging;
mod mapping;
mod registry;
mod transformer;

use std::fmt;

pub use batch_completed::{
    BatchCompletedBuilder, BatchCompletedHook, BatchCompletedRunner, CallbackBatchCompleted,
    GenericBatchCompleted,
};
pub use builtin::{LocationPrefixMapping, PreviouslyMigratedFilter, SkipPreviouslyMigrated};
pub use filter::{
    AsyncPredicateFilter, ContentFilter, FilterBuilder, FilterRunner, GenericFilter,
    PredicateFilter,
};
pub use logging::Logged;
pub use mapping::{
    CallbackMapping, ContentMapping, ContentMappingContext, GenericMapping, MappingBuilder,
    MappingResult, MappingRunner,
};
pub use registry::{ContentItemSet, ContentTypeVisitor, HookFactory, HookRegistry};
pub use transformer::{
    CallbackTransformer, ContentTransformer, FileContentTransformer, FileTransformer,
    GenericTransformer, TransformResult, TransformerBuilder, TransformerRunner,
};

/// The kind of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    /// Decides which items migrate.
    Filter,
    /// Decides where items land.
    Mapping,
    /// Rewrites items before publishing.
    Transformer,
    /// Adjusts the result of a finished batch.
    BatchCompleted,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Filter => "filter",
            Self::Mapping => "mapping",
            Self::Transformer => "transformer",
            Self::BatchCompleted => "batch_completed",
        })
    }
}
