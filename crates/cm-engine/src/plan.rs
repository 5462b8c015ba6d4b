//! Migration plans.
//!
//! A [`MigrationPlan`] is the immutable description of a migration: the two
//! endpoints, the content type steps, the hooks and the reference caches.
//! It is assembled with a [`MigrationPlanBuilder`] and can be executed any
//! number of times; every run gets a fresh scope.
//!
//! # Examples
//!
//! ```ignore
//! let plan = MigrationPlanBuilder::new(source, destination)
//!     .with_config(config)
//!     .migrate::<User>(UserMigrator::new())
//!     .migrate::<Project>(ProjectMigrator::new())
//!     .cache_destination_references::<Project>()
//!     .build()?;
//! ```

use std::fmt;
use std::sync::Arc;

use cm_core::{Config, ConfigError, ContentType, fx_hash_set};
use tracing::debug;
use uuid::Uuid;

use crate::batch::BatchMigrator;
use crate::cache::{
    ContentReferenceCache, ContentReferenceFinder, DestinationReferenceFinder,
    PagedReferenceSearch,
};
use crate::content::ContentItem;
use crate::content_migrator::ContentMigrator;
use crate::endpoint::Endpoint;
use crate::error::EngineResult;
use crate::hooks::{
    BatchCompletedBuilder, ContentFilter, FilterBuilder, HookRegistry, MappingBuilder,
    PreviouslyMigratedFilter, TransformerBuilder,
};
use crate::manifest::MigrationManifest;
use crate::pager::ContentPagerFactory;
use crate::pipeline::{ContentMigrationStep, MigrationPipeline, PipelineStep};
use crate::scope::{MigrationScope, ReferenceFinders};

/// Creates a run's reference finder for one content type.
type FinderFactory =
    Arc<dyn Fn(&Config, &Arc<MigrationManifest>) -> Arc<dyn ContentReferenceFinder> + Send + Sync>;

/// Assembles a [`MigrationPlan`].
pub struct MigrationPlanBuilder<S, D> {
    source: Arc<S>,
    destination: Arc<D>,
    config: Config,
    plan_id: Option<Uuid>,
    steps: Vec<Arc<dyn PipelineStep>>,
    filters: FilterBuilder,
    mappings: MappingBuilder,
    transformers: TransformerBuilder,
    batch_completed: BatchCompletedBuilder,
    source_finders: Vec<(ContentType, FinderFactory)>,
    destination_finders: Vec<(ContentType, FinderFactory)>,
}

impl<S, D> MigrationPlanBuilder<S, D>
where
    S: Endpoint + 'static,
    D: Endpoint + 'static,
{
    /// Starts a plan migrating from `source` to `destination`.
    #[must_use]
    pub fn new(source: Arc<S>, destination: Arc<D>) -> Self {
        Self {
            source,
            destination,
            config: Config::default(),
            plan_id: None,
            steps: Vec::new(),
            filters: FilterBuilder::new(),
            mappings: MappingBuilder::new(),
            transformers: TransformerBuilder::new(),
            batch_completed: BatchCompletedBuilder::new(),
            source_finders: Vec::new(),
            destination_finders: Vec::new(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the plan id. Defaults to a random one.
    #[must_use]
    pub const fn with_plan_id(mut self, plan_id: Uuid) -> Self {
        self.plan_id = Some(plan_id);
        self
    }

    /// Adds a step migrating every `T` of the source through
    /// `batch_migrator`.
    ///
    /// Also registers the filter skipping items a previous run migrated.
    #[must_use]
    pub fn migrate<T>(mut self, batch_migrator: impl BatchMigrator<T> + 'static) -> Self
    where
        T: ContentItem,
        S: ContentPagerFactory<T>,
    {
        let pagers: Arc<dyn ContentPagerFactory<T>> = Arc::clone(&self.source) as _;
        let migrator = ContentMigrator::new(pagers, Arc::new(batch_migrator));
        self.steps.push(Arc::new(ContentMigrationStep::new(migrator)));
        self.filters
            .add_factory::<T>(|scope: &MigrationScope| -> Arc<dyn ContentFilter<T>> {
                Arc::new(PreviouslyMigratedFilter::<T>::new(scope))
            });
        self
    }

    /// Filters registered so far.
    pub fn filters(&mut self) -> &mut FilterBuilder {
        &mut self.filters
    }

    /// Mappings registered so far.
    pub fn mappings(&mut self) -> &mut MappingBuilder {
        &mut self.mappings
    }

    /// Transformers registered so far.
    pub fn transformers(&mut self) -> &mut TransformerBuilder {
        &mut self.transformers
    }

    /// Batch completed hooks registered so far.
    pub fn batch_completed(&mut self) -> &mut BatchCompletedBuilder {
        &mut self.batch_completed
    }

    /// Caches source references of `T` for hooks and migrators.
    ///
    /// The cache is filled by listing every `T` of the source on first
    /// lookup.
    #[must_use]
    pub fn cache_source_references<T>(mut self) -> Self
    where
        T: ContentItem,
        S: ContentPagerFactory<T>,
    {
        let source = Arc::clone(&self.source);
        let factory: FinderFactory = Arc::new(move |config: &Config, _: &Arc<MigrationManifest>| {
            let search =
                PagedReferenceSearch::<T, S>::new(Arc::clone(&source), config.batch.size_for(T::CONTENT_TYPE));
            let finder: Arc<dyn ContentReferenceFinder> = Arc::new(ContentReferenceCache::new(search));
            finder
        });
        self.source_finders.push((T::CONTENT_TYPE, factory));
        self
    }

    /// Resolves destination references of `T` through the manifest first and
    /// a destination listing second.
    #[must_use]
    pub fn cache_destination_references<T>(mut self) -> Self
    where
        T: ContentItem,
        D: ContentPagerFactory<T>,
    {
        let destination = Arc::clone(&self.destination);
        let factory: FinderFactory =
            Arc::new(move |config: &Config, manifest: &Arc<MigrationManifest>| {
                let search = PagedReferenceSearch::<T, D>::new(
                    Arc::clone(&destination),
                    config.batch.size_for(T::CONTENT_TYPE),
                );
                let finder: Arc<dyn ContentReferenceFinder> =
                    Arc::new(DestinationReferenceFinder::new(
                        T::CONTENT_TYPE,
                        Arc::clone(manifest),
                        Arc::new(ContentReferenceCache::new(search)),
                    ));
                finder
            });
        self.destination_finders.push((T::CONTENT_TYPE, factory));
        self
    }

    /// Validates and builds the plan.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`](crate::EngineError::Config) if the
    /// configuration is invalid, no step was added, or a content type was
    /// added twice.
    pub fn build(self) -> EngineResult<MigrationPlan> {
        self.config.validate()?;
        if self.steps.is_empty() {
            return Err(ConfigError::invalid_option("steps", "a plan needs at least one content type").into());
        }
        let mut seen = fx_hash_set();
        for step in &self.steps {
            if !seen.insert(step.content_type()) {
                return Err(ConfigError::invalid_option(
                    "steps",
                    format!("{} is migrated twice", step.content_type()),
                )
                .into());
            }
        }

        let hooks = self
            .filters
            .build()
            .merge(self.mappings.build())
            .merge(self.transformers.build())
            .merge(self.batch_completed.build());
        let pipeline = MigrationPipeline::new(self.steps);
        let plan_id = self.plan_id.unwrap_or_else(Uuid::new_v4);
        debug!(%plan_id, steps = pipeline.len(), hooks = ?hooks, "Built migration plan");

        Ok(MigrationPlan {
            plan_id,
            config: Arc::new(self.config),
            source: self.source,
            destination: self.destination,
            pipeline,
            hooks: Arc::new(hooks),
            source_finders: self.source_finders,
            destination_finders: self.destination_finders,
        })
    }
}

/// An immutable, executable migration plan.
pub struct MigrationPlan {
    plan_id: Uuid,
    config: Arc<Config>,
    source: Arc<dyn Endpoint>,
    destination: Arc<dyn Endpoint>,
    pipeline: MigrationPipeline,
    hooks: Arc<HookRegistry>,
    source_finders: Vec<(ContentType, FinderFactory)>,
    destination_finders: Vec<(ContentType, FinderFactory)>,
}

impl MigrationPlan {
    /// The plan id, stable across runs of this plan.
    #[inline]
    #[must_use]
    pub const fn plan_id(&self) -> Uuid {
        self.plan_id
    }

    /// The plan's configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The source endpoint.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Arc<dyn Endpoint> {
        &self.source
    }

    /// The destination endpoint.
    #[inline]
    #[must_use]
    pub fn destination(&self) -> &Arc<dyn Endpoint> {
        &self.destination
    }

    /// The content type steps.
    #[inline]
    #[must_use]
    pub const fn pipeline(&self) -> &MigrationPipeline {
        &self.pipeline
    }

    /// Creates the scope of a run recording into `manifest`.
    ///
    /// Reference caches are created fresh for every scope.
    #[must_use]
    pub fn create_scope(&self, manifest: Arc<MigrationManifest>) -> MigrationScope {
        let mut references = ReferenceFinders::new();
        for (content_type, factory) in &self.source_finders {
            references.insert_source(*content_type, factory(&self.config, &manifest));
        }
        for (content_type, factory) in &self.destination_finders {
            references.insert_destination(*content_type, factory(&self.config, &manifest));
        }
        MigrationScope::new(
            Arc::clone(&self.config),
            manifest,
            Arc::clone(&self.hooks),
            references,
        )
    }
}

impl fmt::Debug for MigrationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationPlan")
            .field("plan_id", &self.plan_id)
            .field("pipeline", &self.pipeline)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
