//! The ordered sequence of content type migrations.

use std::sync::Arc;

use async_trait::async_trait;
use cm_core::ContentType;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::content::ContentItem;
use crate::content_migrator::ContentMigrator;
use crate::result::{ActionResult, ContentMigrationResult, ResultBuilder};
use crate::scope::MigrationScope;

/// One step of the pipeline: the migration of one content type.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// The content type this step migrates.
    fn content_type(&self) -> ContentType;

    /// Runs the step.
    async fn execute(
        &self,
        scope: &MigrationScope,
        cancel: &CancellationToken,
    ) -> ContentMigrationResult;
}

/// Runs a [`ContentMigrator`] as a pipeline step.
pub struct ContentMigrationStep<T: ContentItem> {
    migrator: ContentMigrator<T>,
}

impl<T: ContentItem> ContentMigrationStep<T> {
    /// Wraps `migrator`.
    #[must_use]
    pub const fn new(migrator: ContentMigrator<T>) -> Self {
        Self { migrator }
    }
}

#[async_trait]
impl<T: ContentItem> PipelineStep for ContentMigrationStep<T> {
    fn content_type(&self) -> ContentType {
        T::CONTENT_TYPE
    }

    async fn execute(
        &self,
        scope: &MigrationScope,
        cancel: &CancellationToken,
    ) -> ContentMigrationResult {
        self.migrator.migrate(scope, cancel).await
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    /// Errors of every step that ran.
    pub result: ActionResult,

    /// Whether the run stopped because of cancellation.
    pub canceled: bool,

    /// Content types whose step ran to completion, in run order.
    pub completed_steps: Vec<ContentType>,
}

/// Content type steps in migration order.
///
/// Steps run one after another: later content types reference earlier ones
/// (groups reference users, workbooks reference projects), so a step only
/// starts once everything it may point at has been published.
#[derive(Clone, Default)]
pub struct MigrationPipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
}

impl MigrationPipeline {
    /// Creates a pipeline, ordering `steps` by [`ContentType::order_index`].
    #[must_use]
    pub fn new(mut steps: Vec<Arc<dyn PipelineStep>>) -> Self {
        steps.sort_by_key(|step| step.content_type().order_index());
        Self { steps }
    }

    /// The content types of the pipeline, in run order.
    #[must_use]
    pub fn content_types(&self) -> Vec<ContentType> {
        self.steps.iter().map(|step| step.content_type()).collect()
    }

    /// Number of steps.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the pipeline has no steps.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order.
    ///
    /// Stops early on cancellation or when a step reports that the next one
    /// must not run.
    pub async fn run(&self, scope: &MigrationScope, cancel: &CancellationToken) -> PipelineResult {
        let mut result = ResultBuilder::new();
        let mut completed_steps = Vec::with_capacity(self.steps.len());
        let mut canceled = false;

        for step in &self.steps {
            let content_type = step.content_type();
            if cancel.is_cancelled() {
                canceled = true;
                break;
            }

            let step_result = step.execute(scope, cancel).await;
            result.add(&step_result.result);

            if step_result.canceled {
                canceled = true;
                break;
            }
            completed_steps.push(content_type);
            if !step_result.perform_next_action {
                warn!(%content_type, "Step failed, stopping the pipeline");
                break;
            }
        }

        info!(
            steps = self.steps.len(),
            completed = completed_steps.len(),
            canceled,
            "Pipeline finished"
        );
        PipelineResult {
            result: result.into_result(),
            canceled,
            completed_steps,
        }
    }
}

impl std::fmt::Debug for MigrationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationPipeline")
            .field("steps", &self.content_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::EngineError;
    use crate::test_support::test_scope;

    struct Step {
        content_type: ContentType,
        outcome: ContentMigrationResult,
        log: Arc<Mutex<Vec<ContentType>>>,
    }

    impl Step {
        fn ok(content_type: ContentType, log: &Arc<Mutex<Vec<ContentType>>>) -> Arc<dyn PipelineStep> {
            let next = ContentMigrationResult {
                perform_next_action: true,
                ..ContentMigrationResult::default()
            };
            Self::with(content_type, next, log)
        }

        fn with(
            content_type: ContentType,
            outcome: ContentMigrationResult,
            log: &Arc<Mutex<Vec<ContentType>>>,
        ) -> Arc<dyn PipelineStep> {
            Arc::new(Self {
                content_type,
                outcome,
                log: Arc::clone(log),
            })
        }
    }

    #[async_trait]
    impl PipelineStep for Step {
        fn content_type(&self) -> ContentType {
            self.content_type
        }

        async fn execute(
            &self,
            _scope: &MigrationScope,
            cancel: &CancellationToken,
        ) -> ContentMigrationResult {
            self.log.lock().push(self.content_type);
            if self.outcome.canceled {
                cancel.cancel();
            }
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_steps_run_in_migration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = MigrationPipeline::new(vec![
            Step::ok(ContentType::Workbook, &log),
            Step::ok(ContentType::User, &log),
            Step::ok(ContentType::Project, &log),
        ]);

        let result = pipeline.run(&test_scope(), &CancellationToken::new()).await;

        assert!(result.result.success);
        let order = vec![ContentType::User, ContentType::Project, ContentType::Workbook];
        assert_eq!(*log.lock(), order);
        assert_eq!(result.completed_steps, order);
    }

    #[tokio::test]
    async fn test_failed_step_stops_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failed = ContentMigrationResult {
            result: ActionResult::from_error(EngineError::Manifest("disk full".to_owned())),
            perform_next_action: false,
            canceled: false,
        };
        let pipeline = MigrationPipeline::new(vec![
            Step::with(ContentType::User, failed, &log),
            Step::ok(ContentType::Project, &log),
        ]);

        let result = pipeline.run(&test_scope(), &CancellationToken::new()).await;

        assert!(!result.result.success);
        assert_eq!(result.result.errors.len(), 1);
        assert_eq!(*log.lock(), vec![ContentType::User]);
    }

    #[tokio::test]
    async fn test_canceled_step_stops_pipeline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let canceled = ContentMigrationResult {
            canceled: true,
            ..ContentMigrationResult::default()
        };
        let pipeline = MigrationPipeline::new(vec![
            Step::with(ContentType::User, canceled, &log),
            Step::ok(ContentType::Project, &log),
        ]);

        let result = pipeline.run(&test_scope(), &CancellationToken::new()).await;

        assert!(result.canceled);
        assert!(result.result.errors.is_empty());
        assert!(result.completed_steps.is_empty());
        assert_eq!(*log.lock(), vec![ContentType::User]);
    }
}
