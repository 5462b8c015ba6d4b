//! Top-level migration runs.
//!
//! [`Migrator::execute`] runs a [`MigrationPlan`] once:
//!
//! 1. Create the run's manifest, seeded from a previous run's document if
//!    one is given
//! 2. Initialize source and destination concurrently; any failure is fatal
//! 3. Run the pipeline and record its errors in the manifest
//! 4. Persist the manifest if `manifest.path` is configured
//!
//! A manifest is produced for every run, including fatal and panicking
//! ones.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use cm_core::CompletionStatus;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::endpoint::EndpointKind;
use crate::error::EngineError;
use crate::manifest::{ManifestDocument, MigrationManifest};
use crate::plan::MigrationPlan;
use crate::result::ActionResult;
use crate::stats::StatsSnapshot;

/// The outcome of one run.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    /// How the run ended.
    pub status: CompletionStatus,

    /// Everything the run recorded.
    pub manifest: Arc<MigrationManifest>,
}

impl MigrationOutcome {
    /// Per-status counts over the whole manifest.
    #[must_use]
    pub fn summary(&self) -> StatsSnapshot {
        self.manifest.summary()
    }
}

/// Executes a migration plan.
#[derive(Debug, Clone)]
pub struct Migrator {
    plan: Arc<MigrationPlan>,
}

impl Migrator {
    /// Creates a migrator for `plan`.
    #[must_use]
    pub const fn new(plan: Arc<MigrationPlan>) -> Self {
        Self { plan }
    }

    /// The plan this migrator runs.
    #[inline]
    #[must_use]
    pub const fn plan(&self) -> &Arc<MigrationPlan> {
        &self.plan
    }

    /// Runs the plan once.
    ///
    /// `previous` is the manifest document of an earlier run of the same
    /// plan; its migrated entries are kept and every other entry is retried.
    pub async fn execute(
        &self,
        previous: Option<&ManifestDocument>,
        cancel: &CancellationToken,
    ) -> MigrationOutcome {
        let slot = Mutex::new(None);
        let run = AssertUnwindSafe(self.run(previous, &slot, cancel))
            .catch_unwind()
            .await;

        let manifest = slot
            .lock()
            .take()
            .unwrap_or_else(|| Arc::new(MigrationManifest::new(self.plan.plan_id())));
        let status = match run {
            Ok(status) => status,
            Err(panic) => {
                let error = EngineError::Panicked(panic_message(panic.as_ref()));
                error!(error = %error, "Migration aborted");
                manifest.add_error(&error);
                CompletionStatus::FatalError
            }
        };

        self.persist(&manifest);

        let summary = manifest.summary();
        info!(
            status = status.label(),
            migration_id = %manifest.migration_id(),
            migrated = summary.migrated,
            skipped = summary.skipped,
            errors = summary.errors,
            "Migration finished"
        );
        MigrationOutcome { status, manifest }
    }

    async fn run(
        &self,
        previous: Option<&ManifestDocument>,
        slot: &Mutex<Option<Arc<MigrationManifest>>>,
        cancel: &CancellationToken,
    ) -> CompletionStatus {
        let plan_id = self.plan.plan_id();
        let manifest = Arc::new(match previous {
            Some(document) => MigrationManifest::seeded_from(plan_id, document),
            None => MigrationManifest::new(plan_id),
        });
        *slot.lock() = Some(Arc::clone(&manifest));
        let scope = self.plan.create_scope(Arc::clone(&manifest));

        info!(
            %plan_id,
            migration_id = %manifest.migration_id(),
            steps = self.plan.pipeline().len(),
            "Starting migration"
        );

        let (source, destination) = tokio::join!(
            self.plan.source().initialize(cancel),
            self.plan.destination().initialize(cancel),
        );
        let errors = initialization_errors([
            (EndpointKind::Source, source),
            (EndpointKind::Destination, destination),
        ]);
        if !errors.is_empty() {
            if errors.iter().all(EngineError::is_cancellation) {
                info!("Migration canceled during endpoint initialization");
                return CompletionStatus::Canceled;
            }
            for error in &errors {
                warn!(error = %error, "Endpoint initialization failed");
            }
            manifest.add_errors(&errors);
            return CompletionStatus::FatalError;
        }

        if cancel.is_cancelled() {
            return CompletionStatus::Canceled;
        }

        let pipeline = self.plan.pipeline().run(&scope, cancel).await;
        manifest.add_errors(&pipeline.result.errors);

        if pipeline.canceled {
            CompletionStatus::Canceled
        } else if pipeline.result.errors.iter().all(EngineError::is_recoverable) {
            CompletionStatus::Completed
        } else {
            CompletionStatus::FatalError
        }
    }

    fn persist(&self, manifest: &MigrationManifest) {
        let config = &self.plan.config().manifest;
        let Some(path) = &config.path else {
            return;
        };
        match manifest.to_document().save(path, config.pretty) {
            Ok(()) => info!(%path, "Saved manifest"),
            Err(e) => {
                error!(%path, error = %e, "Failed to save manifest");
                manifest.add_error(&e);
            }
        }
    }
}

/// Collects the errors of failed endpoint initializations.
///
/// A failure reported without errors gets a generic one.
fn initialization_errors(
    results: [(EndpointKind, ActionResult); 2],
) -> Vec<EngineError> {
    let mut errors = Vec::new();
    for (endpoint, result) in results {
        if result.success {
            continue;
        }
        if result.errors.is_empty() {
            errors.push(EngineError::endpoint(endpoint, "initialization failed"));
        } else {
            errors.extend(result.errors);
        }
    }
    errors
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
