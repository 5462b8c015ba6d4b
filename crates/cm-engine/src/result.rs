//! Result types for engine operations.
//!
//! Long-running operations in the engine do not short-circuit on the first
//! error: they keep going where a "continue" semantic exists and report every
//! error they collected. These types carry that shape:
//!
//! - [`ActionResult`] - success flag plus collected errors
//! - [`ContentMigrationResult`] - one content type's outcome, with a
//!   continuation flag for the pipeline
//! - [`BatchResult`] - one batch's outcome, with a continuation flag for the
//!   content migrator
//! - [`ResultBuilder`] - folds results and errors together

use crate::error::EngineError;

/// The outcome of an operation that collects errors instead of failing fast.
///
/// # Examples
///
/// ```
/// use cm_engine::{ActionResult, EngineError};
///
/// assert!(ActionResult::succeeded().success);
///
/// let failed = ActionResult::from_error(EngineError::Manifest("bad".to_owned()));
/// assert!(!failed.success);
/// assert_eq!(failed.errors.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Whether the operation succeeded.
    pub success: bool,

    /// Errors collected by the operation.
    pub errors: Vec<EngineError>,
}

impl ActionResult {
    /// A successful result with no errors.
    #[must_use]
    pub const fn succeeded() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    /// A failed result carrying `errors`.
    #[must_use]
    pub const fn failed(errors: Vec<EngineError>) -> Self {
        Self {
            success: false,
            errors,
        }
    }

    /// A failed result carrying a single error.
    #[must_use]
    pub fn from_error(error: EngineError) -> Self {
        Self::failed(vec![error])
    }

    /// Returns `true` if every collected error is a cancellation.
    ///
    /// A result without errors is not considered canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(EngineError::is_cancellation)
    }
}

impl Default for ActionResult {
    fn default() -> Self {
        Self::succeeded()
    }
}

impl From<Result<(), EngineError>> for ActionResult {
    fn from(result: Result<(), EngineError>) -> Self {
        match result {
            Ok(()) => Self::succeeded(),
            Err(e) => Self::from_error(e),
        }
    }
}

/// The outcome of migrating one content type.
#[derive(Debug, Clone, Default)]
pub struct ContentMigrationResult {
    /// Folded batch-level and page-level outcome.
    pub result: ActionResult,

    /// Whether the pipeline should run the next content type.
    pub perform_next_action: bool,

    /// Whether the content type's loop stopped at a cancellation checkpoint.
    pub canceled: bool,
}

impl ContentMigrationResult {
    /// Returns `true` if the content type finished without a batch or page
    /// failure.
    #[inline]
    #[must_use]
    pub const fn success(&self) -> bool {
        self.result.success
    }

    /// Returns the collected errors.
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[EngineError] {
        &self.result.errors
    }
}

/// The outcome of one batch handed to a batch migrator.
///
/// Item-level failures are recorded on the items' manifest entries and do not
/// appear here; `success` and `errors` describe the batch as a whole.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Whether the batch as a whole succeeded.
    pub success: bool,

    /// Batch-level errors.
    pub errors: Vec<EngineError>,

    /// Whether the content migrator should fetch and migrate the next page.
    pub perform_next_batch: bool,

    /// Whether the batch stopped because of cancellation.
    pub canceled: bool,
}

impl BatchResult {
    /// A successful batch that allows the next batch to run.
    #[must_use]
    pub const fn succeeded() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            perform_next_batch: true,
            canceled: false,
        }
    }

    /// A failed batch.
    #[must_use]
    pub const fn failed(errors: Vec<EngineError>, perform_next_batch: bool) -> Self {
        Self {
            success: false,
            errors,
            perform_next_batch,
            canceled: false,
        }
    }

    /// A batch that observed cancellation. Not a failure, but no further
    /// batches run.
    #[must_use]
    pub const fn canceled() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            perform_next_batch: false,
            canceled: true,
        }
    }

    /// Returns this result with a different continuation flag.
    #[must_use]
    pub const fn with_perform_next_batch(mut self, perform_next_batch: bool) -> Self {
        self.perform_next_batch = perform_next_batch;
        self
    }
}

/// Folds the outcomes of several operations into one [`ActionResult`].
///
/// Cancellation errors are dropped on the way in: a user-requested stop is
/// not a failure.
///
/// # Examples
///
/// ```
/// use cm_engine::{ActionResult, EngineError, ResultBuilder};
///
/// let mut builder = ResultBuilder::new();
/// builder.add(&ActionResult::succeeded());
/// builder.add_error(EngineError::Canceled);
/// assert!(builder.build().success);
///
/// builder.add_error(EngineError::Manifest("broken".to_owned()));
/// assert!(!builder.build().success);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResultBuilder {
    failed: bool,
    errors: Vec<EngineError>,
}

impl ResultBuilder {
    /// Creates an empty, successful builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds another action result in.
    pub fn add(&mut self, result: &ActionResult) {
        if !result.success {
            self.failed = true;
        }
        self.add_errors(result.errors.iter().cloned());
    }

    /// Folds a batch result in. Only the batch-level outcome is considered.
    pub fn add_batch(&mut self, result: &BatchResult) {
        if !result.success {
            self.failed = true;
        }
        self.add_errors(result.errors.iter().cloned());
    }

    /// Records a single error and marks the result failed, unless the error
    /// is a cancellation.
    pub fn add_error(&mut self, error: EngineError) {
        if error.is_cancellation() {
            return;
        }
        self.failed = true;
        self.errors.push(error);
    }

    /// Records several errors.
    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = EngineError>) {
        for error in errors {
            self.add_error(error);
        }
    }

    /// Returns `true` if nothing has failed so far.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !self.failed
    }

    /// Builds the folded result.
    #[must_use]
    pub fn build(&self) -> ActionResult {
        ActionResult {
            success: !self.failed,
            errors: self.errors.clone(),
        }
    }

    /// Consumes the builder.
    #[must_use]
    pub fn into_result(self) -> ActionResult {
        ActionResult {
            success: !self.failed,
            errors: self.errors,
        }
    }
}
