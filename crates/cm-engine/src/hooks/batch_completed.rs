//! Batch completed hooks.
//!
//! Run once per batch after its manifest entries are finalized and before
//! the batch result is folded into the content type's result. Each hook sees
//! the batch's items and the result the previous hook returned, and may
//! adjust it, e.g. to stop paging once too many items failed.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::HookKind;
use super::logging::Logged;
use super::registry::{
    ContentItemSet, GenericRegistrar, HookFactory, HookRegistry, HookTable, RegisterGeneric,
};
use crate::content::{ContentItem, ContentMigrationItem};
use crate::error::{EngineError, EngineResult};
use crate::result::BatchResult;
use crate::scope::MigrationScope;

/// Inspects or adjusts the result of a finished batch.
#[async_trait]
pub trait BatchCompletedHook<T: ContentItem>: Send + Sync {
    /// A name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Returns the result to continue with.
    async fn execute(
        &self,
        items: &[ContentMigrationItem<T>],
        result: BatchResult,
        cancel: &CancellationToken,
    ) -> EngineResult<BatchResult>;
}

type CompletedFn<T> = Arc<
    dyn Fn(Vec<ContentMigrationItem<T>>, BatchResult, CancellationToken) -> BoxFuture<'static, EngineResult<BatchResult>>
        + Send
        + Sync,
>;

/// A batch completed hook backed by a callback.
pub struct CallbackBatchCompleted<T> {
    callback: CompletedFn<T>,
}

impl<T: ContentItem> CallbackBatchCompleted<T> {
    /// Wraps a synchronous callback that receives the result by mutable
    /// reference.
    pub fn from_fn(
        callback: impl Fn(&[ContentMigrationItem<T>], &mut BatchResult) + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(
                move |items: Vec<ContentMigrationItem<T>>, mut result: BatchResult, _cancel: CancellationToken| {
                    callback(&items, &mut result);
                    futures_util::future::ready(Ok(result)).boxed()
                },
            ),
        }
    }

    /// Wraps an asynchronous callback.
    pub fn from_async_fn<F, Fut>(callback: F) -> Self
    where
        F: Fn(Vec<ContentMigrationItem<T>>, BatchResult, CancellationToken) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = EngineResult<BatchResult>> + Send + 'static,
    {
        Self {
            callback: Arc::new(
                move |items: Vec<ContentMigrationItem<T>>, result: BatchResult, cancel: CancellationToken| {
                    callback(items, result, cancel).boxed()
                },
            ),
        }
    }
}

#[async_trait]
impl<T: ContentItem> BatchCompletedHook<T> for CallbackBatchCompleted<T> {
    async fn execute(
        &self,
        items: &[ContentMigrationItem<T>],
        result: BatchResult,
        cancel: &CancellationToken,
    ) -> EngineResult<BatchResult> {
        (self.callback)(items.to_vec(), result, cancel.clone()).await
    }
}

/// A batch completed hook that can be instantiated for any item type.
pub trait GenericBatchCompleted: Send + Sync + 'static {
    /// Creates the hook for item type `T`.
    fn create<T: ContentItem>(&self, scope: &MigrationScope) -> Arc<dyn BatchCompletedHook<T>>;
}

struct RegisterBatchCompleted;

impl<G: GenericBatchCompleted> RegisterGeneric<G> for RegisterBatchCompleted {
    fn register<T: ContentItem>(&self, table: &mut HookTable, definition: &Arc<G>) {
        let definition = Arc::clone(definition);
        table.push(
            T::CONTENT_TYPE,
            HookFactory::<dyn BatchCompletedHook<T>>::new(move |scope| definition.create::<T>(scope)),
        );
    }
}

/// Accumulates batch completed registrations.
#[derive(Debug, Clone)]
pub struct BatchCompletedBuilder {
    table: HookTable,
}

impl Default for BatchCompletedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchCompletedBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: HookTable::new(HookKind::BatchCompleted),
        }
    }

    /// Registers a fixed hook instance shared by every run.
    pub fn add<T: ContentItem>(&mut self, hook: impl BatchCompletedHook<T> + 'static) -> &mut Self {
        let hook: Arc<dyn BatchCompletedHook<T>> = Arc::new(hook);
        self.table.push(T::CONTENT_TYPE, HookFactory::instance(hook));
        self
    }

    /// Registers a factory that creates the hook for each run.
    pub fn add_factory<T: ContentItem>(
        &mut self,
        factory: impl Fn(&MigrationScope) -> Arc<dyn BatchCompletedHook<T>> + Send + Sync + 'static,
    ) -> &mut Self {
        self.table.push(T::CONTENT_TYPE, HookFactory::new(factory));
        self
    }

    /// Registers a synchronous callback, see [`CallbackBatchCompleted::from_fn`].
    pub fn add_fn<T: ContentItem>(
        &mut self,
        callback: impl Fn(&[ContentMigrationItem<T>], &mut BatchResult) + Send + Sync + 'static,
    ) -> &mut Self {
        self.add(CallbackBatchCompleted::from_fn(callback))
    }

    /// Registers an asynchronous callback.
    pub fn add_async_fn<T, F, Fut>(&mut self, callback: F) -> &mut Self
    where
        T: ContentItem,
        F: Fn(Vec<ContentMigrationItem<T>>, BatchResult, CancellationToken) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = EngineResult<BatchResult>> + Send + 'static,
    {
        self.add(CallbackBatchCompleted::from_async_fn(callback))
    }

    /// Registers one generic hook for every type of `S`.
    pub fn add_generic<S: ContentItemSet, G: GenericBatchCompleted>(&mut self, hook: G) -> &mut Self {
        let mut registrar = GenericRegistrar {
            table: &mut self.table,
            definition: Arc::new(hook),
            register: RegisterBatchCompleted,
        };
        S::visit(&mut registrar);
        self
    }

    /// Removes every registration.
    pub fn clear(&mut self) -> &mut Self {
        self.table.clear();
        self
    }

    /// Builds an immutable snapshot of the registrations.
    #[must_use]
    pub fn build(&self) -> HookRegistry {
        self.table.build()
    }
}

/// Runs the batch completed hooks of one content type in registration order.
pub struct BatchCompletedRunner<T> {
    hooks: Vec<Arc<dyn BatchCompletedHook<T>>>,
}

impl<T: ContentItem> BatchCompletedRunner<T> {
    /// Creates the hooks registered for `T` in `scope`.
    #[must_use]
    pub fn resolve(scope: &MigrationScope) -> Self {
        let hooks = scope
            .hooks()
            .factories::<dyn BatchCompletedHook<T>>(T::CONTENT_TYPE, HookKind::BatchCompleted)
            .iter()
            .map(|factory| {
                let hook: Arc<dyn BatchCompletedHook<T>> =
                    Arc::new(Logged::new(factory.create(scope)));
                hook
            })
            .collect();
        Self { hooks }
    }

    /// Number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` if there are no hooks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Passes `result` through every hook.
    ///
    /// A failing hook ends the chain: its error is added to the result,
    /// which then counts as failed. A canceled hook marks the result
    /// canceled.
    pub async fn execute(
        &self,
        items: &[ContentMigrationItem<T>],
        mut result: BatchResult,
        cancel: &CancellationToken,
    ) -> BatchResult {
        for hook in &self.hooks {
            let previous = result.clone();
            match hook.execute(items, result, cancel).await {
                Ok(next) => result = next,
                Err(e) if e.is_cancellation() => {
                    result = previous;
                    result.canceled = true;
                    result.perform_next_batch = false;
                    break;
                }
                Err(e) => {
                    result = previous;
                    result.success = false;
                    result.errors.push(EngineError::hook(
                        HookKind::BatchCompleted,
                        T::CONTENT_TYPE,
                        e.to_string(),
                    ));
                    break;
                }
            }
        }
        result
    }
}
