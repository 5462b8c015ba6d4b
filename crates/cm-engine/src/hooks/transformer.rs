//! Transformer hooks.
//!
//! Transformers rewrite an item right before it is published, e.g. to
//! replace source references embedded in a workbook file with destination
//! references. They run in registration order, each one seeing the previous
//! one's output.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::HookKind;
use super::logging::Logged;
use super::registry::{
    ContentItemSet, GenericRegistrar, HookFactory, HookRegistry, HookTable, RegisterGeneric,
};
use crate::content::ContentItem;
use crate::error::{EngineError, EngineResult};
use crate::scope::MigrationScope;

/// The outcome of one transformer.
#[derive(Debug)]
pub enum TransformResult<T> {
    /// The item is published as is.
    Unchanged,
    /// The item is replaced by a rewritten copy.
    Replaced(T),
}

/// Rewrites one publishable item.
#[async_trait]
pub trait ContentTransformer<T: ContentItem>: Send + Sync {
    /// A name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Transforms `item`.
    async fn transform(&self, item: &T, cancel: &CancellationToken)
    -> EngineResult<TransformResult<T>>;
}

/// A transformer over an item's file content.
///
/// Rewriting file content is expensive, so the cheap
/// [`needs_transforming`](Self::needs_transforming) check runs first and the
/// rewrite is skipped when it returns `false`. Register through
/// [`TransformerBuilder::add_file`].
#[async_trait]
pub trait FileContentTransformer<T: ContentItem>: Send + Sync {
    /// Returns `true` if the item's file needs rewriting.
    fn needs_transforming(&self, item: &T) -> bool;

    /// Rewrites the item's file.
    async fn transform_file(&self, item: &T, cancel: &CancellationToken) -> EngineResult<T>;
}

/// Adapts a [`FileContentTransformer`] to [`ContentTransformer`].
pub struct FileTransformer<F, T> {
    inner: F,
    _item: PhantomData<fn(&T)>,
}

impl<F, T> FileTransformer<F, T> {
    /// Wraps `inner`.
    pub const fn new(inner: F) -> Self {
        Self {
            inner,
            _item: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> ContentTransformer<T> for FileTransformer<F, T>
where
    T: ContentItem,
    F: FileContentTransformer<T>,
{
    fn name(&self) -> &str {
        std::any::type_name::<F>()
    }

    async fn transform(
        &self,
        item: &T,
        cancel: &CancellationToken,
    ) -> EngineResult<TransformResult<T>> {
        if !self.inner.needs_transforming(item) {
            trace!(item = %item.reference(), "File content needs no transforming");
            return Ok(TransformResult::Unchanged);
        }
        Ok(TransformResult::Replaced(
            self.inner.transform_file(item, cancel).await?,
        ))
    }
}

type TransformFn<T> = Arc<
    dyn Fn(Arc<T>, CancellationToken) -> BoxFuture<'static, EngineResult<TransformResult<T>>>
        + Send
        + Sync,
>;

/// A transformer backed by a callback.
pub struct CallbackTransformer<T> {
    callback: TransformFn<T>,
}

impl<T: ContentItem> CallbackTransformer<T> {
    /// Wraps a synchronous callback returning a replacement, or `None` to
    /// leave the item unchanged.
    pub fn from_fn(callback: impl Fn(&T) -> Option<T> + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(move |item: Arc<T>, _cancel: CancellationToken| {
                let result = callback(&item).map_or(TransformResult::Unchanged, TransformResult::Replaced);
                futures_util::future::ready(Ok(result)).boxed()
            }),
        }
    }

    /// Wraps an asynchronous callback.
    pub fn from_async_fn<F, Fut>(callback: F) -> Self
    where
        F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<TransformResult<T>>> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |item: Arc<T>, cancel: CancellationToken| {
                callback(item, cancel).boxed()
            }),
        }
    }
}

#[async_trait]
impl<T: ContentItem + Clone> ContentTransformer<T> for CallbackTransformer<T> {
    async fn transform(
        &self,
        item: &T,
        cancel: &CancellationToken,
    ) -> EngineResult<TransformResult<T>> {
        (self.callback)(Arc::new(item.clone()), cancel.clone()).await
    }
}

/// A transformer definition that can be instantiated for any content item
/// type.
pub trait GenericTransformer: Send + Sync + 'static {
    /// Creates the transformer for item type `T`.
    fn create<T: ContentItem>(&self, scope: &MigrationScope) -> Arc<dyn ContentTransformer<T>>;
}

struct RegisterTransformer;

impl<G: GenericTransformer> RegisterGeneric<G> for RegisterTransformer {
    fn register<T: ContentItem>(&self, table: &mut HookTable, definition: &Arc<G>) {
        let definition = Arc::clone(definition);
        table.push(
            T::CONTENT_TYPE,
            HookFactory::<dyn ContentTransformer<T>>::new(move |scope| {
                definition.create::<T>(scope)
            }),
        );
    }
}

/// Accumulates transformer registrations.
#[derive(Debug, Clone)]
pub struct TransformerBuilder {
    table: HookTable,
}

impl Default for TransformerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformerBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: HookTable::new(HookKind::Transformer),
        }
    }

    /// Registers a fixed transformer instance shared by every run.
    pub fn add<T: ContentItem>(
        &mut self,
        transformer: impl ContentTransformer<T> + 'static,
    ) -> &mut Self {
        let transformer: Arc<dyn ContentTransformer<T>> = Arc::new(transformer);
        self.table
            .push(T::CONTENT_TYPE, HookFactory::instance(transformer));
        self
    }

    /// Registers a file content transformer.
    pub fn add_file<T: ContentItem>(
        &mut self,
        transformer: impl FileContentTransformer<T> + 'static,
    ) -> &mut Self {
        self.add(FileTransformer::new(transformer))
    }

    /// Registers a factory that creates the transformer for each run.
    pub fn add_factory<T: ContentItem>(
        &mut self,
        factory: impl Fn(&MigrationScope) -> Arc<dyn ContentTransformer<T>> + Send + Sync + 'static,
    ) -> &mut Self {
        self.table.push(T::CONTENT_TYPE, HookFactory::new(factory));
        self
    }

    /// Registers a synchronous callback.
    pub fn add_fn<T: ContentItem + Clone>(
        &mut self,
        callback: impl Fn(&T) -> Option<T> + Send + Sync + 'static,
    ) -> &mut Self {
        self.add(CallbackTransformer::from_fn(callback))
    }

    /// Registers an asynchronous callback.
    pub fn add_async_fn<T, F, Fut>(&mut self, callback: F) -> &mut Self
    where
        T: ContentItem + Clone,
        F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<TransformResult<T>>> + Send + 'static,
    {
        self.add(CallbackTransformer::from_async_fn(callback))
    }

    /// Registers one generic transformer for every type of `S`.
    pub fn add_generic<S: ContentItemSet, G: GenericTransformer>(
        &mut self,
        transformer: G,
    ) -> &mut Self {
        let mut registrar = GenericRegistrar {
            table: &mut self.table,
            definition: Arc::new(transformer),
            register: RegisterTransformer,
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

/// Runs the transformers of one content type in registration order.
pub struct TransformerRunner<T> {
    transformers: Vec<Arc<dyn ContentTransformer<T>>>,
}

impl<T: ContentItem> TransformerRunner<T> {
    /// Creates the transformers registered for `T` in `scope`.
    #[must_use]
    pub fn resolve(scope: &MigrationScope) -> Self {
        let transformers = scope
            .hooks()
            .factories::<dyn ContentTransformer<T>>(T::CONTENT_TYPE, HookKind::Transformer)
            .iter()
            .map(|factory| {
                let transformer: Arc<dyn ContentTransformer<T>> =
                    Arc::new(Logged::new(factory.create(scope)));
                transformer
            })
            .collect();
        Self { transformers }
    }

    /// A runner without transformers.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    /// Number of transformers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    /// Returns `true` if there are no transformers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Produces the publishable form of `item`.
    ///
    /// Returns the same `Arc` when no transformer replaced the item.
    pub async fn execute(&self, item: Arc<T>, cancel: &CancellationToken) -> EngineResult<Arc<T>> {
        let mut current = item;
        for transformer in &self.transformers {
            if cancel.is_cancelled() {
                return Err(EngineError::Canceled);
            }
            match transformer.transform(&current, cancel).await {
                Ok(TransformResult::Unchanged) => {}
                Ok(TransformResult::Replaced(next)) => current = Arc::new(next),
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    return Err(EngineError::hook(
                        HookKind::Transformer,
                        T::CONTENT_TYPE,
                        e.to_string(),
                    ));
                }
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_support::{TestWorkbook, test_scope_with};

    struct Embedder {
        rewrites: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FileContentTransformer<TestWorkbook> for Embedder {
        fn needs_transforming(&self, item: &TestWorkbook) -> bool {
            item.content.contains("source-site")
        }

        async fn transform_file(
            &self,
            item: &TestWorkbook,
            _cancel: &CancellationToken,
        ) -> EngineResult<TestWorkbook> {
            self.rewrites.fetch_add(1, Ordering::SeqCst);
            Ok(item.with_content(item.content.replace("source-site", "destination-site")))
        }
    }

    #[tokio::test]
    async fn test_file_transformer_skips_clean_items() {
        let rewrites = Arc::new(AtomicUsize::new(0));
        let mut builder = TransformerBuilder::new();
        builder.add_file(Embedder {
            rewrites: Arc::clone(&rewrites),
        });
        let scope = test_scope_with(builder.build());
        let runner = TransformerRunner::<TestWorkbook>::resolve(&scope);
        let cancel = CancellationToken::new();

        let clean = Arc::new(TestWorkbook::new("Sales", "no references"));
        let out = runner.execute(Arc::clone(&clean), &cancel).await.unwrap();
        assert!(Arc::ptr_eq(&clean, &out));
        assert_eq!(rewrites.load(Ordering::SeqCst), 0);

        let embedded = Arc::new(TestWorkbook::new("Sales", "server=source-site"));
        let out = runner.execute(embedded, &cancel).await.unwrap();
        assert_eq!(out.content, "server=destination-site");
        assert_eq!(rewrites.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transformers_chain_in_order() {
        let mut builder = TransformerBuilder::new();
        builder
            .add_fn::<TestWorkbook>(|wb| Some(wb.with_content(format!("{}-a", wb.content))))
            .add_async_fn::<TestWorkbook, _, _>(|wb, _cancel| async move {
                Ok(TransformResult::Replaced(
                    wb.with_content(format!("{}-b", wb.content)),
                ))
            });
        let scope = test_scope_with(builder.build());
        let runner = TransformerRunner::<TestWorkbook>::resolve(&scope);

        let out = runner
            .execute(Arc::new(TestWorkbook::new("Sales", "x")), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.content, "x-a-b");
    }

    #[tokio::test]
    async fn test_transformer_error_is_a_hook_error() {
        let mut builder = TransformerBuilder::new();
        builder.add_async_fn::<TestWorkbook, _, _>(|_wb, _cancel| async {
            Err(EngineError::Manifest("bad file".to_owned()))
        });
        let scope = test_scope_with(builder.build());

        let err = TransformerRunner::<TestWorkbook>::resolve(&scope)
            .execute(Arc::new(TestWorkbook::new("Sales", "x")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Hook {
                kind: HookKind::Transformer,
                ..
            }
        ));
    }
}
