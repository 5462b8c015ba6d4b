//! Filter hooks.
//!
//! A filter takes the items of one batch and returns the subset that should
//! be migrated, in the same order. Items a filter removes are marked skipped
//! in the manifest.

use std::future::Future;
use std::marker::PhantomData;
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
use crate::scope::MigrationScope;

/// Filters the items of a batch.
#[async_trait]
pub trait ContentFilter<T: ContentItem>: Send + Sync {
    /// A name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// A disabled filter is skipped by the runner and costs nothing.
    fn is_disabled(&self) -> bool {
        false
    }

    /// Returns the items to keep, preserving their order.
    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<ContentMigrationItem<T>>>;
}

/// A filter backed by a synchronous predicate, applied eagerly.
pub struct PredicateFilter<T, F> {
    predicate: F,
    _item: PhantomData<fn(&T)>,
}

impl<T, F> PredicateFilter<T, F>
where
    T: ContentItem,
    F: Fn(&ContentMigrationItem<T>) -> bool + Send + Sync,
{
    /// Keeps the items `predicate` returns `true` for.
    pub const fn new(predicate: F) -> Self {
        Self {
            predicate,
            _item: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> ContentFilter<T> for PredicateFilter<T, F>
where
    T: ContentItem,
    F: Fn(&ContentMigrationItem<T>) -> bool + Send + Sync,
{
    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        _cancel: &CancellationToken,
    ) -> EngineResult<Vec<ContentMigrationItem<T>>> {
        Ok(items.into_iter().filter(|item| (self.predicate)(item)).collect())
    }
}

type AsyncPredicate<T> = Arc<
    dyn Fn(ContentMigrationItem<T>, CancellationToken) -> BoxFuture<'static, EngineResult<bool>>
        + Send
        + Sync,
>;

/// A filter backed by an asynchronous predicate, awaited once per item.
///
/// Items are decided one after another and the kept items are returned as
/// one list. A predicate error fails the whole filter.
pub struct AsyncPredicateFilter<T> {
    predicate: AsyncPredicate<T>,
}

impl<T: ContentItem> AsyncPredicateFilter<T> {
    /// Keeps the items `predicate` resolves `true` for.
    pub fn new<F, Fut>(predicate: F) -> Self
    where
        F: Fn(ContentMigrationItem<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<bool>> + Send + 'static,
    {
        Self {
            predicate: Arc::new(
                move |item: ContentMigrationItem<T>, cancel: CancellationToken| {
                    predicate(item, cancel).boxed()
                },
            ),
        }
    }
}

#[async_trait]
impl<T: ContentItem> ContentFilter<T> for AsyncPredicateFilter<T> {
    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<ContentMigrationItem<T>>> {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if cancel.is_cancelled() {
                return Err(EngineError::Canceled);
            }
            if (self.predicate)(item.clone(), cancel.clone()).await? {
                kept.push(item);
            }
        }
        Ok(kept)
    }
}

/// A filter definition that can be instantiated for any content item type.
pub trait GenericFilter: Send + Sync + 'static {
    /// Creates the filter for item type `T`.
    fn create<T: ContentItem>(&self, scope: &MigrationScope) -> Arc<dyn ContentFilter<T>>;
}

struct RegisterFilter;

impl<G: GenericFilter> RegisterGeneric<G> for RegisterFilter {
    fn register<T: ContentItem>(&self, table: &mut HookTable, definition: &Arc<G>) {
        let definition = Arc::clone(definition);
        table.push(
            T::CONTENT_TYPE,
            HookFactory::<dyn ContentFilter<T>>::new(move |scope| definition.create::<T>(scope)),
        );
    }
}

/// Accumulates filter registrations.
///
/// # Examples
///
/// ```ignore
/// let mut filters = FilterBuilder::new();
/// filters.add_fn::<User>(|item| !item.source_reference().name.starts_with("svc_"));
/// let registry = filters.build();
/// ```
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    table: HookTable,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: HookTable::new(HookKind::Filter),
        }
    }

    /// Registers a fixed filter instance shared by every run.
    pub fn add<T: ContentItem>(&mut self, filter: impl ContentFilter<T> + 'static) -> &mut Self {
        let filter: Arc<dyn ContentFilter<T>> = Arc::new(filter);
        self.table.push(T::CONTENT_TYPE, HookFactory::instance(filter));
        self
    }

    /// Registers a factory that creates the filter for each run.
    pub fn add_factory<T: ContentItem>(
        &mut self,
        factory: impl Fn(&MigrationScope) -> Arc<dyn ContentFilter<T>> + Send + Sync + 'static,
    ) -> &mut Self {
        self.table.push(T::CONTENT_TYPE, HookFactory::new(factory));
        self
    }

    /// Registers a synchronous predicate.
    pub fn add_fn<T: ContentItem>(
        &mut self,
        predicate: impl Fn(&ContentMigrationItem<T>) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.add(PredicateFilter::new(predicate))
    }

    /// Registers an asynchronous predicate.
    pub fn add_async_fn<T, F, Fut>(&mut self, predicate: F) -> &mut Self
    where
        T: ContentItem,
        F: Fn(ContentMigrationItem<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<bool>> + Send + 'static,
    {
        self.add(AsyncPredicateFilter::new(predicate))
    }

    /// Registers one generic filter for every type of `S`.
    pub fn add_generic<S: ContentItemSet, G: GenericFilter>(&mut self, filter: G) -> &mut Self {
        let mut registrar = GenericRegistrar {
            table: &mut self.table,
            definition: Arc::new(filter),
            register: RegisterFilter,
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

/// Runs the filters of one content type in registration order.
pub struct FilterRunner<T> {
    filters: Vec<Arc<dyn ContentFilter<T>>>,
}

impl<T: ContentItem> FilterRunner<T> {
    /// Creates the filters registered for `T` in `scope`.
    #[must_use]
    pub fn resolve(scope: &MigrationScope) -> Self {
        let filters = scope
            .hooks()
            .factories::<dyn ContentFilter<T>>(T::CONTENT_TYPE, HookKind::Filter)
            .iter()
            .map(|factory| {
                let filter: Arc<dyn ContentFilter<T>> = Arc::new(Logged::new(factory.create(scope)));
                filter
            })
            .collect();
        Self { filters }
    }

    /// Number of filters, disabled ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if there are no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs every enabled filter, each on the previous one's output.
    pub async fn execute(
        &self,
        mut items: Vec<ContentMigrationItem<T>>,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<ContentMigrationItem<T>>> {
        for filter in &self.filters {
            if filter.is_disabled() {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(EngineError::Canceled);
            }
            items = filter.execute(items, cancel).await.map_err(|e| {
                if e.is_cancellation() {
                    e
                } else {
                    EngineError::hook(HookKind::Filter, T::CONTENT_TYPE, e.to_string())
                }
            })?;
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestUser, test_items, test_scope_with};

    struct DropAll {
        disabled: bool,
    }

    #[async_trait]
    impl<T: ContentItem> ContentFilter<T> for DropAll {
        fn is_disabled(&self) -> bool {
            self.disabled
        }

        async fn execute(
            &self,
            _items: Vec<ContentMigrationItem<T>>,
            _cancel: &CancellationToken,
        ) -> EngineResult<Vec<ContentMigrationItem<T>>> {
            Ok(Vec::new())
        }
    }

    impl GenericFilter for DropAll {
        fn create<T: ContentItem>(&self, _scope: &MigrationScope) -> Arc<dyn ContentFilter<T>> {
            Arc::new(Self {
                disabled: self.disabled,
            })
        }
    }

    fn names(items: &[ContentMigrationItem<TestUser>]) -> Vec<String> {
        items.iter().map(|i| i.source_reference().name.clone()).collect()
    }

    #[tokio::test]
    async fn test_filters_chain_in_order() {
        let mut builder = FilterBuilder::new();
        builder
            .add_fn::<TestUser>(|item| item.source_reference().name != "bob")
            .add_async_fn::<TestUser, _, _>(|item, _cancel| async move {
                Ok(item.source_reference().name.len() > 3)
            });
        let scope = test_scope_with(builder.build());
        let runner = FilterRunner::<TestUser>::resolve(&scope);

        let items = test_items(&scope, &["alice", "bob", "eve", "mallory"]);
        let kept = runner.execute(items, &CancellationToken::new()).await.unwrap();

        assert_eq!(runner.len(), 2);
        assert_eq!(names(&kept), vec!["alice", "mallory"]);
    }

    #[tokio::test]
    async fn test_disabled_filter_is_identity() {
        let mut builder = FilterBuilder::new();
        builder.add::<TestUser>(DropAll { disabled: true });
        let scope = test_scope_with(builder.build());
        let runner = FilterRunner::<TestUser>::resolve(&scope);

        let items = test_items(&scope, &["alice", "bob"]);
        let kept = runner.execute(items, &CancellationToken::new()).await.unwrap();
        assert_eq!(names(&kept), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_generic_filter_registers_each_type() {
        let mut builder = FilterBuilder::new();
        builder.add_generic::<(TestUser, crate::test_support::TestProject), _>(DropAll {
            disabled: false,
        });
        let registry = builder.build();
        assert_eq!(registry.count(cm_core::ContentType::User, HookKind::Filter), 1);
        assert_eq!(registry.count(cm_core::ContentType::Project, HookKind::Filter), 1);

        let scope = test_scope_with(registry);
        let runner = FilterRunner::<TestUser>::resolve(&scope);
        let kept = runner
            .execute(test_items(&scope, &["alice"]), &CancellationToken::new())
            .await
            .unwrap();
        assert!(kept.is_empty());
    }

    #[tokio::test]
    async fn test_predicate_error_is_a_hook_error() {
        let mut builder = FilterBuilder::new();
        builder.add_async_fn::<TestUser, _, _>(|_item, _cancel| async {
            Err(EngineError::Manifest("lookup failed".to_owned()))
        });
        let scope = test_scope_with(builder.build());
        let runner = FilterRunner::<TestUser>::resolve(&scope);

        let err = runner
            .execute(test_items(&scope, &["alice"]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Hook { kind: HookKind::Filter, .. }));
    }

    #[tokio::test]
    async fn test_clear_drops_registrations() {
        let mut builder = FilterBuilder::new();
        builder.add_fn::<TestUser>(|_| false).clear();
        assert!(builder.build().is_empty());
    }
}
