//! Mapping hooks.
//!
//! A mapping decides where an item lands on the destination. Mappings run
//! in registration order, each one seeing the location the previous one
//! produced. The final location is written to the item's manifest entry.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use cm_core::ContentLocation;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::HookKind;
use super::logging::Logged;
use super::registry::{
    ContentItemSet, GenericRegistrar, HookFactory, HookRegistry, HookTable, RegisterGeneric,
};
use crate::content::ContentItem;
use crate::error::{EngineError, EngineResult};
use crate::scope::MigrationScope;

/// The input and output of a mapping: an item and its intended location.
#[derive(Debug)]
pub struct ContentMappingContext<T> {
    /// The source item.
    pub content_item: Arc<T>,

    /// Where the item will be published.
    pub mapped_location: ContentLocation,
}

impl<T> Clone for ContentMappingContext<T> {
    fn clone(&self) -> Self {
        Self {
            content_item: Arc::clone(&self.content_item),
            mapped_location: self.mapped_location.clone(),
        }
    }
}

impl<T: ContentItem> ContentMappingContext<T> {
    /// A context mapping `item` to its own source location.
    #[must_use]
    pub fn new(content_item: Arc<T>) -> Self {
        let mapped_location = content_item.reference().location.clone();
        Self {
            content_item,
            mapped_location,
        }
    }

    /// Returns a copy of this context with a different location.
    #[must_use]
    pub fn map_to(&self, mapped_location: ContentLocation) -> Self {
        Self {
            content_item: Arc::clone(&self.content_item),
            mapped_location,
        }
    }
}

/// The outcome of one mapping.
#[derive(Debug)]
pub enum MappingResult<T> {
    /// The mapping did not apply; the previous context stands.
    Unchanged,
    /// The mapping produced a new context.
    Replaced(ContentMappingContext<T>),
}

/// Maps one item to its destination location.
#[async_trait]
pub trait ContentMapping<T: ContentItem>: Send + Sync {
    /// A name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Maps `context`.
    async fn map(
        &self,
        context: &ContentMappingContext<T>,
        cancel: &CancellationToken,
    ) -> EngineResult<MappingResult<T>>;
}

type MapFn<T> = Arc<
    dyn Fn(ContentMappingContext<T>, CancellationToken) -> BoxFuture<'static, EngineResult<MappingResult<T>>>
        + Send
        + Sync,
>;

/// A mapping backed by a callback.
pub struct CallbackMapping<T> {
    callback: MapFn<T>,
}

impl<T: ContentItem> CallbackMapping<T> {
    /// Wraps a synchronous callback returning the new location, or `None`
    /// to leave the item unchanged.
    pub fn from_fn(
        callback: impl Fn(&ContentMappingContext<T>) -> Option<ContentLocation> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(move |context: ContentMappingContext<T>, _cancel: CancellationToken| {
                let result = match callback(&context) {
                    Some(location) => MappingResult::Replaced(context.map_to(location)),
                    None => MappingResult::Unchanged,
                };
                futures_util::future::ready(Ok(result)).boxed()
            }),
        }
    }

    /// Wraps an asynchronous callback.
    pub fn from_async_fn<F, Fut>(callback: F) -> Self
    where
        F: Fn(ContentMappingContext<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<MappingResult<T>>> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |context: ContentMappingContext<T>, cancel: CancellationToken| {
                callback(context, cancel).boxed()
            }),
        }
    }
}

#[async_trait]
impl<T: ContentItem> ContentMapping<T> for CallbackMapping<T> {
    async fn map(
        &self,
        context: &ContentMappingContext<T>,
        cancel: &CancellationToken,
    ) -> EngineResult<MappingResult<T>> {
        (self.callback)(context.clone(), cancel.clone()).await
    }
}

/// A mapping definition that can be instantiated for any content item type.
pub trait GenericMapping: Send + Sync + 'static {
    /// Creates the mapping for item type `T`.
    fn create<T: ContentItem>(&self, scope: &MigrationScope) -> Arc<dyn ContentMapping<T>>;
}

struct RegisterMapping;

impl<G: GenericMapping> RegisterGeneric<G> for RegisterMapping {
    fn register<T: ContentItem>(&self, table: &mut HookTable, definition: &Arc<G>) {
        let definition = Arc::clone(definition);
        table.push(
            T::CONTENT_TYPE,
            HookFactory::<dyn ContentMapping<T>>::new(move |scope| definition.create::<T>(scope)),
        );
    }
}

/// Accumulates mapping registrations.
#[derive(Debug, Clone)]
pub struct MappingBuilder {
    table: HookTable,
}

impl Default for MappingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: HookTable::new(HookKind::Mapping),
        }
    }

    /// Registers a fixed mapping instance shared by every run.
    pub fn add<T: ContentItem>(&mut self, mapping: impl ContentMapping<T> + 'static) -> &mut Self {
        let mapping: Arc<dyn ContentMapping<T>> = Arc::new(mapping);
        self.table.push(T::CONTENT_TYPE, HookFactory::instance(mapping));
        self
    }

    /// Registers a factory that creates the mapping for each run.
    pub fn add_factory<T: ContentItem>(
        &mut self,
        factory: impl Fn(&MigrationScope) -> Arc<dyn ContentMapping<T>> + Send + Sync + 'static,
    ) -> &mut Self {
        self.table.push(T::CONTENT_TYPE, HookFactory::new(factory));
        self
    }

    /// Registers a synchronous callback, see [`CallbackMapping::from_fn`].
    pub fn add_fn<T: ContentItem>(
        &mut self,
        callback: impl Fn(&ContentMappingContext<T>) -> Option<ContentLocation> + Send + Sync + 'static,
    ) -> &mut Self {
        self.add(CallbackMapping::from_fn(callback))
    }

    /// Registers an asynchronous callback.
    pub fn add_async_fn<T, F, Fut>(&mut self, callback: F) -> &mut Self
    where
        T: ContentItem,
        F: Fn(ContentMappingContext<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<MappingResult<T>>> + Send + 'static,
    {
        self.add(CallbackMapping::from_async_fn(callback))
    }

    /// Registers one generic mapping for every type of `S`.
    pub fn add_generic<S: ContentItemSet, G: GenericMapping>(&mut self, mapping: G) -> &mut Self {
        let mut registrar = GenericRegistrar {
            table: &mut self.table,
            definition: Arc::new(mapping),
            register: RegisterMapping,
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

/// Runs the mappings of one content type in registration order.
pub struct MappingRunner<T> {
    mappings: Vec<Arc<dyn ContentMapping<T>>>,
}

impl<T: ContentItem> MappingRunner<T> {
    /// Creates the mappings registered for `T` in `scope`.
    #[must_use]
    pub fn resolve(scope: &MigrationScope) -> Self {
        let mappings = scope
            .hooks()
            .factories::<dyn ContentMapping<T>>(T::CONTENT_TYPE, HookKind::Mapping)
            .iter()
            .map(|factory| {
                let mapping: Arc<dyn ContentMapping<T>> =
                    Arc::new(Logged::new(factory.create(scope)));
                mapping
            })
            .collect();
        Self { mappings }
    }

    /// Number of mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Returns `true` if there are no mappings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Maps `item` starting from its source location.
    pub async fn execute(
        &self,
        item: Arc<T>,
        cancel: &CancellationToken,
    ) -> EngineResult<ContentMappingContext<T>> {
        let mut context = ContentMappingContext::new(item);
        for mapping in &self.mappings {
            if cancel.is_cancelled() {
                return Err(EngineError::Canceled);
            }
            match mapping.map(&context, cancel).await {
                Ok(MappingResult::Unchanged) => {}
                Ok(MappingResult::Replaced(next)) => context = next,
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    return Err(EngineError::hook(
                        HookKind::Mapping,
                        T::CONTENT_TYPE,
                        e.to_string(),
                    ));
                }
            }
        }
        Ok(context)
    }
}
