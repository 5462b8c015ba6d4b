//! Hook registration tables.
//!
//! Hooks are registered as factories keyed by `(content type, hook kind)`.
//! A factory produces a hook instance from the [`MigrationScope`] of a run,
//! so hooks can depend on the run's manifest, configuration and reference
//! finders. Factories of different item types live in one table; each entry
//! is stored type-erased and recovered by downcasting to the typed
//! [`HookFactory`] its builder registered.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use cm_core::{ContentType, FxHashMap, fx_hash_map};
use smallvec::SmallVec;

use super::HookKind;
use crate::content::ContentItem;
use crate::scope::MigrationScope;

type ErasedFactory = Arc<dyn Any + Send + Sync>;

/// Most content types register only a couple of hooks of each kind.
type FactoryList = SmallVec<[ErasedFactory; 2]>;

/// Creates a hook instance for one run.
///
/// `H` is the hook trait object, e.g. `dyn ContentFilter<User>`.
pub struct HookFactory<H: ?Sized>(Arc<dyn Fn(&MigrationScope) -> Arc<H> + Send + Sync>);

impl<H: ?Sized> HookFactory<H> {
    /// Wraps a factory callback.
    pub fn new(factory: impl Fn(&MigrationScope) -> Arc<H> + Send + Sync + 'static) -> Self {
        Self(Arc::new(factory))
    }

    /// Creates the hook for `scope`.
    #[must_use]
    pub fn create(&self, scope: &MigrationScope) -> Arc<H> {
        (self.0)(scope)
    }
}

impl<H: ?Sized + Send + Sync + 'static> HookFactory<H> {
    /// A factory that hands out the same instance to every run.
    #[must_use]
    pub fn instance(hook: Arc<H>) -> Self {
        Self::new(move |_| Arc::clone(&hook))
    }
}

impl<H: ?Sized> Clone for HookFactory<H> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<H: ?Sized> fmt::Debug for HookFactory<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookFactory").finish_non_exhaustive()
    }
}

/// An immutable table of registered hook factories.
///
/// Built once when a plan is finalized and shared by every run of the plan.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: FxHashMap<(ContentType, HookKind), FactoryList>,
}

impl HookRegistry {
    /// Returns the factories registered for `content_type` and `kind`, in
    /// registration order.
    ///
    /// Entries registered under a different hook trait are ignored.
    #[must_use]
    pub fn factories<H: ?Sized + 'static>(
        &self,
        content_type: ContentType,
        kind: HookKind,
    ) -> Vec<HookFactory<H>> {
        self.hooks
            .get(&(content_type, kind))
            .map(|list| {
                list.iter()
                    .filter_map(|f| f.downcast_ref::<HookFactory<H>>().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of factories registered for `content_type` and `kind`.
    #[must_use]
    pub fn count(&self, content_type: ContentType, kind: HookKind) -> usize {
        self.hooks.get(&(content_type, kind)).map_or(0, SmallVec::len)
    }

    /// Returns `true` if no hooks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(SmallVec::is_empty)
    }

    /// Combines two registries. Hooks of `other` run after hooks of `self`.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (key, list) in other.hooks {
            self.hooks.entry(key).or_default().extend(list);
        }
        self
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .hooks
            .iter()
            .map(|((content_type, kind), list)| (*content_type, *kind, list.len()))
            .collect();
        counts.sort_unstable_by_key(|(t, k, _)| (t.order_index(), *k));
        f.debug_struct("HookRegistry").field("hooks", &counts).finish()
    }
}

/// Accumulates factories of one hook kind.
///
/// Wrapped by the typed builders ([`FilterBuilder`](super::FilterBuilder),
/// [`MappingBuilder`](super::MappingBuilder),
/// [`TransformerBuilder`](super::TransformerBuilder),
/// [`BatchCompletedBuilder`](super::BatchCompletedBuilder)).
#[derive(Clone)]
pub(crate) struct HookTable {
    kind: HookKind,
    hooks: FxHashMap<ContentType, FactoryList>,
}

impl HookTable {
    pub(crate) fn new(kind: HookKind) -> Self {
        Self {
            kind,
            hooks: fx_hash_map(),
        }
    }

    pub(crate) fn push<H: ?Sized + 'static>(
        &mut self,
        content_type: ContentType,
        factory: HookFactory<H>,
    ) {
        self.hooks
            .entry(content_type)
            .or_default()
            .push(Arc::new(factory));
    }

    pub(crate) fn clear(&mut self) {
        self.hooks.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.values().map(SmallVec::len).sum()
    }

    pub(crate) fn build(&self) -> HookRegistry {
        HookRegistry {
            hooks: self
                .hooks
                .iter()
                .map(|(content_type, list)| ((*content_type, self.kind), list.clone()))
                .collect(),
        }
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTable")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}

/// Visits every content item type of a [`ContentItemSet`].
pub trait ContentTypeVisitor {
    /// Called once per item type, in list order.
    fn visit<T: ContentItem>(&mut self);
}

/// A compile-time list of content item types.
///
/// Implemented for tuples of up to eight [`ContentItem`] types, so a generic
/// hook can be registered for several types in one call:
///
/// ```ignore
/// builder.add_generic::<(User, Group, Project), _>(LocationPrefixMapping::new(from, to));
/// ```
pub trait ContentItemSet {
    /// Calls `visitor` for every type in the set.
    fn visit<V: ContentTypeVisitor>(visitor: &mut V);

    /// The content types in the set.
    fn content_types() -> Vec<ContentType> {
        struct Collect(Vec<ContentType>);
        impl ContentTypeVisitor for Collect {
            fn visit<T: ContentItem>(&mut self) {
                self.0.push(T::CONTENT_TYPE);
            }
        }
        let mut collect = Collect(Vec::new());
        Self::visit(&mut collect);
        collect.0
    }
}

macro_rules! impl_content_item_set {
    ($($name:ident),+) => {
        impl<$($name: ContentItem),+> ContentItemSet for ($($name,)+) {
            fn visit<V: ContentTypeVisitor>(visitor: &mut V) {
                $(visitor.visit::<$name>();)+
            }
        }
    };
}

impl_content_item_set!(A);
impl_content_item_set!(A, B);
impl_content_item_set!(A, B, C);
impl_content_item_set!(A, B, C, D);
impl_content_item_set!(A, B, C, D, E);
impl_content_item_set!(A, B, C, D, E, F);
impl_content_item_set!(A, B, C, D, E, F, G);
impl_content_item_set!(A, B, C, D, E, F, G, H);

/// Registers one generic definition for every type a visitor sees.
///
/// `R` turns the shared definition into a typed factory for one item type.
pub(crate) struct GenericRegistrar<'a, G, R> {
    pub(crate) table: &'a mut HookTable,
    pub(crate) definition: Arc<G>,
    pub(crate) register: R,
}

/// Produces and stores the typed factory of one item type.
pub(crate) trait RegisterGeneric<G> {
    fn register<T: ContentItem>(&self, table: &mut HookTable, definition: &Arc<G>);
}

impl<G, R: RegisterGeneric<G>> ContentTypeVisitor for GenericRegistrar<'_, G, R> {
    fn visit<T: ContentItem>(&mut self) {
        self.register.register::<T>(self.table, &self.definition);
    }
}
