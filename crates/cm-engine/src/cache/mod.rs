//! Content reference caching.
//!
//! Hooks resolve cross-references (a workbook's project, a permission's
//! group) many times per run. [`ContentReferenceCache`] makes those lookups
//! cheap: it keeps every reference it has seen indexed by id and by location,
//! and remembers keys that are confirmed absent.
//!
//! # Population
//!
//! On a miss the cache runs its [`ReferenceSearch`], which may return any
//! number of references (a bulk listing usually returns all of them). Every
//! returned reference is written to both indices as the same [`Arc`], so a
//! reference found by id and by location is the same object. If the
//! requested key is still unresolved afterwards, an absent sentinel is
//! written for that key only. A failing search writes nothing.
//!
//! At most one search runs per cache instance. Concurrent misses for the
//! same key therefore cost one search, but misses for different keys wait
//! for each other as well.

mod destination;
mod search;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cm_core::{ContentId, ContentLocation, ContentReference, FxHashMap};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub use destination::DestinationReferenceFinder;
pub use search::PagedReferenceSearch;

use crate::error::{EngineError, EngineResult};

/// The key of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Look up by unique id.
    Id(ContentId),
    /// Look up by hierarchical location.
    Location(ContentLocation),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Location(location) => write!(f, "location '{location}'"),
        }
    }
}

/// A cached lookup outcome.
#[derive(Debug, Clone)]
enum CacheEntry {
    Found(Arc<ContentReference>),
    Absent,
}

impl CacheEntry {
    fn reference(&self) -> Option<Arc<ContentReference>> {
        match self {
            Self::Found(reference) => Some(Arc::clone(reference)),
            Self::Absent => None,
        }
    }
}

/// Resolves references on a cache miss.
#[async_trait]
pub trait ReferenceSearch: Send + Sync {
    /// Searches for `key`.
    ///
    /// May return zero, one or many references; all of them are cached.
    async fn search(
        &self,
        key: &CacheKey,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<ContentReference>>;
}

/// Looks up content references by id or location.
///
/// `Ok(None)` means the reference does not exist.
#[async_trait]
pub trait ContentReferenceFinder: Send + Sync {
    /// Finds a reference by id.
    async fn find_by_id(
        &self,
        id: ContentId,
        cancel: &CancellationToken,
    ) -> EngineResult<Option<Arc<ContentReference>>>;

    /// Finds a reference by location.
    async fn find_by_location(
        &self,
        location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> EngineResult<Option<Arc<ContentReference>>>;
}

#[derive(Debug, Default)]
struct CacheIndex {
    by_id: FxHashMap<ContentId, CacheEntry>,
    by_location: FxHashMap<ContentLocation, CacheEntry>,
}

impl CacheIndex {
    fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        match key {
            CacheKey::Id(id) => self.by_id.get(id),
            CacheKey::Location(location) => self.by_location.get(location),
        }
    }

    fn insert_absent(&mut self, key: CacheKey) {
        match key {
            CacheKey::Id(id) => self.by_id.insert(id, CacheEntry::Absent),
            CacheKey::Location(location) => self.by_location.insert(location, CacheEntry::Absent),
        };
    }

    /// Inserts `reference` into both indices, keeping an already cached
    /// object for the same id so earlier lookups stay identical.
    ///
    /// A reference that moved drops its old location key, so no location
    /// resolves to a stale copy of a cached id.
    fn insert_found(&mut self, reference: ContentReference) {
        let shared = match self.by_id.get(&reference.id) {
            Some(CacheEntry::Found(existing)) if **existing == reference => Arc::clone(existing),
            Some(CacheEntry::Found(existing)) => {
                let previous = existing.location.clone();
                if previous != reference.location {
                    let stale = matches!(
                        self.by_location.get(&previous),
                        Some(CacheEntry::Found(at)) if at.id == reference.id
                    );
                    if stale {
                        self.by_location.remove(&previous);
                    }
                }
                Arc::new(reference)
            }
            _ => Arc::new(reference),
        };
        self.by_location
            .insert(shared.location.clone(), CacheEntry::Found(Arc::clone(&shared)));
        self.by_id.insert(shared.id, CacheEntry::Found(shared));
    }
}

/// A thread-safe, single-flight cache of content references.
///
/// # Examples
///
/// ```ignore
/// let cache = ContentReferenceCache::new(PagedReferenceSearch::<Project, _>::new(source, 100));
/// let project = cache.find_by_location(&"Finance".into(), &cancel).await?;
/// ```
pub struct ContentReferenceCache<S> {
    search: S,
    index: RwLock<CacheIndex>,
    populate: Semaphore,
}

impl<S: ReferenceSearch> ContentReferenceCache<S> {
    /// Creates an empty cache backed by `search`.
    #[must_use]
    pub fn new(search: S) -> Self {
        Self {
            search,
            index: RwLock::new(CacheIndex::default()),
            populate: Semaphore::new(1),
        }
    }

    /// Number of distinct references cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index
            .read()
            .by_id
            .values()
            .filter(|e| matches!(e, CacheEntry::Found(_)))
            .count()
    }

    /// Returns `true` if no reference is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Some(..)` when `key` is cached, either found or absent.
    fn cached(&self, key: &CacheKey) -> Option<Option<Arc<ContentReference>>> {
        self.index.read().get(key).map(CacheEntry::reference)
    }

    /// Looks up `key`, searching on a miss.
    pub async fn lookup(
        &self,
        key: CacheKey,
        cancel: &CancellationToken,
    ) -> EngineResult<Option<Arc<ContentReference>>> {
        if let Some(hit) = self.cached(&key) {
            trace!(%key, found = hit.is_some(), "Reference cache hit");
            return Ok(hit);
        }

        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(EngineError::Canceled),
            permit = self.populate.acquire() => permit
                .map_err(|_| EngineError::search(&key, "reference cache is closed"))?,
        };

        // Another lookup may have populated the key while this one waited.
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let references = self.search.search(&key, cancel).await?;
        let found = references.len();

        let mut index = self.index.write();
        for reference in references {
            index.insert_found(reference);
        }
        let resolved = index.get(&key).and_then(CacheEntry::reference);
        if resolved.is_none() {
            index.insert_absent(key.clone());
        }
        drop(index);

        debug!(%key, found, resolved = resolved.is_some(), "Reference cache populated");
        Ok(resolved)
    }
}

#[async_trait]
impl<S: ReferenceSearch> ContentReferenceFinder for ContentReferenceCache<S> {
    async fn find_by_id(
        &self,
        id: ContentId,
        cancel: &CancellationToken,
    ) -> EngineResult<Option<Arc<ContentReference>>> {
        self.lookup(CacheKey::Id(id), cancel).await
    }

    async fn find_by_location(
        &self,
        location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> EngineResult<Option<Arc<ContentReference>>> {
        self.lookup(CacheKey::Location(location.clone()), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Returns a fixed set of references after a short delay, counting calls.
    struct CountingSearch {
        references: Vec<ContentReference>,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingSearch {
        fn new(references: Vec<ContentReference>) -> Self {
            Self {
                references,
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ReferenceSearch for CountingSearch {
        async fn search(
            &self,
            key: &CacheKey,
            _cancel: &CancellationToken,
        ) -> EngineResult<Vec<ContentReference>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(EngineError::search(key, "HTTP 500"));
            }
            Ok(self.references.clone())
        }
    }

    /// Answers each search with the next scripted response, then with an
    /// empty listing once the script runs out.
    struct ScriptedSearch {
        responses: parking_lot::Mutex<std::collections::VecDeque<EngineResult<Vec<ContentReference>>>>,
    }

    impl ScriptedSearch {
        fn new(responses: Vec<EngineResult<Vec<ContentReference>>>) -> Self {
            Self {
                responses: parking_lot::Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl ReferenceSearch for ScriptedSearch {
        async fn search(
            &self,
            _key: &CacheKey,
            _cancel: &CancellationToken,
        ) -> EngineResult<Vec<ContentReference>> {
            self.responses.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn reference(path: &str) -> ContentReference {
        ContentReference::from_location(ContentId::random(), ContentLocation::from_path(path))
    }

    #[tokio::test]
    async fn test_id_and_location_return_same_object() {
        let finance = reference("Finance");
        let cache = ContentReferenceCache::new(CountingSearch::new(vec![finance.clone()]));
        let cancel = CancellationToken::new();

        let by_id = cache.find_by_id(finance.id, &cancel).await.unwrap().unwrap();
        let by_location = cache
            .find_by_location(&finance.location, &cancel)
            .await
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(&by_id, &by_location));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_search_once() {
        let finance = reference("Finance");
        let search = CountingSearch::new(vec![finance.clone()]);
        let calls = Arc::clone(&search.calls);
        let cache = Arc::new(ContentReferenceCache::new(search));

        let lookups: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let location = finance.location.clone();
                tokio::spawn(async move {
                    cache
                        .find_by_location(&location, &CancellationToken::new())
                        .await
                })
            })
            .collect();

        for lookup in lookups {
            assert!(lookup.await.unwrap().unwrap().is_some());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_absent_key_is_cached() {
        let search = CountingSearch::new(vec![reference("Finance")]);
        let calls = Arc::clone(&search.calls);
        let cache = ContentReferenceCache::new(search);
        let cancel = CancellationToken::new();
        let missing = ContentLocation::from_path("Marketing");

        assert!(cache.find_by_location(&missing, &cancel).await.unwrap().is_none());
        assert!(cache.find_by_location(&missing, &cancel).await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The listing also resolved Finance, so no further search is needed.
        let finance = ContentLocation::from_path("Finance");
        assert!(cache.find_by_location(&finance, &cancel).await.unwrap().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_error_is_not_cached() {
        let mut search = CountingSearch::new(vec![reference("Finance")]);
        search.fail = true;
        let calls = Arc::clone(&search.calls);
        let cache = ContentReferenceCache::new(search);
        let cancel = CancellationToken::new();
        let location = ContentLocation::from_path("Finance");

        assert!(cache.find_by_location(&location, &cancel).await.is_err());
        assert!(cache.find_by_location(&location, &cancel).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_after_failed_search_resolves() {
        let finance = reference("Finance");
        let cache = ContentReferenceCache::new(ScriptedSearch::new(vec![
            Err(EngineError::search(
                &CacheKey::Location(finance.location.clone()),
                "HTTP 503",
            )),
            Ok(vec![finance.clone()]),
        ]));
        let cancel = CancellationToken::new();

        assert!(cache.find_by_location(&finance.location, &cancel).await.is_err());
        let resolved = cache
            .find_by_location(&finance.location, &cancel)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, finance.id);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_moved_reference_drops_old_location() {
        let old = reference("Old");
        let moved = ContentReference::from_location(old.id, ContentLocation::from_path("New"));
        let cache = ContentReferenceCache::new(ScriptedSearch::new(vec![
            Ok(vec![old.clone()]),
            Ok(vec![moved.clone()]),
        ]));
        let cancel = CancellationToken::new();

        assert!(cache.find_by_location(&old.location, &cancel).await.unwrap().is_some());
        // A miss on another key relists the type and sees the move.
        let other = ContentLocation::from_path("Other");
        assert!(cache.find_by_location(&other, &cancel).await.unwrap().is_none());

        let by_id = cache.find_by_id(old.id, &cancel).await.unwrap().unwrap();
        let by_new = cache
            .find_by_location(&moved.location, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.location, moved.location);
        assert!(Arc::ptr_eq(&by_id, &by_new));
        assert!(cache.find_by_location(&old.location, &cancel).await.unwrap().is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_canceled_lookup_does_not_search() {
        let search = CountingSearch::new(Vec::new());
        let calls = Arc::clone(&search.calls);
        let cache = ContentReferenceCache::new(search);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = cache.find_by_id(ContentId::random(), &cancel).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
