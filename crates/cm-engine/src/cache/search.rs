//! Bulk reference search through a pager.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use cm_core::ContentReference;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CacheKey, ReferenceSearch};
use crate::content::ContentItem;
use crate::error::{EngineError, EngineResult};
use crate::pager::ContentPagerFactory;

/// Resolves any key by listing every item of one content type.
///
/// One listing answers every later lookup of the cache it backs, which is
/// far cheaper than searching per key on sites with many cross-references.
pub struct PagedReferenceSearch<T, P: ?Sized> {
    pagers: Arc<P>,
    page_size: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T, P> PagedReferenceSearch<T, P>
where
    T: ContentItem,
    P: ContentPagerFactory<T> + ?Sized,
{
    /// Lists items through `pagers`, `page_size` at a time.
    #[must_use]
    pub fn new(pagers: Arc<P>, page_size: usize) -> Self {
        Self {
            pagers,
            page_size,
            _item: PhantomData,
        }
    }
}

#[async_trait]
impl<T, P> ReferenceSearch for PagedReferenceSearch<T, P>
where
    T: ContentItem,
    P: ContentPagerFactory<T> + ?Sized + 'static,
{
    async fn search(
        &self,
        key: &CacheKey,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<ContentReference>> {
        let mut pager = self.pagers.pager(self.page_size);
        let listing = pager.get_all_pages(cancel).await;
        if !listing.success {
            if listing.errors.iter().all(EngineError::is_cancellation) {
                return Err(EngineError::Canceled);
            }
            let message = listing
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(EngineError::search(key, message));
        }

        debug!(
            content_type = %T::CONTENT_TYPE,
            %key,
            count = listing.items.len(),
            "Listed references"
        );
        Ok(listing
            .items
            .iter()
            .map(|item| item.reference().clone())
            .collect())
    }
}
