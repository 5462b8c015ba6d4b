//! Breadth-first re-ordering of hierarchical content.
//!
//! Nested content (projects inside projects) must be created parents-first
//! on the destination, but sources list it in whatever order they like.
//! [`HierarchyPager`] wraps a flat pager and buffers items by location depth
//! so that every item of depth `n` is emitted before any item of depth
//! `n + 1`.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{PagedResult, Pager};
use crate::content::ContentItem;

/// Re-orders a flat pager into breadth-first order.
///
/// While the inner pager still has pages, only top-level items are emitted;
/// deeper items are buffered. Once the inner pager is exhausted the buffer
/// is drained shallowest depth first. Pages keep the requested size except
/// for the last one.
///
/// A failed inner page is returned unchanged.
pub struct HierarchyPager<T> {
    inner: Box<dyn Pager<T>>,
    page_size: usize,
    buffer: BTreeMap<usize, VecDeque<T>>,
    buffered: usize,
    inner_done: bool,
    total_count: usize,
    page_number: usize,
}

impl<T: ContentItem> HierarchyPager<T> {
    /// Wraps `inner`, emitting `page_size` items per page.
    #[must_use]
    pub fn new(inner: Box<dyn Pager<T>>, page_size: usize) -> Self {
        Self {
            inner,
            page_size: page_size.max(1),
            buffer: BTreeMap::new(),
            buffered: 0,
            inner_done: false,
            total_count: 0,
            page_number: 0,
        }
    }

    fn top_level_buffered(&self) -> usize {
        self.buffer.get(&0).map_or(0, VecDeque::len)
    }

    fn take(&mut self, count: usize, top_level_only: bool) -> Vec<T> {
        let mut items = Vec::with_capacity(count);
        while items.len() < count {
            let Some(mut bucket) = self.buffer.first_entry() else {
                break;
            };
            if top_level_only && *bucket.key() != 0 {
                break;
            }
            let queue = bucket.get_mut();
            while items.len() < count {
                match queue.pop_front() {
                    Some(item) => items.push(item),
                    None => break,
                }
            }
            if queue.is_empty() {
                bucket.remove();
            }
        }
        self.buffered -= items.len();
        items
    }
}

#[async_trait]
impl<T: ContentItem> Pager<T> for HierarchyPager<T> {
    async fn next_page(&mut self, cancel: &CancellationToken) -> PagedResult<T> {
        while !self.inner_done && self.top_level_buffered() < self.page_size {
            let page = self.inner.next_page(cancel).await;
            if !page.success() {
                return page;
            }
            self.total_count = page.total_count;
            self.inner_done = page.fetched_all_pages || page.items.is_empty();
            for item in page.items {
                let depth = item.reference().location.depth();
                self.buffer.entry(depth).or_default().push_back(item);
                self.buffered += 1;
            }
        }

        let items = self.take(self.page_size, !self.inner_done);
        if !items.is_empty() {
            self.page_number += 1;
        }
        trace!(
            content_type = %T::CONTENT_TYPE,
            page = self.page_number,
            emitted = items.len(),
            buffered = self.buffered,
            "Emitting breadth-first page"
        );
        PagedResult::page(
            items,
            self.page_number,
            self.page_size,
            self.total_count,
            self.fetched_all_pages(),
        )
    }

    fn fetched_all_pages(&self) -> bool {
        self.inner_done && self.buffered == 0
    }
}
