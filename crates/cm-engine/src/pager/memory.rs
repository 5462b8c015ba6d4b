//! A pager over an in-memory list.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{PagedResult, Pager};
use crate::error::EngineError;

/// Pages over items already held in memory.
///
/// Used to re-page buffered content and by endpoints whose listing is a
/// single request. A canceled token fails the next page.
///
/// # Examples
///
/// ```
/// use cm_engine::{MemoryPager, Pager};
/// use tokio_util::sync::CancellationToken;
///
/// # tokio_test_block_on(async {
/// let mut pager = MemoryPager::new(vec![1, 2, 3], 2);
/// let cancel = CancellationToken::new();
///
/// let first = pager.next_page(&cancel).await;
/// assert_eq!(first.items, vec![1, 2]);
/// assert_eq!(first.total_count, 3);
///
/// let second = pager.next_page(&cancel).await;
/// assert_eq!(second.items, vec![3]);
/// assert!(second.fetched_all_pages);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryPager<T> {
    items: VecDeque<T>,
    page_size: usize,
    total_count: usize,
    page_number: usize,
}

impl<T> MemoryPager<T> {
    /// Creates a pager returning `page_size` items per page.
    ///
    /// A page size of zero is treated as one.
    #[must_use]
    pub fn new(items: Vec<T>, page_size: usize) -> Self {
        Self {
            total_count: items.len(),
            items: items.into(),
            page_size: page_size.max(1),
            page_number: 0,
        }
    }
}

#[async_trait]
impl<T: Send> Pager<T> for MemoryPager<T> {
    async fn next_page(&mut self, cancel: &CancellationToken) -> PagedResult<T> {
        if cancel.is_cancelled() {
            return PagedResult::failed(
                self.page_number + 1,
                self.page_size,
                vec![EngineError::Canceled],
            );
        }
        if self.items.is_empty() {
            return PagedResult::page(
                Vec::new(),
                self.page_number,
                self.page_size,
                self.total_count,
                true,
            );
        }

        self.page_number += 1;
        let take = self.page_size.min(self.items.len());
        let items: Vec<T> = self.items.drain(..take).collect();
        PagedResult::page(
            items,
            self.page_number,
            self.page_size,
            self.total_count,
            self.items.is_empty(),
        )
    }

    fn fetched_all_pages(&self) -> bool {
        self.items.is_empty()
    }
}
