//! Paged access to source content.
//!
//! A [`Pager`] is a single-consumer, forward-only sequence of pages. Each call
//! to [`Pager::next_page`] fetches exactly one page; [`Pager::get_all_pages`]
//! drains the pager into one result.
//!
//! - [`PagedResult`] - one page of items plus paging metadata and errors
//! - [`ContentPagerFactory`] - creates pagers for one content type
//! - [`MemoryPager`] - pages over an in-memory list
//! - [`HierarchyPager`] - re-orders a flat pager parents-first

mod hierarchy;
mod memory;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use hierarchy::HierarchyPager;
pub use memory::MemoryPager;

use crate::error::EngineError;

/// One page of items.
///
/// A page with errors is a failed page; its items (usually none) are still
/// returned.
#[derive(Debug, Clone)]
pub struct PagedResult<T> {
    /// Items of the page.
    pub items: Vec<T>,

    /// 1-based page number.
    pub page_number: usize,

    /// Requested page size.
    pub page_size: usize,

    /// Total number of items across all pages, as reported by the source.
    pub total_count: usize,

    /// Whether this page was the last one.
    pub fetched_all_pages: bool,

    /// Errors of the page. Empty on success.
    pub errors: Vec<EngineError>,
}

impl<T> PagedResult<T> {
    /// Creates a successful page.
    #[must_use]
    pub const fn page(
        items: Vec<T>,
        page_number: usize,
        page_size: usize,
        total_count: usize,
        fetched_all_pages: bool,
    ) -> Self {
        Self {
            items,
            page_number,
            page_size,
            total_count,
            fetched_all_pages,
            errors: Vec::new(),
        }
    }

    /// Creates a failed page.
    #[must_use]
    pub const fn failed(page_number: usize, page_size: usize, errors: Vec<EngineError>) -> Self {
        Self {
            items: Vec::new(),
            page_number,
            page_size,
            total_count: 0,
            fetched_all_pages: false,
            errors,
        }
    }

    /// Returns `true` if the page has no errors.
    #[inline]
    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The result of draining a pager.
#[derive(Debug, Clone)]
pub struct AllPagesResult<T> {
    /// Items of every successful page, in order.
    pub items: Vec<T>,

    /// Whether every page was fetched without error.
    pub success: bool,

    /// Errors of the failed page, if any.
    pub errors: Vec<EngineError>,
}

/// A forward-only sequence of pages.
///
/// Pagers are single-consumer: `next_page` takes `&mut self`.
#[async_trait]
pub trait Pager<T: Send>: Send {
    /// Fetches the next page.
    ///
    /// After the last page has been returned, further calls return an empty
    /// page with `fetched_all_pages` set.
    async fn next_page(&mut self, cancel: &CancellationToken) -> PagedResult<T>;

    /// Returns `true` once the last page has been returned.
    fn fetched_all_pages(&self) -> bool;

    /// Fetches every remaining page.
    ///
    /// Stops at the first empty page, the last page, or a failed page. On
    /// failure the items of the pages fetched so far are still returned.
    async fn get_all_pages(&mut self, cancel: &CancellationToken) -> AllPagesResult<T> {
        let mut items = Vec::new();
        loop {
            let page = self.next_page(cancel).await;
            if !page.success() {
                return AllPagesResult {
                    items,
                    success: false,
                    errors: page.errors,
                };
            }
            if page.items.is_empty() {
                break;
            }
            let last = page.fetched_all_pages;
            items.extend(page.items);
            if last {
                break;
            }
        }
        AllPagesResult {
            items,
            success: true,
            errors: Vec::new(),
        }
    }
}

/// Creates pagers over the content of one type.
///
/// Implemented by source endpoints for every content type they can list,
/// and by destination endpoints that back a reference cache.
pub trait ContentPagerFactory<T: Send>: Send + Sync {
    /// Creates a pager that fetches `page_size` items per page.
    fn pager(&self, page_size: usize) -> Box<dyn Pager<T>>;
}
