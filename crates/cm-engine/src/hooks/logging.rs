//! Tracing decorator for hooks.
//!
//! [`Logged`] wraps any hook and implements the same hook trait, so runners can log every hook uniformly without the
//! hooks themselves knowing about logging.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::batch_completed::BatchCompletedHook;
use super::filter::ContentFilter;
use super::mapping::{ContentMapping, ContentMappingContext, MappingResult};
use super::transformer::{ContentTransformer, TransformResult};
use crate::content::{ContentItem, ContentMigrationItem};
use crate::error::EngineResult;
use crate::result::BatchResult;

/// Logs the execution of the wrapped hook.
pub struct Logged<H: ?Sized> {
    inner: Arc<H>,
}

impl<H: ?Sized> Logged<H> {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: Arc<H>) -> Self {
        Self { inner }
    }

    /// The wrapped hook.
    #[must_use]
    pub const fn inner(&self) -> &Arc<H> {
        &self.inner
    }
}

#[async_trait]
impl<T, H> ContentFilter<T> for Logged<H>
where
    T: ContentItem,
    H: ContentFilter<T> + ?Sized,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_disabled(&self) -> bool {
        self.inner.is_disabled()
    }

    async fn execute(
        &self,
        items: Vec<ContentMigrationItem<T>>,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<ContentMigrationItem<T>>> {
        let before = items.len();
        let started = Instant::now();
        let result = self.inner.execute(items, cancel).await;
        match &result {
            Ok(kept) => debug!(
                filter = self.inner.name(),
                content_type = %T::CONTENT_TYPE,
                before,
                kept = kept.len(),
                elapsed_ms = started.elapsed().as_millis(),
                "Filter executed"
            ),
            Err(e) => warn!(
                filter = self.inner.name(),
                content_type = %T::CONTENT_TYPE,
                error = %e,
                "Filter failed"
            ),
        }
        result
    }
}

#[async_trait]
impl<T, H> ContentMapping<T> for Logged<H>
where
    T: ContentItem,
    H: ContentMapping<T> + ?Sized,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn map(
        &self,
        context: &ContentMappingContext<T>,
        cancel: &CancellationToken,
    ) -> EngineResult<MappingResult<T>> {
        let result = self.inner.map(context, cancel).await;
        match &result {
            Ok(MappingResult::Replaced(next)) => trace!(
                mapping = self.inner.name(),
                item = %context.content_item.reference(),
                from = %context.mapped_location,
                to = %next.mapped_location,
                "Mapping replaced location"
            ),
            Ok(MappingResult::Unchanged) => {}
            Err(e) => warn!(
                mapping = self.inner.name(),
                item = %context.content_item.reference(),
                error = %e,
                "Mapping failed"
            ),
        }
        result
    }
}

#[async_trait]
impl<T, H> ContentTransformer<T> for Logged<H>
where
    T: ContentItem,
    H: ContentTransformer<T> + ?Sized,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn transform(
        &self,
        item: &T,
        cancel: &CancellationToken,
    ) -> EngineResult<TransformResult<T>> {
        let started = Instant::now();
        let result = self.inner.transform(item, cancel).await;
        match &result {
            Ok(outcome) => trace!(
                transformer = self.inner.name(),
                item = %item.reference(),
                replaced = matches!(outcome, TransformResult::Replaced(_)),
                elapsed_ms = started.elapsed().as_millis(),
                "Transformer executed"
            ),
            Err(e) => warn!(
                transformer = self.inner.name(),
                item = %item.reference(),
                error = %e,
                "Transformer failed"
            ),
        }
        result
    }
}

#[async_trait]
impl<T, H> BatchCompletedHook<T> for Logged<H>
where
    T: ContentItem,
    H: BatchCompletedHook<T> + ?Sized,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(
        &self,
        items: &[ContentMigrationItem<T>],
        result: BatchResult,
        cancel: &CancellationToken,
    ) -> EngineResult<BatchResult> {
        let result = self.inner.execute(items, result, cancel).await;
        match &result {
            Ok(adjusted) => debug!(
                hook = self.inner.name(),
                content_type = %T::CONTENT_TYPE,
                items = items.len(),
                success = adjusted.success,
                perform_next_batch = adjusted.perform_next_batch,
                "Batch completed hook executed"
            ),
            Err(e) => warn!(
                hook = self.inner.name(),
                content_type = %T::CONTENT_TYPE,
                error = %e,
                "Batch completed hook failed"
            ),
        }
        result
    }
}
