//! Content types, endpoints and scopes shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cm_core::{Config, ContentId, ContentLocation, ContentReference, ContentType};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::batch::{BatchMigrator, MigrationBatch};
use crate::content::{ContentItem, ContentMigrationItem};
use crate::endpoint::{Endpoint, EndpointKind};
use crate::error::EngineError;
use crate::hooks::HookRegistry;
use crate::manifest::MigrationManifest;
use crate::pager::{ContentPagerFactory, MemoryPager, PagedResult, Pager};
use crate::result::{ActionResult, BatchResult};
use crate::scope::{MigrationScope, ReferenceFinders};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUser {
    pub reference: ContentReference,
}

impl TestUser {
    pub fn named(name: &str) -> Self {
        Self {
            reference: ContentReference::from_location(
                ContentId::random(),
                ContentLocation::from_path(name),
            ),
        }
    }
}

impl ContentItem for TestUser {
    const CONTENT_TYPE: ContentType = ContentType::User;

    fn reference(&self) -> &ContentReference {
        &self.reference
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestProject {
    pub reference: ContentReference,
}

impl TestProject {
    pub fn at(path: &str) -> Self {
        Self {
            reference: ContentReference::from_location(
                ContentId::random(),
                ContentLocation::from_path(path),
            ),
        }
    }
}

impl ContentItem for TestProject {
    const CONTENT_TYPE: ContentType = ContentType::Project;

    fn reference(&self) -> &ContentReference {
        &self.reference
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestWorkbook {
    pub reference: ContentReference,
    pub content: String,
}

impl TestWorkbook {
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            reference: ContentReference::from_location(
                ContentId::random(),
                ContentLocation::from_path(name),
            ),
            content: content.to_owned(),
        }
    }

    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            reference: self.reference.clone(),
            content: content.into(),
        }
    }

    pub fn with_name(&self, name: &str) -> Self {
        let location = self.reference.location.rename(name);
        Self {
            reference: ContentReference::new(self.reference.id, location, name),
            content: self.content.clone(),
        }
    }
}

impl ContentItem for TestWorkbook {
    const CONTENT_TYPE: ContentType = ContentType::Workbook;

    fn reference(&self) -> &ContentReference {
        &self.reference
    }
}

/// A pager whose every page fails.
pub struct FailingPager {
    message: String,
}

impl FailingPager {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

#[async_trait]
impl<T: ContentItem> Pager<T> for FailingPager {
    async fn next_page(&mut self, _cancel: &CancellationToken) -> PagedResult<T> {
        let error = EngineError::page_fetch(T::CONTENT_TYPE, 1, self.message.clone());
        PagedResult::failed(1, 0, vec![error])
    }

    fn fetched_all_pages(&self) -> bool {
        false
    }
}

/// Counts `next_page` calls on the wrapped pager.
struct CountingPager<T> {
    inner: Box<dyn Pager<T>>,
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl<T: Send> Pager<T> for CountingPager<T> {
    async fn next_page(&mut self, cancel: &CancellationToken) -> PagedResult<T> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.next_page(cancel).await
    }

    fn fetched_all_pages(&self) -> bool {
        self.inner.fetched_all_pages()
    }
}

/// An in-memory site.
#[derive(Default)]
pub struct TestEndpoint {
    users: Vec<TestUser>,
    projects: Vec<TestProject>,
    page_error: Option<String>,
    init_result: Option<ActionResult>,
    fetches: Arc<AtomicUsize>,
}

impl TestEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(mut self, users: Vec<TestUser>) -> Self {
        self.users = users;
        self
    }

    pub fn with_projects(mut self, projects: Vec<TestProject>) -> Self {
        self.projects = projects;
        self
    }

    pub fn failing_pages(mut self, message: &str) -> Self {
        self.page_error = Some(message.to_owned());
        self
    }

    pub fn failing_init(mut self, kind: EndpointKind, message: &str) -> Self {
        self.init_result = Some(ActionResult::from_error(EngineError::endpoint(kind, message)));
        self
    }

    pub fn canceled_init(mut self) -> Self {
        self.init_result = Some(ActionResult::from_error(EngineError::Canceled));
        self
    }

    /// Number of pages requested across every pager of this endpoint.
    pub fn page_fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn pager_over<T: ContentItem + Clone>(&self, items: &[T], page_size: usize) -> Box<dyn Pager<T>> {
        let inner: Box<dyn Pager<T>> = match &self.page_error {
            Some(message) => Box::new(FailingPager::new(message)),
            None => Box::new(MemoryPager::new(items.to_vec(), page_size)),
        };
        Box::new(CountingPager {
            inner,
            fetches: Arc::clone(&self.fetches),
        })
    }
}

#[async_trait]
impl Endpoint for TestEndpoint {
    async fn initialize(&self, cancel: &CancellationToken) -> ActionResult {
        if cancel.is_cancelled() {
            return ActionResult::from_error(EngineError::Canceled);
        }
        self.init_result.clone().unwrap_or_default()
    }
}

impl ContentPagerFactory<TestUser> for TestEndpoint {
    fn pager(&self, page_size: usize) -> Box<dyn Pager<TestUser>> {
        self.pager_over(&self.users, page_size)
    }
}

impl ContentPagerFactory<TestProject> for TestEndpoint {
    fn pager(&self, page_size: usize) -> Box<dyn Pager<TestProject>> {
        self.pager_over(&self.projects, page_size)
    }
}

/// A batch migrator that records what it was given and migrates everything.
#[derive(Default)]
pub struct RecordingBatchMigrator {
    batches: Mutex<Vec<Vec<String>>>,
    stop_after_first: bool,
}

impl RecordingBatchMigrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_after_first_batch(mut self) -> Self {
        self.stop_after_first = true;
        self
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(Vec::len).collect()
    }

    pub fn migrated_names(&self) -> Vec<String> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl<T: ContentItem> BatchMigrator<T> for RecordingBatchMigrator {
    async fn migrate_batch(&self, batch: MigrationBatch<T>, cancel: &CancellationToken) -> BatchResult {
        if cancel.is_cancelled() {
            return BatchResult::canceled();
        }
        let names = batch
            .items
            .iter()
            .map(|item| item.source_reference().name.clone())
            .collect();
        for item in &batch.items {
            item.manifest_entry.set_migrated(ContentReference::from_location(
                ContentId::random(),
                item.manifest_entry.mapped_location(),
            ));
        }
        self.batches.lock().push(names);
        BatchResult::succeeded().with_perform_next_batch(!self.stop_after_first)
    }
}

pub fn test_scope() -> MigrationScope {
    test_scope_with(HookRegistry::default())
}

pub fn test_scope_with(hooks: HookRegistry) -> MigrationScope {
    MigrationScope::new(
        Arc::new(Config::default()),
        Arc::new(MigrationManifest::new(Uuid::new_v4())),
        Arc::new(hooks),
        ReferenceFinders::new(),
    )
}

/// Creates one user per name with an entry in the scope's manifest.
pub fn test_items(scope: &MigrationScope, names: &[&str]) -> Vec<ContentMigrationItem<TestUser>> {
    let partition = scope.manifest().partition(ContentType::User);
    names
        .iter()
        .map(|name| {
            let user = TestUser::named(name);
            let entry = partition.get_or_create(&user.reference);
            ContentMigrationItem::new(Arc::new(user), entry)
        })
        .collect()
}
