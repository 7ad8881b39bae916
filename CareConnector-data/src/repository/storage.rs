use async_trait::async_trait;

use super::errors::RepositoryError;
use super::expression::Condition;
use crate::models::item::{BatchGetPage, Document, ItemKey, Page, QueryRequest, ScanRequest};

/// Raw single-request operations against the backing table.
///
/// Implementations perform exactly one round trip per call. Metadata,
/// chunking and retries live in [`super::TableRepository`].
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Short description for logs and health details
    fn describe(&self) -> String;

    /// Write an item; a failed condition is `RepositoryError::ConditionFailed`
    async fn put_item(&self, item: Document, condition: Option<&Condition>) -> Result<(), RepositoryError>;

    async fn get_item(&self, key: &ItemKey) -> Result<Option<Document>, RepositoryError>;

    /// Apply an update and return the item as stored afterwards
    async fn update_item(
        &self,
        key: &ItemKey,
        set: &Document,
        remove: &[String],
        condition: Option<&Condition>,
    ) -> Result<Document, RepositoryError>;

    /// Delete an item, returning the previous version if there was one
    async fn delete_item(
        &self,
        key: &ItemKey,
        condition: Option<&Condition>,
    ) -> Result<Option<Document>, RepositoryError>;

    async fn query_page(
        &self,
        request: &QueryRequest,
        limit: Option<usize>,
        start_key: Option<Document>,
    ) -> Result<Page, RepositoryError>;

    async fn scan_page(
        &self,
        request: &ScanRequest,
        limit: Option<usize>,
        start_key: Option<Document>,
    ) -> Result<Page, RepositoryError>;

    /// Fetch up to 100 keys in one request
    async fn batch_get(&self, keys: &[ItemKey]) -> Result<BatchGetPage, RepositoryError>;

    /// Write up to 25 items in one request, returning the unprocessed ones
    async fn batch_put(&self, items: &[Document]) -> Result<Vec<Document>, RepositoryError>;

    /// Check that the table is reachable
    async fn ping(&self) -> Result<(), RepositoryError>;
}
