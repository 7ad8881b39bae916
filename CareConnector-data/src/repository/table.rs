use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::RepositoryError;
use super::expression::Condition;
use super::in_memory::InMemoryStorage;
use super::storage::StorageBackend;
use crate::models::item::{
    timestamp_now, BatchWriteOutcome, Document, ItemKey, ItemUpdate, QueryRequest, ScanRequest,
    CREATED_AT, ITEM_ID, PARTITION_KEY, SORT_KEY, UPDATED_AT,
};

/// Maximum keys per BatchGetItem request
pub const BATCH_GET_LIMIT: usize = 100;
/// Maximum put requests per BatchWriteItem request
pub const BATCH_WRITE_LIMIT: usize = 25;

/// Generic operations over the single table
#[async_trait]
pub trait TableRepositoryTrait: Send + Sync + std::fmt::Debug {
    /// Create an item that must not exist yet; returns the stored item
    async fn create_item(&self, item: Document) -> Result<Document, RepositoryError>;

    /// Get an item by key
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Document>, RepositoryError>;

    /// Update an item and return all of its attributes afterwards
    async fn update_item(&self, key: &ItemKey, update: ItemUpdate) -> Result<Document, RepositoryError>;

    /// Delete an item; false when nothing was deleted
    async fn delete_item(&self, key: &ItemKey, condition: Option<Condition>) -> Result<bool, RepositoryError>;

    /// Query the table or an index
    async fn query_items(&self, request: QueryRequest) -> Result<Vec<Document>, RepositoryError>;

    /// Scan the table or an index
    async fn scan_items(&self, request: ScanRequest) -> Result<Vec<Document>, RepositoryError>;

    /// Get many items by key
    async fn batch_get_items(&self, keys: &[ItemKey]) -> Result<Vec<Document>, RepositoryError>;

    /// Put many items
    async fn batch_write_items(&self, items: Vec<Document>) -> Result<BatchWriteOutcome, RepositoryError>;

    /// Check that the table is reachable
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Table repository with item metadata, batch chunking and retries
#[derive(Debug, Clone)]
pub struct TableRepository {
    storage: Arc<dyn StorageBackend>,
    max_batch_retries: u32,
    retry_base_delay: Duration,
}

impl TableRepository {
    /// Create a repository over a storage backend
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            max_batch_retries: crate::database::DEFAULT_BATCH_RETRIES,
            retry_base_delay: Duration::from_millis(50),
        }
    }

    /// Create a repository over a fresh in-memory table
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStorage::new()))
    }

    pub fn with_batch_retries(mut self, retries: u32) -> Self {
        self.max_batch_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Backend description for logs
    pub fn describe(&self) -> String {
        self.storage.describe()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(10)))
    }

    fn reject_key_changes(update: &ItemUpdate) -> Result<(), RepositoryError> {
        let touches_key = [PARTITION_KEY, SORT_KEY].iter().any(|key| {
            update.set.contains_key(*key) || update.remove.iter().any(|name| name == key)
        });
        if touches_key {
            return Err(RepositoryError::Validation(
                "Key attributes PK and SK cannot be updated".to_string(),
            ));
        }
        Ok(())
    }
}

/// A zero limit means no limit
fn item_limit(limit: Option<usize>) -> Option<usize> {
    limit.filter(|&limit| limit > 0)
}

#[async_trait]
impl TableRepositoryTrait for TableRepository {
    async fn create_item(&self, mut item: Document) -> Result<Document, RepositoryError> {
        let key = ItemKey::from_document(&item)?;
        let now = timestamp_now();
        item.insert(CREATED_AT.to_string(), Value::String(now.clone()));
        item.insert(UPDATED_AT.to_string(), Value::String(now));
        item.insert(ITEM_ID.to_string(), Value::String(Uuid::new_v4().to_string()));

        match self.storage.put_item(item.clone(), Some(&Condition::item_absent())).await {
            Ok(()) => {
                info!("Created item {}", key);
                Ok(item)
            }
            Err(RepositoryError::ConditionFailed) => Err(RepositoryError::AlreadyExists {
                pk: key.pk,
                sk: key.sk,
            }),
            Err(e) => Err(e),
        }
    }

    async fn get_item(&self, key: &ItemKey) -> Result<Option<Document>, RepositoryError> {
        let item = self.storage.get_item(key).await?;
        if item.is_none() {
            debug!("Item not found: {}", key);
        }
        Ok(item)
    }

    async fn update_item(&self, key: &ItemKey, update: ItemUpdate) -> Result<Document, RepositoryError> {
        Self::reject_key_changes(&update)?;

        let ItemUpdate {
            mut set,
            mut remove,
            condition,
        } = update;
        set.insert(UPDATED_AT.to_string(), Value::String(timestamp_now()));
        remove.retain(|name| !set.contains_key(name));

        match self
            .storage
            .update_item(key, &set, &remove, condition.as_ref())
            .await
        {
            Ok(item) => {
                info!("Updated item {}", key);
                Ok(item)
            }
            Err(RepositoryError::ConditionFailed)
                if condition.as_ref().map_or(false, Condition::requires_existing_item) =>
            {
                match self.storage.get_item(key).await? {
                    None => Err(RepositoryError::NotFound {
                        pk: key.pk.clone(),
                        sk: key.sk.clone(),
                    }),
                    Some(_) => Err(RepositoryError::ConditionFailed),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_item(&self, key: &ItemKey, condition: Option<Condition>) -> Result<bool, RepositoryError> {
        match self.storage.delete_item(key, condition.as_ref()).await {
            Ok(Some(_)) => {
                info!("Deleted item {}", key);
                Ok(true)
            }
            Ok(None) => {
                debug!("Item to delete not found: {}", key);
                Ok(false)
            }
            Err(RepositoryError::ConditionFailed) => {
                warn!("Conditional delete rejected for {}", key);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn query_items(&self, request: QueryRequest) -> Result<Vec<Document>, RepositoryError> {
        let limit = item_limit(request.limit);
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let remaining = limit.map(|limit| limit.saturating_sub(items.len()));
            let page = self.storage.query_page(&request, remaining, start_key.take()).await?;
            items.extend(page.items);

            let satisfied = limit.map_or(false, |limit| items.len() >= limit);
            match page.last_evaluated_key {
                Some(last) if !satisfied => start_key = Some(last),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        debug!("Query on {} returned {} items", request.pk, items.len());
        Ok(items)
    }

    async fn scan_items(&self, request: ScanRequest) -> Result<Vec<Document>, RepositoryError> {
        let limit = item_limit(request.limit);
        let mut items = Vec::new();
        let mut start_key = None;

        loop {
            let remaining = limit.map(|limit| limit.saturating_sub(items.len()));
            let page = self.storage.scan_page(&request, remaining, start_key.take()).await?;
            items.extend(page.items);

            let satisfied = limit.map_or(false, |limit| items.len() >= limit);
            match page.last_evaluated_key {
                Some(last) if !satisfied => start_key = Some(last),
                _ => break,
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn batch_get_items(&self, keys: &[ItemKey]) -> Result<Vec<Document>, RepositoryError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let unique: Vec<ItemKey> = keys.iter().filter(|key| seen.insert(*key)).cloned().collect();

        let mut items = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(BATCH_GET_LIMIT) {
            let mut pending = chunk.to_vec();
            let mut attempt = 0;

            loop {
                let page = self.storage.batch_get(&pending).await?;
                items.extend(page.items);

                if page.unprocessed.is_empty() {
                    break;
                }
                if attempt >= self.max_batch_retries {
                    warn!("{} keys still unprocessed after {} retries", page.unprocessed.len(), attempt);
                    return Err(RepositoryError::BatchIncomplete(page.unprocessed.len()));
                }

                debug!("Retrying {} unprocessed keys", page.unprocessed.len());
                tokio::time::sleep(self.backoff(attempt)).await;
                attempt += 1;
                pending = page.unprocessed;
            }
        }

        Ok(items)
    }

    async fn batch_write_items(&self, items: Vec<Document>) -> Result<BatchWriteOutcome, RepositoryError> {
        if items.is_empty() {
            return Ok(BatchWriteOutcome::default());
        }

        let now = timestamp_now();
        let prepared = items
            .into_iter()
            .map(|mut item| {
                ItemKey::from_document(&item)?;
                item.entry(CREATED_AT)
                    .or_insert_with(|| Value::String(now.clone()));
                item.entry(ITEM_ID)
                    .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
                item.insert(UPDATED_AT.to_string(), Value::String(now.clone()));
                Ok(item)
            })
            .collect::<Result<Vec<Document>, RepositoryError>>()?;

        let total = prepared.len();
        let mut unprocessed = Vec::new();

        for chunk in prepared.chunks(BATCH_WRITE_LIMIT) {
            let mut pending = chunk.to_vec();
            let mut attempt = 0;

            loop {
                let left = self.storage.batch_put(&pending).await?;
                if left.is_empty() {
                    break;
                }
                if attempt >= self.max_batch_retries {
                    warn!("{} items still unprocessed after {} retries", left.len(), attempt);
                    unprocessed.extend(left);
                    break;
                }

                debug!("Retrying {} unprocessed items", left.len());
                tokio::time::sleep(self.backoff(attempt)).await;
                attempt += 1;
                pending = left;
            }
        }

        info!("Batch write finished: {} of {} items written", total - unprocessed.len(), total);
        Ok(BatchWriteOutcome {
            processed: total - unprocessed.len(),
            unprocessed,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.storage.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{BatchGetPage, Page};
    use crate::repository::expression::SortKeyCondition;
    use serde_json::json;
    use std::sync::Mutex;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    fn repo() -> TableRepository {
        TableRepository::in_memory().with_retry_delay(Duration::from_millis(1))
    }

    /// Storage that holds back the last item of every batch request a
    /// configurable number of times, and records batch sizes.
    #[derive(Debug)]
    struct ThrottledStorage {
        inner: InMemoryStorage,
        refusals: Mutex<u32>,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl ThrottledStorage {
        fn new(refusals: u32) -> Self {
            Self {
                inner: InMemoryStorage::new(),
                refusals: Mutex::new(refusals),
                batch_sizes: Mutex::new(Vec::new()),
            }
        }

        fn refuse(&self) -> bool {
            let mut refusals = self.refusals.lock().unwrap();
            if *refusals > 0 {
                *refusals -= 1;
                true
            } else {
                false
            }
        }
    }

    #[async_trait]
    impl StorageBackend for ThrottledStorage {
        fn describe(&self) -> String {
            "throttled".to_string()
        }
        async fn put_item(&self, item: Document, condition: Option<&Condition>) -> Result<(), RepositoryError> {
            self.inner.put_item(item, condition).await
        }
        async fn get_item(&self, key: &ItemKey) -> Result<Option<Document>, RepositoryError> {
            self.inner.get_item(key).await
        }
        async fn update_item(
            &self,
            key: &ItemKey,
            set: &Document,
            remove: &[String],
            condition: Option<&Condition>,
        ) -> Result<Document, RepositoryError> {
            self.inner.update_item(key, set, remove, condition).await
        }
        async fn delete_item(
            &self,
            key: &ItemKey,
            condition: Option<&Condition>,
        ) -> Result<Option<Document>, RepositoryError> {
            self.inner.delete_item(key, condition).await
        }
        async fn query_page(
            &self,
            request: &QueryRequest,
            limit: Option<usize>,
            start_key: Option<Document>,
        ) -> Result<Page, RepositoryError> {
            self.inner.query_page(request, limit, start_key).await
        }
        async fn scan_page(
            &self,
            request: &ScanRequest,
            limit: Option<usize>,
            start_key: Option<Document>,
        ) -> Result<Page, RepositoryError> {
            self.inner.scan_page(request, limit, start_key).await
        }
        async fn batch_get(&self, keys: &[ItemKey]) -> Result<BatchGetPage, RepositoryError> {
            self.batch_sizes.lock().unwrap().push(keys.len());
            if keys.len() > 1 && self.refuse() {
                let (served, held) = keys.split_at(keys.len() - 1);
                let mut page = self.inner.batch_get(served).await?;
                page.unprocessed = held.to_vec();
                return Ok(page);
            }
            self.inner.batch_get(keys).await
        }
        async fn batch_put(&self, items: &[Document]) -> Result<Vec<Document>, RepositoryError> {
            self.batch_sizes.lock().unwrap().push(items.len());
            if self.refuse() {
                let (written, held) = items.split_at(items.len() - 1);
                self.inner.batch_put(written).await?;
                return Ok(held.to_vec());
            }
            self.inner.batch_put(items).await
        }
        async fn ping(&self) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    /// Storage serving a fixed item list in pages of `page_size`, resuming
    /// after the `SK` of the start key. Records the limit and start key of
    /// every page request.
    #[derive(Debug)]
    struct PagedStorage {
        items: Vec<Document>,
        page_size: usize,
        honor_limit: bool,
        requests: Mutex<Vec<(Option<usize>, Option<Document>)>>,
    }

    impl PagedStorage {
        fn new(count: usize, page_size: usize) -> Self {
            Self {
                items: (0..count)
                    .map(|i| doc(json!({"PK": "PATIENT#1", "SK": format!("RECORD#{i:02}")})))
                    .collect(),
                page_size,
                honor_limit: true,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn ignoring_limit(mut self) -> Self {
            self.honor_limit = false;
            self
        }

        fn page(&self, limit: Option<usize>, start_key: Option<Document>) -> Page {
            self.requests.lock().unwrap().push((limit, start_key.clone()));

            let start = match start_key {
                Some(key) => self.items.iter().position(|item| item["SK"] == key["SK"]).unwrap() + 1,
                None => 0,
            };
            let mut size = self.page_size;
            if self.honor_limit {
                size = limit.map_or(size, |limit| size.min(limit));
            }
            let end = (start + size).min(self.items.len());
            let items = self.items[start..end].to_vec();
            let last_evaluated_key = (end < self.items.len())
                .then(|| ItemKey::from_document(&items[items.len() - 1]).unwrap().to_document());

            Page {
                items,
                last_evaluated_key,
            }
        }

        fn requests(&self) -> Vec<(Option<usize>, Option<String>)> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(limit, key)| {
                    let sk = key.as_ref().map(|key| key["SK"].as_str().unwrap().to_string());
                    (*limit, sk)
                })
                .collect()
        }
    }

    #[async_trait]
    impl StorageBackend for PagedStorage {
        fn describe(&self) -> String {
            "paged".to_string()
        }
        async fn put_item(&self, _item: Document, _condition: Option<&Condition>) -> Result<(), RepositoryError> {
            unimplemented!()
        }
        async fn get_item(&self, _key: &ItemKey) -> Result<Option<Document>, RepositoryError> {
            unimplemented!()
        }
        async fn update_item(
            &self,
            _key: &ItemKey,
            _set: &Document,
            _remove: &[String],
            _condition: Option<&Condition>,
        ) -> Result<Document, RepositoryError> {
            unimplemented!()
        }
        async fn delete_item(
            &self,
            _key: &ItemKey,
            _condition: Option<&Condition>,
        ) -> Result<Option<Document>, RepositoryError> {
            unimplemented!()
        }
        async fn query_page(
            &self,
            _request: &QueryRequest,
            limit: Option<usize>,
            start_key: Option<Document>,
        ) -> Result<Page, RepositoryError> {
            Ok(self.page(limit, start_key))
        }
        async fn scan_page(
            &self,
            _request: &ScanRequest,
            limit: Option<usize>,
            start_key: Option<Document>,
        ) -> Result<Page, RepositoryError> {
            Ok(self.page(limit, start_key))
        }
        async fn batch_get(&self, _keys: &[ItemKey]) -> Result<BatchGetPage, RepositoryError> {
            unimplemented!()
        }
        async fn batch_put(&self, _items: &[Document]) -> Result<Vec<Document>, RepositoryError> {
            unimplemented!()
        }
        async fn ping(&self) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    fn sort_keys(items: &[Document]) -> Vec<String> {
        items.iter().map(|item| item["SK"].as_str().unwrap().to_string()).collect()
    }

    #[tokio::test]
    async fn test_query_follows_pages_until_exhausted() {
        let storage = Arc::new(PagedStorage::new(7, 3));
        let repo = TableRepository::new(storage.clone());

        let items = repo.query_items(QueryRequest::new("PATIENT#1")).await.unwrap();

        assert_eq!(items.len(), 7);
        assert_eq!(sort_keys(&items)[6], "RECORD#06");
        assert_eq!(
            storage.requests(),
            vec![
                (None, None),
                (None, Some("RECORD#02".to_string())),
                (None, Some("RECORD#05".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_query_stops_paging_at_limit() {
        let storage = Arc::new(PagedStorage::new(7, 3));
        let repo = TableRepository::new(storage.clone());

        let items = repo
            .query_items(QueryRequest::new("PATIENT#1").with_limit(Some(5)))
            .await
            .unwrap();

        assert_eq!(
            sort_keys(&items),
            vec!["RECORD#00", "RECORD#01", "RECORD#02", "RECORD#03", "RECORD#04"]
        );
        assert_eq!(
            storage.requests(),
            vec![(Some(5), None), (Some(2), Some("RECORD#02".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_query_zero_limit_means_unlimited() {
        let storage = Arc::new(PagedStorage::new(4, 10));
        let repo = TableRepository::new(storage.clone());

        let items = repo
            .query_items(QueryRequest::new("PATIENT#1").with_limit(Some(0)))
            .await
            .unwrap();

        assert_eq!(items.len(), 4);
        assert_eq!(storage.requests(), vec![(None, None)]);
    }

    #[tokio::test]
    async fn test_scan_follows_pages_and_truncates_to_limit() {
        let storage = Arc::new(PagedStorage::new(8, 3).ignoring_limit());
        let repo = TableRepository::new(storage.clone());

        let items = repo
            .scan_items(ScanRequest {
                limit: Some(5),
                ..ScanRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(sort_keys(&items).last().map(String::as_str), Some("RECORD#04"));
        assert_eq!(items.len(), 5);
        assert_eq!(
            storage.requests(),
            vec![(Some(5), None), (Some(2), Some("RECORD#02".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_scan_follows_pages_until_exhausted() {
        let storage = Arc::new(PagedStorage::new(5, 2));
        let repo = TableRepository::new(storage.clone());

        let items = repo
            .scan_items(ScanRequest {
                limit: Some(0),
                ..ScanRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(storage.requests().len(), 3);
        assert_eq!(storage.requests()[2], (None, Some("RECORD#03".to_string())));
    }

    #[tokio::test]
    async fn test_create_adds_metadata() {
        let repo = repo();
        let item = repo
            .create_item(doc(json!({"PK": "PATIENT#1", "SK": "PROFILE", "name": "Ada"})))
            .await
            .unwrap();

        assert!(item.contains_key("CreatedAt"));
        assert_eq!(item.get("CreatedAt"), item.get("UpdatedAt"));
        assert!(Uuid::parse_str(item["ItemId"].as_str().unwrap()).is_ok());

        let stored = repo.get_item(&ItemKey::new("PATIENT#1", "PROFILE")).await.unwrap();
        assert_eq!(stored, Some(item));
    }

    #[tokio::test]
    async fn test_create_rejects_existing_item() {
        let repo = repo();
        let item = doc(json!({"PK": "PATIENT#1", "SK": "PROFILE"}));
        repo.create_item(item.clone()).await.unwrap();

        let err = repo.create_item(item).await.unwrap_err();
        assert_eq!(err.to_string(), "Item with PK: PATIENT#1, SK: PROFILE already exists");
    }

    #[tokio::test]
    async fn test_create_requires_keys() {
        let err = repo().create_item(doc(json!({"Name": "Test"}))).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_returns_all_new() {
        let repo = repo();
        let key = ItemKey::new("PATIENT#1", "PROFILE");
        let created = repo
            .create_item(doc(json!({"PK": "PATIENT#1", "SK": "PROFILE", "a": 1, "b": 2})))
            .await
            .unwrap();

        let updated = repo
            .update_item(&key, ItemUpdate::default().set("a", 10).remove("b"))
            .await
            .unwrap();

        assert_eq!(updated["a"], json!(10));
        assert!(!updated.contains_key("b"));
        assert_eq!(updated["CreatedAt"], created["CreatedAt"]);
        assert!(updated["UpdatedAt"].as_str() >= created["UpdatedAt"].as_str());
    }

    #[tokio::test]
    async fn test_update_missing_item_with_existence_check() {
        let repo = repo();
        let key = ItemKey::new("PATIENT#404", "PROFILE");
        let err = repo
            .update_item(&key, ItemUpdate::default().set("a", 1).with_condition(Condition::item_exists()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_rejects_key_changes() {
        let repo = repo();
        let key = ItemKey::new("PATIENT#1", "PROFILE");
        let err = repo
            .update_item(&key, ItemUpdate::default().set("PK", "PATIENT#2"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let repo = repo();
        let key = ItemKey::new("PATIENT#1", "PROFILE");
        repo.create_item(key.to_document()).await.unwrap();

        let guarded = repo
            .delete_item(&key, Some(Condition::Equals("EntityType".into(), json!("Patient"))))
            .await
            .unwrap();
        assert!(!guarded);

        assert!(repo.delete_item(&key, None).await.unwrap());
        assert!(!repo.delete_item(&key, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_query_with_limit_and_order() {
        let repo = repo();
        for ts in ["2024-01-01", "2024-03-01", "2024-02-01"] {
            let sk = format!("RECORD#{ts}#x");
            repo.create_item(doc(json!({"PK": "PATIENT#1", "SK": sk}))).await.unwrap();
        }

        let records = repo
            .query_items(
                QueryRequest::new("PATIENT#1")
                    .with_sort_key(SortKeyCondition::BeginsWith("RECORD#".into()))
                    .descending()
                    .with_limit(Some(2)),
            )
            .await
            .unwrap();

        let sks: Vec<_> = records.iter().map(|r| r["SK"].as_str().unwrap().to_string()).collect();
        assert_eq!(sks, vec!["RECORD#2024-03-01#x", "RECORD#2024-02-01#x"]);
    }

    #[tokio::test]
    async fn test_scan_with_filter() {
        let repo = repo();
        repo.create_item(doc(json!({"PK": "A", "SK": "1", "EntityType": "Patient"}))).await.unwrap();
        repo.create_item(doc(json!({"PK": "A", "SK": "2", "EntityType": "MedicalRecord"}))).await.unwrap();

        let patients = repo
            .scan_items(ScanRequest {
                filter: Some(Condition::Equals("EntityType".into(), json!("Patient"))),
                ..ScanRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(patients.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_operations_on_empty_input() {
        let repo = repo();
        assert!(repo.batch_get_items(&[]).await.unwrap().is_empty());
        assert_eq!(repo.batch_write_items(Vec::new()).await.unwrap(), BatchWriteOutcome::default());
    }

    #[tokio::test]
    async fn test_batch_write_validates_every_item_first() {
        let repo = repo();
        let err = repo
            .batch_write_items(vec![doc(json!({"PK": "A", "SK": "1"})), doc(json!({"PK": "B"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Validation(_)));
        assert!(repo.get_item(&ItemKey::new("A", "1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_write_preserves_creation_metadata() {
        let repo = repo();
        let outcome = repo
            .batch_write_items(vec![doc(json!({
                "PK": "A", "SK": "1", "CreatedAt": "2020-01-01T00:00:00Z", "ItemId": "fixed"
            }))])
            .await
            .unwrap();
        assert_eq!(outcome.processed, 1);

        let item = repo.get_item(&ItemKey::new("A", "1")).await.unwrap().unwrap();
        assert_eq!(item["CreatedAt"], json!("2020-01-01T00:00:00Z"));
        assert_eq!(item["ItemId"], json!("fixed"));
        assert_ne!(item["UpdatedAt"], json!("2020-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_batch_write_chunks_and_retries() {
        let storage = Arc::new(ThrottledStorage::new(2));
        let repo = TableRepository::new(storage.clone()).with_retry_delay(Duration::from_millis(1));

        let items: Vec<Document> = (0..30)
            .map(|i| doc(json!({"PK": format!("P#{i}"), "SK": "PROFILE"})))
            .collect();
        let outcome = repo.batch_write_items(items).await.unwrap();

        assert_eq!(outcome.processed, 30);
        assert!(outcome.unprocessed.is_empty());
        assert_eq!(storage.inner.len(), 30);
        // 25 refused once, 1 retried and refused again, 1 retried, then the remaining 5
        assert_eq!(*storage.batch_sizes.lock().unwrap(), vec![25, 1, 1, 5]);
    }

    #[tokio::test]
    async fn test_batch_write_reports_items_left_after_retries() {
        let storage = Arc::new(ThrottledStorage::new(10));
        let repo = TableRepository::new(storage.clone())
            .with_batch_retries(2)
            .with_retry_delay(Duration::from_millis(1));

        let items: Vec<Document> = (0..3)
            .map(|i| doc(json!({"PK": format!("P#{i}"), "SK": "PROFILE"})))
            .collect();
        let outcome = repo.batch_write_items(items).await.unwrap();

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.unprocessed.len(), 1);
        assert_eq!(outcome.unprocessed[0]["PK"], json!("P#2"));
    }

    #[tokio::test]
    async fn test_batch_get_chunks_dedups_and_retries() {
        let storage = Arc::new(ThrottledStorage::new(1));
        let repo = TableRepository::new(storage.clone()).with_retry_delay(Duration::from_millis(1));

        let items: Vec<Document> = (0..120)
            .map(|i| doc(json!({"PK": format!("P#{i}"), "SK": "PROFILE"})))
            .collect();
        storage.inner.batch_put(&items).await.unwrap();

        let mut keys: Vec<ItemKey> = (0..120).map(|i| ItemKey::new(format!("P#{i}"), "PROFILE")).collect();
        keys.push(ItemKey::new("P#0", "PROFILE"));

        let found = repo.batch_get_items(&keys).await.unwrap();
        assert_eq!(found.len(), 120);
        assert_eq!(*storage.batch_sizes.lock().unwrap(), vec![100, 1, 20]);
    }
}
