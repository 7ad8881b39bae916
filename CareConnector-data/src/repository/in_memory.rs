use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::errors::RepositoryError;
use super::expression::{Condition, Index};
use super::storage::StorageBackend;
use crate::models::item::{BatchGetPage, Document, ItemKey, Page, QueryRequest, ScanRequest};

/// In-memory table used for development and tests
///
/// Items are kept ordered by (PK, SK). Queries and scans return a single
/// page; index queries skip items lacking the index key attributes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    items: Arc<RwLock<BTreeMap<ItemKey, Document>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(condition: Option<&Condition>, current: Option<&Document>) -> Result<(), RepositoryError> {
        let empty = Document::new();
        match condition {
            Some(condition) if !condition.matches(current.unwrap_or(&empty)) => {
                Err(RepositoryError::ConditionFailed)
            }
            _ => Ok(()),
        }
    }

    fn index_keys<'a>(item: &'a Document, index: Index) -> Option<(&'a str, &'a str)> {
        let pk = item.get(index.partition_attribute()).and_then(Value::as_str)?;
        let sk = item.get(index.sort_attribute()).and_then(Value::as_str)?;
        Some((pk, sk))
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn describe(&self) -> String {
        "in-memory".to_string()
    }

    async fn put_item(&self, item: Document, condition: Option<&Condition>) -> Result<(), RepositoryError> {
        let key = ItemKey::from_document(&item)?;
        let mut store = self.items.write()?;
        Self::check(condition, store.get(&key))?;
        store.insert(key, item);
        Ok(())
    }

    async fn get_item(&self, key: &ItemKey) -> Result<Option<Document>, RepositoryError> {
        let store = self.items.read()?;
        Ok(store.get(key).cloned())
    }

    async fn update_item(
        &self,
        key: &ItemKey,
        set: &Document,
        remove: &[String],
        condition: Option<&Condition>,
    ) -> Result<Document, RepositoryError> {
        let mut store = self.items.write()?;
        Self::check(condition, store.get(key))?;

        let item = store.entry(key.clone()).or_insert_with(|| key.to_document());
        for (name, value) in set {
            item.insert(name.clone(), value.clone());
        }
        for name in remove {
            item.remove(name);
        }
        Ok(item.clone())
    }

    async fn delete_item(
        &self,
        key: &ItemKey,
        condition: Option<&Condition>,
    ) -> Result<Option<Document>, RepositoryError> {
        let mut store = self.items.write()?;
        Self::check(condition, store.get(key))?;
        Ok(store.remove(key))
    }

    async fn query_page(
        &self,
        request: &QueryRequest,
        limit: Option<usize>,
        _start_key: Option<Document>,
    ) -> Result<Page, RepositoryError> {
        let store = self.items.read()?;

        let mut matched: Vec<(&str, &Document)> = store
            .values()
            .filter_map(|item| {
                let (pk, sk) = Self::index_keys(item, request.index)?;
                let in_range = request.sk_condition.as_ref().map_or(true, |c| c.matches(sk));
                (pk == request.pk && in_range).then_some((sk, item))
            })
            .collect();

        matched.sort_by(|a, b| a.0.cmp(b.0));
        if !request.scan_forward {
            matched.reverse();
        }

        let items = matched
            .into_iter()
            .map(|(_, item)| item)
            .filter(|item| request.filter.as_ref().map_or(true, |f| f.matches(item)))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(Page {
            items,
            last_evaluated_key: None,
        })
    }

    async fn scan_page(
        &self,
        request: &ScanRequest,
        limit: Option<usize>,
        _start_key: Option<Document>,
    ) -> Result<Page, RepositoryError> {
        let store = self.items.read()?;

        let items = store
            .values()
            .filter(|item| Self::index_keys(item, request.index).is_some())
            .filter(|item| request.filter.as_ref().map_or(true, |f| f.matches(item)))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(Page {
            items,
            last_evaluated_key: None,
        })
    }

    async fn batch_get(&self, keys: &[ItemKey]) -> Result<BatchGetPage, RepositoryError> {
        let store = self.items.read()?;
        Ok(BatchGetPage {
            items: keys.iter().filter_map(|key| store.get(key).cloned()).collect(),
            unprocessed: Vec::new(),
        })
    }

    async fn batch_put(&self, items: &[Document]) -> Result<Vec<Document>, RepositoryError> {
        let mut store = self.items.write()?;
        for item in items {
            store.insert(ItemKey::from_document(item)?, item.clone());
        }
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        let _store = self.items.read()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::expression::SortKeyCondition;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_conditional_put() {
        let storage = InMemoryStorage::new();
        let item = doc(json!({"PK": "A", "SK": "1"}));

        storage.put_item(item.clone(), Some(&Condition::item_absent())).await.unwrap();
        let second = storage.put_item(item, Some(&Condition::item_absent())).await;

        assert!(matches!(second, Err(RepositoryError::ConditionFailed)));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_update_sets_and_removes() {
        let storage = InMemoryStorage::new();
        storage
            .put_item(doc(json!({"PK": "A", "SK": "1", "old": true})), None)
            .await
            .unwrap();

        let key = ItemKey::new("A", "1");
        let updated = storage
            .update_item(&key, &doc(json!({"new": 1})), &["old".to_string()], None)
            .await
            .unwrap();

        assert_eq!(updated.get("new"), Some(&json!(1)));
        assert!(!updated.contains_key("old"));
    }

    #[tokio::test]
    async fn test_query_orders_by_sort_key() {
        let storage = InMemoryStorage::new();
        for sk in ["RECORD#2", "PROFILE", "RECORD#1", "RECORD#3"] {
            storage.put_item(doc(json!({"PK": "P", "SK": sk})), None).await.unwrap();
        }
        storage.put_item(doc(json!({"PK": "Q", "SK": "RECORD#9"})), None).await.unwrap();

        let request = QueryRequest::new("P")
            .with_sort_key(SortKeyCondition::BeginsWith("RECORD#".into()))
            .descending();
        let page = storage.query_page(&request, Some(2), None).await.unwrap();

        let sks: Vec<_> = page.items.iter().map(|i| i["SK"].as_str().unwrap()).collect();
        assert_eq!(sks, vec!["RECORD#3", "RECORD#2"]);
    }

    #[tokio::test]
    async fn test_index_query_skips_items_without_index_keys() {
        let storage = InMemoryStorage::new();
        storage
            .put_item(doc(json!({"PK": "P#1", "SK": "PROFILE", "GSI1PK": "AGENT#a", "GSI1SK": "P#1"})), None)
            .await
            .unwrap();
        storage.put_item(doc(json!({"PK": "P#2", "SK": "PROFILE"})), None).await.unwrap();

        let page = storage
            .query_page(&QueryRequest::new("AGENT#a").on_index(Index::Gsi1), None, None)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);

        let scan = ScanRequest {
            index: Index::Gsi1,
            ..ScanRequest::default()
        };
        assert_eq!(storage.scan_page(&scan, None, None).await.unwrap().items.len(), 1);
    }
}
