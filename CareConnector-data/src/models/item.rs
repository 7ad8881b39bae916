use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::repository::errors::RepositoryError;
use crate::repository::expression::{Condition, Index, SortKeyCondition};

/// A stored item. Attribute names map to JSON values.
pub type Document = serde_json::Map<String, Value>;

/// Partition key attribute
pub const PARTITION_KEY: &str = "PK";
/// Sort key attribute
pub const SORT_KEY: &str = "SK";
/// Creation timestamp attribute
pub const CREATED_AT: &str = "CreatedAt";
/// Last update timestamp attribute
pub const UPDATED_AT: &str = "UpdatedAt";
/// Generated item identifier attribute
pub const ITEM_ID: &str = "ItemId";
/// Entity discriminator attribute
pub const ENTITY_TYPE: &str = "EntityType";

/// Current UTC time in the format stored in `CreatedAt` / `UpdatedAt`
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Primary key of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    /// Partition key value
    pub pk: String,
    /// Sort key value
    pub sk: String,
}

impl ItemKey {
    /// Create a key from partition and sort key values
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Extract the key from a document, requiring string `PK` and `SK`
    pub fn from_document(item: &Document) -> Result<Self, RepositoryError> {
        match (
            item.get(PARTITION_KEY).and_then(Value::as_str),
            item.get(SORT_KEY).and_then(Value::as_str),
        ) {
            (Some(pk), Some(sk)) => Ok(Self::new(pk, sk)),
            _ => Err(RepositoryError::Validation(
                "Item must contain both 'PK' and 'SK' keys".to_string(),
            )),
        }
    }

    /// Key attributes as a document
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(PARTITION_KEY.to_string(), Value::String(self.pk.clone()));
        doc.insert(SORT_KEY.to_string(), Value::String(self.sk.clone()));
        doc
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PK: {}, SK: {}", self.pk, self.sk)
    }
}

/// Attribute changes applied by an update
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    /// Attributes to set
    pub set: Document,
    /// Attributes to remove
    pub remove: Vec<String>,
    /// Condition the stored item must satisfy
    pub condition: Option<Condition>,
}

impl ItemUpdate {
    /// Update that sets every attribute of `set`
    pub fn new(set: Document) -> Self {
        Self {
            set,
            ..Self::default()
        }
    }

    /// Set a single attribute
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(name.into(), value.into());
        self
    }

    /// Remove a single attribute
    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.remove.push(name.into());
        self
    }

    /// Require a condition, combined with any existing one
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }
}

/// Query against the table or one of its indexes
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Partition key value of the chosen index
    pub pk: String,
    /// Optional sort key condition
    pub sk_condition: Option<SortKeyCondition>,
    /// Index to query
    pub index: Index,
    /// Filter applied after the key condition
    pub filter: Option<Condition>,
    /// Maximum number of items returned
    pub limit: Option<usize>,
    /// Ascending sort key order when true
    pub scan_forward: bool,
}

impl QueryRequest {
    pub fn new(pk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk_condition: None,
            index: Index::Primary,
            filter: None,
            limit: None,
            scan_forward: true,
        }
    }

    pub fn with_sort_key(mut self, condition: SortKeyCondition) -> Self {
        self.sk_condition = Some(condition);
        self
    }

    pub fn on_index(mut self, index: Index) -> Self {
        self.index = index;
        self
    }

    pub fn with_filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Return items in descending sort key order
    pub fn descending(mut self) -> Self {
        self.scan_forward = false;
        self
    }
}

/// Full table or index scan
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub filter: Option<Condition>,
    pub limit: Option<usize>,
    pub index: Index,
}

/// One page of query or scan results
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Document>,
    /// Key to resume from; `None` once the result set is exhausted
    pub last_evaluated_key: Option<Document>,
}

/// Result of a single batch get request
#[derive(Debug, Clone, Default)]
pub struct BatchGetPage {
    pub items: Vec<Document>,
    pub unprocessed: Vec<ItemKey>,
}

/// Result of a batch write
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchWriteOutcome {
    /// Number of items written
    pub processed: usize,
    /// Items still unwritten after every retry
    pub unprocessed: Vec<Document>,
}
