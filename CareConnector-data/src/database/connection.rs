//! Storage backend configuration for the CareConnector table
//!
//! Two backends are supported:
//! - DynamoDB (default), using the AWS default credential chain
//! - In-memory, for local development and tests

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::DatabaseError;
use crate::repository::dynamodb::DynamoDbStorage;
use crate::repository::in_memory::InMemoryStorage;
use crate::repository::storage::StorageBackend;
use crate::repository::TableRepository;

/// Default table name
pub const DEFAULT_TABLE_NAME: &str = "careconnector-main";
/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-2";
/// Default number of retry rounds for unprocessed batch items
pub const DEFAULT_BATCH_RETRIES: u32 = 5;

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// Managed DynamoDB table
    DynamoDb,
    /// Process-local map, lost on restart
    Memory,
}

impl StorageBackendKind {
    /// Convert from string to backend kind
    pub fn parse(s: &str) -> Result<Self, DatabaseError> {
        match s.trim().to_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StorageBackendKind::DynamoDb),
            "memory" | "in-memory" | "in_memory" => Ok(StorageBackendKind::Memory),
            _ => Err(DatabaseError::UnsupportedBackend(s.to_string())),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend to use
    pub backend: StorageBackendKind,
    /// Table name
    pub table_name: String,
    /// AWS region
    pub region: String,
    /// Endpoint override, e.g. DynamoDB Local
    pub endpoint_url: Option<String>,
    /// Retry rounds for unprocessed batch items
    pub max_batch_retries: u32,
    /// Fall back to the in-memory backend when the table is unreachable
    pub fallback_to_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::DynamoDb,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
            max_batch_retries: DEFAULT_BATCH_RETRIES,
            fallback_to_memory: false,
        }
    }
}

impl StoreConfig {
    /// Create a new storage configuration from environment variables
    pub fn from_env() -> Result<Self, DatabaseError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DatabaseError> {
        let backend = match lookup("STORAGE_BACKEND") {
            Some(value) => StorageBackendKind::parse(&value)?,
            None => StorageBackendKind::DynamoDb,
        };

        let table_name = lookup("PATIENTS_TABLE_NAME")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());

        let region = lookup("AWS_DEFAULT_REGION")
            .filter(|region| !region.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let endpoint_url = lookup("AWS_ENDPOINT_URL").filter(|url| !url.is_empty());

        let max_batch_retries = match lookup("DYNAMODB_BATCH_MAX_RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                DatabaseError::ConfigError(format!(
                    "DYNAMODB_BATCH_MAX_RETRIES must be a non-negative integer, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_BATCH_RETRIES,
        };

        let fallback_to_memory = lookup("STORAGE_FALLBACK_TO_MEMORY")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Ok(StoreConfig {
            backend,
            table_name,
            region,
            endpoint_url,
            max_batch_retries,
            fallback_to_memory,
        })
    }

    /// Human-readable target for startup logs
    pub fn target_display(&self) -> String {
        match (self.backend, &self.endpoint_url) {
            (StorageBackendKind::Memory, _) => "in-memory table".to_string(),
            (StorageBackendKind::DynamoDb, Some(url)) => {
                format!("table '{}' on local DynamoDB ({})", self.table_name, url)
            }
            (StorageBackendKind::DynamoDb, None) => {
                format!("table '{}' in region {}", self.table_name, self.region)
            }
        }
    }
}

/// Create the storage backend described by `config`
///
/// When the DynamoDB table cannot be reached and `fallback_to_memory` is set,
/// an in-memory backend is returned instead.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn StorageBackend>, DatabaseError> {
    match config.backend {
        StorageBackendKind::Memory => {
            info!("Using in-memory storage backend");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        StorageBackendKind::DynamoDb => {
            let storage = DynamoDbStorage::from_config(config).await;
            info!("Initialized DynamoDB storage for {}", config.target_display());

            if !config.fallback_to_memory {
                return Ok(Arc::new(storage));
            }

            match storage.ping().await {
                Ok(()) => Ok(Arc::new(storage)),
                Err(e) => {
                    warn!("DynamoDB table unavailable ({}), falling back to in-memory storage", e);
                    Ok(Arc::new(InMemoryStorage::new()))
                }
            }
        }
    }
}

/// Create the table repository described by `config`
pub async fn connect_table(config: &StoreConfig) -> Result<TableRepository, DatabaseError> {
    let storage = connect(config).await?;
    Ok(TableRepository::new(storage)
        .with_batch_retries(config.max_batch_retries)
        .with_retry_delay(Duration::from_millis(50)))
}
