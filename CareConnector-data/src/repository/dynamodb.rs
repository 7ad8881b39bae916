//! DynamoDB storage backend.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{KeysAndAttributes, PutRequest, ReturnValue, WriteRequest};
use aws_sdk_dynamodb::Client;
use tracing::debug;

use super::errors::RepositoryError;
use super::expression::{Condition, ExpressionBuilder};
use super::sdk_errors::{
    map_batch_get_error, map_batch_write_error, map_delete_item_error, map_describe_table_error,
    map_get_item_error, map_put_item_error, map_query_error, map_scan_error, map_update_item_error,
};
use super::storage::StorageBackend;
use crate::database::conversions::{
    document_to_item, item_to_document, item_to_key, key_to_item, values_to_attributes,
};
use crate::database::StoreConfig;
use crate::models::item::{BatchGetPage, Document, ItemKey, Page, QueryRequest, ScanRequest};

fn page_limit(limit: Option<usize>) -> Option<i32> {
    limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX))
}

/// DynamoDB-backed table storage
#[derive(Debug, Clone)]
pub struct DynamoDbStorage {
    client: Client,
    table_name: String,
}

impl DynamoDbStorage {
    /// Creates a new storage with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a client from the AWS default credential chain with the configured
    /// region and optional endpoint override.
    pub async fn from_config(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), config.table_name.clone())
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl StorageBackend for DynamoDbStorage {
    fn describe(&self) -> String {
        format!("dynamodb:{}", self.table_name)
    }

    async fn put_item(&self, item: Document, condition: Option<&Condition>) -> Result<(), RepositoryError> {
        let mut builder = ExpressionBuilder::default();
        let condition_expression = condition.map(|c| builder.condition(c));
        let (names, values) = builder.into_parts();

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(document_to_item(&item)))
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values.map(values_to_attributes))
            .send()
            .await
            .map_err(|e| map_put_item_error(e, &self.table_name))?;

        Ok(())
    }

    async fn get_item(&self, key: &ItemKey) -> Result<Option<Document>, RepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_item(key)))
            .send()
            .await
            .map_err(|e| map_get_item_error(e, &self.table_name))?;

        result.item().map(item_to_document).transpose()
    }

    async fn update_item(
        &self,
        key: &ItemKey,
        set: &Document,
        remove: &[String],
        condition: Option<&Condition>,
    ) -> Result<Document, RepositoryError> {
        let mut builder = ExpressionBuilder::default();
        let update_expression = builder.update(set, remove);
        let condition_expression = condition.map(|c| builder.condition(c));
        let (names, values) = builder.into_parts();

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_item(key)))
            .update_expression(update_expression)
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values.map(values_to_attributes))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| map_update_item_error(e, &self.table_name))?;

        Ok(result
            .attributes()
            .map(item_to_document)
            .transpose()?
            .unwrap_or_default())
    }

    async fn delete_item(
        &self,
        key: &ItemKey,
        condition: Option<&Condition>,
    ) -> Result<Option<Document>, RepositoryError> {
        let mut builder = ExpressionBuilder::default();
        let condition_expression = condition.map(|c| builder.condition(c));
        let (names, values) = builder.into_parts();

        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_item(key)))
            .set_condition_expression(condition_expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values.map(values_to_attributes))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, &self.table_name))?;

        result.attributes().map(item_to_document).transpose()
    }

    async fn query_page(
        &self,
        request: &QueryRequest,
        limit: Option<usize>,
        start_key: Option<Document>,
    ) -> Result<Page, RepositoryError> {
        let mut builder = ExpressionBuilder::default();
        let key_condition =
            builder.key_condition(request.index, &request.pk, request.sk_condition.as_ref());
        let filter = request.filter.as_ref().map(|f| builder.condition(f));
        let (names, values) = builder.into_parts();

        debug!(
            "Query on {} index {:?}: {}",
            self.table_name,
            request.index.name(),
            key_condition
        );

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(request.index.name().map(String::from))
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values.map(values_to_attributes))
            .scan_index_forward(request.scan_forward)
            .set_limit(page_limit(limit))
            .set_exclusive_start_key(start_key.as_ref().map(document_to_item))
            .send()
            .await
            .map_err(|e| map_query_error(e, &self.table_name))?;

        Ok(Page {
            items: result
                .items()
                .iter()
                .map(item_to_document)
                .collect::<Result<Vec<_>, _>>()?,
            last_evaluated_key: result.last_evaluated_key().map(item_to_document).transpose()?,
        })
    }

    async fn scan_page(
        &self,
        request: &ScanRequest,
        limit: Option<usize>,
        start_key: Option<Document>,
    ) -> Result<Page, RepositoryError> {
        let mut builder = ExpressionBuilder::default();
        let filter = request.filter.as_ref().map(|f| builder.condition(f));
        let (names, values) = builder.into_parts();

        let result = self
            .client
            .scan()
            .table_name(&self.table_name)
            .set_index_name(request.index.name().map(String::from))
            .set_filter_expression(filter)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values.map(values_to_attributes))
            .set_limit(page_limit(limit))
            .set_exclusive_start_key(start_key.as_ref().map(document_to_item))
            .send()
            .await
            .map_err(|e| map_scan_error(e, &self.table_name))?;

        Ok(Page {
            items: result
                .items()
                .iter()
                .map(item_to_document)
                .collect::<Result<Vec<_>, _>>()?,
            last_evaluated_key: result.last_evaluated_key().map(item_to_document).transpose()?,
        })
    }

    async fn batch_get(&self, keys: &[ItemKey]) -> Result<BatchGetPage, RepositoryError> {
        let request_keys = KeysAndAttributes::builder()
            .set_keys(Some(keys.iter().map(key_to_item).collect()))
            .build()
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;

        let result = self
            .client
            .batch_get_item()
            .request_items(&self.table_name, request_keys)
            .send()
            .await
            .map_err(|e| map_batch_get_error(e, &self.table_name))?;

        let items = result
            .responses()
            .and_then(|responses| responses.get(&self.table_name))
            .map(|items| items.iter().map(item_to_document).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();

        let unprocessed = result
            .unprocessed_keys()
            .and_then(|unprocessed| unprocessed.get(&self.table_name))
            .map(|pending| pending.keys().iter().map(item_to_key).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();

        Ok(BatchGetPage { items, unprocessed })
    }

    async fn batch_put(&self, items: &[Document]) -> Result<Vec<Document>, RepositoryError> {
        let requests = items
            .iter()
            .map(|item| {
                PutRequest::builder()
                    .set_item(Some(document_to_item(item)))
                    .build()
                    .map(|put| WriteRequest::builder().put_request(put).build())
                    .map_err(|e| RepositoryError::Backend(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let result = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .map_err(|e| map_batch_write_error(e, &self.table_name))?;

        let unprocessed = result
            .unprocessed_items()
            .and_then(|unprocessed| unprocessed.get(&self.table_name))
            .map(|pending| {
                pending
                    .iter()
                    .filter_map(|request| request.put_request())
                    .map(|put| item_to_document(put.item()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(unprocessed)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(|e| map_describe_table_error(e, &self.table_name))?;
        Ok(())
    }
}
