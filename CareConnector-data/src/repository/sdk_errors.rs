//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `RepositoryError`. Conditional check failures are
//! reported as `ConditionFailed`; the table repository decides what they mean
//! for the calling operation.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;

use super::errors::RepositoryError;

fn throttled(operation: &str) -> RepositoryError {
    RepositoryError::Throttled(operation.to_string())
}

/// Map a PutItem SDK error to RepositoryError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => RepositoryError::ConditionFailed,
        PutItemError::ResourceNotFoundException(_) => RepositoryError::TableNotFound(table.to_string()),
        PutItemError::ProvisionedThroughputExceededException(_)
        | PutItemError::RequestLimitExceeded(_) => throttled("PutItem"),
        err => RepositoryError::Backend(format!("PutItem failed: {:?}", err)),
    }
}

/// Map a GetItem SDK error to RepositoryError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => RepositoryError::TableNotFound(table.to_string()),
        GetItemError::ProvisionedThroughputExceededException(_)
        | GetItemError::RequestLimitExceeded(_) => throttled("GetItem"),
        err => RepositoryError::Backend(format!("GetItem failed: {:?}", err)),
    }
}

/// Map an UpdateItem SDK error to RepositoryError.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => RepositoryError::ConditionFailed,
        UpdateItemError::ResourceNotFoundException(_) => RepositoryError::TableNotFound(table.to_string()),
        UpdateItemError::ProvisionedThroughputExceededException(_)
        | UpdateItemError::RequestLimitExceeded(_) => throttled("UpdateItem"),
        err => RepositoryError::Backend(format!("UpdateItem failed: {:?}", err)),
    }
}

/// Map a DeleteItem SDK error to RepositoryError.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(_) => RepositoryError::ConditionFailed,
        DeleteItemError::ResourceNotFoundException(_) => RepositoryError::TableNotFound(table.to_string()),
        DeleteItemError::ProvisionedThroughputExceededException(_)
        | DeleteItemError::RequestLimitExceeded(_) => throttled("DeleteItem"),
        err => RepositoryError::Backend(format!("DeleteItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to RepositoryError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => RepositoryError::TableNotFound(table.to_string()),
        QueryError::ProvisionedThroughputExceededException(_)
        | QueryError::RequestLimitExceeded(_) => throttled("Query"),
        err => RepositoryError::Backend(format!("Query failed: {:?}", err)),
    }
}

/// Map a Scan SDK error to RepositoryError.
pub fn map_scan_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ScanError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        ScanError::ResourceNotFoundException(_) => RepositoryError::TableNotFound(table.to_string()),
        ScanError::ProvisionedThroughputExceededException(_)
        | ScanError::RequestLimitExceeded(_) => throttled("Scan"),
        err => RepositoryError::Backend(format!("Scan failed: {:?}", err)),
    }
}

/// Map a BatchGetItem SDK error to RepositoryError.
pub fn map_batch_get_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchGetItemError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        BatchGetItemError::ResourceNotFoundException(_) => {
            RepositoryError::TableNotFound(table.to_string())
        }
        BatchGetItemError::ProvisionedThroughputExceededException(_)
        | BatchGetItemError::RequestLimitExceeded(_) => throttled("BatchGetItem"),
        err => RepositoryError::Backend(format!("BatchGetItem failed: {:?}", err)),
    }
}

/// Map a BatchWriteItem SDK error to RepositoryError.
pub fn map_batch_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        BatchWriteItemError::ResourceNotFoundException(_) => {
            RepositoryError::TableNotFound(table.to_string())
        }
        BatchWriteItemError::ProvisionedThroughputExceededException(_)
        | BatchWriteItemError::RequestLimitExceeded(_) => throttled("BatchWriteItem"),
        err => RepositoryError::Backend(format!("BatchWriteItem failed: {:?}", err)),
    }
}

/// Map a DescribeTable SDK error to RepositoryError.
pub fn map_describe_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DescribeTableError, R>,
    table: &str,
) -> RepositoryError {
    match err.into_service_error() {
        DescribeTableError::ResourceNotFoundException(_) => {
            RepositoryError::TableNotFound(table.to_string())
        }
        err => RepositoryError::Backend(format!("DescribeTable failed: {:?}", err)),
    }
}
