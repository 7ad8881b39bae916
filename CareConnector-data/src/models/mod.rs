pub mod item;

pub use item::{
    timestamp_now, BatchGetPage, BatchWriteOutcome, Document, ItemKey, ItemUpdate, Page,
    QueryRequest, ScanRequest,
};
