use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::errors::RepositoryError;
use super::expression::SortKeyCondition;
use super::keys::{medical_record_sk, patient_pk, RECORD_PREFIX};
use super::table::TableRepositoryTrait;
use crate::models::item::{timestamp_now, Document, QueryRequest, ENTITY_TYPE, PARTITION_KEY, SORT_KEY};

/// `EntityType` value of medical records
pub const MEDICAL_RECORD_ENTITY: &str = "MedicalRecord";

/// Medical records stored next to the patient profile, sorted by date
#[derive(Debug, Clone)]
pub struct MedicalRecordRepository {
    table: Arc<dyn TableRepositoryTrait>,
}

impl MedicalRecordRepository {
    pub fn new(table: Arc<dyn TableRepositoryTrait>) -> Self {
        Self { table }
    }

    /// Store a new record for a patient
    pub async fn create_record(&self, patient_id: &str, data: Document) -> Result<Document, RepositoryError> {
        let record_id = Uuid::new_v4().to_string();
        let record_date = timestamp_now();

        let mut item = data;
        item.insert(PARTITION_KEY.to_string(), Value::String(patient_pk(patient_id)));
        item.insert(
            SORT_KEY.to_string(),
            Value::String(medical_record_sk(&record_date, &record_id)),
        );
        item.insert(ENTITY_TYPE.to_string(), Value::String(MEDICAL_RECORD_ENTITY.to_string()));
        item.insert("RecordId".to_string(), Value::String(record_id.clone()));
        item.insert("RecordDate".to_string(), Value::String(record_date));

        let created = self.table.create_item(item).await?;
        info!("Created medical record {} for {}", record_id, patient_id);
        Ok(created)
    }

    /// A patient's records, newest first
    pub async fn get_patient_records(
        &self,
        patient_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, RepositoryError> {
        let request = QueryRequest::new(patient_pk(patient_id))
            .with_sort_key(SortKeyCondition::BeginsWith(RECORD_PREFIX.to_string()))
            .descending()
            .with_limit(limit);

        self.table.query_items(request).await
    }
}
