use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::errors::RepositoryError;
use super::expression::{Condition, Index};
use super::keys::{agent_gsi1_pk, patient_gsi1_sk, patient_pk, profile_key, GSI1_PK, GSI1_SK, PROFILE_SK};
use super::table::TableRepositoryTrait;
use crate::models::item::{Document, ItemUpdate, QueryRequest, ENTITY_TYPE, PARTITION_KEY, SORT_KEY};

/// `EntityType` value of patient profiles
pub const PATIENT_ENTITY: &str = "Patient";

const PATIENT_ID: &str = "PatientId";
const AGENT_EMAIL: &str = "agent_email";

/// Patient profiles stored under `PATIENT#<id>` / `PROFILE`
#[derive(Debug, Clone)]
pub struct PatientRepository {
    table: Arc<dyn TableRepositoryTrait>,
}

impl PatientRepository {
    pub fn new(table: Arc<dyn TableRepositoryTrait>) -> Self {
        Self { table }
    }

    fn agent_email(data: &Document) -> Option<&str> {
        data.get(AGENT_EMAIL).and_then(Value::as_str)
    }

    /// Create a profile. A non-empty `agent_email` makes the profile visible
    /// through the agent index.
    pub async fn create_patient(&self, patient_id: &str, data: Document) -> Result<Document, RepositoryError> {
        let mut item = data;
        item.insert(PARTITION_KEY.to_string(), Value::String(patient_pk(patient_id)));
        item.insert(SORT_KEY.to_string(), Value::String(PROFILE_SK.to_string()));
        item.insert(ENTITY_TYPE.to_string(), Value::String(PATIENT_ENTITY.to_string()));
        item.insert(PATIENT_ID.to_string(), Value::String(patient_id.to_string()));

        match Self::agent_email(&item).filter(|email| !email.is_empty()).map(agent_gsi1_pk) {
            Some(gsi1_pk) => {
                item.insert(GSI1_PK.to_string(), Value::String(gsi1_pk));
                item.insert(GSI1_SK.to_string(), Value::String(patient_gsi1_sk(patient_id)));
            }
            None => {
                item.remove(GSI1_PK);
                item.remove(GSI1_SK);
            }
        }

        let created = self.table.create_item(item).await?;
        info!("Created patient profile for {}", patient_id);
        Ok(created)
    }

    /// Get a patient's profile
    pub async fn get_patient(&self, patient_id: &str) -> Result<Option<Document>, RepositoryError> {
        self.table.get_item(&profile_key(patient_id)).await
    }

    /// Update an existing profile. Fails with `NotFound` when there is no
    /// profile. An empty `agent_email` drops the agent index attributes.
    pub async fn update_patient(&self, patient_id: &str, updates: Document) -> Result<Document, RepositoryError> {
        let mut update = ItemUpdate::new(Document::new()).with_condition(Condition::item_exists());

        match Self::agent_email(&updates).map(str::to_string) {
            Some(email) if !email.is_empty() => {
                update = update
                    .set(GSI1_PK, agent_gsi1_pk(&email))
                    .set(GSI1_SK, patient_gsi1_sk(patient_id));
            }
            Some(_) => {
                update = update.remove(GSI1_PK).remove(GSI1_SK);
            }
            None => {}
        }

        for (name, value) in updates {
            update = update.set(name, value);
        }

        self.table.update_item(&profile_key(patient_id), update).await
    }

    /// Delete a profile; false when none existed
    pub async fn delete_patient(&self, patient_id: &str) -> Result<bool, RepositoryError> {
        self.table.delete_item(&profile_key(patient_id), None).await
    }

    /// Patients assigned to an agent mailbox, through the agent index
    pub async fn list_patients_by_agent(&self, agent_email: &str) -> Result<Vec<Document>, RepositoryError> {
        let request = QueryRequest::new(agent_gsi1_pk(agent_email))
            .on_index(Index::Gsi1)
            .with_filter(Condition::Equals(
                ENTITY_TYPE.to_string(),
                Value::String(PATIENT_ENTITY.to_string()),
            ));

        let patients = self.table.query_items(request).await?;
        debug!("Found {} patients for agent {}", patients.len(), agent_email);
        Ok(patients)
    }
}
