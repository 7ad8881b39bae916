use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use care_connector_data::repository::{PatientRepository, RepositoryError, TableRepositoryTrait};

use crate::auth::UserInfo;
use crate::mail::{CreateInboxRequest, Inbox, MailClientTrait, MailError};

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Access to AgentMail inboxes
#[async_trait]
pub trait InboxServiceTrait: Send + Sync {
    /// Provision an inbox with the given options
    async fn create_inbox(&self, request: CreateInboxRequest) -> Result<Inbox, InboxError>;

    /// Messages of the user's own inbox
    async fn messages(&self, user: &UserInfo) -> Result<Value, InboxError>;

    /// Threads of the user's own inbox
    async fn threads(&self, user: &UserInfo) -> Result<Value, InboxError>;
}

#[derive(Debug, Clone)]
pub struct InboxService {
    patients: PatientRepository,
    mail: Arc<dyn MailClientTrait>,
}

impl InboxService {
    pub fn new(table: Arc<dyn TableRepositoryTrait>, mail: Arc<dyn MailClientTrait>) -> Self {
        Self {
            patients: PatientRepository::new(table),
            mail,
        }
    }

    /// Inbox id stored on the user's profile
    async fn inbox_id(&self, user: &UserInfo) -> Result<String, InboxError> {
        let profile = self
            .patients
            .get_patient(&user.user_id)
            .await?
            .ok_or_else(|| InboxError::NotFound("Patient profile not found".to_string()))?;

        profile
            .get("agentmail_inbox")
            .and_then(|inbox| inbox.get("inbox_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| InboxError::NotFound("No inbox found for this patient".to_string()))
    }
}

#[async_trait]
impl InboxServiceTrait for InboxService {
    async fn create_inbox(&self, request: CreateInboxRequest) -> Result<Inbox, InboxError> {
        Ok(self.mail.create_inbox(request).await?)
    }

    async fn messages(&self, user: &UserInfo) -> Result<Value, InboxError> {
        let inbox_id = self.inbox_id(user).await?;
        debug!("Fetching messages of {} for {}", inbox_id, user.user_id);
        Ok(self.mail.list_messages(&inbox_id).await?)
    }

    async fn threads(&self, user: &UserInfo) -> Result<Value, InboxError> {
        let inbox_id = self.inbox_id(user).await?;
        Ok(self.mail.list_threads(&inbox_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MockMailClientTrait;
    use care_connector_data::models::Document;
    use care_connector_data::repository::TableRepository;
    use mockall::predicate::eq;
    use serde_json::json;

    async fn table_with_profile(profile: Value) -> Arc<dyn TableRepositoryTrait> {
        let table: Arc<dyn TableRepositoryTrait> = Arc::new(TableRepository::in_memory());
        let data: Document = profile.as_object().cloned().unwrap_or_default();
        PatientRepository::new(table.clone())
            .create_patient("auth0|pat", data)
            .await
            .unwrap();
        table
    }

    #[tokio::test]
    async fn test_messages_use_stored_inbox() {
        let table = table_with_profile(json!({"agentmail_inbox": {"inbox_id": "pat@agentmail.to"}})).await;
        let mut mail = MockMailClientTrait::new();
        mail.expect_list_messages()
            .with(eq("pat@agentmail.to"))
            .times(1)
            .returning(|_| Ok(json!({"count": 0, "messages": []})));

        let service = InboxService::new(table, Arc::new(mail));
        let messages = service.messages(&UserInfo::new("auth0|pat")).await.unwrap();
        assert_eq!(messages["count"], 0);
    }

    #[tokio::test]
    async fn test_missing_inbox_is_not_found() {
        let table = table_with_profile(json!({"name": "Pat"})).await;
        let service = InboxService::new(table, Arc::new(MockMailClientTrait::new()));

        let err = service.threads(&UserInfo::new("auth0|pat")).await.unwrap_err();
        assert_eq!(err.to_string(), "No inbox found for this patient");

        let err = service.threads(&UserInfo::new("auth0|other")).await.unwrap_err();
        assert_eq!(err.to_string(), "Patient profile not found");
    }
}
