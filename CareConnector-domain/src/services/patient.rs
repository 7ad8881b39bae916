use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::Validate;

use care_connector_data::models::Document;
use care_connector_data::repository::{
    MedicalRecordRepository, PatientRepository, RepositoryError, TableRepositoryTrait,
};

use crate::auth::UserInfo;
use crate::entities::patient::{
    default_medical_info, default_preferences, merge_medical_info, merge_over, missing_fields,
    split_display_name,
    CreateMedicalRecordRequest, Initialization, REQUIRED_EMERGENCY_FIELDS,
    REQUIRED_PERSONAL_FIELDS, RESERVED_ATTRIBUTES,
};
use crate::mail::{CreateInboxRequest, MailClientTrait, OutgoingMessage};

/// Patient service errors
#[derive(Debug, Error)]
pub enum PatientServiceError {
    /// Invalid input, shown to the client as is
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Patient profile and medical record operations
#[async_trait]
pub trait PatientServiceTrait: Send + Sync {
    /// Create the initial profile on first login, or return the existing one
    async fn initialize(&self, user: &UserInfo) -> Result<Initialization, PatientServiceError>;

    async fn get_profile(&self, user: &UserInfo) -> Result<Document, PatientServiceError>;

    /// Create or complete a profile from a client payload
    async fn create_profile(&self, user: &UserInfo, body: Document) -> Result<Document, PatientServiceError>;

    /// Apply client changes to an existing profile
    async fn update_profile(&self, user: &UserInfo, updates: Document) -> Result<Document, PatientServiceError>;

    async fn delete_profile(&self, user: &UserInfo) -> Result<(), PatientServiceError>;

    /// Profiles assigned to an agent mailbox
    async fn patients_by_agent(&self, agent_email: &str) -> Result<Vec<Document>, PatientServiceError>;

    async fn add_medical_record(
        &self,
        user: &UserInfo,
        request: CreateMedicalRecordRequest,
    ) -> Result<Document, PatientServiceError>;

    /// Records of the user, newest first
    async fn medical_records(
        &self,
        user: &UserInfo,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, PatientServiceError>;
}

const PROFILE_NOT_FOUND: &str = "Patient profile not found";

const WELCOME_SUBJECT: &str = "Welcome to CareConnector!";
const WELCOME_CONTENT: &str = "Welcome to CareConnector! Your health profile has been successfully created. You can now schedule appointments, communicate with providers, and manage your healthcare all in one place.";

/// Patient service over the single-table store and the mail provider
#[derive(Debug, Clone)]
pub struct PatientService {
    patients: PatientRepository,
    records: MedicalRecordRepository,
    mail: Arc<dyn MailClientTrait>,
}

impl PatientService {
    pub fn new(table: Arc<dyn TableRepositoryTrait>, mail: Arc<dyn MailClientTrait>) -> Self {
        Self {
            patients: PatientRepository::new(table.clone()),
            records: MedicalRecordRepository::new(table),
            mail,
        }
    }

    fn map_repo_error(err: RepositoryError) -> PatientServiceError {
        match err {
            RepositoryError::NotFound { .. } => PatientServiceError::NotFound(PROFILE_NOT_FOUND.to_string()),
            RepositoryError::AlreadyExists { .. } => {
                PatientServiceError::AlreadyExists("Patient profile already exists".to_string())
            }
            RepositoryError::Validation(msg) => PatientServiceError::Validation(msg),
            other => PatientServiceError::Repository(other),
        }
    }

    /// Check the profile payload and build the stored attributes
    fn build_profile(user: &UserInfo, body: &Document) -> Result<Document, PatientServiceError> {
        let personal_info = match body.get("personal_info") {
            Some(info @ Value::Object(_)) => info.clone(),
            _ => {
                return Err(PatientServiceError::Validation(
                    "Personal information is required".to_string(),
                ))
            }
        };

        let missing = missing_fields(&personal_info, &REQUIRED_PERSONAL_FIELDS);
        if !missing.is_empty() {
            return Err(PatientServiceError::Validation(format!(
                "Missing required personal information: {}",
                missing.join(", ")
            )));
        }

        if let Some(contact) = personal_info.get("emergency_contact") {
            let missing = missing_fields(contact, &REQUIRED_EMERGENCY_FIELDS);
            if !missing.is_empty() {
                return Err(PatientServiceError::Validation(format!(
                    "Missing required emergency contact information: {}",
                    missing.join(", ")
                )));
            }
        }

        let agent_email = body
            .get("agent_email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut profile = Document::new();
        profile.insert("user_id".into(), Value::String(user.user_id.clone()));
        profile.insert("personal_info".into(), personal_info);
        profile.insert("medical_info".into(), merge_medical_info(body.get("medical_info")));
        profile.insert(
            "preferences".into(),
            merge_over(default_preferences(), body.get("preferences")),
        );
        profile.insert("agent_email".into(), Value::String(agent_email));
        profile.insert("profile_complete".into(), Value::Bool(true));
        Ok(profile)
    }

    /// Provision an inbox and attach it to the profile; failures only logged
    async fn attach_inbox(&self, user: &UserInfo, profile: Document) -> Document {
        let (first_name, last_name) = split_display_name(user.name.as_deref());
        let request = CreateInboxRequest {
            display_name: Some(format!("{} {}", first_name, last_name)),
            client_id: Some(user.user_id.clone()),
            ..CreateInboxRequest::default()
        };

        let inbox = match self.mail.create_inbox(request).await {
            Ok(inbox) => inbox,
            Err(e) => {
                error!("Failed to create AgentMail inbox for {}: {}", user.user_id, e);
                return profile;
            }
        };
        info!("Created AgentMail inbox {} for {}", inbox.inbox_id, user.user_id);

        let mut update = Document::new();
        match serde_json::to_value(&inbox) {
            Ok(value) => {
                update.insert("agentmail_inbox".into(), value);
            }
            Err(e) => {
                error!("Failed to serialize inbox {}: {}", inbox.inbox_id, e);
                return profile;
            }
        }

        match self.patients.update_patient(&user.user_id, update).await {
            Ok(updated) => updated,
            Err(e) => {
                error!("Failed to store inbox for {}: {}", user.user_id, e);
                profile
            }
        }
    }

    async fn send_welcome(&self, user: &UserInfo) {
        let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) else {
            return;
        };
        let message = OutgoingMessage::new(email, WELCOME_SUBJECT, WELCOME_CONTENT)
            .with_template("welcome_template");
        if let Err(e) = self.mail.send_message(message).await {
            warn!("Welcome email to {} not sent: {}", email, e);
        }
    }
}

#[async_trait]
impl PatientServiceTrait for PatientService {
    async fn initialize(&self, user: &UserInfo) -> Result<Initialization, PatientServiceError> {
        if let Some(existing) = self.patients.get_patient(&user.user_id).await? {
            info!("User {} already initialized", user.user_id);
            return Ok(Initialization {
                profile: existing,
                created: false,
            });
        }

        let initial = serde_json::json!({
            "user_id": user.user_id,
            "email": user.email.clone().unwrap_or_default(),
            "name": user.name.clone().unwrap_or_else(|| "User".to_string()),
            "initialization_complete": true,
            "profile_complete": false,
            "personal_info": {},
            "medical_info": default_medical_info(),
            "preferences": default_preferences(),
            "agent_email": ""
        });
        let initial = match initial {
            Value::Object(map) => map,
            _ => Document::new(),
        };

        let profile = self
            .patients
            .create_patient(&user.user_id, initial)
            .await
            .map_err(Self::map_repo_error)?;
        info!("Initialized patient record for {}", user.user_id);

        Ok(Initialization {
            profile,
            created: true,
        })
    }

    async fn get_profile(&self, user: &UserInfo) -> Result<Document, PatientServiceError> {
        self.patients
            .get_patient(&user.user_id)
            .await?
            .ok_or_else(|| PatientServiceError::NotFound(PROFILE_NOT_FOUND.to_string()))
    }

    async fn create_profile(&self, user: &UserInfo, body: Document) -> Result<Document, PatientServiceError> {
        let mut profile = Self::build_profile(user, &body)?;

        let stored = match self.patients.get_patient(&user.user_id).await? {
            Some(existing) if existing.get("profile_complete") == Some(&Value::Bool(true)) => {
                return Err(PatientServiceError::AlreadyExists(
                    "Patient profile already exists".to_string(),
                ));
            }
            Some(_) => {
                info!("Completing initialized profile for {}", user.user_id);
                self.patients
                    .update_patient(&user.user_id, profile)
                    .await
                    .map_err(Self::map_repo_error)?
            }
            None => {
                if let Some(email) = &user.email {
                    profile.insert("email".into(), Value::String(email.clone()));
                }
                if let Some(name) = &user.name {
                    profile.insert("name".into(), Value::String(name.clone()));
                }
                profile.insert("initialization_complete".into(), Value::Bool(true));
                self.patients
                    .create_patient(&user.user_id, profile)
                    .await
                    .map_err(Self::map_repo_error)?
            }
        };

        let stored = self.attach_inbox(user, stored).await;
        self.send_welcome(user).await;
        Ok(stored)
    }

    async fn update_profile(&self, user: &UserInfo, updates: Document) -> Result<Document, PatientServiceError> {
        if updates.is_empty() {
            return Err(PatientServiceError::Validation("No update data provided".to_string()));
        }

        let updates: Document = updates
            .into_iter()
            .filter(|(name, _)| !RESERVED_ATTRIBUTES.contains(&name.as_str()))
            .collect();

        self.patients
            .update_patient(&user.user_id, updates)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound { .. } => {
                    PatientServiceError::NotFound("Profile not found".to_string())
                }
                other => Self::map_repo_error(other),
            })
    }

    async fn delete_profile(&self, user: &UserInfo) -> Result<(), PatientServiceError> {
        if self.patients.delete_patient(&user.user_id).await? {
            info!("Deleted patient profile for {}", user.user_id);
            Ok(())
        } else {
            Err(PatientServiceError::NotFound(PROFILE_NOT_FOUND.to_string()))
        }
    }

    async fn patients_by_agent(&self, agent_email: &str) -> Result<Vec<Document>, PatientServiceError> {
        if agent_email.trim().is_empty() {
            return Err(PatientServiceError::Validation("Agent email is required".to_string()));
        }
        Ok(self.patients.list_patients_by_agent(agent_email).await?)
    }

    async fn add_medical_record(
        &self,
        user: &UserInfo,
        request: CreateMedicalRecordRequest,
    ) -> Result<Document, PatientServiceError> {
        if let Err(errors) = request.validate() {
            let mut messages = Vec::new();
            for (field, errs) in errors.field_errors() {
                for err in errs {
                    messages.push(
                        err.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid {}", field)),
                    );
                }
            }
            return Err(PatientServiceError::Validation(messages.join(", ")));
        }

        if self.patients.get_patient(&user.user_id).await?.is_none() {
            return Err(PatientServiceError::NotFound(PROFILE_NOT_FOUND.to_string()));
        }

        Ok(self
            .records
            .create_record(&user.user_id, request.into_document())
            .await?)
    }

    async fn medical_records(
        &self,
        user: &UserInfo,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, PatientServiceError> {
        Ok(self.records.get_patient_records(&user.user_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{Inbox, MailError, MockMailClientTrait};
    use care_connector_data::repository::TableRepository;
    use mockall::predicate::function;
    use serde_json::json;

    fn user() -> UserInfo {
        UserInfo::new("auth0|pat")
            .with_email("pat@example.com")
            .with_name("Pat Example")
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    fn quiet_mail() -> MockMailClientTrait {
        let mut mail = MockMailClientTrait::new();
        mail.expect_create_inbox()
            .returning(|_| Err(MailError::NotConfigured));
        mail.expect_send_message().returning(|_| Err(MailError::NotConfigured));
        mail
    }

    fn service(mail: MockMailClientTrait) -> PatientService {
        PatientService::new(Arc::new(TableRepository::in_memory()), Arc::new(mail))
    }

    fn valid_body() -> Document {
        doc(json!({
            "personal_info": {
                "date_of_birth": "1990-04-01",
                "gender": "female",
                "phone": "555-0100",
                "address": "1 Main St",
                "emergency_contact": {"name": "Sam", "phone": "555-0101", "relationship": "sibling"}
            },
            "medical_info": {"allergies": ["penicillin"], "insurance": {"provider": "Acme"}},
            "agent_email": "care@agentmail.to"
        }))
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let service = service(quiet_mail());

        let first = service.initialize(&user()).await.unwrap();
        assert!(first.created);
        assert_eq!(first.profile["name"], json!("Pat Example"));
        assert_eq!(first.profile["profile_complete"], json!(false));
        assert_eq!(first.profile["preferences"]["communication_method"], json!("email"));

        let second = service.initialize(&user()).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.profile["ItemId"], first.profile["ItemId"]);
    }

    #[tokio::test]
    async fn test_initialize_defaults_name() {
        let service = service(quiet_mail());
        let init = service.initialize(&UserInfo::new("auth0|anon")).await.unwrap();
        assert_eq!(init.profile["name"], json!("User"));
        assert_eq!(init.profile["email"], json!(""));
    }

    #[tokio::test]
    async fn test_create_profile_validation_messages() {
        let service = service(quiet_mail());

        let err = service.create_profile(&user(), doc(json!({"x": 1}))).await.unwrap_err();
        assert_eq!(err.to_string(), "Personal information is required");

        let err = service
            .create_profile(&user(), doc(json!({"personal_info": {"gender": "f"}})))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required personal information: date_of_birth, phone, address"
        );

        let mut body = valid_body();
        body["personal_info"]["emergency_contact"] = json!({"name": "Sam"});
        let err = service.create_profile(&user(), body).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required emergency contact information: phone, relationship"
        );
    }

    #[tokio::test]
    async fn test_create_profile_stores_merged_profile_with_inbox() {
        let mut mail = MockMailClientTrait::new();
        mail.expect_create_inbox()
            .with(function(|req: &CreateInboxRequest| {
                req.display_name.as_deref() == Some("Pat Example")
                    && req.client_id.as_deref() == Some("auth0|pat")
            }))
            .times(1)
            .returning(|_| {
                Ok(Inbox {
                    inbox_id: "pat@agentmail.to".into(),
                    display_name: Some("Pat Example".into()),
                    client_id: None,
                    extra: Default::default(),
                })
            });
        mail.expect_send_message()
            .with(function(|m: &OutgoingMessage| {
                m.to == "pat@example.com"
                    && m.subject == "Welcome to CareConnector!"
                    && m.template_id.as_deref() == Some("welcome_template")
            }))
            .times(1)
            .returning(|_| Ok(()));

        let service = service(mail);
        let profile = service.create_profile(&user(), valid_body()).await.unwrap();

        assert_eq!(profile["agentmail_inbox"]["inbox_id"], json!("pat@agentmail.to"));
        assert_eq!(profile["medical_info"]["insurance"]["policy_number"], json!(""));
        assert_eq!(profile["medical_info"]["allergies"], json!(["penicillin"]));
        assert_eq!(profile["preferences"]["appointment_reminders"], json!(true));
        assert_eq!(profile["GSI1PK"], json!("AGENT#care@agentmail.to"));

        let by_agent = service.patients_by_agent("care@agentmail.to").await.unwrap();
        assert_eq!(by_agent.len(), 1);
    }

    #[tokio::test]
    async fn test_create_profile_completes_initialized_stub() {
        let service = service(quiet_mail());
        let init = service.initialize(&user()).await.unwrap();

        let profile = service.create_profile(&user(), valid_body()).await.unwrap();
        assert_eq!(profile["profile_complete"], json!(true));
        assert_eq!(profile["ItemId"], init.profile["ItemId"]);
        assert_eq!(profile["email"], json!("pat@example.com"));

        let err = service.create_profile(&user(), valid_body()).await.unwrap_err();
        assert!(matches!(err, PatientServiceError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = service(quiet_mail());

        let err = service.update_profile(&user(), Document::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "No update data provided");

        let err = service
            .update_profile(&user(), doc(json!({"preferences": {}})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Profile not found");

        service.create_profile(&user(), valid_body()).await.unwrap();
        let updated = service
            .update_profile(
                &user(),
                doc(json!({"user_id": "someone-else", "PK": "PATIENT#x", "agent_email": "", "phone_verified": true})),
            )
            .await
            .unwrap();

        assert_eq!(updated["user_id"], json!("auth0|pat"));
        assert_eq!(updated["PK"], json!("PATIENT#auth0|pat"));
        assert_eq!(updated["phone_verified"], json!(true));
        assert!(!updated.contains_key("GSI1PK"));
        assert!(service.patients_by_agent("care@agentmail.to").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_profile() {
        let service = service(quiet_mail());
        service.initialize(&user()).await.unwrap();

        service.delete_profile(&user()).await.unwrap();
        let err = service.delete_profile(&user()).await.unwrap_err();
        assert!(matches!(err, PatientServiceError::NotFound(_)));
        assert!(matches!(
            service.get_profile(&user()).await,
            Err(PatientServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_medical_records() {
        let service = service(quiet_mail());
        let request = CreateMedicalRecordRequest {
            record_type: "visit_summary".into(),
            title: Some("Annual checkup".into()),
            provider: Some("Dr. Sarah Johnson".into()),
            date: Some("2025-08-15".into()),
            notes: None,
            details: None,
        };

        let err = service.add_medical_record(&user(), request.clone()).await.unwrap_err();
        assert!(matches!(err, PatientServiceError::NotFound(_)));

        service.initialize(&user()).await.unwrap();
        let record = service.add_medical_record(&user(), request).await.unwrap();
        assert_eq!(record["EntityType"], json!("MedicalRecord"));

        let records = service.medical_records(&user(), Some(10)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["title"], json!("Annual checkup"));

        let invalid = CreateMedicalRecordRequest {
            record_type: String::new(),
            title: None,
            provider: None,
            date: None,
            notes: None,
            details: None,
        };
        let err = service.add_medical_record(&user(), invalid).await.unwrap_err();
        assert_eq!(err.to_string(), "Record type is required");
    }
}
