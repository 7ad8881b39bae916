use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use care_connector_data::models::Document;

use crate::auth::UserInfo;
use crate::entities::{Appointment, DashboardStats, MessageSummary, NotificationKind, Provider};
use crate::mail::{MailClientTrait, OutgoingMessage};

/// Coordination service errors
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("{0}")]
    Validation(String),

    /// The notification could not be handed to the mail provider
    #[error("Failed to send notification")]
    DeliveryFailed,
}

/// Filters for the provider search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderFilter {
    pub location: Option<String>,
    pub specialty: Option<String>,
}

/// Appointments, messages, providers and notifications
#[async_trait]
pub trait CoordinationServiceTrait: Send + Sync {
    fn appointments(&self, user: &UserInfo) -> Vec<Appointment>;

    async fn book_appointment(&self, user: &UserInfo, body: &Document) -> Result<Value, CoordinationError>;

    fn messages(&self, user: &UserInfo) -> Vec<MessageSummary>;

    async fn send_message(&self, user: &UserInfo, body: &Document) -> Result<Value, CoordinationError>;

    fn providers(&self, filter: &ProviderFilter) -> Vec<Provider>;

    fn dashboard_stats(&self, user: &UserInfo) -> DashboardStats;

    /// Send a templated notification to the user's own email
    async fn send_notification(&self, user: &UserInfo, body: &Document) -> Result<(), CoordinationError>;
}

/// Coordination backed by a fixed catalog
#[derive(Debug, Clone)]
pub struct CoordinationService {
    mail: Arc<dyn MailClientTrait>,
}

fn require(body: &Document, fields: &[&str]) -> Result<(), CoordinationError> {
    match fields.iter().find(|field| !body.contains_key(**field)) {
        Some(field) => Err(CoordinationError::Validation(format!(
            "Missing required field: {}",
            field
        ))),
        None => Ok(()),
    }
}

fn text(body: &Document, field: &str) -> String {
    match body.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl CoordinationService {
    pub fn new(mail: Arc<dyn MailClientTrait>) -> Self {
        Self { mail }
    }

    /// Best effort email to the signed-in user
    async fn notify_user(&self, user: &UserInfo, message: impl FnOnce(&str) -> OutgoingMessage) {
        let Some(email) = user.email.as_deref().filter(|e| !e.is_empty()) else {
            return;
        };
        if let Err(e) = self.mail.send_message(message(email)).await {
            warn!("Email to {} not sent: {}", email, e);
        }
    }

    fn catalog_providers() -> Vec<Provider> {
        vec![
            Provider {
                provider_id: "provider-1".into(),
                name: "Dr. Sarah Johnson".into(),
                specialty: "Family Medicine".into(),
                location: "Ann Arbor, MI".into(),
                rating: 4.8,
                available_times: vec!["9:00 AM".into(), "2:30 PM".into(), "4:00 PM".into()],
                bio: "Board-certified family physician with 15 years of experience.".into(),
            },
            Provider {
                provider_id: "provider-2".into(),
                name: "Dr. Michael Chen".into(),
                specialty: "Cardiology".into(),
                location: "Ann Arbor, MI".into(),
                rating: 4.9,
                available_times: vec!["10:00 AM".into(), "1:00 PM".into(), "3:30 PM".into()],
                bio: "Cardiologist specializing in preventive heart care.".into(),
            },
        ]
    }
}

#[async_trait]
impl CoordinationServiceTrait for CoordinationService {
    fn appointments(&self, _user: &UserInfo) -> Vec<Appointment> {
        vec![
            Appointment {
                id: "1".into(),
                provider_name: "Dr. Sarah Johnson".into(),
                date: "2025-10-02".into(),
                time: "2:30 PM".into(),
                appointment_type: "Annual Checkup".into(),
                status: "upcoming".into(),
                location: "Main Medical Center".into(),
                provider_id: "provider-1".into(),
            },
            Appointment {
                id: "2".into(),
                provider_name: "Dr. Michael Chen".into(),
                date: "2025-10-15".into(),
                time: "10:00 AM".into(),
                appointment_type: "Cardiology Consultation".into(),
                status: "upcoming".into(),
                location: "Specialty Care Building".into(),
                provider_id: "provider-2".into(),
            },
        ]
    }

    async fn book_appointment(&self, user: &UserInfo, body: &Document) -> Result<Value, CoordinationError> {
        require(body, &["provider_id", "date", "time", "type"])?;

        let now = Utc::now().to_rfc3339();
        let appointment = json!({
            "appointment_id": Uuid::new_v4().to_string(),
            "patient_id": user.user_id,
            "provider_id": text(body, "provider_id"),
            "date": text(body, "date"),
            "time": text(body, "time"),
            "type": text(body, "type"),
            "status": "upcoming",
            "location": text(body, "location"),
            "notes": text(body, "notes"),
            "created_at": now,
        });
        info!("Booked appointment {} for {}", appointment["appointment_id"], user.user_id);

        let content = format!(
            "Your appointment for {} on {} at {} has been confirmed.",
            text(body, "type"),
            text(body, "date"),
            text(body, "time")
        );
        self.notify_user(user, |email| {
            OutgoingMessage::new(email, "Appointment Confirmation", content)
                .with_template("appointment_confirmation")
        })
        .await;

        Ok(appointment)
    }

    fn messages(&self, _user: &UserInfo) -> Vec<MessageSummary> {
        vec![
            MessageSummary {
                id: "1".into(),
                sender: "Dr. Sarah Johnson".into(),
                subject: "Lab Results Available".into(),
                preview: "Your recent blood work results are now available for review...".into(),
                timestamp: "2025-09-27T14:30:00Z".into(),
                unread: true,
                message_type: "results".into(),
            },
            MessageSummary {
                id: "2".into(),
                sender: "CareFlow System".into(),
                subject: "Appointment Reminder".into(),
                preview: "This is a reminder for your upcoming appointment on October 2nd...".into(),
                timestamp: "2025-09-26T09:00:00Z".into(),
                unread: false,
                message_type: "appointment".into(),
            },
        ]
    }

    async fn send_message(&self, user: &UserInfo, body: &Document) -> Result<Value, CoordinationError> {
        require(body, &["to", "subject", "content"])?;

        let now = Utc::now().to_rfc3339();
        let message_type = match text(body, "type") {
            t if t.is_empty() => "general".to_string(),
            t => t,
        };
        let message = json!({
            "message_id": Uuid::new_v4().to_string(),
            "patient_id": user.user_id,
            "provider_id": text(body, "to"),
            "timestamp": now,
            "subject": text(body, "subject"),
            "content": text(body, "content"),
            "from": "patient",
            "type": message_type,
            "created_at": now,
        });

        let provider_email = text(body, "provider_email");
        if !provider_email.is_empty() {
            let notification = OutgoingMessage::new(
                provider_email.as_str(),
                format!("New message from patient: {}", text(body, "subject")),
                format!(
                    "You have received a new message from a patient.\n\nSubject: {}\n\nMessage: {}",
                    text(body, "subject"),
                    text(body, "content")
                ),
            )
            .with_template("provider_notification");
            if let Err(e) = self.mail.send_message(notification).await {
                warn!("Provider notification to {} not sent: {}", provider_email, e);
            }
        }

        Ok(message)
    }

    fn providers(&self, filter: &ProviderFilter) -> Vec<Provider> {
        Self::catalog_providers()
            .into_iter()
            .filter(|p| {
                filter
                    .location
                    .as_deref()
                    .map_or(true, |l| contains_ignore_case(&p.location, l))
            })
            .filter(|p| {
                filter
                    .specialty
                    .as_deref()
                    .map_or(true, |s| contains_ignore_case(&p.specialty, s))
            })
            .collect()
    }

    fn dashboard_stats(&self, _user: &UserInfo) -> DashboardStats {
        DashboardStats {
            upcoming_appointments: 2,
            unread_messages: 1,
            active_prescriptions: 3,
            last_visit: "2025-08-15".into(),
            next_appointment: "2025-10-02".into(),
        }
    }

    async fn send_notification(&self, user: &UserInfo, body: &Document) -> Result<(), CoordinationError> {
        require(body, &["type", "recipient"])?;

        let kind = NotificationKind::parse(&text(body, "type"))
            .ok_or_else(|| CoordinationError::Validation("Invalid notification type".to_string()))?;

        let email = user
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(CoordinationError::DeliveryFailed)?;

        let message = OutgoingMessage::new(email, kind.subject(), text(body, "content"))
            .with_template(kind.template_id());

        self.mail.send_message(message).await.map_err(|e| {
            warn!("Notification {} to {} failed: {}", kind.template_id(), email, e);
            CoordinationError::DeliveryFailed
        })?;
        info!("Sent {} notification to {}", kind.template_id(), email);
        Ok(())
    }
}
