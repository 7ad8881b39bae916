use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Scheduled appointment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Appointment {
    pub id: String,
    pub provider_name: String,
    pub date: String,
    pub time: String,
    #[serde(rename = "type")]
    pub appointment_type: String,
    pub status: String,
    pub location: String,
    pub provider_id: String,
}

/// Inbox entry shown on the messages page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageSummary {
    pub id: String,
    #[serde(rename = "from")]
    pub sender: String,
    pub subject: String,
    pub preview: String,
    pub timestamp: String,
    pub unread: bool,
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Care provider available for booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Provider {
    pub provider_id: String,
    pub name: String,
    pub specialty: String,
    pub location: String,
    pub rating: f64,
    pub available_times: Vec<String>,
    pub bio: String,
}

/// Counters for the patient dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub upcoming_appointments: u32,
    pub unread_messages: u32,
    pub active_prescriptions: u32,
    pub last_visit: String,
    pub next_appointment: String,
}

/// Templated notification emails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    AppointmentReminder,
    TestResults,
    PrescriptionRefill,
}

impl NotificationKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "appointment_reminder" => Some(Self::AppointmentReminder),
            "test_results" => Some(Self::TestResults),
            "prescription_refill" => Some(Self::PrescriptionRefill),
            _ => None,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::AppointmentReminder => "Appointment Reminder - CareFlow",
            Self::TestResults => "Test Results Available - CareFlow",
            Self::PrescriptionRefill => "Prescription Refill Reminder - CareFlow",
        }
    }

    pub fn template_id(&self) -> &'static str {
        match self {
            Self::AppointmentReminder => "appointment_reminder",
            Self::TestResults => "test_results",
            Self::PrescriptionRefill => "prescription_refill",
        }
    }
}
