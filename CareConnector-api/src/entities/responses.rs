use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

/// Profile along with an acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub profile: Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub record: Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AppointmentResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub appointment: Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageSentResponse {
    pub message: String,
    #[schema(value_type = Object)]
    pub message_data: Value,
}

/// Result of `/api/create-inbox`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InboxResponse {
    /// "success" or "error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub inbox: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `?limit=` for record listings
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LimitParams {
    /// Maximum number of records to return
    pub limit: Option<usize>,
}

/// Filters for the provider directory
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProviderParams {
    /// Case-insensitive substring of the provider location
    pub location: Option<String>,
    /// Case-insensitive substring of the provider specialty
    pub specialty: Option<String>,
}
