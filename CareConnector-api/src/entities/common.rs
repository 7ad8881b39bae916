use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;
use utoipa::ToSchema;

use care_connector_domain::services::{CoordinationError, InboxError, PatientServiceError};

/// Standard error body: `{"error": "..."}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Message-only body, used for acknowledgements and missing profiles
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageBody {
    pub message: String,
}

/// Error returned by a handler
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Key the message is reported under
    key: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            key: "error",
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 404 reported as `{"message": "Patient profile not found"}`
    pub fn profile_not_found() -> Self {
        Self {
            key: "message",
            ..Self::not_found("Patient profile not found")
        }
    }

    /// Map a patient service failure, hiding internals behind `fallback`
    pub fn from_patient(err: PatientServiceError, fallback: &str) -> Self {
        match err {
            PatientServiceError::Validation(msg) => Self::bad_request(msg),
            PatientServiceError::AlreadyExists(msg) => Self::new(StatusCode::CONFLICT, msg),
            PatientServiceError::NotFound(msg) if msg == "Patient profile not found" => {
                Self::profile_not_found()
            }
            PatientServiceError::NotFound(msg) => Self::not_found(msg),
            PatientServiceError::Repository(e) => {
                error!("Repository failure: {}", e);
                Self::internal(fallback)
            }
        }
    }
}

impl From<CoordinationError> for ApiError {
    fn from(err: CoordinationError) -> Self {
        match err {
            CoordinationError::Validation(msg) => Self::bad_request(msg),
            CoordinationError::DeliveryFailed => Self::internal(err.to_string()),
        }
    }
}

impl From<InboxError> for ApiError {
    fn from(err: InboxError) -> Self {
        match err {
            InboxError::NotFound(msg) if msg == "Patient profile not found" => Self::profile_not_found(),
            InboxError::NotFound(msg) => Self::not_found(msg),
            other => {
                error!("Inbox request failed: {}", other);
                Self::new(StatusCode::BAD_GATEWAY, "Failed to reach AgentMail")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert(self.key.to_string(), Value::String(self.message));
        (self.status, Json(Value::Object(body))).into_response()
    }
}

/// Parse a request body as a non-empty JSON object.
///
/// Missing, non-JSON and empty bodies are all rejected with `missing`.
pub fn json_object(body: &[u8], missing: &str) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if !map.is_empty() => Ok(map),
        _ => Err(ApiError::bad_request(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_object() {
        assert!(json_object(br#"{"a": 1}"#, "No data provided").is_ok());

        for body in ["", "{}", "not json", "[1, 2]"] {
            let err = json_object(body.as_bytes(), "No data provided").unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_eq!(err.message, "No data provided");
        }
    }

    #[test]
    fn test_patient_error_mapping() {
        let err = ApiError::from_patient(
            PatientServiceError::NotFound("Patient profile not found".into()),
            "Internal server error",
        );
        assert_eq!(err, ApiError::profile_not_found());

        let err = ApiError::from_patient(
            PatientServiceError::Validation("Personal information is required".into()),
            "Internal server error",
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_delivery_failure_is_500() {
        let err = ApiError::from(CoordinationError::DeliveryFailed);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to send notification");
    }
}
