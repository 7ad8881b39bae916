use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Types of authentication events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthEventType {
    /// Bearer token verification
    TokenValidation,
    /// Request without an Authorization header
    MissingCredentials,
    /// Authorization header that is not a single bearer token
    MalformedHeader,
    /// Signing keys fetched from the identity provider
    JwksRefresh,
}

impl std::fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthEventType::TokenValidation => write!(f, "TOKEN_VALIDATION"),
            AuthEventType::MissingCredentials => write!(f, "MISSING_CREDENTIALS"),
            AuthEventType::MalformedHeader => write!(f, "MALFORMED_HEADER"),
            AuthEventType::JwksRefresh => write!(f, "JWKS_REFRESH"),
        }
    }
}

/// Authentication event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Type of authentication event
    pub event_type: AuthEventType,
    /// User ID (if available)
    pub user_id: Option<String>,
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    /// Whether the event was successful
    pub success: bool,
    /// Additional details about the event
    pub details: Option<String>,
    /// The resource being accessed (if applicable)
    pub resource: Option<String>,
    /// Duration of the operation in milliseconds (if applicable)
    pub duration_ms: Option<u64>,
    /// Authentication method used
    pub auth_method: Option<String>,
}

impl AuthEvent {
    /// Create a new authentication event
    pub fn new(event_type: AuthEventType, user_id: Option<&str>, success: bool) -> Self {
        Self {
            event_type,
            user_id: user_id.map(String::from),
            timestamp: Utc::now(),
            success,
            details: None,
            resource: None,
            duration_ms: None,
            auth_method: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_auth_method(mut self, auth_method: impl Into<String>) -> Self {
        self.auth_method = Some(auth_method.into());
        self
    }

    /// Single log line for the event
    pub fn log_line(&self) -> String {
        let user_id = self.user_id.as_deref().unwrap_or("anonymous");
        let status = if self.success { "SUCCESS" } else { "FAILURE" };
        let mut line = format!(
            "AUTH-LOG [{}] [{}] [{}] [{}] {}",
            self.event_type,
            user_id,
            status,
            self.timestamp.to_rfc3339(),
            self.details.as_deref().unwrap_or("")
        );

        if let Some(resource) = &self.resource {
            line.push_str(&format!(" resource={}", resource));
        }
        if let Some(method) = &self.auth_method {
            line.push_str(&format!(" method={}", method));
        }
        if let Some(duration) = self.duration_ms {
            line.push_str(&format!(" duration_ms={}", duration));
        }
        line
    }
}

/// Log an authentication event
pub fn log_auth_event(event: AuthEvent) {
    if event.success {
        info!("{}", event.log_line());
    } else {
        warn!("{}", event.log_line());
    }
}

/// Log a signing key refresh for an issuer
pub fn log_jwks_refresh(issuer: &str, success: bool, details: Option<&str>) {
    let mut event = AuthEvent::new(AuthEventType::JwksRefresh, None, success)
        .with_resource(issuer)
        .with_auth_method("auth0");

    if let Some(d) = details {
        event = event.with_details(d);
    }

    log_auth_event(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_auth_event() {
        let event = AuthEvent::new(AuthEventType::TokenValidation, Some("auth0|123"), true)
            .with_details("Token validation successful")
            .with_resource("/api/patient/profile")
            .with_duration(12)
            .with_auth_method("auth0");

        assert_eq!(event.event_type, AuthEventType::TokenValidation);
        assert_eq!(event.user_id.as_deref(), Some("auth0|123"));
        assert!(event.success);
        assert_eq!(event.resource.as_deref(), Some("/api/patient/profile"));
        assert_eq!(event.duration_ms, Some(12));
    }

    #[test]
    fn test_log_line_format() {
        let event = AuthEvent::new(AuthEventType::MissingCredentials, None, false)
            .with_details("authorization_header_missing");
        let line = event.log_line();

        assert!(line.starts_with("AUTH-LOG [MISSING_CREDENTIALS] [anonymous] [FAILURE] ["));
        assert!(line.ends_with("authorization_header_missing"));
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(AuthEventType::TokenValidation.to_string(), "TOKEN_VALIDATION");
        assert_eq!(AuthEventType::MalformedHeader.to_string(), "MALFORMED_HEADER");
        assert_eq!(AuthEventType::JwksRefresh.to_string(), "JWKS_REFRESH");
    }
}
