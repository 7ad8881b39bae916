//! Authentication module for CareConnector
//!
//! Bearer-token middleware for protected endpoints. Tokens are checked by a
//! [`TokenVerifier`]; production uses [`auth0::Auth0Verifier`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::auth::logging::{log_auth_event, AuthEvent, AuthEventType};

pub mod auth0;
pub mod logging;

/// User information extracted from authenticated requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    /// Subject of the token (Auth0 user ID)
    pub user_id: String,
    /// Email claim, if present
    pub email: Option<String>,
    /// Display name claim, if present
    pub name: Option<String>,
    /// Profile picture URL, if present
    pub picture: Option<String>,
    /// Permissions granted to the token
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Authentication source (e.g. "auth0")
    pub auth_source: String,
}

impl UserInfo {
    /// User with only an ID, mainly for tests and tooling
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            name: None,
            picture: None,
            permissions: Vec::new(),
            auth_source: "static".to_string(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Authentication failures, rendered as `{code, description}`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is expected.")]
    HeaderMissing,

    #[error("Authorization header must start with \"Bearer\".")]
    InvalidScheme,

    #[error("Token not found.")]
    TokenNotFound,

    #[error("Authorization header must be bearer token.")]
    NotBearerToken,

    #[error("Authorization malformed.")]
    MissingKeyId,

    #[error("Unable to find appropriate key.")]
    KeyNotFound,

    #[error("Token expired.")]
    Expired,

    #[error("Incorrect claims. Please, check the audience and issuer.")]
    InvalidClaims,

    #[error("Unable to parse authentication token.")]
    Unparseable,

    #[error("Unable to validate token.")]
    Unavailable(String),
}

impl AuthError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::HeaderMissing => "authorization_header_missing",
            AuthError::Expired => "token_expired",
            AuthError::InvalidClaims => "invalid_claims",
            AuthError::Unavailable(_) => "invalid_token",
            _ => "invalid_header",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unparseable => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.code(),
            "description": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let header_value = header_value.ok_or(AuthError::HeaderMissing)?;
    let parts: Vec<&str> = header_value.split_whitespace().collect();

    match parts.as_slice() {
        [] => Err(AuthError::HeaderMissing),
        [scheme, ..] if !scheme.eq_ignore_ascii_case("bearer") => Err(AuthError::InvalidScheme),
        [_] => Err(AuthError::TokenNotFound),
        [_, token] => Ok(*token),
        _ => Err(AuthError::NotBearerToken),
    }
}

/// Verifies bearer tokens and resolves the calling user
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a raw token
    async fn verify(&self, token: &str) -> Result<UserInfo, AuthError>;

    /// Name used in auth logs
    fn method(&self) -> &'static str {
        "jwt"
    }
}

/// Authentication middleware for protected routes
///
/// Inserts the verified [`UserInfo`] into the request extensions.
pub async fn auth_middleware(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let request_path = req.uri().path().to_string();
    let start_time = Instant::now();

    let header_value = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => match value.to_str() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Authorization header is not valid UTF-8");
                return reject(AuthError::NotBearerToken, &request_path, start_time, verifier.method());
            }
        },
        None => None,
    };

    let token = match bearer_token(header_value) {
        Ok(token) => token.to_string(),
        Err(err) => {
            debug!("Rejected Authorization header on {}: {}", request_path, err);
            return reject(err, &request_path, start_time, verifier.method());
        }
    };

    match verifier.verify(&token).await {
        Ok(user_info) => {
            let event = AuthEvent::new(AuthEventType::TokenValidation, Some(&user_info.user_id), true)
                .with_details("Token validation successful")
                .with_resource(request_path)
                .with_duration(start_time.elapsed().as_millis() as u64)
                .with_auth_method(verifier.method());
            log_auth_event(event);

            req.extensions_mut().insert(user_info);
            next.run(req).await
        }
        Err(err) => {
            if let AuthError::Unavailable(reason) = &err {
                warn!("Token could not be validated: {}", reason);
            }
            reject(err, &request_path, start_time, verifier.method())
        }
    }
}

fn reject(err: AuthError, resource: &str, start_time: Instant, method: &str) -> Response {
    let event_type = match err {
        AuthError::HeaderMissing => AuthEventType::MissingCredentials,
        AuthError::InvalidScheme | AuthError::TokenNotFound | AuthError::NotBearerToken => {
            AuthEventType::MalformedHeader
        }
        _ => AuthEventType::TokenValidation,
    };

    let event = AuthEvent::new(event_type, None, false)
        .with_details(format!("{}: {}", err.code(), err))
        .with_resource(resource)
        .with_duration(start_time.elapsed().as_millis() as u64)
        .with_auth_method(method);
    log_auth_event(event);

    err.into_response()
}

/// Configure CORS and security headers for the application
pub fn configure_auth(app: Router, allowed_origins: &[String]) -> Router {
    use tower_http::cors::CorsLayer;
    use tower_http::set_header::SetResponseHeaderLayer;

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    app.layer(cors).layer(security_headers)
}
