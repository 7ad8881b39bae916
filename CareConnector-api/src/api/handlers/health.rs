use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use care_connector_domain::health::{ComponentStatus, SystemStatus};

use crate::api::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy", "degraded" or "unhealthy"
    pub status: String,
    /// RFC 3339 time the response was generated
    pub timestamp: String,
    /// Application version from the Cargo manifest
    pub version: String,
    /// Seconds since the server started
    pub uptime: u64,
    pub environment: String,
    /// Status of each collaborator, keyed by name
    pub components: BTreeMap<String, ComponentHealth>,
}

/// Health of one component
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn system_status(status: SystemStatus) -> &'static str {
    match status {
        SystemStatus::Healthy => "healthy",
        SystemStatus::Degraded => "degraded",
        SystemStatus::Unhealthy => "unhealthy",
    }
}

fn component_status(status: ComponentStatus) -> &'static str {
    match status {
        ComponentStatus::Healthy => "healthy",
        ComponentStatus::Degraded => "degraded",
        ComponentStatus::Unhealthy => "unhealthy",
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = "health"
)]
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.health.get_system_health().await;

    let components = health
        .components
        .into_iter()
        .map(|(name, component)| {
            (
                name,
                ComponentHealth {
                    status: component_status(component.status).to_string(),
                    details: component.details,
                },
            )
        })
        .collect();

    let response = HealthResponse {
        status: system_status(health.status).to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.started_at.elapsed().as_secs(),
        environment: state.config.environment.clone(),
        components,
    };

    let code = match health.status {
        SystemStatus::Unhealthy => {
            warn!("Health check reports unhealthy");
            StatusCode::SERVICE_UNAVAILABLE
        }
        status => {
            info!("Health check: {}", system_status(status));
            StatusCode::OK
        }
    };

    (code, Json(response))
}
