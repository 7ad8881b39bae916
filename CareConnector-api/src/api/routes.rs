use axum::{
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::debug;

use care_connector_domain::auth::{auth_middleware, configure_auth};

use crate::api::handlers::{coordination, health, inbox, patient};
use crate::api::state::AppState;
use crate::openapi::configure_swagger_routes;

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Resource not found" })),
    )
}

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    debug!("Creating application router");

    // Routes that require a verified bearer token
    let protected_routes = Router::new()
        .route("/api/patient/initialize", post(patient::initialize_patient))
        .route(
            "/api/patient/profile",
            get(patient::get_profile)
                .post(patient::create_profile)
                .put(patient::update_profile)
                .delete(patient::delete_profile),
        )
        .route(
            "/api/patient/records",
            get(patient::list_records).post(patient::create_record),
        )
        .route("/api/patients/by-agent/:agent_email", get(patient::patients_by_agent))
        .route(
            "/api/appointments",
            get(coordination::list_appointments).post(coordination::create_appointment),
        )
        .route(
            "/api/messages",
            get(coordination::list_messages).post(coordination::send_message),
        )
        .route("/api/providers", get(coordination::list_providers))
        .route("/api/dashboard/stats", get(coordination::dashboard_stats))
        .route("/api/notifications/send", post(coordination::send_notification))
        .route("/api/create-inbox", post(inbox::create_inbox))
        .route("/api/inbox/messages", get(inbox::inbox_messages))
        .route("/api/inbox/threads", get(inbox::inbox_threads))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            auth_middleware,
        ));

    debug!("Protected routes configured");

    let public_routes = Router::new().route("/api/health", get(health::health_check));

    let allowed_origins = state.config.cors_origins.clone();

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .with_state(state)
        .merge(configure_swagger_routes());

    debug!("Swagger UI merged");

    let app = configure_auth(app, &allowed_origins).layer(TraceLayer::new_for_http());
    debug!("Security configuration applied");

    app
}
