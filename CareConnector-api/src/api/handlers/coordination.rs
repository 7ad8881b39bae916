use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use tracing::{debug, info, instrument};

use care_connector_domain::auth::UserInfo;
use care_connector_domain::entities::{Appointment, DashboardStats, MessageSummary, Provider};
use care_connector_domain::services::ProviderFilter;

use crate::api::state::AppState;
use crate::entities::common::{json_object, ApiError, ErrorBody, MessageBody};
use crate::entities::responses::{AppointmentResponse, MessageSentResponse, ProviderParams};

/// Upcoming appointments of the signed-in user
#[utoipa::path(
    get,
    path = "/api/appointments",
    responses((status = 200, description = "Appointments", body = [Appointment])),
    security(("bearer" = [])),
    tag = "coordination"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Json<Vec<Appointment>> {
    Json(state.coordination.appointments(&user))
}

/// Book an appointment
#[utoipa::path(
    post,
    path = "/api/appointments",
    request_body = Object,
    responses(
        (status = 201, description = "Appointment booked", body = AppointmentResponse),
        (status = 400, description = "Missing field", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "coordination"
)]
#[instrument(skip(state, user, body), fields(user_id = %user.user_id))]
pub async fn create_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let data = json_object(&body, "No appointment data provided")?;
    let appointment = state.coordination.book_appointment(&user, &data).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Appointment created successfully", "appointment": appointment })),
    ))
}

/// Messages of the signed-in user
#[utoipa::path(
    get,
    path = "/api/messages",
    responses((status = 200, description = "Messages", body = [MessageSummary])),
    security(("bearer" = [])),
    tag = "coordination"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Json<Vec<MessageSummary>> {
    Json(state.coordination.messages(&user))
}

/// Send a message to a provider
#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = Object,
    responses(
        (status = 201, description = "Message sent", body = MessageSentResponse),
        (status = 400, description = "Missing field", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "coordination"
)]
#[instrument(skip(state, user, body), fields(user_id = %user.user_id))]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let data = json_object(&body, "No message data provided")?;
    let message = state.coordination.send_message(&user, &data).await?;
    info!("Message sent by {}", user.user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Message sent successfully", "message_data": message })),
    ))
}

/// Provider directory
#[utoipa::path(
    get,
    path = "/api/providers",
    params(ProviderParams),
    responses((status = 200, description = "Matching providers", body = [Provider])),
    security(("bearer" = [])),
    tag = "coordination"
)]
#[instrument(skip(state, _user))]
pub async fn list_providers(
    State(state): State<AppState>,
    Extension(_user): Extension<UserInfo>,
    Query(params): Query<ProviderParams>,
) -> Json<Vec<Provider>> {
    let filter = ProviderFilter {
        location: params.location.filter(|l| !l.is_empty()),
        specialty: params.specialty.filter(|s| !s.is_empty()),
    };
    let providers = state.coordination.providers(&filter);
    debug!("{} providers match {:?}", providers.len(), filter);
    Json(providers)
}

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses((status = 200, description = "Dashboard statistics", body = DashboardStats)),
    security(("bearer" = [])),
    tag = "coordination"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Json<DashboardStats> {
    Json(state.coordination.dashboard_stats(&user))
}

/// Email a templated notification to the signed-in user
#[utoipa::path(
    post,
    path = "/api/notifications/send",
    request_body = Object,
    responses(
        (status = 200, description = "Notification sent", body = MessageBody),
        (status = 400, description = "Invalid notification", body = ErrorBody),
        (status = 500, description = "Delivery failed", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "coordination"
)]
#[instrument(skip(state, user, body), fields(user_id = %user.user_id))]
pub async fn send_notification(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    body: Bytes,
) -> Result<Json<MessageBody>, ApiError> {
    let data = json_object(&body, "No notification data provided")?;
    state.coordination.send_notification(&user, &data).await?;

    Ok(Json(MessageBody {
        message: "Notification sent successfully".to_string(),
    }))
}
