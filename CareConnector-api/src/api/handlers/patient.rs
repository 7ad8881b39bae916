use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use care_connector_domain::auth::UserInfo;
use care_connector_domain::entities::CreateMedicalRecordRequest;

use crate::api::state::AppState;
use crate::entities::common::{json_object, ApiError, ErrorBody, MessageBody};
use crate::entities::responses::{LimitParams, ProfileResponse, RecordResponse};

/// Create the initial profile for the signed-in user
#[utoipa::path(
    post,
    path = "/api/patient/initialize",
    responses(
        (status = 201, description = "User initialized", body = ProfileResponse),
        (status = 200, description = "User already initialized", body = ProfileResponse),
        (status = 500, description = "Initialization failed", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "patient"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn initialize_patient(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<impl IntoResponse, ApiError> {
    let init = state.patients.initialize(&user).await.map_err(|e| {
        error!("Error initializing user {}: {}", user.user_id, e);
        ApiError::internal("Failed to initialize user")
    })?;

    let (status, message) = if init.created {
        (StatusCode::CREATED, "User initialized successfully")
    } else {
        (StatusCode::OK, "User already initialized")
    };

    Ok((
        status,
        Json(json!({ "message": message, "profile": init.profile })),
    ))
}

/// Get the signed-in user's profile
#[utoipa::path(
    get,
    path = "/api/patient/profile",
    responses(
        (status = 200, description = "Patient profile", body = Object),
        (status = 404, description = "No profile", body = MessageBody)
    ),
    security(("bearer" = [])),
    tag = "patient"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<Value>, ApiError> {
    let profile = state
        .patients
        .get_profile(&user)
        .await
        .map_err(|e| ApiError::from_patient(e, "Internal server error"))?;
    Ok(Json(Value::Object(profile)))
}

/// Create or complete the signed-in user's profile
#[utoipa::path(
    post,
    path = "/api/patient/profile",
    request_body = Object,
    responses(
        (status = 201, description = "Profile created", body = ProfileResponse),
        (status = 400, description = "Invalid profile", body = ErrorBody),
        (status = 409, description = "Profile already exists", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "patient"
)]
#[instrument(skip(state, user, body), fields(user_id = %user.user_id))]
pub async fn create_profile(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let data = json_object(&body, "No data provided")?;

    let profile = state
        .patients
        .create_profile(&user, data)
        .await
        .map_err(|e| ApiError::from_patient(e, "Internal server error"))?;
    info!("Profile created for {}", user.user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Profile created successfully", "profile": profile })),
    ))
}

/// Update the signed-in user's profile
#[utoipa::path(
    put,
    path = "/api/patient/profile",
    request_body = Object,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "No update data", body = ErrorBody),
        (status = 404, description = "Profile not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "patient"
)]
#[instrument(skip(state, user, body), fields(user_id = %user.user_id))]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let updates = json_object(&body, "No update data provided")?;

    let profile = state
        .patients
        .update_profile(&user, updates)
        .await
        .map_err(|e| ApiError::from_patient(e, "Internal server error"))?;

    Ok(Json(json!({ "message": "Profile updated successfully", "profile": profile })))
}

/// Delete the signed-in user's profile
#[utoipa::path(
    delete,
    path = "/api/patient/profile",
    responses(
        (status = 200, description = "Profile deleted", body = MessageBody),
        (status = 404, description = "No profile", body = MessageBody)
    ),
    security(("bearer" = [])),
    tag = "patient"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<MessageBody>, ApiError> {
    state
        .patients
        .delete_profile(&user)
        .await
        .map_err(|e| ApiError::from_patient(e, "Internal server error"))?;

    Ok(Json(MessageBody {
        message: "Profile deleted successfully".to_string(),
    }))
}

/// Patients assigned to an agent mailbox
#[utoipa::path(
    get,
    path = "/api/patients/by-agent/{agent_email}",
    params(("agent_email" = String, Path, description = "Agent mailbox address")),
    responses(
        (status = 200, description = "Assigned patients", body = [Object]),
        (status = 400, description = "Invalid agent email", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "patient"
)]
#[instrument(skip(state, _user))]
pub async fn patients_by_agent(
    State(state): State<AppState>,
    Extension(_user): Extension<UserInfo>,
    Path(agent_email): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let patients = state
        .patients
        .patients_by_agent(&agent_email)
        .await
        .map_err(|e| ApiError::from_patient(e, "Internal server error"))?;

    Ok(Json(patients.into_iter().map(Value::Object).collect()))
}

/// Medical records of the signed-in user, newest first
#[utoipa::path(
    get,
    path = "/api/patient/records",
    params(LimitParams),
    responses((status = 200, description = "Medical records", body = [Object])),
    security(("bearer" = [])),
    tag = "patient"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_records(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let records = state
        .patients
        .medical_records(&user, params.limit)
        .await
        .map_err(|e| ApiError::from_patient(e, "Internal server error"))?;

    Ok(Json(records.into_iter().map(Value::Object).collect()))
}

/// Add a medical record for the signed-in user
#[utoipa::path(
    post,
    path = "/api/patient/records",
    request_body = CreateMedicalRecordRequest,
    responses(
        (status = 201, description = "Record created", body = RecordResponse),
        (status = 400, description = "Invalid record", body = ErrorBody),
        (status = 404, description = "No profile", body = MessageBody)
    ),
    security(("bearer" = [])),
    tag = "patient"
)]
#[instrument(skip(state, user, body), fields(user_id = %user.user_id))]
pub async fn create_record(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let data = json_object(&body, "No record data provided")?;
    let request: CreateMedicalRecordRequest = serde_json::from_value(Value::Object(data))
        .map_err(|e| ApiError::bad_request(format!("Invalid medical record: {}", e)))?;

    let record = state
        .patients
        .add_medical_record(&user, request)
        .await
        .map_err(|e| ApiError::from_patient(e, "Internal server error"))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Medical record created successfully", "record": record })),
    ))
}
