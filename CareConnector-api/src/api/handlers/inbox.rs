use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use care_connector_domain::auth::UserInfo;
use care_connector_domain::mail::CreateInboxRequest;

use crate::api::state::AppState;
use crate::entities::common::{ApiError, ErrorBody, MessageBody};
use crate::entities::responses::InboxResponse;

fn inbox_error(message: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(InboxResponse {
            status: "error".to_string(),
            inbox: None,
            message: Some(message.into()),
        }),
    )
        .into_response()
}

fn inbox_created(inbox: &impl Serialize) -> Response {
    match serde_json::to_value(inbox) {
        Ok(inbox) => (
            StatusCode::CREATED,
            Json(InboxResponse {
                status: "success".to_string(),
                inbox: Some(inbox),
                message: None,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to serialize created inbox: {}", e);
            inbox_error(format!("Failed to serialize inbox: {}", e))
        }
    }
}

/// Provision an AgentMail inbox
///
/// Every option may be omitted; an empty body creates an inbox with
/// provider defaults.
#[utoipa::path(
    post,
    path = "/api/create-inbox",
    request_body = CreateInboxRequest,
    responses(
        (status = 201, description = "Inbox created", body = InboxResponse),
        (status = 500, description = "Inbox creation failed", body = InboxResponse)
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
#[instrument(skip(state, user, body), fields(user_id = %user.user_id))]
pub async fn create_inbox(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    body: Bytes,
) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        CreateInboxRequest::default()
    } else {
        match serde_json::from_slice::<CreateInboxRequest>(&body) {
            Ok(request) => request,
            Err(e) => return inbox_error(e.to_string()),
        }
    };

    match state.inbox.create_inbox(request).await {
        Ok(inbox) => {
            info!("Inbox {} created for {}", inbox.inbox_id, user.user_id);
            inbox_created(&inbox)
        }
        Err(e) => {
            error!("Inbox creation failed: {}", e);
            inbox_error(e.to_string())
        }
    }
}

/// Messages of the signed-in user's inbox
#[utoipa::path(
    get,
    path = "/api/inbox/messages",
    responses(
        (status = 200, description = "Inbox messages as returned by AgentMail", body = Object),
        (status = 404, description = "No profile or inbox", body = ErrorBody),
        (status = 502, description = "AgentMail unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn inbox_messages(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.inbox.messages(&user).await?))
}

/// Threads of the signed-in user's inbox
#[utoipa::path(
    get,
    path = "/api/inbox/threads",
    responses(
        (status = 200, description = "Inbox threads as returned by AgentMail", body = Object),
        (status = 404, description = "No profile or inbox", body = MessageBody),
        (status = 502, description = "AgentMail unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "inbox"
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn inbox_threads(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.inbox.threads(&user).await?))
}
