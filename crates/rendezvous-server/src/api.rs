use axum::{
    extract::{rejection::JsonRejection, Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rendezvous_common::Error;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::JoinPolicy;
use crate::groups::Group;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupRequest {
    pub user_key: String,
    pub group_key: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    #[serde(default)]
    pub group: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub active_connections: usize,
    pub groups: usize,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::AlreadyExists(_) => StatusCode::CONFLICT,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Malformed(_) => StatusCode::BAD_REQUEST,
        Error::Transport(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Relay error rendered as a JSON error body.
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(error_status(&self.0), self.0.to_string())
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::malformed(rejection.body_text()))
    }
}

/// POST /group
pub async fn create_group(
    State(state): State<AppState>,
    payload: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<Json<Group>, ApiError> {
    let Json(req) = payload?;
    if req.key.trim().is_empty() {
        return Err(Error::malformed("group key must not be empty").into());
    }

    let group = state
        .groups
        .create_group(&req.key, &req.name, &req.members)?;
    Ok(Json(group))
}

/// GET /group?group=KEY
pub async fn get_group(
    State(state): State<AppState>,
    Query(query): Query<GroupQuery>,
) -> Result<Json<Group>, ApiError> {
    let group = state.groups.get_group(&query.group)?;
    Ok(Json(group))
}

/// POST /group/join
///
/// Adds the user to the group, then pushes the new roster to every member
/// that is currently connected.
pub async fn join_group(
    State(state): State<AppState>,
    payload: Result<Json<JoinGroupRequest>, JsonRejection>,
) -> Result<Json<Group>, ApiError> {
    let Json(req) = payload?;
    if req.user_key.trim().is_empty() || req.group_key.trim().is_empty() {
        return Err(Error::malformed("userKey and groupKey are required").into());
    }

    let group = match state.join_policy {
        JoinPolicy::Strict => state.groups.join_group(&req.user_key, &req.group_key)?,
        JoinPolicy::Lenient => state.groups.enter_group(&req.user_key, &req.group_key),
    };

    let delivered = state
        .router
        .broadcast_roster(&req.user_key, &group.members)
        .await;
    if delivered < group.members.len() {
        warn!(
            "roster for group {} reached {} of {} members",
            group.key,
            delivered,
            group.members.len()
        );
    }
    Ok(Json(group))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        active_connections: state.connections.len(),
        groups: state.groups.len(),
    })
}
