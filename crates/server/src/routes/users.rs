use crate::auth::Principal;
use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::SubjectInfo;

/// Create-user request; `user_id` is generated when absent.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
}

/// The caller's own identity, joined with its registry entry when one exists.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub tenant_id: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub face_registered: bool,
}

/// Profile of the authenticated caller; open to non-admin tokens.
pub async fn user_info(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
) -> ServerResult<impl IntoResponse> {
    let subject = state
        .engine
        .registry()
        .get(&principal.tenant_id, &principal.user_id)
        .await?
        .filter(SubjectInfo::is_active);
    Ok(Json(UserProfile {
        display_name: subject.as_ref().map(|s| s.display_name.clone()),
        face_registered: subject.is_some_and(|s| s.face_registered),
        user_id: principal.user_id,
        tenant_id: principal.tenant_id,
        is_admin: principal.is_admin,
    }))
}

/// Active users of the caller's tenant.
pub async fn list_users(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
) -> ServerResult<impl IntoResponse> {
    let users: Vec<SubjectInfo> = state
        .engine
        .registry()
        .list(&principal.tenant_id)
        .await?
        .into_iter()
        .filter(SubjectInfo::is_active)
        .collect();
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let user = state
        .engine
        .registry()
        .get(&principal.tenant_id, &user_id)
        .await?
        .filter(SubjectInfo::is_active)
        .ok_or_else(|| ServerError::NotFound(format!("user {user_id} not found")))?;
    Ok(Json(user))
}

pub async fn create_user(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(request) = payload?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ServerError::Validation("name must not be empty".to_string()));
    }
    let user_id = request
        .user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let user = state
        .engine
        .registry()
        .register(&principal.tenant_id, &user_id, name)
        .await?;
    tracing::info!(tenant_id = %principal.tenant_id, user_id = %user_id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Change a user's display name.
pub async fn update_user(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(request) = payload?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ServerError::Validation("name must not be empty".to_string()));
    }
    let user = state
        .engine
        .registry()
        .rename(&principal.tenant_id, &user_id, name)
        .await?;
    tracing::info!(tenant_id = %principal.tenant_id, user_id = %user_id, "user renamed");
    Ok(Json(user))
}

/// Soft-delete a user and the user's face embedding.
pub async fn delete_user(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let tenant_id = principal.tenant_id.as_str();
    if !state.engine.registry().mark_deleted(tenant_id, &user_id).await? {
        return Err(ServerError::NotFound(format!("user {user_id} not found")));
    }
    let face_removed = state.engine.store().mark_deleted(tenant_id, &user_id).await?;
    tracing::info!(tenant_id, user_id = %user_id, face_removed, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
