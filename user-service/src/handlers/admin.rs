use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::types::{ApiError, PaginatedResponse};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::*;
use crate::AppState;

// Staff access is enforced by the `require_staff` layer on these routes.

/// List all users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserPublic>>, ApiError> {
    let users = state.user_service.list_users(query).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = state.user_service.get_user(user_id).await?;
    Ok(Json(user))
}

/// Suspend user account
pub async fn suspend_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = state.user_service.set_active(user_id, false).await?;
    Ok(Json(user))
}

/// Activate user account
pub async fn activate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = state.user_service.set_active(user_id, true).await?;
    Ok(Json(user))
}

pub async fn verify_user_email(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = state.user_service.mark_email_verified(user_id).await?;
    Ok(Json(user))
}
