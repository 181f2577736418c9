use axum::{
    extract::{Path, State},
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::ApiError;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::*;
use crate::AppState;

/// Get the current user's account and role profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.user_service.get_me(claims.user_id()?).await?;
    Ok(Json(profile))
}

/// Update the current user's account and role profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state.user_service.update_me(claims.user_id()?, req).await?;
    Ok(Json(profile))
}

/// Public organizer page
pub async fn get_organizer(
    State(state): State<Arc<AppState>>,
    Path(organizer_id): Path<Uuid>,
) -> Result<Json<OrganizerPublic>, ApiError> {
    let organizer = state.user_service.get_organizer(organizer_id).await?;
    Ok(Json(organizer))
}
