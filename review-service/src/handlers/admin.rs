use axum::{
    extract::{Path, State},
    Json,
};
use shared::types::ApiError;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{ModerateReviewRequest, RefreshResponse, ReviewView};
use crate::AppState;

/// Hide, publish or verify a review. Staff only, enforced by the router.
pub async fn moderate(
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<ModerateReviewRequest>,
) -> Result<Json<ReviewView>, ApiError> {
    Ok(Json(state.review_service.moderate(review_id, req).await?))
}

pub async fn refresh_statistics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let artists_updated = state.review_service.refresh_all_statistics().await?;
    Ok(Json(RefreshResponse { artists_updated }))
}
