use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::ApiError;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::*;
use crate::AppState;

/// Artist emails a past client a single-use review link
pub async fn request_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RequestReviewRequest>,
) -> Result<(StatusCode, Json<ReviewRequestView>), ApiError> {
    let user_id = claims.require_artist()?;
    let request = state.review_service.request_review(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Anyone holding the link may look at it, even once it expired.
pub async fn get_public_request(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
) -> Result<Json<PublicRequestView>, ApiError> {
    Ok(Json(state.review_service.get_public_request(token).await?))
}

pub async fn submit_public_review(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
    Json(req): Json<PublicReviewRequest>,
) -> Result<(StatusCode, Json<ReviewView>), ApiError> {
    let review = state.review_service.submit_public_review(token, req).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
