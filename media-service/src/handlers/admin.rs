use axum::{extract::State, Json};
use shared::types::ApiError;
use std::sync::Arc;

use crate::models::{BulkActionResponse, ResetOrderRequest};
use crate::AppState;

/// Staff only, enforced by the router.
pub async fn reset_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetOrderRequest>,
) -> Result<Json<BulkActionResponse>, ApiError> {
    Ok(Json(state.media_service.reset_order(req).await?))
}
