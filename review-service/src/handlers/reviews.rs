use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::ApiError;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::*;
use crate::AppState;

/// Organizer reviews an artist
pub async fn leave_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LeaveReviewRequest>,
) -> Result<(StatusCode, Json<ReviewView>), ApiError> {
    let user_id = claims.require_organizer()?;
    let review = state.review_service.leave_review(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn my_reviews(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MyReviewsResponse>, ApiError> {
    let user_id = claims.user_id()?;
    Ok(Json(
        state.review_service.my_reviews(user_id, claims.user_type).await?,
    ))
}

pub async fn respond(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<ResponseTextRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    let user_id = claims.require_artist()?;
    let response = state
        .review_service
        .respond(user_id, review_id, &req.response_text)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn edit_response(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(response_id): Path<Uuid>,
    Json(req): Json<ResponseTextRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let user_id = claims.require_artist()?;
    Ok(Json(
        state
            .review_service
            .edit_response(user_id, response_id, &req.response_text)
            .await?,
    ))
}

/// Vote a review helpful or not; a second vote replaces the first.
pub async fn mark_helpful(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<HelpfulRequest>,
) -> Result<Json<HelpfulResponse>, ApiError> {
    let user_id = claims.user_id()?;
    Ok(Json(
        state
            .review_service
            .mark_helpful(user_id, review_id, req.is_helpful)
            .await?,
    ))
}

/// Public, paginated reviews of one artist with their rating breakdown
pub async fn artist_reviews(
    State(state): State<Arc<AppState>>,
    Path(artist_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<Json<ArtistReviewsResponse>, ApiError> {
    Ok(Json(
        state
            .review_service
            .artist_reviews(artist_id, params.page.as_deref())
            .await?,
    ))
}

pub async fn event_types() -> Json<Vec<EventTypeChoice>> {
    Json(
        EventType::ALL
            .iter()
            .map(|t| EventTypeChoice {
                value: t.as_str(),
                label: t.label(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_types_lists_every_choice() {
        let Json(choices) = event_types().await;
        assert_eq!(choices.len(), EventType::ALL.len());
        assert_eq!(choices[0].value, "wedding_traditional");
        assert_eq!(choices[0].label, "Mariage traditionnel");
        assert_eq!(choices.last().map(|c| c.value), Some("other"));
    }
}
