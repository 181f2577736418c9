use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::types::ApiError;
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::locations::{Choice, MAJOR_CITIES, REGIONS};
use crate::models::*;
use crate::AppState;

pub async fn list_genres(State(state): State<Arc<AppState>>) -> Result<Json<ReferenceList>, ApiError> {
    Ok(Json(state.reference_service.list(ReferenceKind::Genre).await?))
}

pub async fn list_roles(State(state): State<Arc<AppState>>) -> Result<Json<ReferenceList>, ApiError> {
    Ok(Json(state.reference_service.list(ReferenceKind::Role).await?))
}

pub async fn list_instruments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReferenceList>, ApiError> {
    Ok(Json(state.reference_service.list(ReferenceKind::Instrument).await?))
}

#[derive(Debug, Serialize)]
pub struct LocationsResponse {
    pub regions: &'static [Choice],
    pub cities: &'static [Choice],
}

/// Region and city choices for the search form
pub async fn list_locations() -> Json<LocationsResponse> {
    Json(LocationsResponse {
        regions: REGIONS,
        cities: MAJOR_CITIES,
    })
}

// Staff only, enforced by the router.

async fn create(
    state: &AppState,
    kind: ReferenceKind,
    req: CreateReferenceRequest,
) -> Result<(StatusCode, Json<ReferenceItem>), ApiError> {
    let item = state.reference_service.create(kind, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn create_genre(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReferenceRequest>,
) -> Result<(StatusCode, Json<ReferenceItem>), ApiError> {
    create(&state, ReferenceKind::Genre, req).await
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReferenceRequest>,
) -> Result<(StatusCode, Json<ReferenceItem>), ApiError> {
    create(&state, ReferenceKind::Role, req).await
}

pub async fn create_instrument(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReferenceRequest>,
) -> Result<(StatusCode, Json<ReferenceItem>), ApiError> {
    create(&state, ReferenceKind::Instrument, req).await
}

pub async fn update_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReferenceRequest>,
) -> Result<Json<ReferenceItem>, ApiError> {
    Ok(Json(state.reference_service.update(ReferenceKind::Genre, id, req).await?))
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReferenceRequest>,
) -> Result<Json<ReferenceItem>, ApiError> {
    Ok(Json(state.reference_service.update(ReferenceKind::Role, id, req).await?))
}

pub async fn update_instrument(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReferenceRequest>,
) -> Result<Json<ReferenceItem>, ApiError> {
    Ok(Json(
        state
            .reference_service
            .update(ReferenceKind::Instrument, id, req)
            .await?,
    ))
}
