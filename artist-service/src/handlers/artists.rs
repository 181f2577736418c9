use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::HeaderMap,
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::{ApiError, PaginatedResponse};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::visitor;
use crate::models::*;
use crate::AppState;

/// All artists, 12 per page
pub async fn list_artists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<PaginatedResponse<ArtistCard>>, ApiError> {
    let artists = state.artist_service.list_artists(params.page.as_deref()).await?;
    Ok(Json(artists))
}

/// Filtered search with sidebar statistics
pub async fn search_artists(
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    claims: Option<Extension<Claims>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let visitor = visitor(&headers, remote, claims.map(|Extension(c)| c));
    let response = state.artist_service.search_artists(params, &visitor).await?;
    Ok(Json(response))
}

/// Autocomplete for the navigation bar
pub async fn quick_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QuickSearchParams>,
) -> Result<Json<QuickSearchResponse>, ApiError> {
    let response = state.artist_service.quick_search(params.q.as_deref()).await?;
    Ok(Json(response))
}

/// Artist profile page
pub async fn get_artist(
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    claims: Option<Extension<Claims>>,
    Path(artist_id): Path<Uuid>,
) -> Result<Json<ArtistDetail>, ApiError> {
    let visitor = visitor(&headers, remote, claims.map(|Extension(c)| c));
    let artist = state.artist_service.get_artist(artist_id, &visitor).await?;
    Ok(Json(artist))
}

/// Genres, roles and instruments of the calling artist
pub async fn my_tags(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ArtistTags>, ApiError> {
    let user_id = claims.require_artist()?;
    let (artist_id, _) = state.artist_service.artist_for_user(user_id).await?;
    let tags = state.artist_service.tags_for(artist_id).await?;
    Ok(Json(tags))
}

async fn set_tags(
    state: &AppState,
    claims: &Claims,
    kind: ReferenceKind,
    ids: Vec<Uuid>,
) -> Result<Json<ArtistTags>, ApiError> {
    let user_id = claims.require_artist()?;
    state.reference_service.set_my_tags(user_id, kind, ids).await?;
    let (artist_id, _) = state.artist_service.artist_for_user(user_id).await?;
    Ok(Json(state.artist_service.tags_for(artist_id).await?))
}

pub async fn set_my_genres(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetTagsRequest>,
) -> Result<Json<ArtistTags>, ApiError> {
    set_tags(&state, &claims, ReferenceKind::Genre, req.ids).await
}

pub async fn set_my_roles(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetTagsRequest>,
) -> Result<Json<ArtistTags>, ApiError> {
    set_tags(&state, &claims, ReferenceKind::Role, req.ids).await
}

pub async fn set_my_instruments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetInstrumentsRequest>,
) -> Result<Json<ArtistTags>, ApiError> {
    let user_id = claims.require_artist()?;
    state
        .reference_service
        .set_my_instruments(user_id, req.instruments)
        .await?;
    let (artist_id, _) = state.artist_service.artist_for_user(user_id).await?;
    Ok(Json(state.artist_service.tags_for(artist_id).await?))
}
