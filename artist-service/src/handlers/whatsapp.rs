use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::ApiError;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::handlers::visitor;
use crate::models::*;
use crate::AppState;

/// Message templates, or a straight redirect to WhatsApp with `direct=true`.
pub async fn contact_page(
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    claims: Option<Extension<Claims>>,
    Path(artist_id): Path<Uuid>,
    Query(req): Query<WhatsAppContactRequest>,
) -> Result<Response, ApiError> {
    if req.direct {
        let visitor = visitor(&headers, remote, claims.map(|Extension(c)| c));
        let redirect = state
            .artist_service
            .whatsapp_contact(artist_id, &req, &visitor)
            .await?;
        return Ok((StatusCode::FOUND, [(header::LOCATION, redirect.redirect_url)]).into_response());
    }

    let templates = state.artist_service.whatsapp_templates(artist_id).await?;
    Ok(Json(templates).into_response())
}

/// Record the click and return the wa.me link for the chosen message
pub async fn contact(
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    claims: Option<Extension<Claims>>,
    Path(artist_id): Path<Uuid>,
    Json(req): Json<WhatsAppContactRequest>,
) -> Result<Json<WhatsAppRedirect>, ApiError> {
    let visitor = visitor(&headers, remote, claims.map(|Extension(c)| c));
    let redirect = state
        .artist_service
        .whatsapp_contact(artist_id, &req, &visitor)
        .await?;
    Ok(Json(redirect))
}

/// Contact statistics for the calling artist
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<WhatsAppStats>, ApiError> {
    let user_id = claims.require_artist()?;
    let stats = state.artist_service.whatsapp_stats(user_id).await?;
    Ok(Json(stats))
}
