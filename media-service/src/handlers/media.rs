use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use shared::auth::Claims;
use shared::types::{ApiError, MessageResponse};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::*;
use crate::AppState;

/// Upload one file (or a video link) for the calling artist
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MediaFileView>), ApiError> {
    let user_id = claims.require_artist()?;
    let kind: MediaKind = kind.parse()?;
    let form = read_form(multipart).await?;

    let file = state.media_service.upload(user_id, kind, form).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        debug!("Processing field: {}", name);

        if name == "file" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read file: {}", e)))?;
            form.file = Some(UploadedFile {
                filename,
                content_type,
                data: data.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::Validation(format!("Invalid field '{}': {}", name, e)))?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "description" => form.description = Some(value),
            "video_url" => form.video_url = Some(value),
            "document_type" => form.document_type = Some(value),
            "is_profile_picture" => form.is_profile_picture = parse_flag(&value),
            "display_order" => {
                form.display_order = Some(value.trim().parse().map_err(|_| {
                    ApiError::Validation("display_order must be a number".to_string())
                })?)
            }
            _ => debug!("Ignoring unknown field '{}'", name),
        }
    }

    Ok(form)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

/// The caller's files grouped by kind, with quota usage
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MyMediaResponse>, ApiError> {
    let user_id = claims.require_artist()?;
    Ok(Json(state.media_service.list_mine(user_id).await?))
}

pub async fn get_mine(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(media_id): Path<Uuid>,
) -> Result<Json<MediaFileView>, ApiError> {
    let user_id = claims.require_artist()?;
    Ok(Json(state.media_service.get_mine(user_id, media_id).await?))
}

pub async fn quota(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<QuotaStatus>, ApiError> {
    let user_id = claims.require_artist()?;
    Ok(Json(state.media_service.quota_status(user_id).await?))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MediaStats>, ApiError> {
    let user_id = claims.require_artist()?;
    Ok(Json(state.media_service.stats(user_id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(media_id): Path<Uuid>,
    Json(req): Json<UpdateMediaRequest>,
) -> Result<Json<MediaFileView>, ApiError> {
    let user_id = claims.require_artist()?;
    Ok(Json(state.media_service.update(user_id, media_id, req).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(media_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = claims.require_artist()?;
    state.media_service.delete(user_id, media_id).await?;
    Ok(Json(MessageResponse::new("File deleted")))
}

/// Activate, deactivate or delete several of the caller's files at once
pub async fn bulk(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkActionRequest>,
) -> Result<Json<BulkActionResponse>, ApiError> {
    let user_id = claims.require_artist()?;
    Ok(Json(state.media_service.bulk(user_id, req).await?))
}

/// Public portfolio of an artist
pub async fn portfolio(
    State(state): State<Arc<AppState>>,
    Path(artist_id): Path<Uuid>,
) -> Result<Json<MediaByKind>, ApiError> {
    Ok(Json(state.media_service.public_portfolio(artist_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" ON "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
