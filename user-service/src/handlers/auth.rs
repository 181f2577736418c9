use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use shared::auth::Claims;
use shared::types::{ApiError, MessageResponse};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Register a new artist account
pub async fn register_artist(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterArtistRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let response = state.user_service.register_artist(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Register a new organizer account
pub async fn register_organizer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterOrganizerRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let response = state.user_service.register_organizer(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login user
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state.user_service.login(req).await?;
    Ok(Json(response))
}

/// Logout user
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.logout(claims.user_id()?).await?;
    Ok(Json(MessageResponse::new("Successfully logged out")))
}

/// Refresh access token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = state.user_service.refresh_token(&req.refresh_token).await?;
    Ok(Json(response))
}

/// Verify email address from the link sent at registration
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.verify_email(&req.token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// Same as [`verify_email`] for links opened straight from the mailbox.
pub async fn verify_email_link(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.verify_email(&token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

pub async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.resend_verification(claims.user_id()?).await?;
    Ok(Json(MessageResponse::new("Verification email sent")))
}

/// Request password reset
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.forgot_password(req).await?;
    Ok(Json(MessageResponse::new(
        "If an account exists with this email, a password reset link has been sent",
    )))
}

/// Reset password with token
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.reset_password(req).await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.change_password(claims.user_id()?, req).await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}
