use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::{Claims, JwtKeys, ACCESS_TOKEN};

/// Extract user claims from the Authorization header
pub async fn require_auth(
    State(keys): State<Arc<JwtKeys>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = access_claims(&keys, request.headers())?;

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Same as [`require_auth`] and additionally requires a staff account
pub async fn require_staff(
    State(keys): State<Arc<JwtKeys>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = access_claims(&keys, request.headers())?;

    if !claims.is_staff {
        return Err(AuthError::InsufficientPermissions);
    }

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Optionally extract user claims (doesn't fail if no token provided)
pub async fn optional_auth(
    State(keys): State<Arc<JwtKeys>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(claims) = access_claims(&keys, request.headers()) {
        request.extensions_mut().insert(claims);
    }

    next.run(request).await
}

fn access_claims(keys: &JwtKeys, headers: &HeaderMap) -> Result<Claims, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    let claims = keys.validate_token(token)?;

    if claims.token_type != ACCESS_TOKEN {
        return Err(AuthError::InvalidTokenType);
    }

    Ok(claims)
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    InvalidTokenType,
    InsufficientPermissions,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidFormat => (StatusCode::UNAUTHORIZED, "Invalid authorization format"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::InvalidTokenType => (StatusCode::UNAUTHORIZED, "Invalid token type"),
            AuthError::InsufficientPermissions => (StatusCode::FORBIDDEN, "Insufficient permissions"),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenSubject;
    use crate::config::JwtConfig;
    use crate::types::UserType;
    use axum::{body::Body, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn keys() -> Arc<JwtKeys> {
        Arc::new(JwtKeys::new(JwtConfig {
            secret: "middleware_test_secret".to_string(),
            access_token_expiry_hours: 1,
            refresh_token_expiry_days: 1,
        }))
    }

    fn token(keys: &JwtKeys, is_staff: bool, refresh: bool) -> String {
        let subject = TokenSubject {
            user_id: Uuid::new_v4(),
            email: "user@example.cm",
            user_type: UserType::Organizer,
            is_staff,
        };
        if refresh {
            keys.generate_refresh_token(&subject).unwrap()
        } else {
            keys.generate_access_token(&subject).unwrap()
        }
    }

    async fn whoami(Extension(claims): Extension<Claims>) -> String {
        claims.email
    }

    async fn maybe(claims: Option<Extension<Claims>>) -> String {
        claims.map(|Extension(c)| c.email).unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(keys: Arc<JwtKeys>) -> Router {
        Router::new()
            .route(
                "/private",
                get(whoami).route_layer(middleware::from_fn_with_state(keys.clone(), require_auth)),
            )
            .route(
                "/staff",
                get(whoami).route_layer(middleware::from_fn_with_state(keys.clone(), require_staff)),
            )
            .route(
                "/public",
                get(maybe).route_layer(middleware::from_fn_with_state(keys, optional_auth)),
            )
    }

    fn get_with(uri: &str, bearer: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(t) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let response = app(keys()).oneshot(get_with("/private", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_access_token_is_accepted() {
        let keys = keys();
        let t = token(&keys, false, false);
        let response = app(keys).oneshot(get_with("/private", Some(&t))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_refresh_token_is_rejected() {
        let keys = keys();
        let t = token(&keys, false, true);
        let response = app(keys).oneshot(get_with("/private", Some(&t))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_staff_route_requires_staff() {
        let keys = keys();
        let regular = token(&keys, false, false);
        let staff = token(&keys, true, false);

        let denied = app(keys.clone()).oneshot(get_with("/staff", Some(&regular))).await.unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let allowed = app(keys).oneshot(get_with("/staff", Some(&staff))).await.unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_optional_auth_never_fails() {
        let response = app(keys())
            .oneshot(get_with("/public", Some("garbage")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
