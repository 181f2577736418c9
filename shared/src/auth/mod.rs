//! JWT claims and token codec shared by every service.
//!
//! Only the user service issues tokens; the other services validate them
//! with the same secret through the middleware in [`middleware`].

pub mod middleware;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::types::{ApiError, UserType};

pub use middleware::{optional_auth, require_auth, require_staff, AuthError};

pub const ACCESS_TOKEN: &str = "access";
pub const REFRESH_TOKEN: &str = "refresh";

/// Marker stored in `password_hash` for accounts created without a password.
/// Such accounts can only log in after a password reset.
pub const UNUSABLE_PASSWORD_PREFIX: &str = "!";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // User ID
    pub email: String,
    pub user_type: UserType,
    pub is_staff: bool,
    pub exp: i64,           // Expiry timestamp
    pub iat: i64,           // Issued at timestamp
    pub token_type: String, // "access" or "refresh"
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, ApiError> {
        Uuid::parse_str(&self.sub).map_err(|_| ApiError::Authentication("Invalid token".to_string()))
    }

    pub fn is_artist(&self) -> bool {
        self.user_type == UserType::Artist
    }

    pub fn is_organizer(&self) -> bool {
        self.user_type == UserType::Organizer
    }

    pub fn require_artist(&self) -> Result<Uuid, ApiError> {
        if !self.is_artist() {
            return Err(ApiError::Forbidden("Only artists can perform this action".to_string()));
        }
        self.user_id()
    }

    pub fn require_organizer(&self) -> Result<Uuid, ApiError> {
        if !self.is_organizer() {
            return Err(ApiError::Forbidden(
                "Only organizers can perform this action".to_string(),
            ));
        }
        self.user_id()
    }
}

/// Identity carried into a freshly issued token pair.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub user_type: UserType,
    pub is_staff: bool,
}

pub struct JwtKeys {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    fn issue(&self, subject: &TokenSubject<'_>, ttl: Duration, token_type: &str) -> Result<String, ApiError> {
        let now = Utc::now();

        let claims = Claims {
            sub: subject.user_id.to_string(),
            email: subject.email.to_string(),
            user_type: subject.user_type,
            is_staff: subject.is_staff,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            token_type: token_type.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn generate_access_token(&self, subject: &TokenSubject<'_>) -> Result<String, ApiError> {
        let ttl = Duration::hours(self.config.access_token_expiry_hours as i64);
        self.issue(subject, ttl, ACCESS_TOKEN)
    }

    pub fn generate_refresh_token(&self, subject: &TokenSubject<'_>) -> Result<String, ApiError> {
        let ttl = Duration::days(self.config.refresh_token_expiry_days as i64);
        self.issue(subject, ttl, REFRESH_TOKEN)
    }

    /// Validate signature and expiry.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Access token lifetime in seconds.
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry_hours * 3600
    }
}
