use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::{ApiError, UserType};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

pub type UserResult<T> = Result<T, UserError>;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User not found")]
    NotFound,

    #[error("An account with this email already exists")]
    AlreadyExists,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::ValidationError(msg) => ApiError::Validation(msg),
            UserError::AuthenticationError(msg) => ApiError::Authentication(msg),
            UserError::Forbidden(msg) => ApiError::Forbidden(msg),
            UserError::NotFound => ApiError::NotFound("User not found".to_string()),
            e @ UserError::AlreadyExists => ApiError::Conflict(e.to_string()),
            e @ UserError::InvalidToken => ApiError::Validation(e.to_string()),
            UserError::DatabaseError(msg) => ApiError::Database(msg),
            UserError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for UserError {
    fn from(err: validator::ValidationErrors) -> Self {
        UserError::ValidationError(format!("{}", err))
    }
}

// ============= Database rows =============

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub email_verified: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn kind(&self) -> UserResult<UserType> {
        UserType::from_str(&self.user_type).map_err(UserError::Internal)
    }

    pub fn full_name(&self) -> String {
        shared::text::full_name(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArtistProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stage_name: Option<String>,
    pub phone_number: String,
    pub whatsapp_number: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub city: String,
    pub region: String,
    pub is_available: bool,
    pub rating_average: Decimal,
    pub total_reviews: i32,
    pub profile_views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganizerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone_number: String,
    pub whatsapp_number: Option<String>,
    pub organization_name: Option<String>,
    pub organization_type: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub city: String,
    pub region: String,
    pub profile_views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Individual,
    Company,
    Church,
    Association,
    EventAgency,
    Other,
}

impl OrganizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationType::Individual => "individual",
            OrganizationType::Company => "company",
            OrganizationType::Church => "church",
            OrganizationType::Association => "association",
            OrganizationType::EventAgency => "event_agency",
            OrganizationType::Other => "other",
        }
    }
}

impl Default for OrganizationType {
    fn default() -> Self {
        OrganizationType::Individual
    }
}

// ============= Requests =============

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterArtistRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 150, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 150, message = "Last name is required"))]
    pub last_name: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub password_confirm: String,

    #[validate(length(max = 100))]
    pub stage_name: Option<String>,

    #[validate(length(min = 8, max = 20, message = "Phone number must be 8-20 characters"))]
    pub phone_number: String,

    #[validate(length(max = 20))]
    pub whatsapp_number: Option<String>,

    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,

    #[validate(length(min = 1, max = 100, message = "Region is required"))]
    pub region: String,

    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterOrganizerRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 150, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 150, message = "Last name is required"))]
    pub last_name: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub password_confirm: String,

    #[validate(length(max = 200))]
    pub organization_name: Option<String>,

    #[serde(default)]
    pub organization_type: OrganizationType,

    #[validate(length(min = 8, max = 20, message = "Phone number must be 8-20 characters"))]
    pub phone_number: String,

    #[validate(length(max = 20))]
    pub whatsapp_number: Option<String>,

    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,

    #[validate(length(min = 1, max = 100, message = "Region is required"))]
    pub region: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,

    pub new_password_confirm: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,

    pub new_password_confirm: String,
}

/// Partial profile update; absent fields are left untouched. Fields that
/// do not apply to the caller's role are ignored.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 150))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 150))]
    pub last_name: Option<String>,

    #[validate(length(min = 8, max = 20))]
    pub phone_number: Option<String>,

    #[validate(length(max = 20))]
    pub whatsapp_number: Option<String>,

    pub bio: Option<String>,

    #[validate(length(max = 100))]
    pub city: Option<String>,

    #[validate(length(max = 100))]
    pub region: Option<String>,

    // Artist only
    #[validate(length(max = 100))]
    pub stage_name: Option<String>,
    pub is_available: Option<bool>,

    // Organizer only
    #[validate(length(max = 200))]
    pub organization_name: Option<String>,
    pub organization_type: Option<OrganizationType>,
    #[validate(url(message = "Invalid URL format"))]
    pub website: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub user_type: Option<UserType>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<String>,
}

// ============= Responses =============

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserPublic,
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub user_type: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub email_verified: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        let full_name = user.full_name();
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            full_name,
            user_type: user.user_type,
            is_staff: user.is_staff,
            is_active: user.is_active,
            email_verified: user.email_verified,
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}

/// The caller's account with exactly one of the two role profiles set.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserPublic,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_profile: Option<ArtistProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_profile: Option<OrganizerProfile>,
}

#[derive(Debug, Serialize)]
pub struct OrganizerPublic {
    pub id: Uuid,
    pub display_name: String,
    pub organization_name: Option<String>,
    pub organization_type: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub website: Option<String>,
    pub city: String,
    pub region: String,
    pub profile_views: i32,
    pub whatsapp_link: Option<String>,
    pub member_since: DateTime<Utc>,
}

/// Password pair check shared by registration, reset and change.
pub fn ensure_passwords_match(password: &str, confirmation: &str) -> UserResult<()> {
    if password != confirmation {
        return Err(UserError::ValidationError(
            "The two password fields didn't match".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist_request() -> RegisterArtistRequest {
        RegisterArtistRequest {
            email: "ben@example.cm".to_string(),
            first_name: "Ben".to_string(),
            last_name: "Decca".to_string(),
            password: "makossa2024".to_string(),
            password_confirm: "makossa2024".to_string(),
            stage_name: Some("Ben Decca".to_string()),
            phone_number: "+237699001122".to_string(),
            whatsapp_number: None,
            city: "Douala".to_string(),
            region: "Littoral".to_string(),
            bio: None,
        }
    }

    #[test]
    fn test_valid_artist_registration() {
        assert!(artist_request().validate().is_ok());
    }

    #[test]
    fn test_short_password_rejected() {
        let mut req = artist_request();
        req.password = "short".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_missing_city_rejected() {
        let mut req = artist_request();
        req.city = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_password_mismatch() {
        assert!(ensure_passwords_match("abcdefgh", "abcdefgh").is_ok());
        assert!(matches!(
            ensure_passwords_match("abcdefgh", "abcdefgi"),
            Err(UserError::ValidationError(_))
        ));
    }

    #[test]
    fn test_organization_type_defaults_to_individual() {
        let req: RegisterOrganizerRequest = serde_json::from_value(serde_json::json!({
            "email": "org@example.cm",
            "first_name": "Awa",
            "last_name": "Ngo",
            "password": "password123",
            "password_confirm": "password123",
            "phone_number": "699001122",
            "city": "Yaoundé",
            "region": "Centre"
        }))
        .unwrap();
        assert_eq!(req.organization_type, OrganizationType::Individual);
        assert_eq!(OrganizationType::EventAgency.as_str(), "event_agency");
    }

    #[test]
    fn test_user_error_status_mapping() {
        let status = |err: UserError| ApiError::from(err).status_code().as_u16();
        assert_eq!(status(UserError::AlreadyExists), 409);
        assert_eq!(status(UserError::InvalidToken), 400);
        assert_eq!(status(UserError::AuthenticationError("x".into())), 401);
    }
}
