use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::{ApiError, PaginatedResponse};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::catalog::whatsapp::TemplateView;

pub type ArtistResult<T> = Result<T, ArtistError>;

#[derive(Debug, Error)]
pub enum ArtistError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("This artist has no WhatsApp number configured")]
    NoWhatsAppNumber,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ArtistError> for ApiError {
    fn from(err: ArtistError) -> Self {
        match err {
            ArtistError::ValidationError(msg) => ApiError::Validation(msg),
            e @ ArtistError::NotFound(_) => ApiError::NotFound(e.to_string()),
            ArtistError::Forbidden(msg) => ApiError::Forbidden(msg),
            ArtistError::AlreadyExists(msg) => ApiError::Conflict(msg),
            e @ ArtistError::NoWhatsAppNumber => ApiError::Unprocessable(e.to_string()),
            ArtistError::DatabaseError(msg) => ApiError::Database(msg),
            ArtistError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ArtistError {
    fn from(err: validator::ValidationErrors) -> Self {
        ArtistError::ValidationError(format!("{}", err))
    }
}

impl From<sqlx::Error> for ArtistError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ArtistError::AlreadyExists("An entry with this name or slug already exists".to_string())
            }
            other => ArtistError::DatabaseError(other.to_string()),
        }
    }
}

// ============= Artists =============

/// An artist as shown in listings, search results and "similar artists".
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ArtistCard {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub stage_name: Option<String>,
    pub display_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub city: String,
    pub region: String,
    pub is_available: bool,
    pub rating_average: Decimal,
    pub total_reviews: i32,
    pub profile_views: i32,
    pub created_at: DateTime<Utc>,
    pub genres: Vec<String>,
    #[serde(skip_serializing)]
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub whatsapp_number: Option<String>,
}

impl ArtistCard {
    /// Number used for WhatsApp: the dedicated one if set, else the phone.
    pub fn contact_number(&self) -> &str {
        self.whatsapp_number
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.phone_number)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GenreTag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_traditional: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoleTag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InstrumentTag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub proficiency_level: String,
    #[sqlx(skip)]
    pub family: String,
}

#[derive(Debug, Serialize)]
pub struct ArtistTags {
    pub genres: Vec<GenreTag>,
    pub roles: Vec<RoleTag>,
    pub instruments: Vec<InstrumentTag>,
}

#[derive(Debug, Serialize)]
pub struct ArtistDetail {
    #[serde(flatten)]
    pub artist: ArtistCard,
    #[serde(flatten)]
    pub tags: ArtistTags,
    pub whatsapp_link: Option<String>,
    pub similar_artists: Vec<ArtistCard>,
    /// Whether the viewer is an organizer who may contact the artist.
    pub can_contact: bool,
}

// ============= Search =============

/// Raw search parameters. List filters take comma separated ids.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub genres: Option<String>,
    pub roles: Option<String>,
    pub instruments: Option<String>,
    pub is_available: Option<bool>,
    pub min_rating: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct GenreCount {
    pub id: Uuid,
    pub name: String,
    pub artist_count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RegionCount {
    pub region: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct SidebarStats {
    pub total_artists: i64,
    pub available_artists: i64,
    pub top_genres: Vec<GenreCount>,
    pub top_regions: Vec<RegionCount>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub artists: PaginatedResponse<ArtistCard>,
    pub stats: SidebarStats,
    pub has_filters: bool,
    pub results_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuickSearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuickSearchResult {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: Uuid,
    pub name: String,
    pub subtitle: String,
    pub url: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuickSearchResponse {
    pub results: Vec<QuickSearchResult>,
}

// ============= WhatsApp =============

#[derive(Debug, Serialize)]
pub struct WhatsAppTemplatesResponse {
    pub artist_id: Uuid,
    pub artist_name: String,
    pub has_whatsapp: bool,
    pub templates: Vec<TemplateView>,
}

/// Accepted both as a JSON body and as query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppContactRequest {
    pub message_type: Option<String>,
    pub custom_message: Option<String>,
    #[serde(default)]
    pub direct: bool,
}

#[derive(Debug, Serialize)]
pub struct WhatsAppRedirect {
    pub redirect_url: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DailyClicks {
    pub date: NaiveDate,
    pub clicks: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TopClicker {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub click_count: i64,
}

#[derive(Debug, Serialize)]
pub struct WhatsAppStats {
    pub total_clicks: i64,
    pub recent_clicks_count: i64,
    pub daily_clicks: Vec<DailyClicks>,
    pub top_clickers: Vec<TopClicker>,
    pub anonymous_clicks: i64,
    pub profile_views: i32,
    pub conversion_rate: f64,
}

// ============= Reference data =============

/// The three kinds of tags an artist can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Genre,
    Role,
    Instrument,
}

impl ReferenceKind {
    pub fn table(&self) -> &'static str {
        match self {
            ReferenceKind::Genre => "music_genres",
            ReferenceKind::Role => "artist_roles",
            ReferenceKind::Instrument => "instruments",
        }
    }

    /// Join table linking artists to this kind of tag.
    pub fn link_table(&self) -> &'static str {
        match self {
            ReferenceKind::Genre => "artist_genres",
            ReferenceKind::Role => "artist_role_assignments",
            ReferenceKind::Instrument => "artist_instruments",
        }
    }

    pub fn link_column(&self) -> &'static str {
        match self {
            ReferenceKind::Genre => "genre_id",
            ReferenceKind::Role => "role_id",
            ReferenceKind::Instrument => "instrument_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReferenceKind::Genre => "Genre",
            ReferenceKind::Role => "Role",
            ReferenceKind::Instrument => "Instrument",
        }
    }
}

/// A genre, role or instrument with the number of artists carrying it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReferenceItem {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub artist_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_traditional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[sqlx(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReferenceList {
    pub items: Vec<ReferenceItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentCategory {
    Traditional,
    Modern,
}

impl InstrumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentCategory::Traditional => "traditional",
            InstrumentCategory::Modern => "modern",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProficiencyLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
    Expert,
}

impl ProficiencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProficiencyLevel::Beginner => "beginner",
            ProficiencyLevel::Intermediate => "intermediate",
            ProficiencyLevel::Advanced => "advanced",
            ProficiencyLevel::Expert => "expert",
        }
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProficiencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(ProficiencyLevel::Beginner),
            "intermediate" => Ok(ProficiencyLevel::Intermediate),
            "advanced" => Ok(ProficiencyLevel::Advanced),
            "expert" => Ok(ProficiencyLevel::Expert),
            other => Err(format!("Unknown proficiency level: {}", other)),
        }
    }
}

/// Create a genre, role or instrument. Fields that do not apply to the
/// kind being created are ignored.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReferenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 120))]
    pub slug: Option<String>,

    pub description: Option<String>,

    #[serde(default)]
    pub is_traditional: bool,

    pub category: Option<InstrumentCategory>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateReferenceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,

    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub is_traditional: Option<bool>,
    pub category: Option<InstrumentCategory>,
}

#[derive(Debug, Deserialize)]
pub struct SetTagsRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct InstrumentAssignment {
    pub instrument_id: Uuid,
    #[serde(default)]
    pub proficiency_level: ProficiencyLevel,
}

#[derive(Debug, Deserialize)]
pub struct SetInstrumentsRequest {
    pub instruments: Vec<InstrumentAssignment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(phone: &str, whatsapp: Option<&str>) -> ArtistCard {
        ArtistCard {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            first_name: "Manu".to_string(),
            last_name: "Dibango".to_string(),
            stage_name: None,
            display_name: "Manu Dibango".to_string(),
            bio: None,
            profile_picture: None,
            city: "Douala".to_string(),
            region: "Littoral".to_string(),
            is_available: true,
            rating_average: Decimal::new(450, 2),
            total_reviews: 4,
            profile_views: 10,
            created_at: Utc::now(),
            genres: vec!["Makossa".to_string()],
            phone_number: phone.to_string(),
            whatsapp_number: whatsapp.map(str::to_string),
        }
    }

    #[test]
    fn test_contact_number_prefers_whatsapp() {
        assert_eq!(card("699000000", Some("677111111")).contact_number(), "677111111");
        assert_eq!(card("699000000", Some("  ")).contact_number(), "699000000");
        assert_eq!(card("699000000", None).contact_number(), "699000000");
    }

    #[test]
    fn test_phone_numbers_are_not_serialized() {
        let value = serde_json::to_value(card("699000000", None)).unwrap();
        assert!(value.get("phone_number").is_none());
        assert!(value.get("whatsapp_number").is_none());
        assert_eq!(value["rating_average"], "4.50");
    }

    #[test]
    fn test_proficiency_default_and_parse() {
        assert_eq!(ProficiencyLevel::default(), ProficiencyLevel::Intermediate);
        assert_eq!("expert".parse::<ProficiencyLevel>().unwrap(), ProficiencyLevel::Expert);
        assert!("virtuoso".parse::<ProficiencyLevel>().is_err());
    }

    #[test]
    fn test_no_whatsapp_number_is_unprocessable() {
        let err: ApiError = ArtistError::NoWhatsAppNumber.into();
        assert_eq!(err.status_code().as_u16(), 422);
        let err: ApiError = ArtistError::NotFound("Artist").into();
        assert_eq!(err.to_string(), "Artist not found");
    }
}
