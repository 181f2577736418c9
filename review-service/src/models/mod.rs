use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::{ApiError, PaginatedResponse};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::rating::RatingSummary;

pub type ReviewResult<T> = Result<T, ReviewError>;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    LinkUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::ValidationError(msg) => ApiError::Validation(msg),
            e @ ReviewError::NotFound(_) => ApiError::NotFound(e.to_string()),
            ReviewError::Forbidden(msg) => ApiError::Forbidden(msg),
            ReviewError::AlreadyExists(msg) => ApiError::Conflict(msg),
            ReviewError::LinkUnavailable(msg) => ApiError::Gone(msg),
            ReviewError::DatabaseError(msg) => ApiError::Database(msg),
            ReviewError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for ReviewError {
    fn from(err: sqlx::Error) -> Self {
        ReviewError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ReviewError {
    fn from(err: validator::ValidationErrors) -> Self {
        ReviewError::ValidationError(format!("{}", err))
    }
}

/// Maps a unique violation to `AlreadyExists(message)`.
pub fn conflict_on_duplicate(message: &'static str) -> impl FnOnce(sqlx::Error) -> ReviewError {
    move |err| match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            ReviewError::AlreadyExists(message.to_string())
        }
        other => other.into(),
    }
}

// ============= Event types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WeddingTraditional,
    WeddingCivil,
    WeddingReligious,
    Dowry,
    Funeral,
    Baptism,
    Mass,
    PrayerVigil,
    Evangelization,
    GospelConcert,
    SpiritualRetreat,
    Pilgrimage,
    Birthday,
    Engagement,
    BabyShower,
    NewYear,
    NewYearEve,
    DanceParty,
    CompanyParty,
    CorporateEvent,
    ProductLaunch,
    Seminar,
    CharityGala,
    PoliticalEvent,
    NationalDay,
    YouthDay,
    PublicConcert,
    MusicFestival,
    Other,
}

impl EventType {
    pub const ALL: [EventType; 29] = [
        EventType::WeddingTraditional,
        EventType::WeddingCivil,
        EventType::WeddingReligious,
        EventType::Dowry,
        EventType::Funeral,
        EventType::Baptism,
        EventType::Mass,
        EventType::PrayerVigil,
        EventType::Evangelization,
        EventType::GospelConcert,
        EventType::SpiritualRetreat,
        EventType::Pilgrimage,
        EventType::Birthday,
        EventType::Engagement,
        EventType::BabyShower,
        EventType::NewYear,
        EventType::NewYearEve,
        EventType::DanceParty,
        EventType::CompanyParty,
        EventType::CorporateEvent,
        EventType::ProductLaunch,
        EventType::Seminar,
        EventType::CharityGala,
        EventType::PoliticalEvent,
        EventType::NationalDay,
        EventType::YouthDay,
        EventType::PublicConcert,
        EventType::MusicFestival,
        EventType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::WeddingTraditional => "wedding_traditional",
            EventType::WeddingCivil => "wedding_civil",
            EventType::WeddingReligious => "wedding_religious",
            EventType::Dowry => "dowry",
            EventType::Funeral => "funeral",
            EventType::Baptism => "baptism",
            EventType::Mass => "mass",
            EventType::PrayerVigil => "prayer_vigil",
            EventType::Evangelization => "evangelization",
            EventType::GospelConcert => "gospel_concert",
            EventType::SpiritualRetreat => "spiritual_retreat",
            EventType::Pilgrimage => "pilgrimage",
            EventType::Birthday => "birthday",
            EventType::Engagement => "engagement",
            EventType::BabyShower => "baby_shower",
            EventType::NewYear => "new_year",
            EventType::NewYearEve => "new_year_eve",
            EventType::DanceParty => "dance_party",
            EventType::CompanyParty => "company_party",
            EventType::CorporateEvent => "corporate_event",
            EventType::ProductLaunch => "product_launch",
            EventType::Seminar => "seminar",
            EventType::CharityGala => "charity_gala",
            EventType::PoliticalEvent => "political_event",
            EventType::NationalDay => "national_day",
            EventType::YouthDay => "youth_day",
            EventType::PublicConcert => "public_concert",
            EventType::MusicFestival => "music_festival",
            EventType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventType::WeddingTraditional => "Mariage traditionnel",
            EventType::WeddingCivil => "Mariage civil",
            EventType::WeddingReligious => "Mariage religieux",
            EventType::Dowry => "Dot/Libation",
            EventType::Funeral => "Funérailles/Deuil",
            EventType::Baptism => "Baptême",
            EventType::Mass => "Messe/Service religieux",
            EventType::PrayerVigil => "Veillée de prière",
            EventType::Evangelization => "Croisade d'évangélisation",
            EventType::GospelConcert => "Concert gospel",
            EventType::SpiritualRetreat => "Retraite spirituelle",
            EventType::Pilgrimage => "Pèlerinage",
            EventType::Birthday => "Anniversaire",
            EventType::Engagement => "Fiançailles",
            EventType::BabyShower => "Baby shower",
            EventType::NewYear => "Fête de fin d'année",
            EventType::NewYearEve => "Réveillon",
            EventType::DanceParty => "Soirée dansante",
            EventType::CompanyParty => "Fête d'entreprise",
            EventType::CorporateEvent => "Événement d'entreprise",
            EventType::ProductLaunch => "Lancement de produit",
            EventType::Seminar => "Séminaire/Conférence",
            EventType::CharityGala => "Gala de charité",
            EventType::PoliticalEvent => "Événement politique",
            EventType::NationalDay => "Fête nationale (20 mai)",
            EventType::YouthDay => "Fête de la jeunesse (11 février)",
            EventType::PublicConcert => "Concert public",
            EventType::MusicFestival => "Festival de musique",
            EventType::Other => "Autre",
        }
    }

    /// Label for a stored value, falling back to the raw value.
    pub fn label_for(value: &str) -> String {
        value
            .parse::<EventType>()
            .map(|t| t.label().to_string())
            .unwrap_or_else(|_| value.to_string())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ReviewError::ValidationError(format!("Unknown event type '{}'", s)))
    }
}

#[derive(Debug, Serialize)]
pub struct EventTypeChoice {
    pub value: &'static str,
    pub label: &'static str,
}

// ============= Reviews =============

pub const REVIEW_COLUMNS: &str = "r.id, r.artist_id, r.organizer_id, r.rating, r.comment, r.event_date, \
     r.event_type, r.event_location, r.is_verified, r.is_public, r.created_at, r.updated_at, \
     COALESCE(NULLIF(TRIM(o.organization_name), ''), TRIM(ou.first_name || ' ' || ou.last_name)) AS organizer_name, \
     COALESCE(NULLIF(TRIM(a.stage_name), ''), TRIM(au.first_name || ' ' || au.last_name)) AS artist_name, \
     rr.id AS response_id, rr.response_text, rr.created_at AS response_created_at, \
     rr.updated_at AS response_updated_at, \
     (SELECT COUNT(*) FROM review_helpfulness h WHERE h.review_id = r.id AND h.is_helpful) AS helpful_count, \
     (SELECT COUNT(*) FROM review_helpfulness h WHERE h.review_id = r.id) AS total_votes";

pub const REVIEW_FROM: &str = " FROM reviews r \
     JOIN organizer_profiles o ON o.id = r.organizer_id \
     JOIN users ou ON ou.id = o.user_id \
     JOIN artist_profiles a ON a.id = r.artist_id \
     JOIN users au ON au.id = a.user_id \
     LEFT JOIN review_responses rr ON rr.review_id = r.id";

/// One joined row; see [`ReviewView`] for the API shape.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub artist_id: Uuid,
    pub organizer_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub event_type: Option<String>,
    pub event_location: Option<String>,
    pub is_verified: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub organizer_name: String,
    pub artist_name: String,
    pub response_id: Option<Uuid>,
    pub response_text: Option<String>,
    pub response_created_at: Option<DateTime<Utc>>,
    pub response_updated_at: Option<DateTime<Utc>>,
    pub helpful_count: i64,
    pub total_votes: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub review_id: Uuid,
    pub response_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: Uuid,
    pub artist_id: Uuid,
    pub artist_name: String,
    pub organizer_id: Uuid,
    pub organizer_name: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub event_type: Option<String>,
    pub event_type_label: Option<String>,
    pub event_location: Option<String>,
    pub is_verified: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub response: Option<ReviewResponse>,
    pub helpful_count: i64,
    pub total_votes: i64,
}

impl From<ReviewRow> for ReviewView {
    fn from(row: ReviewRow) -> Self {
        let response = match (row.response_id, row.response_text) {
            (Some(id), Some(response_text)) => Some(ReviewResponse {
                id,
                review_id: row.id,
                response_text,
                created_at: row.response_created_at.unwrap_or(row.created_at),
                updated_at: row.response_updated_at.unwrap_or(row.updated_at),
            }),
            _ => None,
        };

        Self {
            event_type_label: row.event_type.as_deref().map(EventType::label_for),
            id: row.id,
            artist_id: row.artist_id,
            artist_name: row.artist_name,
            organizer_id: row.organizer_id,
            organizer_name: row.organizer_name,
            rating: row.rating,
            comment: row.comment,
            event_date: row.event_date,
            event_type: row.event_type,
            event_location: row.event_location,
            is_verified: row.is_verified,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
            response,
            helpful_count: row.helpful_count,
            total_votes: row.total_votes,
        }
    }
}

// ============= Review requests =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Valid,
    Expired,
    Used,
}

impl RequestStatus {
    pub fn of(is_used: bool, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if is_used {
            RequestStatus::Used
        } else if now > expires_at {
            RequestStatus::Expired
        } else {
            RequestStatus::Valid
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewRequest {
    pub id: Uuid,
    pub artist_id: Uuid,
    pub client_email: String,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub event_date: NaiveDate,
    pub event_type: String,
    pub event_location: String,
    pub token: Uuid,
    pub message: Option<String>,
    pub is_sent: bool,
    pub is_used: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReviewRequest {
    pub fn status(&self) -> RequestStatus {
        RequestStatus::of(self.is_used, self.expires_at, Utc::now())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewRequestView {
    #[serde(flatten)]
    pub request: ReviewRequest,
    pub status: RequestStatus,
    pub event_type_label: String,
}

impl From<ReviewRequest> for ReviewRequestView {
    fn from(request: ReviewRequest) -> Self {
        Self {
            status: request.status(),
            event_type_label: EventType::label_for(&request.event_type),
            request,
        }
    }
}

/// What the client sees when opening an emailed link.
#[derive(Debug, Serialize)]
pub struct PublicRequestView {
    pub status: RequestStatus,
    pub artist_id: Uuid,
    pub artist_name: String,
    pub client_name: String,
    pub event_date: NaiveDate,
    pub event_type: String,
    pub event_type_label: String,
    pub event_location: String,
    pub expires_at: DateTime<Utc>,
}

// ============= Requests =============

#[derive(Debug, Deserialize, Validate)]
pub struct LeaveReviewRequest {
    pub artist_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    pub comment: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub event_type: Option<EventType>,
    #[validate(length(max = 200))]
    pub event_location: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestReviewRequest {
    #[validate(email)]
    pub client_email: String,
    #[validate(length(min = 1, max = 200))]
    pub client_name: String,
    #[validate(length(max = 20))]
    pub client_phone: Option<String>,
    pub event_date: NaiveDate,
    pub event_type: EventType,
    #[validate(length(min = 1, max = 200))]
    pub event_location: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PublicReviewRequest {
    #[validate(length(min = 1, max = 200))]
    pub organizer_name: String,
    #[validate(email)]
    pub organizer_email: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseTextRequest {
    pub response_text: String,
}

#[derive(Debug, Deserialize)]
pub struct HelpfulRequest {
    pub is_helpful: bool,
}

#[derive(Debug, Deserialize)]
pub struct ModerateReviewRequest {
    pub is_public: Option<bool>,
    pub is_verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

// ============= Responses =============

#[derive(Debug, Serialize)]
pub struct HelpfulResponse {
    pub helpful_count: i64,
    pub total_votes: i64,
    pub user_voted_helpful: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum MyReviewsResponse {
    Artist {
        reviews_received: Vec<ReviewView>,
        review_requests: Vec<ReviewRequestView>,
        average_rating: Decimal,
        total_reviews: i64,
    },
    Organizer {
        reviews_given: Vec<ReviewView>,
    },
}

#[derive(Debug, Serialize)]
pub struct ArtistReviewsResponse {
    pub artist_id: Uuid,
    pub artist_name: String,
    pub stats: RatingSummary,
    pub reviews: PaginatedResponse<ReviewView>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub artists_updated: u64,
}

// ============= Field rules =============

pub const MIN_TEXT_LENGTH: usize = 10;

/// Optional review comment: blank means none, anything else needs 10 visible characters.
pub fn clean_comment(comment: Option<String>) -> ReviewResult<Option<String>> {
    match comment.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) => {
            if trimmed.chars().count() < MIN_TEXT_LENGTH {
                return Err(ReviewError::ValidationError(format!(
                    "Comment must contain at least {} characters",
                    MIN_TEXT_LENGTH
                )));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

pub fn clean_response_text(text: &str) -> ReviewResult<String> {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_TEXT_LENGTH {
        return Err(ReviewError::ValidationError(format!(
            "Response must contain at least {} characters",
            MIN_TEXT_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Event dates cannot be in the future, nor older than `max_age_days` when given.
pub fn check_event_date(date: NaiveDate, today: NaiveDate, max_age_days: Option<i64>) -> ReviewResult<()> {
    if date > today {
        return Err(ReviewError::ValidationError(
            "Event date cannot be in the future".to_string(),
        ));
    }
    if let Some(days) = max_age_days {
        if date < today - chrono::Duration::days(days) {
            return Err(ReviewError::ValidationError(format!(
                "Event date cannot be more than {} days ago",
                days
            )));
        }
    }
    Ok(())
}

/// "Jean Paul Mballa" -> ("Jean", "Paul Mballa")
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_event_types() {
        assert_eq!(EventType::ALL.len(), 29);
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().ok(), Some(t));
        }
        assert_eq!(EventType::Dowry.label(), "Dot/Libation");
        assert_eq!(EventType::label_for("national_day"), "Fête nationale (20 mai)");
        assert_eq!(EventType::label_for("legacy_value"), "legacy_value");
        assert!("rave".parse::<EventType>().is_err());
    }

    #[test]
    fn test_event_type_serde_matches_as_str() {
        for t in EventType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_clean_comment() {
        assert_eq!(clean_comment(None).unwrap(), None);
        assert_eq!(clean_comment(Some(String::new())).unwrap(), None);
        assert_eq!(clean_comment(Some("   ".to_string())).unwrap(), None);
        assert_eq!(clean_comment(Some(" \n\t ".to_string())).unwrap(), None);
        assert!(clean_comment(Some("Top !".to_string())).is_err());
        assert_eq!(
            clean_comment(Some("  Excellent prestation  ".to_string())).unwrap(),
            Some("Excellent prestation".to_string())
        );
    }

    #[test]
    fn test_clean_response_text() {
        assert!(clean_response_text("Merci").is_err());
        assert_eq!(
            clean_response_text(" Merci beaucoup ! ").unwrap(),
            "Merci beaucoup !"
        );
    }

    #[test]
    fn test_check_event_date() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 20).unwrap();
        assert!(check_event_date(today, today, Some(365)).is_ok());
        assert!(check_event_date(today + Duration::days(1), today, Some(365)).is_err());
        assert!(check_event_date(today - Duration::days(365), today, Some(365)).is_ok());
        assert!(check_event_date(today - Duration::days(366), today, Some(365)).is_err());
        assert!(check_event_date(today - Duration::days(2000), today, None).is_ok());
    }

    #[test]
    fn test_request_status() {
        let now = Utc::now();
        assert_eq!(RequestStatus::of(false, now + Duration::days(1), now), RequestStatus::Valid);
        assert_eq!(RequestStatus::of(false, now - Duration::seconds(1), now), RequestStatus::Expired);
        assert_eq!(RequestStatus::of(true, now - Duration::days(1), now), RequestStatus::Used);
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("Jean Paul Mballa"), ("Jean".to_string(), "Paul Mballa".to_string()));
        assert_eq!(split_name("Ebogo"), ("Ebogo".to_string(), String::new()));
        assert_eq!(split_name("  "), (String::new(), String::new()));
    }

    #[test]
    fn test_review_view_nests_response() {
        let now = Utc::now();
        let row = ReviewRow {
            id: Uuid::new_v4(),
            artist_id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            rating: 5,
            comment: Some("Ambiance extraordinaire".to_string()),
            event_date: None,
            event_type: Some("birthday".to_string()),
            event_location: Some("Douala".to_string()),
            is_verified: false,
            is_public: true,
            created_at: now,
            updated_at: now,
            organizer_name: "Mairie de Bafoussam".to_string(),
            artist_name: "Ténor".to_string(),
            response_id: Some(Uuid::new_v4()),
            response_text: Some("Merci pour votre confiance".to_string()),
            response_created_at: Some(now),
            response_updated_at: Some(now),
            helpful_count: 2,
            total_votes: 3,
        };

        let view = ReviewView::from(row.clone());
        assert_eq!(view.event_type_label.as_deref(), Some("Anniversaire"));
        let response = view.response.unwrap();
        assert_eq!(response.review_id, row.id);

        let without = ReviewView::from(ReviewRow {
            response_id: None,
            response_text: None,
            ..row
        });
        assert!(without.response.is_none());
    }

    #[test]
    fn test_link_errors_are_gone() {
        let err = ReviewError::LinkUnavailable("expired".to_string());
        assert!(matches!(ApiError::from(err), ApiError::Gone(_)));
    }
}
