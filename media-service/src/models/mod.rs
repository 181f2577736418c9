use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::text::{format_duration, human_file_size};
use shared::types::ApiError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::config::MediaConfig;
use crate::processing::ProcessingError;
use crate::storage::StorageError;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("File too large. Maximum size is {max_mb} MB for {kind} files")]
    TooLarge { kind: MediaKind, max_mb: u64 },

    #[error("You have reached the limit of {max} {kind} files")]
    QuotaExceeded { kind: MediaKind, max: i64 },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::ValidationError(msg) => ApiError::Validation(msg),
            e @ MediaError::NotFound(_) => ApiError::NotFound(e.to_string()),
            e @ MediaError::TooLarge { .. } => ApiError::PayloadTooLarge(e.to_string()),
            e @ MediaError::QuotaExceeded { .. } => ApiError::QuotaExceeded(e.to_string()),
            MediaError::DatabaseError(msg) => ApiError::Database(msg),
            MediaError::Storage(e) => ApiError::Internal(e.to_string()),
            MediaError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for MediaError {
    fn from(err: sqlx::Error) -> Self {
        MediaError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for MediaError {
    fn from(err: validator::ValidationErrors) -> Self {
        MediaError::ValidationError(format!("{}", err))
    }
}

impl From<ProcessingError> for MediaError {
    fn from(err: ProcessingError) -> Self {
        MediaError::Internal(err.to_string())
    }
}

// ============= Kinds =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Photo,
    Document,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Audio,
        MediaKind::Video,
        MediaKind::Photo,
        MediaKind::Document,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Photo => "photo",
            MediaKind::Document => "document",
        }
    }

    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Audio => &["mp3", "wav", "ogg", "m4a"],
            MediaKind::Video => &["mp4", "avi", "mov", "wmv"],
            MediaKind::Photo => &["jpg", "jpeg", "png", "gif"],
            MediaKind::Document => &["pdf"],
        }
    }

    /// Lowercased extension of `filename` if this kind accepts it.
    pub fn accepts(&self, filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions()
            .contains(&ext.as_str())
            .then_some(ext)
    }

    /// Number of files of this kind shown on a public portfolio
    pub fn portfolio_limit(&self) -> i64 {
        match self {
            MediaKind::Audio => 3,
            MediaKind::Video => 2,
            MediaKind::Photo => 6,
            MediaKind::Document => 3,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            "photo" => Ok(MediaKind::Photo),
            "document" => Ok(MediaKind::Document),
            other => Err(MediaError::ValidationError(format!(
                "Unknown media kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Partition,
    PressKit,
    Contract,
    Rider,
    Biography,
    #[default]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Partition => "partition",
            DocumentType::PressKit => "press_kit",
            DocumentType::Contract => "contract",
            DocumentType::Rider => "rider",
            DocumentType::Biography => "biography",
            DocumentType::Other => "other",
        }
    }
}

impl FromStr for DocumentType {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partition" => Ok(DocumentType::Partition),
            "press_kit" => Ok(DocumentType::PressKit),
            "contract" => Ok(DocumentType::Contract),
            "rider" => Ok(DocumentType::Rider),
            "biography" => Ok(DocumentType::Biography),
            "other" => Ok(DocumentType::Other),
            other => Err(MediaError::ValidationError(format!(
                "Unknown document type '{}'",
                other
            ))),
        }
    }
}

/// Where a video actually plays from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    Local,
    Youtube,
    Vimeo,
    External,
}

impl VideoSource {
    pub fn classify(file_path: Option<&str>, video_url: Option<&str>) -> Option<Self> {
        if file_path.is_some() {
            return Some(VideoSource::Local);
        }
        let url = video_url?.to_ascii_lowercase();
        Some(if url.contains("youtube.com") || url.contains("youtu.be") {
            VideoSource::Youtube
        } else if url.contains("vimeo.com") {
            VideoSource::Vimeo
        } else {
            VideoSource::External
        })
    }
}

// ============= Rows =============

pub const MEDIA_COLUMNS: &str = "id, artist_id, kind, title, description, file_path, original_filename, \
     content_type, file_size, file_hash, is_active, display_order, upload_date, duration_seconds, \
     video_url, thumbnail_path, has_watermark, is_profile_picture, document_type";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MediaFile {
    pub id: Uuid,
    pub artist_id: Uuid,
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
    pub file_size: i64,
    #[serde(skip_serializing)]
    pub file_hash: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
    pub upload_date: DateTime<Utc>,
    pub duration_seconds: Option<i32>,
    pub video_url: Option<String>,
    pub thumbnail_path: Option<String>,
    pub has_watermark: bool,
    pub is_profile_picture: bool,
    pub document_type: Option<String>,
}

impl MediaFile {
    pub fn kind(&self) -> MediaResult<MediaKind> {
        self.kind.parse()
    }
}

/// A media file with everything a client needs to display it.
#[derive(Debug, Clone, Serialize)]
pub struct MediaFileView {
    #[serde(flatten)]
    pub file: MediaFile,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_source: Option<VideoSource>,
    pub size_display: String,
    pub duration_display: String,
}

impl MediaFileView {
    pub fn new(file: MediaFile, config: &MediaConfig) -> Self {
        let video_source = if file.kind == MediaKind::Video.as_str() {
            VideoSource::classify(file.file_path.as_deref(), file.video_url.as_deref())
        } else {
            None
        };

        Self {
            url: file.file_path.as_deref().map(|p| config.public_url(p)),
            thumbnail_url: file.thumbnail_path.as_deref().map(|p| config.public_url(p)),
            video_source,
            size_display: human_file_size(file.file_size),
            duration_display: format_duration(file.duration_seconds),
            file,
        }
    }
}

// ============= Upload =============

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Fields of a multipart upload form.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub document_type: Option<String>,
    pub is_profile_picture: bool,
    pub display_order: Option<i32>,
    pub file: Option<UploadedFile>,
}

// ============= Requests =============

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMediaRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    #[validate(range(min = 0))]
    pub display_order: Option<i32>,
    pub is_profile_picture: Option<bool>,
    pub document_type: Option<DocumentType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Activate,
    Deactivate,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct BulkActionRequest {
    pub action: BulkAction,
    #[serde(default)]
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ResetOrderRequest {
    pub ids: Vec<Uuid>,
}

// ============= Responses =============

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct QuotaEntry {
    pub used: i64,
    pub max: i64,
    pub can_upload: bool,
}

impl QuotaEntry {
    pub fn new(used: i64, max: i64) -> Self {
        Self {
            used,
            max,
            can_upload: used < max,
        }
    }
}

pub type QuotaStatus = BTreeMap<MediaKind, QuotaEntry>;

#[derive(Debug, Serialize, Default)]
pub struct MediaByKind {
    pub audio: Vec<MediaFileView>,
    pub video: Vec<MediaFileView>,
    pub photo: Vec<MediaFileView>,
    pub document: Vec<MediaFileView>,
}

impl MediaByKind {
    pub fn push(&mut self, kind: MediaKind, view: MediaFileView) {
        match kind {
            MediaKind::Audio => self.audio.push(view),
            MediaKind::Video => self.video.push(view),
            MediaKind::Photo => self.photo.push(view),
            MediaKind::Document => self.document.push(view),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MyMediaResponse {
    #[serde(flatten)]
    pub files: MediaByKind,
    pub quota: QuotaStatus,
}

#[derive(Debug, Serialize)]
pub struct MediaStats {
    pub quota: QuotaStatus,
    pub total_files: i64,
    pub storage_used_mb: f64,
}

#[derive(Debug, Serialize)]
pub struct BulkActionResponse {
    pub affected: u64,
}

/// MIME type of a stored file, from its extension.
pub fn content_type_for(path: &str) -> Option<&'static str> {
    let (_, ext) = path.rsplit_once('.')?;
    let content_type = match ext.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(content_type)
}

/// Megabytes rounded to two decimals.
pub fn megabytes(bytes: i64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
