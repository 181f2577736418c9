use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidateUrl};

use crate::config::MediaConfig;
use crate::models::*;
use crate::processing::{MediaProcessor, Pipeline, Processed};
use crate::storage::LocalStorage;

/// Everything needed to insert a row once the file is in place.
struct NewMedia {
    kind: MediaKind,
    title: String,
    description: Option<String>,
    original_filename: Option<String>,
    content_type: Option<String>,
    video_url: Option<String>,
    document_type: Option<DocumentType>,
    is_profile_picture: bool,
    display_order: i32,
    processed: Option<Processed>,
}

pub struct MediaService {
    config: MediaConfig,
    db_pool: PgPool,
    storage: LocalStorage,
    processor: Arc<dyn MediaProcessor>,
}

impl MediaService {
    pub fn new(
        config: MediaConfig,
        db_pool: PgPool,
        storage: LocalStorage,
        processor: Arc<dyn MediaProcessor>,
    ) -> Self {
        Self {
            config,
            db_pool,
            storage,
            processor,
        }
    }

    fn view(&self, file: MediaFile) -> MediaFileView {
        MediaFileView::new(file, &self.config)
    }

    async fn artist_id(&self, user_id: Uuid) -> MediaResult<Uuid> {
        sqlx::query_scalar("SELECT id FROM artist_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(MediaError::NotFound("Artist profile"))
    }

    // ============= Quotas =============

    async fn active_counts<'e, E>(&self, executor: E, artist_id: Uuid) -> MediaResult<HashMap<MediaKind, i64>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, COUNT(*) FROM media_files WHERE artist_id = $1 AND is_active GROUP BY kind",
        )
        .bind(artist_id)
        .fetch_all(executor)
        .await?;

        let mut counts = HashMap::new();
        for (kind, count) in rows {
            counts.insert(kind.parse::<MediaKind>()?, count);
        }
        Ok(counts)
    }

    fn quota_from_counts(&self, counts: &HashMap<MediaKind, i64>) -> QuotaStatus {
        MediaKind::ALL
            .iter()
            .map(|&kind| {
                let used = counts.get(&kind).copied().unwrap_or(0);
                (kind, QuotaEntry::new(used, self.config.quota(kind)))
            })
            .collect()
    }

    pub async fn quota_status(&self, user_id: Uuid) -> MediaResult<QuotaStatus> {
        let artist_id = self.artist_id(user_id).await?;
        let counts = self.active_counts(&self.db_pool, artist_id).await?;
        Ok(self.quota_from_counts(&counts))
    }

    fn check_quota(&self, kind: MediaKind, counts: &HashMap<MediaKind, i64>) -> MediaResult<()> {
        let max = self.config.quota(kind);
        if counts.get(&kind).copied().unwrap_or(0) >= max {
            return Err(MediaError::QuotaExceeded { kind, max });
        }
        Ok(())
    }

    // ============= Upload =============

    pub async fn upload(&self, user_id: Uuid, kind: MediaKind, form: UploadForm) -> MediaResult<MediaFileView> {
        let artist_id = self.artist_id(user_id).await?;

        // Cheap early rejection; the authoritative check runs under the row lock.
        let counts = self.active_counts(&self.db_pool, artist_id).await?;
        self.check_quota(kind, &counts)?;

        let (mut new, upload) = validate_upload(&self.config, kind, form)?;

        if let Some((file, extension)) = upload {
            let stored = self.storage.store(kind, &extension, &file.data).await?;
            let pipeline = Pipeline {
                processor: self.processor.as_ref(),
                storage: &self.storage,
                video_target_mb: self.config.video_target_mb,
            };
            new.processed = Some(pipeline.run(kind, stored).await);
        }

        match self.insert(artist_id, &new).await {
            Ok(file) => {
                info!("Artist {} uploaded {} file {}", artist_id, kind, file.id);
                Ok(self.view(file))
            }
            Err(e) => {
                if let Some(ref processed) = new.processed {
                    self.discard_processed(processed).await;
                }
                Err(e)
            }
        }
    }

    async fn insert(&self, artist_id: Uuid, new: &NewMedia) -> MediaResult<MediaFile> {
        let mut tx = self.db_pool.begin().await?;

        sqlx::query("SELECT id FROM artist_profiles WHERE id = $1 FOR UPDATE")
            .bind(artist_id)
            .execute(&mut *tx)
            .await?;

        let counts = self.active_counts(&mut *tx, artist_id).await?;
        self.check_quota(new.kind, &counts)?;

        let processed = new.processed.as_ref();
        // The stored file may have been transcoded to another format.
        let content_type = processed
            .and_then(|p| content_type_for(&p.file.relative_path))
            .map(str::to_string)
            .or_else(|| new.content_type.clone());
        let file: MediaFile = sqlx::query_as(&format!(
            "INSERT INTO media_files (id, artist_id, kind, title, description, file_path, \
             original_filename, content_type, file_size, file_hash, display_order, duration_seconds, \
             video_url, thumbnail_path, has_watermark, is_profile_picture, document_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {}",
            MEDIA_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(artist_id)
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(&new.description)
        .bind(processed.map(|p| p.file.relative_path.clone()))
        .bind(&new.original_filename)
        .bind(content_type)
        .bind(processed.map_or(0, |p| p.file.file_size))
        .bind(processed.map(|p| p.file.file_hash.clone()))
        .bind(new.display_order)
        .bind(processed.and_then(|p| p.duration_seconds))
        .bind(&new.video_url)
        .bind(processed.and_then(|p| p.thumbnail_path.clone()))
        .bind(processed.map_or(false, |p| p.has_watermark))
        .bind(new.is_profile_picture)
        .bind(new.document_type.map(|t| t.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        if file.is_profile_picture {
            set_profile_picture(&mut tx, &file).await?;
        }

        tx.commit().await?;
        Ok(file)
    }

    async fn discard_processed(&self, processed: &Processed) {
        self.storage.discard(&processed.file.relative_path).await;
        if let Some(ref thumb) = processed.thumbnail_path {
            self.storage.discard(thumb).await;
        }
    }

    // ============= Listing =============

    async fn files_for(&self, artist_id: Uuid, active_only: bool) -> MediaResult<Vec<MediaFile>> {
        let files = sqlx::query_as(&format!(
            "SELECT {} FROM media_files WHERE artist_id = $1 AND (is_active OR NOT $2) \
             ORDER BY display_order, upload_date DESC",
            MEDIA_COLUMNS
        ))
        .bind(artist_id)
        .bind(active_only)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(files)
    }

    pub async fn list_mine(&self, user_id: Uuid) -> MediaResult<MyMediaResponse> {
        let artist_id = self.artist_id(user_id).await?;
        let files = self.files_for(artist_id, false).await?;

        let mut grouped = MediaByKind::default();
        for file in files {
            let kind = file.kind()?;
            grouped.push(kind, self.view(file));
        }

        let counts = self.active_counts(&self.db_pool, artist_id).await?;
        Ok(MyMediaResponse {
            files: grouped,
            quota: self.quota_from_counts(&counts),
        })
    }

    pub async fn get_mine(&self, user_id: Uuid, media_id: Uuid) -> MediaResult<MediaFileView> {
        let artist_id = self.artist_id(user_id).await?;
        let file = self.owned_file(artist_id, media_id).await?;
        Ok(self.view(file))
    }

    async fn owned_file(&self, artist_id: Uuid, media_id: Uuid) -> MediaResult<MediaFile> {
        sqlx::query_as(&format!(
            "SELECT {} FROM media_files WHERE id = $1 AND artist_id = $2",
            MEDIA_COLUMNS
        ))
        .bind(media_id)
        .bind(artist_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(MediaError::NotFound("Media file"))
    }

    pub async fn stats(&self, user_id: Uuid) -> MediaResult<MediaStats> {
        let artist_id = self.artist_id(user_id).await?;
        let counts = self.active_counts(&self.db_pool, artist_id).await?;

        let storage_bytes: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(file_size), 0)::BIGINT FROM media_files WHERE artist_id = $1",
        )
        .bind(artist_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(MediaStats {
            total_files: counts.values().sum(),
            quota: self.quota_from_counts(&counts),
            storage_used_mb: megabytes(storage_bytes),
        })
    }

    /// Active files of an artist, capped per kind.
    pub async fn public_portfolio(&self, artist_id: Uuid) -> MediaResult<MediaByKind> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM artist_profiles a JOIN users u ON u.id = a.user_id \
             WHERE a.id = $1 AND u.is_active)",
        )
        .bind(artist_id)
        .fetch_one(&self.db_pool)
        .await?;
        if !exists {
            return Err(MediaError::NotFound("Artist"));
        }

        let mut portfolio = MediaByKind::default();
        for kind in MediaKind::ALL {
            let files: Vec<MediaFile> = sqlx::query_as(&format!(
                "SELECT {} FROM media_files WHERE artist_id = $1 AND kind = $2 AND is_active \
                 ORDER BY display_order, upload_date DESC LIMIT $3",
                MEDIA_COLUMNS
            ))
            .bind(artist_id)
            .bind(kind.as_str())
            .bind(kind.portfolio_limit())
            .fetch_all(&self.db_pool)
            .await?;

            for file in files {
                portfolio.push(kind, self.view(file));
            }
        }

        Ok(portfolio)
    }

    // ============= Changes =============

    pub async fn update(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        req: UpdateMediaRequest,
    ) -> MediaResult<MediaFileView> {
        req.validate()?;
        let artist_id = self.artist_id(user_id).await?;
        let current = self.owned_file(artist_id, media_id).await?;
        let kind = current.kind()?;

        if req.is_profile_picture == Some(true) && kind != MediaKind::Photo {
            return Err(MediaError::ValidationError(
                "Only photos can be used as profile picture".to_string(),
            ));
        }
        if req.document_type.is_some() && kind != MediaKind::Document {
            return Err(MediaError::ValidationError(
                "Document type only applies to documents".to_string(),
            ));
        }

        let stays_active = req.is_active.unwrap_or(current.is_active);
        if req.is_profile_picture == Some(true) && !stays_active {
            return Err(MediaError::ValidationError(
                "An inactive photo cannot be the profile picture".to_string(),
            ));
        }
        // A deactivated photo gives up the profile picture.
        let is_profile_picture = if stays_active {
            req.is_profile_picture
        } else {
            Some(false)
        };

        let mut tx = self.db_pool.begin().await?;

        // Re-activating a file takes a quota slot back.
        if req.is_active == Some(true) && !current.is_active {
            sqlx::query("SELECT id FROM artist_profiles WHERE id = $1 FOR UPDATE")
                .bind(artist_id)
                .execute(&mut *tx)
                .await?;
            let counts = self.active_counts(&mut *tx, artist_id).await?;
            self.check_quota(kind, &counts)?;
        }

        let file: MediaFile = sqlx::query_as(&format!(
            "UPDATE media_files SET \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                is_active = COALESCE($5, is_active), \
                display_order = COALESCE($6, display_order), \
                is_profile_picture = COALESCE($7, is_profile_picture), \
                document_type = COALESCE($8, document_type) \
             WHERE id = $1 AND artist_id = $2 \
             RETURNING {}",
            MEDIA_COLUMNS
        ))
        .bind(media_id)
        .bind(artist_id)
        .bind(req.title.as_deref().map(str::trim))
        .bind(&req.description)
        .bind(req.is_active)
        .bind(req.display_order)
        .bind(is_profile_picture)
        .bind(req.document_type.map(|t| t.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        match is_profile_picture {
            Some(true) => set_profile_picture(&mut tx, &file).await?,
            Some(false) if current.is_profile_picture => {
                clear_profile_picture(&mut tx, artist_id, current.file_path.as_deref()).await?
            }
            _ => {}
        }

        tx.commit().await?;

        debug!("Media file {} updated", media_id);
        Ok(self.view(file))
    }

    pub async fn delete(&self, user_id: Uuid, media_id: Uuid) -> MediaResult<()> {
        let artist_id = self.artist_id(user_id).await?;
        let removed = self.delete_rows(artist_id, &[media_id]).await?;
        if removed.is_empty() {
            return Err(MediaError::NotFound("Media file"));
        }
        info!("Artist {} deleted media file {}", artist_id, media_id);
        Ok(())
    }

    /// Deletes rows and then their stored files. Returns the deleted rows.
    async fn delete_rows(&self, artist_id: Uuid, ids: &[Uuid]) -> MediaResult<Vec<MediaFile>> {
        let mut tx = self.db_pool.begin().await?;

        let removed: Vec<MediaFile> = sqlx::query_as(&format!(
            "DELETE FROM media_files WHERE artist_id = $1 AND id = ANY($2) RETURNING {}",
            MEDIA_COLUMNS
        ))
        .bind(artist_id)
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;

        for file in removed.iter().filter(|f| f.is_profile_picture) {
            clear_profile_picture(&mut tx, artist_id, file.file_path.as_deref()).await?;
        }

        tx.commit().await?;

        for file in &removed {
            if let Some(ref path) = file.file_path {
                self.storage.discard(path).await;
            }
            if let Some(ref thumb) = file.thumbnail_path {
                self.storage.discard(thumb).await;
            }
        }

        Ok(removed)
    }

    /// Activates the selected files if every kind stays within its quota.
    async fn activate_rows(&self, artist_id: Uuid, ids: &[Uuid]) -> MediaResult<u64> {
        let mut tx = self.db_pool.begin().await?;

        sqlx::query("SELECT id FROM artist_profiles WHERE id = $1 FOR UPDATE")
            .bind(artist_id)
            .execute(&mut *tx)
            .await?;

        let counts = self.active_counts(&mut *tx, artist_id).await?;
        let activating: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, COUNT(*) FROM media_files \
             WHERE artist_id = $1 AND id = ANY($2) AND NOT is_active GROUP BY kind",
        )
        .bind(artist_id)
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;

        for (kind, count) in activating {
            let kind = kind.parse::<MediaKind>()?;
            let max = self.config.quota(kind);
            if counts.get(&kind).copied().unwrap_or(0) + count > max {
                return Err(MediaError::QuotaExceeded { kind, max });
            }
        }

        let affected = sqlx::query("UPDATE media_files SET is_active = TRUE WHERE artist_id = $1 AND id = ANY($2)")
            .bind(artist_id)
            .bind(ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(affected)
    }

    async fn deactivate_rows(&self, artist_id: Uuid, ids: &[Uuid]) -> MediaResult<u64> {
        let mut tx = self.db_pool.begin().await?;

        let profile_pictures: Vec<Option<String>> = sqlx::query_scalar(
            "SELECT file_path FROM media_files \
             WHERE artist_id = $1 AND id = ANY($2) AND is_profile_picture",
        )
        .bind(artist_id)
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;

        let affected = sqlx::query(
            "UPDATE media_files SET is_active = FALSE, is_profile_picture = FALSE \
             WHERE artist_id = $1 AND id = ANY($2)",
        )
        .bind(artist_id)
        .bind(ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for path in &profile_pictures {
            clear_profile_picture(&mut tx, artist_id, path.as_deref()).await?;
        }

        tx.commit().await?;
        Ok(affected)
    }

    pub async fn bulk(&self, user_id: Uuid, req: BulkActionRequest) -> MediaResult<BulkActionResponse> {
        if req.ids.is_empty() {
            return Err(MediaError::ValidationError("No files selected".to_string()));
        }
        let artist_id = self.artist_id(user_id).await?;

        let affected = match req.action {
            BulkAction::Delete => self.delete_rows(artist_id, &req.ids).await?.len() as u64,
            BulkAction::Activate => self.activate_rows(artist_id, &req.ids).await?,
            BulkAction::Deactivate => self.deactivate_rows(artist_id, &req.ids).await?,
        };

        info!(
            "Artist {} applied {:?} to {} media file(s)",
            artist_id, req.action, affected
        );
        Ok(BulkActionResponse { affected })
    }

    /// Staff: renumber the given files from 0 in upload order.
    pub async fn reset_order(&self, req: ResetOrderRequest) -> MediaResult<BulkActionResponse> {
        if req.ids.is_empty() {
            return Err(MediaError::ValidationError("No files selected".to_string()));
        }

        let affected = sqlx::query(
            "UPDATE media_files m SET display_order = o.position \
             FROM (SELECT id, (ROW_NUMBER() OVER (ORDER BY upload_date) - 1)::INT AS position \
                   FROM media_files WHERE id = ANY($1)) o \
             WHERE m.id = o.id",
        )
        .bind(&req.ids)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if affected == 0 {
            warn!("Order reset matched no media files");
        }
        Ok(BulkActionResponse { affected })
    }
}

async fn set_profile_picture(tx: &mut Transaction<'_, Postgres>, file: &MediaFile) -> MediaResult<()> {
    sqlx::query(
        "UPDATE media_files SET is_profile_picture = FALSE \
         WHERE artist_id = $1 AND kind = 'photo' AND id <> $2 AND is_profile_picture",
    )
    .bind(file.artist_id)
    .bind(file.id)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE artist_profiles SET profile_picture = $2, updated_at = NOW() WHERE id = $1")
        .bind(file.artist_id)
        .bind(&file.file_path)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn clear_profile_picture(
    tx: &mut Transaction<'_, Postgres>,
    artist_id: Uuid,
    path: Option<&str>,
) -> MediaResult<()> {
    sqlx::query(
        "UPDATE artist_profiles SET profile_picture = NULL, updated_at = NOW() \
         WHERE id = $1 AND profile_picture IS NOT DISTINCT FROM $2",
    )
    .bind(artist_id)
    .bind(path)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Checks the form. Returns the row to insert and the file with its extension.
fn validate_upload(
    config: &MediaConfig,
    kind: MediaKind,
    form: UploadForm,
) -> MediaResult<(NewMedia, Option<(UploadedFile, String)>)> {
    let title = form
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MediaError::ValidationError("Title is required".to_string()))?;
    if title.chars().count() > 200 {
        return Err(MediaError::ValidationError(
            "Title must be at most 200 characters".to_string(),
        ));
    }

    let video_url = form
        .video_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(ref url) = video_url {
        if kind != MediaKind::Video {
            return Err(MediaError::ValidationError(
                "Only videos can be added from a URL".to_string(),
            ));
        }
        if !url.validate_url() {
            return Err(MediaError::ValidationError("Invalid video URL".to_string()));
        }
    }

    if form.file.is_none() {
        let message = if kind == MediaKind::Video {
            "Provide a video file or a video URL"
        } else {
            "No file provided"
        };
        if video_url.is_none() {
            return Err(MediaError::ValidationError(message.to_string()));
        }
    }

    if let Some(ref file) = form.file {
        if file.data.is_empty() {
            return Err(MediaError::ValidationError("Empty file provided".to_string()));
        }
        if file.data.len() as u64 > config.max_bytes(kind) {
            return Err(MediaError::TooLarge {
                kind,
                max_mb: config.max_size_mb.get(kind),
            });
        }
    }
    let upload = match form.file {
        Some(file) => {
            let extension = kind.accepts(&file.filename).ok_or_else(|| {
                MediaError::ValidationError(format!(
                    "Unsupported file type. Allowed: {}",
                    kind.allowed_extensions().join(", ")
                ))
            })?;
            Some((file, extension))
        }
        None => None,
    };

    let document_type = match (kind, form.document_type.as_deref()) {
        (MediaKind::Document, Some(t)) if !t.trim().is_empty() => Some(t.trim().parse()?),
        (MediaKind::Document, _) => Some(DocumentType::default()),
        _ => None,
    };

    if form.is_profile_picture && kind != MediaKind::Photo {
        return Err(MediaError::ValidationError(
            "Only photos can be used as profile picture".to_string(),
        ));
    }

    let display_order = form.display_order.unwrap_or(0);
    if display_order < 0 {
        return Err(MediaError::ValidationError(
            "Display order cannot be negative".to_string(),
        ));
    }

    let new = NewMedia {
        kind,
        title,
        description: form.description.filter(|d| !d.trim().is_empty()),
        original_filename: upload.as_ref().map(|(f, _)| f.filename.clone()),
        content_type: upload.as_ref().and_then(|(f, _)| f.content_type.clone()),
        video_url,
        document_type,
        is_profile_picture: form.is_profile_picture,
        display_order,
        processed: None,
    };
    Ok((new, upload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::MockMediaProcessor;
    use pretty_assertions::assert_eq;

    fn form(title: &str, filename: Option<&str>) -> UploadForm {
        UploadForm {
            title: Some(title.to_string()),
            file: filename.map(|name| UploadedFile {
                filename: name.to_string(),
                content_type: None,
                data: b"payload".to_vec(),
            }),
            ..UploadForm::default()
        }
    }

    fn rejects(kind: MediaKind, form: UploadForm) -> MediaError {
        match validate_upload(&MediaConfig::default(), kind, form) {
            Ok(_) => panic!("upload should have been rejected"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_audio_upload() {
        let (new, upload) =
            validate_upload(&MediaConfig::default(), MediaKind::Audio, form("  Ndolo  ", Some("ndolo.WAV")))
                .unwrap();
        assert_eq!(new.title, "Ndolo");
        assert_eq!(new.original_filename.as_deref(), Some("ndolo.WAV"));
        assert_eq!(new.document_type, None);
        assert_eq!(upload.map(|(_, ext)| ext), Some("wav".to_string()));
    }

    #[test]
    fn test_title_is_required() {
        assert!(matches!(
            rejects(MediaKind::Audio, form("   ", Some("a.mp3"))),
            MediaError::ValidationError(_)
        ));
        assert!(matches!(
            rejects(MediaKind::Audio, form(&"x".repeat(201), Some("a.mp3"))),
            MediaError::ValidationError(_)
        ));
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        assert!(matches!(
            rejects(MediaKind::Photo, form("Cover", Some("cover.bmp"))),
            MediaError::ValidationError(_)
        ));
        assert!(matches!(
            rejects(MediaKind::Document, form("Rider", Some("rider.docx"))),
            MediaError::ValidationError(_)
        ));
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let mut config = MediaConfig::default();
        config.max_size_mb.photo = 0;
        let err = validate_upload(&config, MediaKind::Photo, form("Cover", Some("cover.jpg")))
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::TooLarge { max_mb: 0, .. }));
    }

    #[test]
    fn test_video_needs_file_or_url() {
        assert!(matches!(
            rejects(MediaKind::Video, form("Live", None)),
            MediaError::ValidationError(_)
        ));

        let mut by_url = form("Live à Yaoundé", None);
        by_url.video_url = Some("https://youtu.be/abc123".to_string());
        let (new, upload) = validate_upload(&MediaConfig::default(), MediaKind::Video, by_url).unwrap();
        assert!(upload.is_none());
        assert_eq!(new.video_url.as_deref(), Some("https://youtu.be/abc123"));

        let mut bad_url = form("Live", None);
        bad_url.video_url = Some("not a url".to_string());
        assert!(matches!(rejects(MediaKind::Video, bad_url), MediaError::ValidationError(_)));
    }

    #[test]
    fn test_url_only_allowed_for_videos() {
        let mut audio = form("Track", None);
        audio.video_url = Some("https://vimeo.com/1".to_string());
        assert!(matches!(rejects(MediaKind::Audio, audio), MediaError::ValidationError(_)));
    }

    #[test]
    fn test_document_type_defaults_to_other() {
        let (new, _) =
            validate_upload(&MediaConfig::default(), MediaKind::Document, form("Bio", Some("bio.pdf"))).unwrap();
        assert_eq!(new.document_type, Some(DocumentType::Other));

        let mut kit = form("Kit", Some("kit.pdf"));
        kit.document_type = Some("press_kit".to_string());
        let (new, _) = validate_upload(&MediaConfig::default(), MediaKind::Document, kit).unwrap();
        assert_eq!(new.document_type, Some(DocumentType::PressKit));

        let mut unknown = form("Kit", Some("kit.pdf"));
        unknown.document_type = Some("invoice".to_string());
        assert!(rejects(MediaKind::Document, unknown).to_string().contains("invoice"));
    }

    #[test]
    fn test_profile_picture_only_for_photos() {
        let mut audio = form("Track", Some("a.mp3"));
        audio.is_profile_picture = true;
        assert!(matches!(rejects(MediaKind::Audio, audio), MediaError::ValidationError(_)));

        let mut photo = form("Portrait", Some("me.png"));
        photo.is_profile_picture = true;
        let (new, _) = validate_upload(&MediaConfig::default(), MediaKind::Photo, photo).unwrap();
        assert!(new.is_profile_picture);
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let mut empty = form("Track", Some("a.mp3"));
        if let Some(ref mut file) = empty.file {
            file.data.clear();
        }
        assert!(matches!(rejects(MediaKind::Audio, empty), MediaError::ValidationError(_)));
    }

    // ============= Database =============

    fn service(pool: PgPool, root: &std::path::Path, processor: MockMediaProcessor) -> MediaService {
        MediaService::new(
            MediaConfig::default(),
            pool,
            LocalStorage::new(root),
            Arc::new(processor),
        )
    }

    /// Returns (user id, artist profile id).
    async fn create_artist(pool: &PgPool) -> (Uuid, Uuid) {
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (id, email, password_hash, user_type) \
             VALUES ($1, 'artist@example.cm', 'x', 'artist') RETURNING id",
        )
        .bind(Uuid::new_v4())
        .fetch_one(pool)
        .await
        .expect("insert user");
        let artist_id = sqlx::query_scalar(
            "INSERT INTO artist_profiles (id, user_id, stage_name) VALUES ($1, $2, 'Ténor') RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("insert artist profile");
        (user_id, artist_id)
    }

    async fn create_photo(pool: &PgPool, artist_id: Uuid, is_active: bool, is_profile_picture: bool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO media_files (id, artist_id, kind, title, file_path, is_active, is_profile_picture) \
             VALUES ($1, $2, 'photo', 'Concert', $3, $4, $5)",
        )
        .bind(id)
        .bind(artist_id)
        .bind(format!("photos/{}.jpg", id.simple()))
        .bind(is_active)
        .bind(is_profile_picture)
        .execute(pool)
        .await
        .expect("insert photo");
        id
    }

    async fn active_photos(pool: &PgPool, artist_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM media_files WHERE artist_id = $1 AND kind = 'photo' AND is_active")
            .bind(artist_id)
            .fetch_one(pool)
            .await
            .expect("count photos")
    }

    async fn profile_picture(pool: &PgPool, artist_id: Uuid) -> Option<String> {
        sqlx::query_scalar("SELECT profile_picture FROM artist_profiles WHERE id = $1")
            .bind(artist_id)
            .fetch_one(pool)
            .await
            .expect("artist profile")
    }

    async fn use_as_profile_picture(pool: &PgPool, artist_id: Uuid, media_id: Uuid) -> String {
        sqlx::query_scalar(
            "UPDATE artist_profiles a SET profile_picture = m.file_path \
             FROM media_files m WHERE a.id = $1 AND m.id = $2 RETURNING a.profile_picture",
        )
        .bind(artist_id)
        .bind(media_id)
        .fetch_one(pool)
        .await
        .expect("set profile picture")
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_bulk_activate_respects_quota(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let service = service(pool.clone(), dir.path(), MockMediaProcessor::new());
        let (user_id, artist_id) = create_artist(&pool).await;

        for _ in 0..5 {
            create_photo(&pool, artist_id, true, false).await;
        }
        let first = create_photo(&pool, artist_id, false, false).await;
        let second = create_photo(&pool, artist_id, false, false).await;

        let err = service
            .bulk(
                user_id,
                BulkActionRequest {
                    action: BulkAction::Activate,
                    ids: vec![first, second],
                },
            )
            .await
            .err()
            .expect("over quota");
        assert!(matches!(err, MediaError::QuotaExceeded { kind: MediaKind::Photo, max: 6 }));
        assert_eq!(active_photos(&pool, artist_id).await, 5);

        let done = service
            .bulk(
                user_id,
                BulkActionRequest {
                    action: BulkAction::Activate,
                    ids: vec![first],
                },
            )
            .await
            .unwrap();
        assert_eq!(done.affected, 1);
        assert_eq!(active_photos(&pool, artist_id).await, 6);

        let reactivate = UpdateMediaRequest {
            is_active: Some(true),
            ..UpdateMediaRequest::default()
        };
        let err = service.update(user_id, second, reactivate).await.err().expect("over quota");
        assert!(matches!(err, MediaError::QuotaExceeded { .. }));
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_deactivated_photo_gives_up_profile_picture(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let service = service(pool.clone(), dir.path(), MockMediaProcessor::new());
        let (user_id, artist_id) = create_artist(&pool).await;

        let portrait = create_photo(&pool, artist_id, true, true).await;
        use_as_profile_picture(&pool, artist_id, portrait).await;

        let both = UpdateMediaRequest {
            is_active: Some(false),
            is_profile_picture: Some(true),
            ..UpdateMediaRequest::default()
        };
        let err = service.update(user_id, portrait, both).await.err().expect("inactive portrait");
        assert!(matches!(err, MediaError::ValidationError(_)));

        let hide = UpdateMediaRequest {
            is_active: Some(false),
            ..UpdateMediaRequest::default()
        };
        let view = service.update(user_id, portrait, hide).await.unwrap();
        assert!(!view.file.is_active);
        assert!(!view.file.is_profile_picture);
        assert_eq!(profile_picture(&pool, artist_id).await, None);

        let other = create_photo(&pool, artist_id, true, true).await;
        let path = use_as_profile_picture(&pool, artist_id, other).await;
        assert_eq!(profile_picture(&pool, artist_id).await, Some(path));

        service
            .bulk(
                user_id,
                BulkActionRequest {
                    action: BulkAction::Deactivate,
                    ids: vec![other],
                },
            )
            .await
            .unwrap();
        assert_eq!(profile_picture(&pool, artist_id).await, None);
        let flagged: bool = sqlx::query_scalar("SELECT is_profile_picture FROM media_files WHERE id = $1")
            .bind(other)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(!flagged);
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_upload_records_type_of_processed_file(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let mut processor = MockMediaProcessor::new();
        processor.expect_probe_duration().returning(|_| Ok(180));
        processor.expect_watermark_audio().returning(|_, output| {
            std::fs::write(output, b"ID3 watermarked")?;
            Ok(())
        });
        let service = service(pool.clone(), dir.path(), processor);
        let (user_id, _) = create_artist(&pool).await;

        let mut upload = form("Ndolo", Some("ndolo.wav"));
        if let Some(ref mut file) = upload.file {
            file.content_type = Some("audio/x-wav".to_string());
        }
        let view = service.upload(user_id, MediaKind::Audio, upload).await.unwrap();

        let content_type: Option<String> = sqlx::query_scalar("SELECT content_type FROM media_files WHERE id = $1")
            .bind(view.file.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(content_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(view.file.original_filename.as_deref(), Some("ndolo.wav"));
    }
}
