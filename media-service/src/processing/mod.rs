//! Post-upload processing: durations, watermarks, thumbnails, photo resizing.
//!
//! Every step is best effort. A failing step is logged and the file stays as
//! it was uploaded.

pub mod ffmpeg;
pub mod photo;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::MediaKind;
use crate::storage::{derived_path, LocalStorage, StoredFile};

pub use ffmpeg::FfmpegProcessor;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{0} timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Unexpected output: {0}")]
    Output(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Length in whole seconds.
    async fn probe_duration(&self, input: &Path) -> Result<i32, ProcessingError>;

    async fn watermark_audio(&self, input: &Path, output: &Path) -> Result<(), ProcessingError>;

    async fn watermark_video(&self, input: &Path, output: &Path) -> Result<(), ProcessingError>;

    async fn thumbnail(&self, input: &Path, output: &Path) -> Result<(), ProcessingError>;

    async fn compress_video(
        &self,
        input: &Path,
        output: &Path,
        target_mb: u64,
        duration_seconds: Option<i32>,
    ) -> Result<(), ProcessingError>;

    async fn optimize_photo(&self, input: &Path, output: &Path) -> Result<(), ProcessingError>;
}

/// Outcome of processing one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub file: StoredFile,
    pub duration_seconds: Option<i32>,
    pub thumbnail_path: Option<String>,
    pub has_watermark: bool,
}

impl Processed {
    fn untouched(file: StoredFile) -> Self {
        Self {
            file,
            duration_seconds: None,
            thumbnail_path: None,
            has_watermark: false,
        }
    }
}

pub struct Pipeline<'a> {
    pub processor: &'a dyn MediaProcessor,
    pub storage: &'a LocalStorage,
    pub video_target_mb: u64,
}

impl<'a> Pipeline<'a> {
    pub async fn run(&self, kind: MediaKind, stored: StoredFile) -> Processed {
        match kind {
            MediaKind::Audio => self.audio(stored).await,
            MediaKind::Video => self.video(stored).await,
            MediaKind::Photo => self.photo(stored).await,
            MediaKind::Document => Processed::untouched(stored),
        }
    }

    async fn audio(&self, stored: StoredFile) -> Processed {
        let duration_seconds = self.duration(&stored.relative_path).await;
        let file = self
            .replace_with(&stored, "wm", "mp3", |input, output| async move {
                self.processor.watermark_audio(&input, &output).await
            })
            .await;

        Processed {
            duration_seconds,
            thumbnail_path: None,
            has_watermark: file.is_some(),
            file: file.unwrap_or(stored),
        }
    }

    async fn video(&self, stored: StoredFile) -> Processed {
        let duration_seconds = self.duration(&stored.relative_path).await;

        let target_bytes = (self.video_target_mb * 1024 * 1024) as i64;
        let stored = if stored.file_size > target_bytes {
            let target_mb = self.video_target_mb;
            self.replace_with(&stored, "small", "mp4", |input, output| async move {
                self.processor
                    .compress_video(&input, &output, target_mb, duration_seconds)
                    .await
            })
            .await
            .unwrap_or(stored)
        } else {
            stored
        };

        let thumbnail_path = self.thumbnail(&stored.relative_path).await;

        let watermarked = self
            .replace_with(&stored, "wm", "mp4", |input, output| async move {
                self.processor.watermark_video(&input, &output).await
            })
            .await;

        Processed {
            duration_seconds,
            thumbnail_path,
            has_watermark: watermarked.is_some(),
            file: watermarked.unwrap_or(stored),
        }
    }

    async fn photo(&self, stored: StoredFile) -> Processed {
        let optimized = self
            .replace_with(&stored, "opt", "jpg", |input, output| async move {
                self.processor.optimize_photo(&input, &output).await
            })
            .await;
        Processed::untouched(optimized.unwrap_or(stored))
    }

    async fn duration(&self, relative: &str) -> Option<i32> {
        let input = self.storage.resolve(relative).ok()?;
        match self.processor.probe_duration(&input).await {
            Ok(seconds) => Some(seconds),
            Err(e) => {
                warn!("Could not read duration of {}: {}", relative, e);
                None
            }
        }
    }

    async fn thumbnail(&self, relative: &str) -> Option<String> {
        let thumb = derived_path(relative, "thumb", "jpg");
        let (input, output) = match (self.storage.resolve(relative), self.storage.resolve(&thumb)) {
            (Ok(input), Ok(output)) => (input, output),
            _ => return None,
        };

        match self.processor.thumbnail(&input, &output).await {
            Ok(()) => Some(thumb),
            Err(e) => {
                warn!("Could not generate thumbnail for {}: {}", relative, e);
                self.storage.discard(&thumb).await;
                None
            }
        }
    }

    /// Run `step` from `stored` into a derived file. On success the original
    /// is removed and the derived file described; on failure the partial
    /// output is removed and `None` returned.
    async fn replace_with<F, Fut>(
        &self,
        stored: &StoredFile,
        tag: &str,
        extension: &str,
        step: F,
    ) -> Option<StoredFile>
    where
        F: FnOnce(std::path::PathBuf, std::path::PathBuf) -> Fut,
        Fut: std::future::Future<Output = Result<(), ProcessingError>>,
    {
        let target = derived_path(&stored.relative_path, tag, extension);
        let (input, output) = match (
            self.storage.resolve(&stored.relative_path),
            self.storage.resolve(&target),
        ) {
            (Ok(input), Ok(output)) => (input, output),
            _ => return None,
        };

        if let Err(e) = step(input, output).await {
            warn!("Processing step '{}' failed for {}: {}", tag, stored.relative_path, e);
            self.storage.discard(&target).await;
            return None;
        }

        match self.storage.describe(&target).await {
            Ok(described) => {
                self.storage.discard(&stored.relative_path).await;
                info!("Replaced {} with {}", stored.relative_path, target);
                Some(described)
            }
            Err(e) => {
                warn!("Processed file {} is unreadable: {}", target, e);
                self.storage.discard(&target).await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn pipeline<'a>(processor: &'a MockMediaProcessor, storage: &'a LocalStorage) -> Pipeline<'a> {
        Pipeline {
            processor,
            storage,
            video_target_mb: 50,
        }
    }

    fn write_output(output: &Path, data: &[u8]) -> Result<(), ProcessingError> {
        std::fs::write(output, data)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_audio_is_watermarked_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let stored = storage.store(MediaKind::Audio, "wav", b"RIFF....WAVE").await.unwrap();

        let mut processor = MockMediaProcessor::new();
        processor.expect_probe_duration().returning(|_| Ok(214));
        processor
            .expect_watermark_audio()
            .times(1)
            .returning(|_, output| write_output(output, b"ID3 watermarked"));

        let processed = pipeline(&processor, &storage).run(MediaKind::Audio, stored.clone()).await;

        assert_eq!(processed.duration_seconds, Some(214));
        assert!(processed.has_watermark);
        assert!(processed.file.relative_path.ends_with("_wm.mp3"));
        assert_eq!(processed.file.file_size, 15);
        assert!(!storage.resolve(&stored.relative_path).unwrap().exists());
    }

    #[tokio::test]
    async fn test_failed_watermark_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let stored = storage.store(MediaKind::Audio, "mp3", b"ID3 original").await.unwrap();

        let mut processor = MockMediaProcessor::new();
        processor
            .expect_probe_duration()
            .returning(|_| Err(ProcessingError::Output("no duration".to_string())));
        processor.expect_watermark_audio().returning(|_, output| {
            std::fs::write(output, b"half written").ok();
            Err(ProcessingError::Timeout("ffmpeg".to_string(), Duration::from_secs(1)))
        });

        let processed = pipeline(&processor, &storage).run(MediaKind::Audio, stored.clone()).await;

        assert_eq!(processed.file, stored);
        assert_eq!(processed.duration_seconds, None);
        assert!(!processed.has_watermark);
        assert!(storage.resolve(&stored.relative_path).unwrap().exists());
        let partial = derived_path(&stored.relative_path, "wm", "mp3");
        assert!(!storage.resolve(&partial).unwrap().exists());
    }

    #[tokio::test]
    async fn test_video_gets_thumbnail_and_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let stored = storage.store(MediaKind::Video, "mov", b"small clip").await.unwrap();

        let mut processor = MockMediaProcessor::new();
        processor.expect_probe_duration().returning(|_| Ok(95));
        processor.expect_compress_video().never();
        processor
            .expect_thumbnail()
            .returning(|_, output| write_output(output, b"jpeg"));
        processor
            .expect_watermark_video()
            .returning(|_, output| write_output(output, b"mp4 with logo"));

        let processed = pipeline(&processor, &storage).run(MediaKind::Video, stored.clone()).await;

        assert_eq!(processed.duration_seconds, Some(95));
        assert!(processed.has_watermark);
        let thumb = processed.thumbnail_path.unwrap();
        assert!(thumb.ends_with("_thumb.jpg"));
        assert!(storage.resolve(&thumb).unwrap().exists());
        assert!(processed.file.relative_path.ends_with("_wm.mp4"));
    }

    #[tokio::test]
    async fn test_large_video_is_compressed_first() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let stored = storage.store(MediaKind::Video, "mp4", &[0u8; 2048]).await.unwrap();

        let mut processor = MockMediaProcessor::new();
        processor.expect_probe_duration().returning(|_| Ok(60));
        processor
            .expect_compress_video()
            .withf(|_, _, target, duration| *target == 0 && *duration == Some(60))
            .times(1)
            .returning(|_, output, _, _| write_output(output, b"compressed"));
        processor
            .expect_thumbnail()
            .returning(|_, _| Err(ProcessingError::Output("no frame".to_string())));
        processor
            .expect_watermark_video()
            .withf(|input: &Path, _| input.to_string_lossy().ends_with("_small.mp4"))
            .returning(|_, _| Err(ProcessingError::Output("overlay failed".to_string())));

        let processor_ref = &processor;
        let processed = Pipeline {
            processor: processor_ref,
            storage: &storage,
            video_target_mb: 0,
        }
        .run(MediaKind::Video, stored)
        .await;

        assert!(processed.file.relative_path.ends_with("_small.mp4"));
        assert_eq!(processed.file.file_size, 10);
        assert_eq!(processed.thumbnail_path, None);
        assert!(!processed.has_watermark);
    }

    #[tokio::test]
    async fn test_documents_are_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let stored = storage.store(MediaKind::Document, "pdf", b"%PDF-1.7").await.unwrap();

        let processor = MockMediaProcessor::new();
        let processed = pipeline(&processor, &storage)
            .run(MediaKind::Document, stored.clone())
            .await;

        assert_eq!(processed, Processed::untouched(stored));
    }

    #[tokio::test]
    async fn test_photo_is_optimized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let stored = storage.store(MediaKind::Photo, "png", b"png bytes").await.unwrap();

        let mut processor = MockMediaProcessor::new();
        processor
            .expect_optimize_photo()
            .returning(|input: &Path, output: &Path| {
                assert!(PathBuf::from(input).exists());
                write_output(output, b"jpeg")
            });

        let processed = pipeline(&processor, &storage).run(MediaKind::Photo, stored).await;
        assert!(processed.file.relative_path.ends_with("_opt.jpg"));
        assert!(!processed.has_watermark);
    }
}
