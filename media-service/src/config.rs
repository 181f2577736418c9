use anyhow::Result;
use serde::{Deserialize, Serialize};
use shared::config::{DatabaseConfig, JwtConfig, ServerConfig};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::MediaKind;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub root: PathBuf,
    /// URL prefix stored files are served under
    pub public_prefix: String,
    pub max_size_mb: KindLimits,
    pub quotas: KindLimits,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub ffmpeg_timeout_seconds: u64,
    pub watermark_path: PathBuf,
    /// Uploaded videos above this size are re-encoded down to it
    pub video_target_mb: u64,
}

/// One number per media kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindLimits {
    pub audio: u64,
    pub video: u64,
    pub photo: u64,
    pub document: u64,
}

impl KindLimits {
    pub fn get(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Audio => self.audio,
            MediaKind::Video => self.video,
            MediaKind::Photo => self.photo,
            MediaKind::Document => self.document,
        }
    }

    fn largest(&self) -> u64 {
        self.audio.max(self.video).max(self.photo).max(self.document)
    }

    fn from_env(prefix: &str, defaults: KindLimits) -> Result<Self> {
        let read = |kind: &str, default: u64| -> Result<u64> {
            Ok(std::env::var(format!("{}_{}", prefix, kind))
                .unwrap_or_else(|_| default.to_string())
                .parse()?)
        };

        Ok(Self {
            audio: read("AUDIO", defaults.audio)?,
            video: read("VIDEO", defaults.video)?,
            photo: read("PHOTO", defaults.photo)?,
            document: read("DOCUMENT", defaults.document)?,
        })
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./media"),
            public_prefix: "/media".to_string(),
            max_size_mb: KindLimits {
                audio: 25,
                video: 100,
                photo: 15,
                document: 10,
            },
            quotas: KindLimits {
                audio: 3,
                video: 2,
                photo: 6,
                document: 5,
            },
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            ffmpeg_timeout_seconds: 300,
            watermark_path: PathBuf::from("./media/watermarks/talentzik_logo.png"),
            video_target_mb: 50,
        }
    }
}

impl MediaConfig {
    pub fn max_bytes(&self, kind: MediaKind) -> u64 {
        self.max_size_mb.get(kind) * MB
    }

    pub fn quota(&self, kind: MediaKind) -> i64 {
        self.quotas.get(kind) as i64
    }

    /// Request body cap for uploads: the largest file plus room for the form fields.
    pub fn max_request_bytes(&self) -> usize {
        ((self.max_size_mb.largest() + 1) * MB) as usize
    }

    pub fn ffmpeg_timeout(&self) -> Duration {
        Duration::from_secs(self.ffmpeg_timeout_seconds)
    }

    pub fn public_url(&self, relative: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), relative)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = MediaConfig::default();
        let root = std::env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.root);
        let watermark_path = std::env::var("WATERMARK_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| root.join("watermarks").join("talentzik_logo.png"));

        Ok(Self {
            server: ServerConfig::from_env("MEDIA_SERVICE_PORT", 8083)?,
            database: DatabaseConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            media: MediaConfig {
                root,
                public_prefix: std::env::var("MEDIA_URL_PREFIX").unwrap_or(defaults.public_prefix),
                max_size_mb: KindLimits::from_env("MAX_UPLOAD_MB", defaults.max_size_mb)?,
                quotas: KindLimits::from_env("MEDIA_QUOTA", defaults.quotas)?,
                ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
                ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or(defaults.ffprobe_path),
                ffmpeg_timeout_seconds: std::env::var("FFMPEG_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| defaults.ffmpeg_timeout_seconds.to_string())
                    .parse()?,
                watermark_path,
                video_target_mb: std::env::var("VIDEO_TARGET_MB")
                    .unwrap_or_else(|_| defaults.video_target_mb.to_string())
                    .parse()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = MediaConfig::default();
        assert_eq!(config.max_bytes(MediaKind::Audio), 25 * MB);
        assert_eq!(config.max_bytes(MediaKind::Video), 100 * MB);
        assert_eq!(config.quota(MediaKind::Photo), 6);
        assert_eq!(config.quota(MediaKind::Document), 5);
        assert_eq!(config.max_request_bytes(), (101 * MB) as usize);
    }

    #[test]
    fn test_public_url() {
        let mut config = MediaConfig::default();
        assert_eq!(config.public_url("audio/2026/10/a.mp3"), "/media/audio/2026/10/a.mp3");

        config.public_prefix = "https://cdn.talentzik.cm/media/".to_string();
        assert_eq!(
            config.public_url("photo/x.jpg"),
            "https://cdn.talentzik.cm/media/photo/x.jpg"
        );
    }
}
