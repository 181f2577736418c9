//! Local filesystem storage for uploaded media.
//!
//! Files live under `<root>/<kind>/<year>/<month>/<uuid>.<ext>` and are
//! addressed everywhere else by that relative path. Writes go to a temp file
//! in `<root>/.uploading` first and are renamed into place once synced.

use chrono::{Datelike, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::MediaKind;

const TEMP_DIR: &str = ".uploading";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path escapes the media root: {0}")]
    OutsideRoot(String),
}

/// A file that landed in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub relative_path: String,
    pub file_size: i64,
    pub file_hash: String,
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` under a fresh name for `kind`, keeping the extension.
    pub async fn store(
        &self,
        kind: MediaKind,
        extension: &str,
        data: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let now = Utc::now();
        let relative_path = format!(
            "{}/{}/{:02}/{}.{}",
            kind.as_str(),
            now.year(),
            now.month(),
            Uuid::new_v4(),
            extension
        );

        let mut writer = TempWriter::new(&self.root.join(TEMP_DIR)).await?;
        writer.write(data).await?;
        writer.finalize(&self.resolve(&relative_path)?).await?;

        info!("Stored {} bytes at {}", data.len(), relative_path);

        Ok(StoredFile {
            relative_path,
            file_size: data.len() as i64,
            file_hash: hash_bytes(data),
        })
    }

    /// Absolute path of a stored file. Rejects anything that could leave the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let relative_path = Path::new(relative);
        let clean = relative_path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        let path = self.root.join(relative_path);
        if !clean || relative.is_empty() || !path.starts_with(&self.root) {
            return Err(StorageError::OutsideRoot(relative.to_string()));
        }
        Ok(path)
    }

    /// Size and hash of a file already in storage, e.g. after re-encoding.
    pub async fn describe(&self, relative: &str) -> Result<StoredFile, StorageError> {
        let data = tokio::fs::read(self.resolve(relative)?).await?;
        Ok(StoredFile {
            relative_path: relative.to_string(),
            file_size: data.len() as i64,
            file_hash: hash_bytes(&data),
        })
    }

    pub async fn remove(&self, relative: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.resolve(relative)?).await {
            Ok(()) => {
                debug!("Removed {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best effort removal, for cleanup paths that must not fail the request.
    pub async fn discard(&self, relative: &str) {
        if let Err(e) = self.remove(relative).await {
            warn!("Failed to remove {}: {}", relative, e);
        }
    }
}

/// Sibling of `relative` sharing its stem: `a/b/<stem>_<tag>.<ext>`.
pub fn derived_path(relative: &str, tag: &str, extension: &str) -> String {
    let (dir, name) = match relative.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, relative),
    };
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    match dir {
        Some(dir) => format!("{}/{}_{}.{}", dir, stem, tag, extension),
        None => format!("{}_{}.{}", stem, tag, extension),
    }
}

pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Temp file that is removed unless it is moved into place.
#[derive(Debug)]
struct TempWriter {
    file: Option<(File, PathBuf)>,
}

impl TempWriter {
    async fn new(temp_dir: &Path) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(temp_dir).await?;
        let (file, path) = loop {
            let path = temp_dir.join(format!("{}.tmp", Uuid::new_v4()));
            match File::options().create_new(true).write(true).open(&path).await {
                Ok(file) => break (file, path),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        };

        Ok(Self {
            file: Some((file, path)),
        })
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        match &mut self.file {
            Some((file, _)) => file.write_all(data).await,
            None => Err(ErrorKind::NotFound.into()),
        }
    }

    async fn finalize(mut self, target: &Path) -> std::io::Result<()> {
        if let Some((file, temp_path)) = self.file.take() {
            file.sync_all().await?;
            drop(file);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if let Err(e) = tokio::fs::rename(&temp_path, target).await {
                std::fs::remove_file(&temp_path).ok();
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Drop for TempWriter {
    fn drop(&mut self) {
        if let Some((_file, temp_path)) = self.file.take() {
            std::fs::remove_file(temp_path).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_store_and_describe() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let stored = storage
            .store(MediaKind::Audio, "mp3", b"ID3 bikutsi")
            .await
            .unwrap();

        assert!(stored.relative_path.starts_with("audio/"));
        assert!(stored.relative_path.ends_with(".mp3"));
        assert_eq!(stored.file_size, 11);
        assert_eq!(stored.file_hash.len(), 64);

        let described = storage.describe(&stored.relative_path).await.unwrap();
        assert_eq!(described, stored);

        // Temp directory is left empty
        let mut leftovers = tokio::fs::read_dir(dir.path().join(TEMP_DIR)).await.unwrap();
        assert!(leftovers.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let stored = storage.store(MediaKind::Document, "pdf", b"%PDF").await.unwrap();

        storage.remove(&stored.relative_path).await.unwrap();
        assert!(!storage.resolve(&stored.relative_path).unwrap().exists());
        storage.remove(&stored.relative_path).await.unwrap();
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let storage = LocalStorage::new("/srv/media");
        assert!(storage.resolve("photo/2026/10/a.jpg").is_ok());
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("photo/../../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
    }

    #[test]
    fn test_derived_path() {
        assert_eq!(
            derived_path("audio/2026/10/abc.wav", "wm", "mp3"),
            "audio/2026/10/abc_wm.mp3"
        );
        assert_eq!(derived_path("clip.mov", "thumb", "jpg"), "clip_thumb.jpg");
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
