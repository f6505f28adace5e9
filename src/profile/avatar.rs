use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use thiserror::Error;

use crate::shared::errors::{StoreError, ValidationError};

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// An avatar file as received from the dashboard, validated before any
/// storage call is made.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl AvatarUpload {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.content_type.starts_with("image/") {
            return Err(ValidationError::NotAnImage);
        }
        if self.bytes.len() > MAX_AVATAR_BYTES {
            return Err(ValidationError::FileTooLarge);
        }
        Ok(())
    }

    pub fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin")
    }
}

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(String);

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError(e.to_string())
    }
}

/// Where avatar objects live. `put` overwrites an existing object at the
/// same path and returns the public URL the row should carry.
#[async_trait]
pub trait AvatarStorage: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StorageError>;
    async fn remove(&self, path: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed storage served by the fronting web tier under a public
/// base URL.
pub struct FsAvatarStorage {
    root: PathBuf,
    public_base_url: String,
}

impl FsAvatarStorage {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url,
        }
    }
}

#[async_trait]
impl AvatarStorage for FsAvatarStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            path
        ))
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.root.join(path)).await?;
        Ok(())
    }
}

/// Recover the storage path (`<user_id>/<file>`) from a public avatar URL.
pub fn object_path_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let mut segments = trimmed.rsplit('/');
    let file = segments.next()?;
    let dir = segments.next()?;
    if file.is_empty() || dir.is_empty() {
        return None;
    }
    Some(format!("{dir}/{file}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, len: usize) -> AvatarUpload {
        AvatarUpload {
            file_name: "me.png".to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn rejects_non_image_content_type() {
        let err = upload("application/pdf", 1024).validate().unwrap_err();
        assert_eq!(err, ValidationError::NotAnImage);
    }

    #[test]
    fn rejects_six_megabyte_file() {
        let err = upload("image/png", 6 * 1024 * 1024).validate().unwrap_err();
        assert_eq!(err, ValidationError::FileTooLarge);
    }

    #[test]
    fn accepts_four_megabyte_png() {
        assert!(upload("image/png", 4 * 1024 * 1024).validate().is_ok());
    }

    #[test]
    fn extension_falls_back_when_missing() {
        let mut u = upload("image/png", 10);
        assert_eq!(u.extension(), "png");
        u.file_name = "noext".to_string();
        assert_eq!(u.extension(), "bin");
        u.file_name = "trailing.".to_string();
        assert_eq!(u.extension(), "bin");
    }

    #[test]
    fn object_path_is_last_two_url_segments() {
        assert_eq!(
            object_path_from_url("https://cdn.example.com/avatars/abc/123.png").as_deref(),
            Some("abc/123.png")
        );
        assert_eq!(object_path_from_url(""), None);
    }

    #[tokio::test]
    async fn fs_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsAvatarStorage::new(
            dir.path().to_path_buf(),
            "http://localhost:8080/avatars".to_string(),
        );

        let url = storage.put("u1/1.png", b"png-bytes").await.unwrap();
        assert_eq!(url, "http://localhost:8080/avatars/u1/1.png");
        assert_eq!(
            tokio::fs::read(dir.path().join("u1/1.png")).await.unwrap(),
            b"png-bytes"
        );

        storage.remove("u1/1.png").await.unwrap();
        assert!(!dir.path().join("u1/1.png").exists());
    }
}
