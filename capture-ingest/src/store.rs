//! Artifact storage
//!
//! The store is the source of truth for which artifact bytes exist. Writes
//! are idempotent overwrites and never expose a partially written file.

use async_trait::async_trait;
use capture_common::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::ArtifactPath;

/// Durable artifact storage keyed by (child, session, filename)
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes`, replacing any artifact already at `path`
    async fn put(&self, path: &ArtifactPath, bytes: &[u8]) -> Result<()>;

    /// Whether a complete artifact exists at `path`
    async fn exists(&self, path: &ArtifactPath) -> Result<bool>;
}

/// Stores artifacts under `{photos_dir}/{childName}/{sessionId}/{filename}`
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    photos_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(photos_dir: impl Into<PathBuf>) -> Self {
        Self {
            photos_dir: photos_dir.into(),
        }
    }

    fn session_dir(&self, path: &ArtifactPath) -> PathBuf {
        self.photos_dir
            .join(&path.key.child_name)
            .join(&path.key.session_id)
    }

    /// Absolute filesystem location of an artifact
    pub fn resolve(&self, path: &ArtifactPath) -> PathBuf {
        self.session_dir(path).join(&path.filename)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, path: &ArtifactPath, bytes: &[u8]) -> Result<()> {
        let dir = self.session_dir(path);
        tokio::fs::create_dir_all(&dir).await?;

        // Write under a unique hidden name, then rename over the destination.
        // Rename within one directory is atomic, so `exists` only ever sees
        // complete files and concurrent retries never interleave bytes.
        let temp_path = dir.join(format!(".{}.{}.partial", path.filename, Uuid::new_v4()));
        let destination = dir.join(&path.filename);

        let written = write_and_sync(&temp_path, bytes).await;
        let result = match written {
            Ok(()) => tokio::fs::rename(&temp_path, &destination).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                tracing::debug!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Temporary artifact file not removed"
                );
            }
            return Err(e.into());
        }

        tracing::debug!(path = %destination.display(), bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    async fn exists(&self, path: &ArtifactPath) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// In-memory store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &ArtifactPath) -> Option<Vec<u8>> {
        self.artifacts.read().await.get(&path.relative()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, path: &ArtifactPath, bytes: &[u8]) -> Result<()> {
        self.artifacts
            .write()
            .await
            .insert(path.relative(), bytes.to_vec());
        Ok(())
    }

    async fn exists(&self, path: &ArtifactPath) -> Result<bool> {
        Ok(self.artifacts.read().await.contains_key(&path.relative()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionKey;
    use tempfile::TempDir;

    fn artifact(filename: &str) -> ArtifactPath {
        ArtifactPath::new(&SessionKey::new("amy", "s1").unwrap(), filename)
    }

    #[tokio::test]
    async fn test_fs_put_creates_session_directory() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().join("photos"));
        let path = artifact("img-g1-4.png");

        store.put(&path, b"frame").await.unwrap();

        let on_disk = dir.path().join("photos/amy/s1/img-g1-4.png");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"frame");
        assert!(store.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_fs_put_overwrites_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let path = artifact("img-g1-4.png");

        store.put(&path, b"first").await.unwrap();
        store.put(&path, b"second").await.unwrap();

        let session_dir = dir.path().join("amy/s1");
        let entries: Vec<_> = std::fs::read_dir(&session_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(std::fs::read(session_dir.join("img-g1-4.png")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_fs_failed_rename_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let path = artifact("img-g1-4.png");

        // A non-empty directory at the destination makes the rename fail
        let blocker = dir.path().join("amy/s1/img-g1-4.png");
        std::fs::create_dir_all(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        assert!(store.put(&path, b"frame").await.is_err());

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("amy/s1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["img-g1-4.png".to_string()]);
        assert!(blocker.is_dir());
        assert!(store.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_fs_exists_false_for_missing() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(!store.exists(&artifact("screenshot-g1-4.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryArtifactStore::new();
        let path = artifact("img-g1-4.png");

        assert!(!store.exists(&path).await.unwrap());
        store.put(&path, b"frame").await.unwrap();
        assert!(store.exists(&path).await.unwrap());
        assert_eq!(store.get(&path).await, Some(b"frame".to_vec()));
        assert_eq!(store.len().await, 1);
    }
}
