//! Local filesystem store.
//!
//! Layout under the storage root:
//!
//! ```text
//! uploads/    source videos, one file per asset, never modified
//! staging/    renders in progress, private to the service
//! artifacts/  published renders, served by name
//! ```
//!
//! `staging/` and `artifacts/` live under the same root so publication is a
//! rename.

use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use vsess_models::{file_extension, is_safe_file_name, ArtifactName, AssetId};

use crate::error::{StorageError, StorageResult};
use crate::fs_utils::{move_file, remove_if_exists};

const UPLOADS_DIR: &str = "uploads";
const STAGING_DIR: &str = "staging";
const ARTIFACTS_DIR: &str = "artifacts";

/// Suffix of in-progress renders inside the staging directory.
const STAGING_SUFFIX: &str = ".part";

/// A source file that has been fully written to the uploads directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub id: AssetId,
    /// File name inside the uploads directory
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Local storage for uploads and artifacts.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    uploads: PathBuf,
    staging: PathBuf,
    artifacts: PathBuf,
}

impl LocalStore {
    /// Open the store, creating its directories if needed.
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        let store = Self {
            uploads: root.join(UPLOADS_DIR),
            staging: root.join(STAGING_DIR),
            artifacts: root.join(ARTIFACTS_DIR),
            root,
        };

        for dir in [&store.uploads, &store.staging, &store.artifacts] {
            fs::create_dir_all(dir).await?;
        }

        info!("Opened local store at {}", store.root.display());
        Ok(store)
    }

    /// Stored file name for an upload of `id` whose client name was `filename`.
    ///
    /// Only the extension of the client name is kept; it helps FFmpeg pick
    /// a demuxer for containers without a clear signature.
    pub fn source_file_name(id: &AssetId, filename: &str) -> String {
        match file_extension(filename) {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.to_string(),
        }
    }

    /// Path of a stored upload.
    pub fn source_path(&self, file_name: &str) -> StorageResult<PathBuf> {
        if !is_safe_file_name(file_name) {
            return Err(StorageError::invalid_name(file_name));
        }
        Ok(self.uploads.join(file_name))
    }

    /// Start writing a new upload for `id`.
    pub async fn create_upload(&self, id: &AssetId, filename: &str) -> StorageResult<UploadWriter> {
        let file_name = Self::source_file_name(id, filename);
        let path = self.source_path(&file_name)?;

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        debug!("Receiving upload into {}", path.display());
        Ok(UploadWriter {
            id: id.clone(),
            file_name,
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Delete a stored upload. Missing files are not an error.
    pub async fn discard_upload(&self, file_name: &str) -> StorageResult<()> {
        let path = self.source_path(file_name)?;
        if remove_if_exists(&path).await? {
            debug!("Discarded upload {}", file_name);
        }
        Ok(())
    }

    /// Every complete upload in the uploads directory.
    ///
    /// Files whose stem is not an asset id are skipped.
    pub async fn list_uploads(&self) -> StorageResult<Vec<StoredUpload>> {
        let mut uploads = Vec::new();
        let mut entries = fs::read_dir(&self.uploads).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let stem = file_name.split_once('.').map_or(file_name.as_str(), |(s, _)| s);
            let Some(id) = AssetId::parse(stem) else {
                warn!("Skipping unrecognised file in uploads: {}", file_name);
                continue;
            };

            uploads.push(StoredUpload {
                id,
                path: entry.path(),
                file_name,
                size_bytes: metadata.len(),
            });
        }

        uploads.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(uploads)
    }

    /// Path a render of `name` writes to before publication.
    pub fn staging_path(&self, name: &ArtifactName) -> PathBuf {
        self.staging.join(format!("{}{}", name, STAGING_SUFFIX))
    }

    /// Remove a staging file. Missing files are not an error.
    pub async fn discard_staging(&self, name: &ArtifactName) -> StorageResult<()> {
        remove_if_exists(self.staging_path(name)).await?;
        Ok(())
    }

    /// Remove every leftover staging file, returning how many were removed.
    pub async fn sweep_staging(&self) -> StorageResult<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.staging).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() && remove_if_exists(entry.path()).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Removed {} stale staging files", removed);
        }
        Ok(removed)
    }

    /// Path of a published artifact.
    pub fn artifact_path(&self, name: &ArtifactName) -> PathBuf {
        self.artifacts.join(name.as_str())
    }

    /// Move a finished render from staging into the artifacts directory.
    ///
    /// Returns the published size in bytes.
    pub async fn publish_artifact(&self, name: &ArtifactName) -> StorageResult<u64> {
        let staged = self.staging_path(name);
        let size = fs::metadata(&staged)
            .await
            .map_err(|e| StorageError::publish_failed(format!("staged render missing: {}", e)))?
            .len();
        if size == 0 {
            return Err(StorageError::publish_failed("staged render is empty"));
        }

        move_file(&staged, self.artifact_path(name)).await?;
        info!("Published artifact {} ({} bytes)", name, size);
        Ok(size)
    }

    /// Open a published artifact for reading.
    pub async fn open_artifact(&self, name: &ArtifactName) -> StorageResult<(File, u64)> {
        let path = self.artifact_path(name);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(name.as_str()));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(StorageError::not_found(name.as_str()));
        }
        Ok((file, metadata.len()))
    }

    /// Published artifacts derived from `id`.
    pub async fn list_artifacts_for(&self, id: &AssetId) -> StorageResult<Vec<ArtifactName>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.artifacts).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(name) = ArtifactName::parse(&file_name) {
                if name.belongs_to(id) {
                    names.push(name);
                }
            }
        }

        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names)
    }

    /// Delete a published artifact. Missing files are not an error.
    pub async fn remove_artifact(&self, name: &ArtifactName) -> StorageResult<()> {
        remove_if_exists(self.artifact_path(name)).await?;
        Ok(())
    }

    /// Check that the store can create files.
    pub async fn check_writable(&self) -> StorageResult<()> {
        let probe = self.staging.join(".write-check");
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }
}

/// Streams an upload to disk chunk by chunk.
#[derive(Debug)]
pub struct UploadWriter {
    id: AssetId,
    file_name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl UploadWriter {
    /// Append a chunk.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.writer.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Flush and close the file. The file is deleted if it cannot be synced.
    pub async fn finish(mut self) -> StorageResult<StoredUpload> {
        let synced = match self.writer.flush().await {
            Ok(()) => self.writer.get_mut().sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            warn!("Failed to sync upload {}: {}", self.path.display(), e);
            if let Err(cleanup) = self.abort().await {
                warn!("Failed to remove unsynced upload: {}", cleanup);
            }
            return Err(e.into());
        }

        Ok(StoredUpload {
            id: self.id,
            file_name: self.file_name,
            path: self.path,
            size_bytes: self.written,
        })
    }

    /// Close and delete the partial file.
    pub async fn abort(self) -> StorageResult<()> {
        let path = self.path;
        drop(self.writer);
        remove_if_exists(&path).await?;
        debug!("Aborted upload {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, LocalStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[test]
    fn test_source_file_name() {
        let id = AssetId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            LocalStore::source_file_name(&id, "clip.MP4"),
            "67e55044-10b1-426f-9247-bb680e5fe0c8.mp4"
        );
        assert_eq!(
            LocalStore::source_file_name(&id, "video"),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }

    #[tokio::test]
    async fn test_upload_roundtrip() {
        let (_dir, store) = store().await;
        let id = AssetId::new();

        let mut writer = store.create_upload(&id, "clip.mp4").await.unwrap();
        writer.write_chunk(b"hello ").await.unwrap();
        writer.write_chunk(b"world").await.unwrap();
        assert_eq!(writer.written(), 11);
        let upload = writer.finish().await.unwrap();

        assert_eq!(upload.size_bytes, 11);
        assert_eq!(fs::read(&upload.path).await.unwrap(), b"hello world");

        let listed = store.list_uploads().await.unwrap();
        assert_eq!(listed, vec![upload.clone()]);

        store.discard_upload(&upload.file_name).await.unwrap();
        assert!(!upload.path.exists());
        assert!(store.list_uploads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abort_removes_partial_upload() {
        let (_dir, store) = store().await;
        let id = AssetId::new();

        let mut writer = store.create_upload(&id, "clip.mp4").await.unwrap();
        writer.write_chunk(b"partial").await.unwrap();
        let path = store.source_path(writer.file_name()).unwrap();
        writer.abort().await.unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_list_uploads_skips_foreign_files() {
        let (dir, store) = store().await;
        fs::write(dir.path().join("uploads").join("notes.txt"), b"x")
            .await
            .unwrap();
        assert!(store.list_uploads().await.unwrap().is_empty());
    }

    #[test]
    fn test_source_path_rejects_traversal() {
        let store = LocalStore {
            root: PathBuf::from("/data"),
            uploads: PathBuf::from("/data/uploads"),
            staging: PathBuf::from("/data/staging"),
            artifacts: PathBuf::from("/data/artifacts"),
        };
        assert!(store.source_path("../secret").is_err());
        assert!(store.source_path("a/b").is_err());
    }

    #[tokio::test]
    async fn test_publish_artifact() {
        let (_dir, store) = store().await;
        let name = ArtifactName::generate(&AssetId::new());

        // Not visible before publication
        fs::write(store.staging_path(&name), b"mp4 data").await.unwrap();
        assert!(matches!(
            store.open_artifact(&name).await,
            Err(StorageError::NotFound(_))
        ));

        let size = store.publish_artifact(&name).await.unwrap();
        assert_eq!(size, 8);
        assert!(!store.staging_path(&name).exists());

        let (_file, len) = store.open_artifact(&name).await.unwrap();
        assert_eq!(len, 8);
    }

    #[tokio::test]
    async fn test_publish_without_render_fails() {
        let (_dir, store) = store().await;
        let name = ArtifactName::generate(&AssetId::new());

        assert!(store.publish_artifact(&name).await.is_err());

        fs::write(store.staging_path(&name), b"").await.unwrap();
        assert!(store.publish_artifact(&name).await.is_err());
        assert!(!store.artifact_path(&name).exists());
    }

    #[tokio::test]
    async fn test_sweep_staging() {
        let (_dir, store) = store().await;
        let name = ArtifactName::generate(&AssetId::new());
        fs::write(store.staging_path(&name), b"partial").await.unwrap();

        assert_eq!(store.sweep_staging().await.unwrap(), 1);
        assert_eq!(store.sweep_staging().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_and_remove_artifacts() {
        let (_dir, store) = store().await;
        let id = AssetId::new();
        let other = AssetId::new();

        let mine = ArtifactName::generate(&id);
        let theirs = ArtifactName::generate(&other);
        for name in [&mine, &theirs] {
            fs::write(store.staging_path(name), b"data").await.unwrap();
            store.publish_artifact(name).await.unwrap();
        }

        assert_eq!(store.list_artifacts_for(&id).await.unwrap(), vec![mine.clone()]);

        store.remove_artifact(&mine).await.unwrap();
        assert!(store.list_artifacts_for(&id).await.unwrap().is_empty());
        assert_eq!(store.list_artifacts_for(&other).await.unwrap(), vec![theirs]);
    }

    #[tokio::test]
    async fn test_check_writable() {
        let (_dir, store) = store().await;
        store.check_writable().await.unwrap();
    }
}
