//! Video session service: ingest, frame access, transform and download.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::{pin_mut, Stream, StreamExt};
use serde::Serialize;
use tokio::fs::File;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use vsess_media::{VideoInfo, VideoToolkit};
use vsess_models::{
    clamp_frame_index, sanitize_filename, ArtifactName, AssetId, CropRect, DerivedArtifact,
    OutputLayout, VideoAsset,
};
use vsess_storage::{AssetRegistry, LocalStore, StorageError, StoredUpload};

use crate::config::SessionConfig;
use crate::metrics;
use crate::services::error::{SessionError, SessionResult};

/// A decoded frame.
#[derive(Debug, Clone)]
pub struct FrameImage {
    /// Index of the frame actually returned, after clamping
    pub index: u64,
    pub png: Vec<u8>,
}

/// An open artifact ready to be streamed.
#[derive(Debug)]
pub struct ArtifactDownload {
    pub name: ArtifactName,
    pub file: File,
    pub size_bytes: u64,
}

/// An asset and the artifacts rendered from it.
#[derive(Debug, Clone, Serialize)]
pub struct AssetDetails {
    pub asset: VideoAsset,
    pub artifacts: Vec<DerivedArtifact>,
}

/// Result of deleting an asset.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedAsset {
    pub file_id: AssetId,
    pub artifacts_removed: usize,
}

/// Outcome of restoring stored uploads on startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    pub already_registered: usize,
    pub unreadable: usize,
    pub staging_removed: usize,
}

/// Dependency checks for readiness.
#[derive(Debug, Clone)]
pub struct ReadinessReport {
    pub toolkit: Result<(), String>,
    pub storage: Result<(), String>,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.toolkit.is_ok() && self.storage.is_ok()
    }
}

/// Composes storage, the asset registry and the media toolkit into the
/// operations exposed over HTTP.
pub struct SessionService {
    store: LocalStore,
    registry: Arc<dyn AssetRegistry>,
    toolkit: Arc<dyn VideoToolkit>,
    transform_permits: Arc<Semaphore>,
    min_width: u32,
    min_height: u32,
}

impl SessionService {
    pub fn new(
        config: &SessionConfig,
        store: LocalStore,
        registry: Arc<dyn AssetRegistry>,
        toolkit: Arc<dyn VideoToolkit>,
    ) -> Self {
        Self {
            store,
            registry,
            toolkit,
            transform_permits: Arc::new(Semaphore::new(config.max_concurrent_transforms.max(1))),
            min_width: config.min_video_width,
            min_height: config.min_video_height,
        }
    }

    /// Store an uploaded video and register it.
    ///
    /// `chunks` is consumed as it arrives; the upload is never held in
    /// memory. Bytes that turn out not to be a usable video are deleted
    /// before returning the error.
    pub async fn ingest<S, B, E>(&self, filename: &str, chunks: S) -> SessionResult<VideoAsset>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let started = Instant::now();
        let filename = sanitize_filename(filename);
        let id = AssetId::new();

        let mut writer = self
            .store
            .create_upload(&id, &filename)
            .await
            .map_err(|e| SessionError::from_storage("upload", e))?;

        pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            let written = match chunk {
                Ok(bytes) => writer.write_chunk(bytes.as_ref()).await,
                Err(e) => {
                    warn!(file_id = %id, error = %e, "Upload interrupted");
                    discard_writer(writer).await;
                    metrics::record_upload("interrupted");
                    return Err(SessionError::validation("upload was interrupted"));
                }
            };
            if let Err(e) = written {
                discard_writer(writer).await;
                return Err(SessionError::from_storage("upload", e));
            }
        }

        if writer.written() == 0 {
            discard_writer(writer).await;
            metrics::record_upload("empty");
            return Err(SessionError::validation("uploaded file is empty"));
        }

        let upload = writer
            .finish()
            .await
            .map_err(|e| SessionError::from_storage("upload", e))?;

        let info = match self.toolkit.probe(&upload.path).await {
            Ok(info) => info,
            Err(e) => {
                self.discard_upload(&upload).await;
                metrics::record_upload("unreadable");
                return Err(SessionError::decode("reading the uploaded video", e));
            }
        };

        if info.width < self.min_width || info.height < self.min_height {
            self.discard_upload(&upload).await;
            metrics::record_upload("too_small");
            return Err(SessionError::validation(format!(
                "video is {}x{}, minimum is {}x{}",
                info.width, info.height, self.min_width, self.min_height
            )));
        }

        let asset = build_asset(&upload, filename, &info);
        if let Err(e) = self.registry.insert_asset(asset.clone()).await {
            self.discard_upload(&upload).await;
            metrics::record_upload("failed");
            return Err(SessionError::from_storage("asset registration", e));
        }

        metrics::record_upload("ok");
        metrics::record_ffmpeg_duration("ingest", started.elapsed().as_secs_f64());
        info!(
            file_id = %asset.id,
            width = asset.width,
            height = asset.height,
            frame_count = asset.frame_count,
            size_bytes = asset.size_bytes,
            "Ingested upload"
        );
        Ok(asset)
    }

    /// Decode one frame of an asset as PNG.
    ///
    /// Out of range indices resolve to the first or last frame.
    pub async fn frame(&self, file_id: &str, frame_index: i64) -> SessionResult<FrameImage> {
        let asset = self.resolve_asset(file_id).await?;
        let index = clamp_frame_index(frame_index, asset.frame_count);
        let source = self.source_path(&asset)?;

        let started = Instant::now();
        let png = self
            .toolkit
            .extract_frame(&source, index, asset.fps)
            .await
            .map_err(|e| SessionError::decode("frame decode", e))?;

        metrics::record_frame_served();
        metrics::record_ffmpeg_duration("frame", started.elapsed().as_secs_f64());
        debug!(file_id = %asset.id, frame_index = index, bytes = png.len(), "Frame decoded");

        Ok(FrameImage { index, png })
    }

    /// Render a cropped copy of an asset and publish it.
    ///
    /// The rectangle is clamped to the frame; a rectangle that does not
    /// overlap the frame at all is rejected and nothing is created.
    pub async fn transform(
        &self,
        file_id: &str,
        crop: CropRect,
        layout: OutputLayout,
    ) -> SessionResult<DerivedArtifact> {
        let asset = self.resolve_asset(file_id).await?;
        let clamped = crop
            .clamp_to(asset.width, asset.height)
            .map_err(|e| SessionError::validation(e.to_string()))?;
        let source = self.source_path(&asset)?;

        let _permit = self
            .transform_permits
            .acquire()
            .await
            .map_err(|_| SessionError::internal("transform queue closed"))?;

        let name = ArtifactName::generate(&asset.id);
        let staging = self.store.staging_path(&name);
        info!(
            file_id = %asset.id,
            out_file = %name,
            layout = %layout,
            x = clamped.x,
            y = clamped.y,
            width = clamped.width,
            height = clamped.height,
            "Starting transform"
        );

        let started = Instant::now();
        let rendered = match self.toolkit.render(&source, &staging, &clamped, layout).await {
            Ok(rendered) => rendered,
            Err(e) => {
                self.discard_staging(&name).await;
                metrics::record_transform(layout.as_str(), "failed");
                return Err(SessionError::encode("transform", e));
            }
        };

        let size_bytes = match self.store.publish_artifact(&name).await {
            Ok(size) => size,
            Err(e) => {
                self.discard_staging(&name).await;
                metrics::record_transform(layout.as_str(), "failed");
                return Err(SessionError::from_storage("artifact publication", e));
            }
        };

        let artifact = DerivedArtifact {
            name,
            source: asset.id.clone(),
            crop: clamped,
            layout,
            width: rendered.width,
            height: rendered.height,
            size_bytes,
            created_at: Utc::now(),
        };

        // Refused when the asset was deleted while rendering.
        if let Err(e) = self.registry.insert_artifact(artifact.clone()).await {
            if let Err(cleanup) = self.store.remove_artifact(&artifact.name).await {
                warn!(out_file = %artifact.name, error = %cleanup, "Failed to remove unregistered artifact");
            }
            metrics::record_transform(layout.as_str(), "failed");
            return Err(match e {
                StorageError::NotFound(_) => SessionError::not_found("video not found"),
                other => SessionError::from_storage("artifact registration", other),
            });
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_transform(layout.as_str(), "ok");
        metrics::record_ffmpeg_duration("transform", elapsed);
        info!(
            file_id = %asset.id,
            out_file = %artifact.name,
            width = artifact.width,
            height = artifact.height,
            duration_secs = elapsed,
            "Transform published"
        );
        Ok(artifact)
    }

    /// Open a published artifact by name.
    pub async fn download(&self, out_file: &str) -> SessionResult<ArtifactDownload> {
        let name = ArtifactName::parse(out_file).map_err(|_| SessionError::not_found("file not found"))?;
        let (file, size_bytes) = self
            .store
            .open_artifact(&name)
            .await
            .map_err(|e| SessionError::from_storage("file", e))?;

        Ok(ArtifactDownload {
            name,
            file,
            size_bytes,
        })
    }

    /// The asset record and the artifacts rendered from it.
    pub async fn asset_details(&self, file_id: &str) -> SessionResult<AssetDetails> {
        let asset = self.resolve_asset(file_id).await?;
        let artifacts = self
            .registry
            .artifacts_for(&asset.id)
            .await
            .map_err(|e| SessionError::from_storage("artifact lookup", e))?;
        Ok(AssetDetails { asset, artifacts })
    }

    /// Delete an asset, its source bytes and every artifact derived from it.
    pub async fn delete_asset(&self, file_id: &str) -> SessionResult<DeletedAsset> {
        let id = AssetId::parse(file_id).ok_or_else(|| SessionError::not_found("video not found"))?;
        let (asset, registered) = self
            .registry
            .remove_asset(&id)
            .await
            .map_err(|e| SessionError::from_storage("asset removal", e))?
            .ok_or_else(|| SessionError::not_found("video not found"))?;

        self.store
            .discard_upload(&asset.source_file)
            .await
            .map_err(|e| SessionError::from_storage("source removal", e))?;

        // Artifacts published before a restart are on disk but not registered.
        let mut names: Vec<ArtifactName> = registered.into_iter().map(|a| a.name).collect();
        let on_disk = self
            .store
            .list_artifacts_for(&id)
            .await
            .map_err(|e| SessionError::from_storage("artifact lookup", e))?;
        for name in on_disk {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        for name in &names {
            self.store
                .remove_artifact(name)
                .await
                .map_err(|e| SessionError::from_storage("artifact removal", e))?;
        }

        info!(file_id = %id, artifacts_removed = names.len(), "Deleted asset");
        Ok(DeletedAsset {
            file_id: id,
            artifacts_removed: names.len(),
        })
    }

    /// Clear stale staging files and, if `reregister`, register every stored
    /// upload that is not registered yet.
    ///
    /// Unreadable uploads are left on disk and skipped.
    pub async fn restore(&self, reregister: bool) -> SessionResult<RestoreSummary> {
        let mut summary = RestoreSummary {
            staging_removed: self
                .store
                .sweep_staging()
                .await
                .map_err(|e| SessionError::from_storage("staging sweep", e))?,
            ..RestoreSummary::default()
        };

        if !reregister {
            return Ok(summary);
        }

        let uploads = self
            .store
            .list_uploads()
            .await
            .map_err(|e| SessionError::from_storage("upload listing", e))?;

        for upload in uploads {
            if self.registry_asset(&upload.id).await?.is_some() {
                summary.already_registered += 1;
                continue;
            }

            match self.toolkit.probe(&upload.path).await {
                Ok(info) => {
                    let asset = build_asset(&upload, upload.file_name.clone(), &info);
                    self.registry
                        .insert_asset(asset)
                        .await
                        .map_err(|e| SessionError::from_storage("asset registration", e))?;
                    summary.restored += 1;
                }
                Err(e) => {
                    warn!(file_id = %upload.id, error = %e, "Skipping unreadable stored upload");
                    summary.unreadable += 1;
                }
            }
        }

        info!(
            restored = summary.restored,
            already_registered = summary.already_registered,
            unreadable = summary.unreadable,
            staging_removed = summary.staging_removed,
            "Restored stored uploads"
        );
        Ok(summary)
    }

    /// Check the media toolkit and the storage root.
    pub async fn readiness(&self) -> ReadinessReport {
        ReadinessReport {
            toolkit: self.toolkit.check_available().map_err(|e| e.to_string()),
            storage: self
                .store
                .check_writable()
                .await
                .map_err(|_| "storage root is not writable".to_string()),
        }
    }

    async fn resolve_asset(&self, file_id: &str) -> SessionResult<VideoAsset> {
        let id = AssetId::parse(file_id).ok_or_else(|| SessionError::not_found("video not found"))?;
        self.registry_asset(&id)
            .await?
            .ok_or_else(|| SessionError::not_found("video not found"))
    }

    async fn registry_asset(&self, id: &AssetId) -> SessionResult<Option<VideoAsset>> {
        self.registry
            .get_asset(id)
            .await
            .map_err(|e| SessionError::from_storage("asset lookup", e))
    }

    fn source_path(&self, asset: &VideoAsset) -> SessionResult<std::path::PathBuf> {
        self.store
            .source_path(&asset.source_file)
            .map_err(|e| SessionError::from_storage("source video", e))
    }

    async fn discard_upload(&self, upload: &StoredUpload) {
        if let Err(e) = self.store.discard_upload(&upload.file_name).await {
            warn!(file_id = %upload.id, error = %e, "Failed to discard upload");
        }
    }

    async fn discard_staging(&self, name: &ArtifactName) {
        if let Err(e) = self.store.discard_staging(name).await {
            warn!(out_file = %name, error = %e, "Failed to discard staging file");
        }
    }
}

async fn discard_writer(writer: vsess_storage::UploadWriter) {
    if let Err(e) = writer.abort().await {
        warn!(error = %e, "Failed to discard partial upload");
    }
}

fn build_asset(upload: &StoredUpload, filename: String, info: &VideoInfo) -> VideoAsset {
    VideoAsset {
        id: upload.id.clone(),
        filename,
        source_file: upload.file_name.clone(),
        width: info.width,
        height: info.height,
        frame_count: info.frame_count,
        fps: info.fps,
        duration: info.duration,
        codec: info.codec.clone(),
        size_bytes: upload.size_bytes,
        created_at: Utc::now(),
    }
}
