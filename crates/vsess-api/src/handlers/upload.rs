//! Upload handler.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::debug;

use vsess_models::VideoAsset;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart field carrying the video.
pub const UPLOAD_FIELD: &str = "video";

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    pub fps: f64,
    pub duration: f64,
    pub filename: String,
}

impl From<VideoAsset> for UploadResponse {
    fn from(asset: VideoAsset) -> Self {
        Self {
            file_id: asset.id.to_string(),
            width: asset.width,
            height: asset.height,
            frame_count: asset.frame_count,
            fps: asset.fps,
            duration: asset.duration,
            filename: asset.filename,
        }
    }
}

/// Upload a video.
///
/// POST /upload (multipart, field `video`)
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let asset = state.session.ingest(&filename, field).await?;
        return Ok(Json(asset.into()));
    }

    Err(ApiError::validation("no video file provided"))
}
