//! Transform handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use vsess_models::rect::{DEFAULT_CROP_HEIGHT, DEFAULT_CROP_WIDTH};
use vsess_models::{CropRect, OutputLayout};

use crate::error::{ApiError, ApiResult};
use crate::handlers::params;
use crate::state::AppState;

/// Transform request. Missing crop fields take the client defaults.
#[derive(Debug, Deserialize)]
pub struct TransformRequest {
    pub file_id: Option<String>,
    #[serde(default, deserialize_with = "params::lenient_i64")]
    pub crop_x: Option<i64>,
    #[serde(default, deserialize_with = "params::lenient_i64")]
    pub crop_y: Option<i64>,
    #[serde(default, deserialize_with = "params::lenient_i64")]
    pub crop_w: Option<i64>,
    #[serde(default, deserialize_with = "params::lenient_i64")]
    pub crop_h: Option<i64>,
    #[serde(default)]
    pub layout: Option<String>,
}

impl TransformRequest {
    pub fn crop(&self) -> CropRect {
        CropRect::new(
            self.crop_x.unwrap_or(0),
            self.crop_y.unwrap_or(0),
            self.crop_w.unwrap_or(DEFAULT_CROP_WIDTH),
            self.crop_h.unwrap_or(DEFAULT_CROP_HEIGHT),
        )
    }

    pub fn layout(&self) -> ApiResult<OutputLayout> {
        match self.layout.as_deref() {
            None => Ok(OutputLayout::default()),
            Some(s) => s.parse().map_err(ApiError::Validation),
        }
    }
}

/// Transform response.
#[derive(Debug, Serialize)]
pub struct TransformResponse {
    pub out_file: String,
    pub width: u32,
    pub height: u32,
}

/// Crop a video into a new downloadable artifact.
///
/// POST /transform
pub async fn transform(
    State(state): State<AppState>,
    request: Result<Json<TransformRequest>, JsonRejection>,
) -> ApiResult<Json<TransformResponse>> {
    let Json(request) = request.map_err(|e| ApiError::validation(e.body_text()))?;
    let file_id = request
        .file_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation("file_id is required"))?;
    let layout = request.layout()?;

    let artifact = state
        .session
        .transform(file_id, request.crop(), layout)
        .await?;

    Ok(Json(TransformResponse {
        out_file: artifact.name.to_string(),
        width: artifact.width,
        height: artifact.height,
    }))
}
