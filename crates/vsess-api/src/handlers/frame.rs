//! Frame preview handler.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use vsess_models::encoding::FRAME_CONTENT_TYPE;

use crate::error::{ApiError, ApiResult};
use crate::handlers::params;
use crate::state::AppState;

/// Header reporting the frame index actually returned.
pub const FRAME_INDEX_HEADER: &str = "x-frame-index";

#[derive(Debug, Deserialize)]
pub struct FrameQuery {
    pub file_id: Option<String>,
    #[serde(default, deserialize_with = "params::lenient_i64")]
    pub frame_index: Option<i64>,
}

/// Decode one frame as PNG.
///
/// GET /frame?file_id=...&frame_index=N
pub async fn frame(
    State(state): State<AppState>,
    query: Result<Query<FrameQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) =
        query.map_err(|_| ApiError::validation("frame_index must be an integer"))?;
    let file_id = query
        .file_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation("file_id is required"))?;

    let image = state
        .session
        .frame(&file_id, query.frame_index.unwrap_or(0))
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, FRAME_CONTENT_TYPE.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
            (
                header::HeaderName::from_static(FRAME_INDEX_HEADER),
                image.index.to_string(),
            ),
        ],
        image.png,
    )
        .into_response())
}
