//! Asset inspection and cleanup handlers.

use axum::extract::{Path, State};
use axum::Json;

use crate::error::ApiResult;
use crate::services::{AssetDetails, DeletedAsset};
use crate::state::AppState;

/// Get an asset and its artifacts.
///
/// GET /assets/:file_id
pub async fn get_asset(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<AssetDetails>> {
    Ok(Json(state.session.asset_details(&file_id).await?))
}

/// Delete an asset with its source video and artifacts.
///
/// DELETE /assets/:file_id
pub async fn delete_asset(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<DeletedAsset>> {
    Ok(Json(state.session.delete_asset(&file_id).await?))
}
