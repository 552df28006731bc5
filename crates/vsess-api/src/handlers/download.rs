//! Artifact download handler.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures_util::stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::info;

use vsess_models::encoding::ARTIFACT_CONTENT_TYPE;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Name offered to the browser for every download.
pub const DOWNLOAD_FILENAME: &str = "converted.mp4";

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Stream a published artifact.
///
/// GET /download/:out_file
pub async fn download(
    State(state): State<AppState>,
    Path(out_file): Path<String>,
) -> ApiResult<Response> {
    let artifact = state.session.download(&out_file).await?;
    info!(out_file = %artifact.name, size_bytes = artifact.size_bytes, "Serving download");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, ARTIFACT_CONTENT_TYPE)
        .header(header::CONTENT_LENGTH, artifact.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
        )
        .body(Body::from_stream(file_stream(artifact.file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// Read `file` in fixed size chunks. The stream ends after the first error.
fn file_stream(
    file: File,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    stream::unfold(Some(file), |file| async move {
        let mut file = file?;
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(file)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_stream_reads_everything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp4");
        let data: Vec<u8> = (0..(READ_CHUNK_SIZE * 2 + 10)).map(|i| i as u8).collect();
        tokio::fs::write(&path, &data).await.unwrap();

        let file = File::open(&path).await.unwrap();
        let chunks: Vec<_> = file_stream(file).collect().await;
        assert!(chunks.len() >= 3);

        let read: Vec<u8> = chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect();
        assert_eq!(read, data);
    }
}
