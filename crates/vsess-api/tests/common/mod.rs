//! Shared fixtures: a scripted video toolkit and service builders.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use tempfile::TempDir;

use vsess_api::{ApiConfig, AppState, SessionConfig, SessionService};
use vsess_media::{MediaError, MediaResult, RenderOutput, VideoInfo, VideoToolkit};
use vsess_models::{ClampedCrop, OutputLayout};
use vsess_storage::{AssetRegistry, InMemoryRegistry, LocalStore};

pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Uploads starting with this marker fail to probe.
pub const CORRUPT_MARKER: &[u8] = b"corrupt";

/// Toolkit that treats every readable upload as a fixed-size video.
pub struct FakeToolkit {
    pub info: VideoInfo,
    pub render_delay: Duration,
    pub fail_render: AtomicBool,
    pub probes: AtomicUsize,
    pub frames_requested: Mutex<Vec<u64>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeToolkit {
    pub fn new(width: u32, height: u32, frame_count: u64) -> Self {
        Self {
            info: VideoInfo {
                duration: frame_count as f64 / 10.0,
                width,
                height,
                fps: 10.0,
                frame_count,
                codec: "h264".to_string(),
                size: 0,
            },
            render_delay: Duration::ZERO,
            fail_render: AtomicBool::new(false),
            probes: AtomicUsize::new(0),
            frames_requested: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }
}

impl Default for FakeToolkit {
    fn default() -> Self {
        Self::new(320, 240, 10)
    }
}

#[async_trait]
impl VideoToolkit for FakeToolkit {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let bytes = tokio::fs::read(path).await?;
        if bytes.starts_with(CORRUPT_MARKER) {
            return Err(MediaError::invalid_video("No video stream found"));
        }
        Ok(VideoInfo {
            size: bytes.len() as u64,
            ..self.info.clone()
        })
    }

    async fn extract_frame(&self, path: &Path, index: u64, _fps: f64) -> MediaResult<Vec<u8>> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        self.frames_requested.lock().unwrap().push(index);
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(index.to_string().as_bytes());
        Ok(png)
    }

    async fn render(
        &self,
        input: &Path,
        output: &Path,
        crop: &ClampedCrop,
        layout: OutputLayout,
    ) -> MediaResult<RenderOutput> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let (width, height) = layout.output_size(crop);
        tokio::fs::write(output, format!("partial {}x{}", width, height)).await?;
        tokio::time::sleep(self.render_delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_render.load(Ordering::SeqCst) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(format!("{}: Conversion failed", output.display())),
                Some(1),
            ));
        }

        tokio::fs::write(output, format!("mp4 {}x{}", width, height)).await?;
        Ok(RenderOutput { width, height })
    }

    fn check_available(&self) -> MediaResult<()> {
        Ok(())
    }
}

pub fn session_config(dir: &TempDir) -> SessionConfig {
    SessionConfig {
        storage_root: dir.path().to_path_buf(),
        ..SessionConfig::default()
    }
}

pub async fn service_with(config: &SessionConfig, toolkit: Arc<FakeToolkit>) -> SessionService {
    service_with_registry(config, Arc::new(InMemoryRegistry::new()), toolkit).await
}

pub async fn service_with_registry(
    config: &SessionConfig,
    registry: Arc<dyn AssetRegistry>,
    toolkit: Arc<FakeToolkit>,
) -> SessionService {
    let store = LocalStore::open(&config.storage_root).await.unwrap();
    SessionService::new(config, store, registry, toolkit)
}

pub async fn service(dir: &TempDir, toolkit: Arc<FakeToolkit>) -> SessionService {
    service_with(&session_config(dir), toolkit).await
}

pub async fn app_state(dir: &TempDir, toolkit: Arc<FakeToolkit>) -> AppState {
    AppState::with_session(ApiConfig::default(), service(dir, toolkit).await)
}

/// A successful upload body split into two chunks.
pub fn upload_chunks(data: &[u8]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> {
    let mid = data.len() / 2;
    stream::iter(vec![Ok(data[..mid].to_vec()), Ok(data[mid..].to_vec())])
}

/// Files currently in a storage subdirectory.
pub fn files_in(dir: &TempDir, sub: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path().join(sub))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Build a multipart body with one file field.
pub fn multipart_body(field: &str, filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "vsess-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: video/mp4\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
