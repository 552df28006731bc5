//! FFmpeg CLI wrapper for the video session service.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Timeouts that kill stalled FFmpeg/FFprobe processes
//! - Probing (resolution, frame rate, frame count)
//! - Single frame extraction as PNG
//! - Crop rendering with optional panel rearrangement
//! - The [`VideoToolkit`] seam used by the session service

pub mod command;
pub mod error;
pub mod filters;
pub mod frame;
pub mod probe;
pub mod progress;
pub mod render;
pub mod toolkit;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frame::extract_frame;
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use render::{render_crop, RenderOutput};
pub use toolkit::{FfmpegToolkit, ToolkitTimeouts, VideoToolkit};
