//! Shared data models for the video session service.
//!
//! This crate provides Serde-serializable types for:
//! - Uploaded video assets and their identifiers
//! - Crop rectangles and the clamping policy applied to them
//! - Frame index clamping
//! - Derived artifacts and output layouts
//! - Encoding configuration for rendered artifacts

pub mod artifact;
pub mod asset;
pub mod encoding;
pub mod frame;
pub mod layout;
pub mod rect;
pub mod utils;

// Re-export common types
pub use artifact::{ArtifactName, DerivedArtifact, InvalidArtifactName};
pub use asset::{AssetId, VideoAsset};
pub use encoding::EncodingConfig;
pub use frame::{clamp_frame_index, seek_timestamp};
pub use layout::OutputLayout;
pub use rect::{ClampedCrop, CropRect, EmptyCrop};
pub use utils::{file_extension, is_safe_file_name, sanitize_filename};
