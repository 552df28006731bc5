//! Uploaded video asset models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    /// Generate a new random asset ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse an ID that was produced by [`AssetId::new`].
    ///
    /// Returns `None` for anything that is not a hyphenated UUID, which keeps
    /// client-supplied ids from ever reaching a filesystem path.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s)
            .ok()
            .filter(|u| u.hyphenated().to_string() == s.to_ascii_lowercase())
            .map(|u| Self(u.hyphenated().to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An uploaded video and the values probed from it at ingest.
///
/// Probe values are never updated after the record is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoAsset {
    /// Unique asset ID
    pub id: AssetId,

    /// Sanitised name of the uploaded file
    pub filename: String,

    /// Name of the stored source file inside the uploads directory
    pub source_file: String,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Total number of video frames
    pub frame_count: u64,

    /// Frame rate (fps)
    pub fps: f64,

    /// Duration in seconds
    pub duration: f64,

    /// Video codec name
    #[serde(default)]
    pub codec: String,

    /// Stored size in bytes
    pub size_bytes: u64,

    /// Ingest timestamp
    pub created_at: DateTime<Utc>,
}
