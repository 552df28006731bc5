//! Derived artifact models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::asset::AssetId;
use crate::layout::OutputLayout;
use crate::rect::ClampedCrop;
use crate::utils::is_safe_file_name;

/// File extension of rendered artifacts.
pub const ARTIFACT_EXTENSION: &str = "mp4";

/// Suffix appended to every artifact name.
const ARTIFACT_SUFFIX: &str = "_converted.mp4";

/// Name under which an artifact is published and downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ArtifactName(String);

/// The string cannot name an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid artifact name")]
pub struct InvalidArtifactName;

impl ArtifactName {
    /// Generate a fresh name for an artifact derived from `source`.
    ///
    /// The random token keeps concurrent renders of the same asset apart.
    pub fn generate(source: &AssetId) -> Self {
        let token = rand::random::<u64>() & 0xffff_ffff_ffff;
        Self(format!("{}_{:012x}{}", source, token, ARTIFACT_SUFFIX))
    }

    /// Validate a client-supplied artifact name.
    pub fn parse(s: &str) -> Result<Self, InvalidArtifactName> {
        if is_safe_file_name(s) && s.ends_with(ARTIFACT_SUFFIX) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidArtifactName)
        }
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this artifact was derived from `source`.
    pub fn belongs_to(&self, source: &AssetId) -> bool {
        self.0
            .strip_prefix(source.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rendered output video.
///
/// Artifacts are immutable; rendering again creates a new artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DerivedArtifact {
    /// Published file name
    pub name: ArtifactName,

    /// Asset the artifact was rendered from
    pub source: AssetId,

    /// Crop applied to every source frame
    pub crop: ClampedCrop,

    /// Output layout
    pub layout: OutputLayout,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Published size in bytes
    pub size_bytes: u64,

    /// Publication timestamp
    pub created_at: DateTime<Utc>,
}
