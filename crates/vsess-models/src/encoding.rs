//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
pub const DEFAULT_PRESET: &str = "fast";
pub const DEFAULT_CRF: u8 = 18;
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Pixel format used when both output dimensions are even.
pub const PIX_FMT_EVEN: &str = "yuv420p";
/// Pixel format used for odd output sizes, which 4:2:0 cannot represent.
pub const PIX_FMT_ODD: &str = "yuv444p";

/// Preview frame codec and MIME type
pub const FRAME_IMAGE_CODEC: &str = "png";
pub const FRAME_CONTENT_TYPE: &str = "image/png";

/// Artifact MIME type
pub const ARTIFACT_CONTENT_TYPE: &str = "video/mp4";

/// H.264/AAC settings for rendered artifacts.
///
/// Missing fields deserialize to the defaults above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    pub codec: String,
    pub preset: String,
    /// 0-51, lower is better
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Appended after the standard output arguments
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// CRF values above 51 are capped.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Pixel format for an output of the given size.
    pub fn pixel_format(width: u32, height: u32) -> &'static str {
        if width % 2 == 0 && height % 2 == 0 {
            PIX_FMT_EVEN
        } else {
            PIX_FMT_ODD
        }
    }

    /// Output arguments for a `width` x `height` render.
    pub fn to_ffmpeg_args(&self, width: u32, height: u32) -> Vec<String> {
        let crf = self.crf.to_string();
        let pairs: [(&str, &str); 7] = [
            ("-c:v", self.codec.as_str()),
            ("-preset", self.preset.as_str()),
            ("-crf", crf.as_str()),
            ("-pix_fmt", Self::pixel_format(width, height)),
            ("-c:a", self.audio_codec.as_str()),
            ("-b:a", self.audio_bitrate.as_str()),
            ("-movflags", "+faststart"),
        ];

        pairs
            .iter()
            .flat_map(|(flag, value)| [flag.to_string(), value.to_string()])
            .chain(self.extra_args.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, 18);
    }

    #[test]
    fn test_ffmpeg_args() {
        let config = EncodingConfig::default();
        let args = config.to_ffmpeg_args(100, 100);
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"18".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
    }

    #[test]
    fn test_odd_sizes_use_full_chroma() {
        let args = EncodingConfig::default().to_ffmpeg_args(101, 100);
        assert!(args.contains(&"yuv444p".to_string()));
        assert!(!args.contains(&"yuv420p".to_string()));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 23}"#).unwrap();
        assert_eq!(config.crf, 23);
        assert_eq!(config.preset, DEFAULT_PRESET);
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_crf_is_capped() {
        assert_eq!(EncodingConfig::new().with_crf(90).crf, 51);
    }
}
