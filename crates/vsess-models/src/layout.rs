//! Output layouts for rendered artifacts.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::rect::ClampedCrop;

/// Intermediate size the crop is scaled to before panel rearrangement.
pub const PANEL_SOURCE_WIDTH: u32 = 512;
pub const PANEL_SOURCE_HEIGHT: u32 = 256;

/// Final size of the panel layout.
pub const PANEL_OUTPUT_WIDTH: u32 = 384;
pub const PANEL_OUTPUT_HEIGHT: u32 = 256;

/// How cropped frames are laid out in the output video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// Output frames are exactly the clamped crop.
    #[default]
    Crop,
    /// Crop scaled to 512x256, then rearranged into a 384x256 panel.
    Panel384,
}

impl OutputLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLayout::Crop => "crop",
            OutputLayout::Panel384 => "panel384",
        }
    }

    /// Output frame size for a crop rendered with this layout.
    pub fn output_size(&self, crop: &ClampedCrop) -> (u32, u32) {
        match self {
            OutputLayout::Crop => (crop.width, crop.height),
            OutputLayout::Panel384 => (PANEL_OUTPUT_WIDTH, PANEL_OUTPUT_HEIGHT),
        }
    }
}

impl fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crop" | "" => Ok(OutputLayout::Crop),
            "panel384" | "panel_384" => Ok(OutputLayout::Panel384),
            other => Err(format!("unknown layout '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_parse() {
        assert_eq!("crop".parse::<OutputLayout>().unwrap(), OutputLayout::Crop);
        assert_eq!("Panel384".parse::<OutputLayout>().unwrap(), OutputLayout::Panel384);
        assert!("mosaic".parse::<OutputLayout>().is_err());
    }

    #[test]
    fn test_layout_serde() {
        let layout: OutputLayout = serde_json::from_str("\"panel384\"").unwrap();
        assert_eq!(layout, OutputLayout::Panel384);
        assert_eq!(serde_json::to_string(&OutputLayout::Crop).unwrap(), "\"crop\"");
    }

    #[test]
    fn test_output_size() {
        let crop = ClampedCrop {
            x: 0,
            y: 0,
            width: 101,
            height: 57,
        };
        assert_eq!(OutputLayout::Crop.output_size(&crop), (101, 57));
        assert_eq!(OutputLayout::Panel384.output_size(&crop), (384, 256));
    }
}
