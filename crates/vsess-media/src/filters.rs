//! FFmpeg filter definitions.

use vsess_models::layout::{PANEL_SOURCE_HEIGHT, PANEL_SOURCE_WIDTH};
use vsess_models::{ClampedCrop, OutputLayout};

/// Label of the rendered video stream in layout filter graphs.
pub const VIDEO_OUT_LABEL: &str = "[vout]";

/// Panel rearrangement of a 512x256 frame into 384x256.
///
/// Top band keeps the left 384x128. Below it, the two 128x64 blocks from the
/// right edge are rotated clockwise and placed side by side (lower block
/// first), followed by the 256x128 centre of the bottom half.
const FILTER_PANEL_384: &str = concat!(
    "split=4[top][lower][upper][centre];",
    "[top]crop=384:128:0:0[top_band];",
    "[lower]crop=128:64:384:64,transpose=1[lower_rot];",
    "[upper]crop=128:64:384:0,transpose=1[upper_rot];",
    "[centre]crop=256:128:128:128[centre_band];",
    "[lower_rot][upper_rot][centre_band]hstack=inputs=3[bottom_band];",
    "[top_band][bottom_band]vstack=inputs=2"
);

/// Build filter for cropping a rectangle.
pub fn filter_crop(crop: &ClampedCrop) -> String {
    format!("crop={}:{}:{}:{}", crop.width, crop.height, crop.x, crop.y)
}

/// Build filter selecting a single frame by decoded frame number.
pub fn filter_select_frame(index: u64) -> String {
    format!("select=eq(n\\,{})", index)
}

/// Build the filter graph for rendering `crop` with `layout`.
///
/// The graph reads `[0:v]` and writes [`VIDEO_OUT_LABEL`].
pub fn build_layout_filter(layout: OutputLayout, crop: &ClampedCrop) -> String {
    match layout {
        OutputLayout::Crop => format!("[0:v]{}{}", filter_crop(crop), VIDEO_OUT_LABEL),
        OutputLayout::Panel384 => format!(
            "[0:v]{},scale={}:{},{}{}",
            filter_crop(crop),
            PANEL_SOURCE_WIDTH,
            PANEL_SOURCE_HEIGHT,
            FILTER_PANEL_384,
            VIDEO_OUT_LABEL
        ),
    }
}
