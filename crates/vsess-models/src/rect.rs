//! Crop rectangles and the clamping policy applied to them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default crop width used when a client omits `crop_w`.
pub const DEFAULT_CROP_WIDTH: i64 = 512;
/// Default crop height used when a client omits `crop_h`.
pub const DEFAULT_CROP_HEIGHT: i64 = 256;

/// A crop rectangle exactly as requested by a client.
///
/// Values are untrusted: they may be negative, zero, or extend past the
/// frame. Use [`CropRect::clamp_to`] before handing them to an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CropRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// A crop rectangle that lies entirely within a frame and has a non-zero area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ClampedCrop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The requested rectangle does not intersect the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "crop rectangle ({x}, {y}, {width}x{height}) does not overlap the {frame_width}x{frame_height} frame"
)]
pub struct EmptyCrop {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl CropRect {
    /// Create a new crop rectangle.
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height }
    }

    /// Intersect the rectangle with a `frame_width` x `frame_height` frame.
    ///
    /// A rectangle that only partially overlaps the frame is shrunk to the
    /// overlapping area. An empty intersection is an error.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Result<ClampedCrop, EmptyCrop> {
        let empty = || EmptyCrop {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            frame_width,
            frame_height,
        };

        if self.width <= 0 || self.height <= 0 {
            return Err(empty());
        }

        let (x0, x1) = clamp_span(self.x, self.width, frame_width).ok_or_else(empty)?;
        let (y0, y1) = clamp_span(self.y, self.height, frame_height).ok_or_else(empty)?;

        Ok(ClampedCrop {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Clamp `[start, start + len)` to `[0, limit)`; `None` when nothing is left.
fn clamp_span(start: i64, len: i64, limit: u32) -> Option<(u32, u32)> {
    let limit = i64::from(limit);
    let lo = start.clamp(0, limit);
    let hi = start.saturating_add(len).clamp(0, limit);
    // Both bounds are within [0, limit] so the casts cannot truncate.
    (hi > lo).then(|| (lo as u32, hi as u32))
}

impl ClampedCrop {
    /// Output area in pixels.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inside_rect_is_unchanged() {
        let crop = CropRect::new(10, 10, 100, 100).clamp_to(320, 240).unwrap();
        assert_eq!(
            crop,
            ClampedCrop {
                x: 10,
                y: 10,
                width: 100,
                height: 100
            }
        );
    }

    #[test]
    fn test_partial_overlap_is_clamped() {
        // Client defaults (512x256) on a smaller frame
        let crop = CropRect::new(0, 0, DEFAULT_CROP_WIDTH, DEFAULT_CROP_HEIGHT)
            .clamp_to(320, 240)
            .unwrap();
        assert_eq!((crop.width, crop.height), (320, 240));

        let crop = CropRect::new(600, 400, 100, 100).clamp_to(640, 480).unwrap();
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (600, 400, 40, 80));

        let crop = CropRect::new(-50, -20, 100, 100).clamp_to(640, 480).unwrap();
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (0, 0, 50, 80));
    }

    #[test]
    fn test_empty_intersection_is_rejected() {
        assert!(CropRect::new(640, 0, 10, 10).clamp_to(640, 480).is_err());
        assert!(CropRect::new(0, 480, 10, 10).clamp_to(640, 480).is_err());
        assert!(CropRect::new(-20, 0, 20, 10).clamp_to(640, 480).is_err());
        assert!(CropRect::new(1000, 1000, 50, 50).clamp_to(640, 480).is_err());
    }

    #[test]
    fn test_non_positive_size_is_rejected() {
        assert!(CropRect::new(0, 0, 0, 10).clamp_to(640, 480).is_err());
        assert!(CropRect::new(0, 0, 10, -5).clamp_to(640, 480).is_err());
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let crop = CropRect::new(i64::MAX - 1, 0, i64::MAX, 10).clamp_to(640, 480);
        assert!(crop.is_err());

        // MIN + MAX = -1, so nothing overlaps on either axis
        let crop = CropRect::new(i64::MIN, i64::MIN, i64::MAX, i64::MAX).clamp_to(640, 480);
        assert!(crop.is_err());

        let crop = CropRect::new(-5, -5, i64::MAX, i64::MAX).clamp_to(640, 480).unwrap();
        assert_eq!(crop.area(), 640 * 480);
    }

    #[test]
    fn test_error_message_is_readable() {
        let err = CropRect::new(700, 0, 10, 10).clamp_to(640, 480).unwrap_err();
        assert_eq!(
            err.to_string(),
            "crop rectangle (700, 0, 10x10) does not overlap the 640x480 frame"
        );
    }
}
