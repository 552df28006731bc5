//! Frame index policy.

/// Frame rate assumed when a container reports none.
pub const FALLBACK_FPS: f64 = 30.0;

/// Clamp a requested frame index to `[0, frame_count - 1]`.
///
/// Out-of-range requests resolve to the nearest boundary frame instead of
/// failing. An asset with no frames resolves to 0.
pub fn clamp_frame_index(requested: i64, frame_count: u64) -> u64 {
    let last = frame_count.saturating_sub(1);
    u64::try_from(requested).map_or(0, |index| index.min(last))
}

/// Input seek position (seconds) that lands exactly on frame `index`.
///
/// Seeking half a frame early keeps float rounding from skipping past the
/// target; the decoder then discards everything before it.
pub fn seek_timestamp(index: u64, fps: f64) -> f64 {
    let fps = if fps.is_finite() && fps > 0.0 { fps } else { FALLBACK_FPS };
    ((index as f64 - 0.5) / fps).max(0.0)
}
