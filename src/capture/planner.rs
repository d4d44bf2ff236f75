use serde::Serialize;
use tracing::debug;

use crate::capture::config::{CaptureLimits, MOBILE_WIDTH_MAX};

/// Emulated device size chosen for a full-page capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePlan {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Natural content size before clamping
    pub content_width: u32,
    pub content_height: u32,
    pub is_mobile_like: bool,
}

/// Computes a memory-bounded capture size
///
/// A positive `requested_width` is honored verbatim; otherwise the content
/// width is clamped to the width cap. The height is always clamped to the
/// height cap. Content past the caps is cut off, never scaled. Zero sizes
/// become 1.
pub fn plan(
    content_width: u32,
    content_height: u32,
    requested_width: Option<u32>,
    limits: &CaptureLimits,
) -> CapturePlan {
    let viewport_height = content_height.min(limits.max_height).max(1);

    let (viewport_width, is_mobile_like) = match requested_width {
        Some(width) if width > 0 => (width, width <= MOBILE_WIDTH_MAX),
        _ => (content_width.min(limits.max_width).max(1), false),
    };

    debug!(
        "Planned capture {}x{} for content {}x{} (requested width: {:?})",
        viewport_width, viewport_height, content_width, content_height, requested_width
    );

    CapturePlan {
        viewport_width,
        viewport_height,
        content_width,
        content_height,
        is_mobile_like,
    }
}

/// Converts a CSS pixel measurement from layout metrics to a whole pixel count
pub fn css_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.ceil().min(u32::MAX as f64) as u32
    } else {
        0
    }
}
