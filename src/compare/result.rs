use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{ImageFormat, RgbaImage};
use serde::Serialize;
use std::io::Cursor;

use crate::compare::differ::DiffOutput;
use crate::error::{VrtError, VrtResult};

/// Outcome of comparing one before/after pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub diff_pixel_count: u64,
    pub total_pixels: u64,
    /// Changed share of the canvas as a percent with exactly two decimals
    pub diff_percentage: String,
    /// PNG visualization of the differences
    #[serde(skip)]
    pub diff_image_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub before_url: String,
    pub after_url: String,
    pub produced_at_millis: i64,
}

impl ComparisonResult {
    pub fn diff_image_data_url(&self) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(&self.diff_image_bytes))
    }
}

/// Packages a diff into a [`ComparisonResult`]
///
/// Fails only if the diff buffer cannot be encoded as PNG, which means it did
/// not hold `width * height` RGBA pixels.
pub fn build(
    diff: DiffOutput,
    width: u32,
    height: u32,
    before_url: impl Into<String>,
    after_url: impl Into<String>,
) -> VrtResult<ComparisonResult> {
    let total_pixels = u64::from(width) * u64::from(height);
    let expected = total_pixels as usize * 4;
    let actual = diff.diff_buffer.len();
    let image = RgbaImage::from_raw(width, height, diff.diff_buffer)
        .ok_or(VrtError::SizeMismatch { expected, actual })?;

    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png).map_err(VrtError::Encode)?;

    Ok(ComparisonResult {
        diff_pixel_count: diff.diff_pixel_count,
        total_pixels,
        diff_percentage: format_percentage(diff.diff_pixel_count, total_pixels),
        diff_image_bytes: png.into_inner(),
        width,
        height,
        before_url: before_url.into(),
        after_url: after_url.into(),
        produced_at_millis: chrono::Utc::now().timestamp_millis(),
    })
}

/// `changed / total * 100`, rounded half-up to two decimals
///
/// An empty canvas reports `"0.00"`.
pub fn format_percentage(changed: u64, total: u64) -> String {
    if total == 0 {
        return "0.00".to_string();
    }
    let (changed, total) = (u128::from(changed), u128::from(total));
    let hundredths = (changed * 20_000 + total) / (2 * total);
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_have_two_decimals() {
        assert_eq!(format_percentage(150, 10_000), "1.50");
        assert_eq!(format_percentage(0, 10_000), "0.00");
        assert_eq!(format_percentage(10_000, 10_000), "100.00");
        assert_eq!(format_percentage(1, 3), "33.33");
        assert_eq!(format_percentage(2, 3), "66.67");
        assert_eq!(format_percentage(0, 0), "0.00");
    }

    #[test]
    fn halves_round_up() {
        // 0.125% and 0.005%
        assert_eq!(format_percentage(1, 800), "0.13");
        assert_eq!(format_percentage(1, 20_000), "0.01");
        assert_eq!(format_percentage(1, 20_001), "0.00");
    }

    #[test]
    fn build_encodes_png() {
        let diff = DiffOutput {
            diff_pixel_count: 2,
            diff_buffer: vec![255; 4 * 4 * 4],
        };
        let result = build(diff, 4, 4, "https://a.test", "https://b.test").unwrap();
        assert_eq!(result.total_pixels, 16);
        assert_eq!(result.diff_percentage, "12.50");
        assert_eq!(&result.diff_image_bytes[1..4], b"PNG");
        assert!(result.diff_image_data_url().starts_with("data:image/png;base64,"));

        let decoded = image::load_from_memory(&result.diff_image_bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let diff = DiffOutput {
            diff_pixel_count: 0,
            diff_buffer: vec![0; 8],
        };
        assert!(matches!(
            build(diff, 4, 4, "a", "b"),
            Err(VrtError::SizeMismatch { expected: 64, actual: 8 })
        ));
    }
}
