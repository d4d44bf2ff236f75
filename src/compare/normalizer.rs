use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::{debug, info};

use crate::capture::config::CaptureLimits;
use crate::error::{VrtError, VrtResult};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Two opaque RGBA images of identical size, ready for pixel comparison
#[derive(Debug, Clone)]
pub struct NormalizedImagePair {
    pub before: RgbaImage,
    pub after: RgbaImage,
}

impl NormalizedImagePair {
    pub fn width(&self) -> u32 {
        self.before.width()
    }

    pub fn height(&self) -> u32 {
        self.before.height()
    }
}

/// Decodes an encoded raster into RGBA pixels
pub fn decode(bytes: &[u8], label: &'static str) -> VrtResult<RgbaImage> {
    let image = image::load_from_memory(bytes).map_err(|source| VrtError::Decode { label, source })?;
    Ok(image.to_rgba8())
}

/// Decodes both rasters and aligns them onto one canvas
pub fn normalize(raw_before: &[u8], raw_after: &[u8], limits: &CaptureLimits) -> VrtResult<NormalizedImagePair> {
    let before = decode(raw_before, "before")?;
    let after = decode(raw_after, "after")?;
    Ok(normalize_images(&before, &after, limits))
}

/// Aligns two decoded images onto a common white canvas
///
/// The canvas is the larger of the two sizes per axis, scaled down with its
/// aspect ratio kept when it exceeds the caps. Each source is centered, never
/// stretched.
pub fn normalize_images(before: &RgbaImage, after: &RgbaImage, limits: &CaptureLimits) -> NormalizedImagePair {
    let (width, height) = target_size(before.dimensions(), after.dimensions(), limits);
    debug!(
        "Normalizing {:?} and {:?} onto {}x{}",
        before.dimensions(),
        after.dimensions(),
        width,
        height
    );
    NormalizedImagePair {
        before: place(before, width, height, limits),
        after: place(after, width, height, limits),
    }
}

/// Common canvas size for two sources under the caps
pub fn target_size(a: (u32, u32), b: (u32, u32), limits: &CaptureLimits) -> (u32, u32) {
    let width = a.0.max(b.0).max(1);
    let height = a.1.max(b.1).max(1);

    if width <= limits.max_width && height <= limits.max_height {
        return (width, height);
    }

    let scale = (limits.max_width as f64 / width as f64).min(limits.max_height as f64 / height as f64);
    let scaled = (
        ((width as f64 * scale).floor() as u32).max(1),
        ((height as f64 * scale).floor() as u32).max(1),
    );
    info!("Reducing comparison canvas from {}x{} to {}x{}", width, height, scaled.0, scaled.1);
    scaled
}

fn place(source: &RgbaImage, width: u32, height: u32, limits: &CaptureLimits) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);

    let downscaled;
    let source = if source.dimensions() != (width, height)
        && (source.width() > limits.max_source_dimension || source.height() > limits.max_source_dimension)
    {
        let max = limits.max_source_dimension as f64;
        let scale = (max / source.width() as f64).min(max / source.height() as f64);
        let w = ((source.width() as f64 * scale).floor() as u32).max(1);
        let h = ((source.height() as f64 * scale).floor() as u32).max(1);
        debug!("Downscaling source {:?} to {}x{} before placement", source.dimensions(), w, h);
        downscaled = imageops::resize(source, w, h, FilterType::Triangle);
        &downscaled
    } else {
        source
    };

    let x = width.saturating_sub(source.width()) / 2;
    let y = height.saturating_sub(source.height()) / 2;
    imageops::overlay(&mut canvas, source, i64::from(x), i64::from(y));
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    #[test]
    fn smaller_image_is_centered_on_white() {
        let small = solid(400, 300, [0, 0, 0, 255]);
        let large = solid(800, 600, [10, 20, 30, 255]);
        let pair = normalize_images(&small, &large, &CaptureLimits::default());

        assert_eq!(pair.before.dimensions(), (800, 600));
        assert_eq!(pair.after.dimensions(), (800, 600));
        assert_eq!(pair.before.get_pixel(199, 149), &BACKGROUND);
        assert_eq!(pair.before.get_pixel(200, 150), &Rgba([0, 0, 0, 255]));
        assert_eq!(pair.before.get_pixel(599, 449), &Rgba([0, 0, 0, 255]));
        assert_eq!(pair.before.get_pixel(600, 450), &BACKGROUND);
        assert_eq!(pair.after.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn odd_offsets_are_floored() {
        let pair = normalize_images(&solid(3, 3, [0, 0, 0, 255]), &solid(6, 6, [0, 0, 0, 255]), &CaptureLimits::default());
        assert_eq!(pair.before.get_pixel(0, 0), &BACKGROUND);
        assert_eq!(pair.before.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
        assert_eq!(pair.before.get_pixel(4, 4), &BACKGROUND);
    }

    #[test]
    fn transparency_is_flattened_onto_white() {
        let clear = solid(4, 4, [0, 0, 0, 0]);
        let pair = normalize_images(&clear, &clear, &CaptureLimits::default());
        assert!(pair.before.pixels().all(|p| p == &BACKGROUND));
    }

    #[test]
    fn canvas_is_scaled_to_the_caps() {
        assert_eq!(target_size((4000, 1000), (100, 100), &CaptureLimits::default()), (2000, 500));
        assert_eq!(target_size((1000, 20000), (10, 10), &CaptureLimits::default()), (500, 10000));
        assert_eq!(target_size((1280, 9000), (1024, 700), &CaptureLimits::default()), (1280, 9000));
    }

    #[test]
    fn oversized_sources_are_downscaled_before_placement() {
        let limits = CaptureLimits {
            max_width: 100,
            max_height: 400,
            max_source_dimension: 50,
        };
        let tall = solid(60, 300, [0, 0, 0, 255]);
        let small = solid(20, 20, [0, 0, 0, 255]);
        let pair = normalize_images(&tall, &small, &limits);
        assert_eq!(pair.before.dimensions(), (60, 300));
        // 60x300 is already the canvas size, so it is placed untouched
        assert_eq!(pair.before.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        // 20x20 sits in the middle
        assert_eq!(pair.after.get_pixel(30, 150), &Rgba([0, 0, 0, 255]));
        assert_eq!(pair.after.get_pixel(0, 0), &BACKGROUND);

        let wide = solid(80, 10, [0, 0, 0, 255]);
        let pair = normalize_images(&wide, &small, &limits);
        assert_eq!(pair.before.dimensions(), (80, 20));
        // 80x10 shrinks to 50x6 and is centered at (15, 7)
        assert_eq!(pair.before.get_pixel(14, 10), &BACKGROUND);
        assert_eq!(pair.before.get_pixel(15, 10), &Rgba([0, 0, 0, 255]));
        assert_eq!(pair.before.get_pixel(65, 10), &BACKGROUND);
    }

    #[test]
    fn undecodable_bytes_are_decode_errors() {
        let err = normalize(b"not an image", b"still not", &CaptureLimits::default()).unwrap_err();
        assert!(matches!(err, VrtError::Decode { label: "before", .. }));
    }
}
