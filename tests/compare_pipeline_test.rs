mod common;

use anyhow::Result;
use common::{png, quick_capturer, quick_settings, MockSurface};
use quick_vrt::capture::{CaptureLimits, CaptureRequest, CaptureResult, RasterFormat};
use quick_vrt::compare::{diff, normalize, ComparisonSession, DiffOptions};
use quick_vrt::settings::VrtSettings;

fn viewport_capture(bytes: Vec<u8>, url: &str) -> CaptureResult {
    CaptureResult::viewport(bytes, RasterFormat::Png, url.to_string())
}

fn compare(before: Vec<u8>, after: Vec<u8>) -> Result<quick_vrt::compare::ComparisonOutcome> {
    let mut session = ComparisonSession::new(&VrtSettings::default());
    session.set_before(viewport_capture(before, "https://before.test/"));
    session.set_after(viewport_capture(after, "https://after.test/"));
    Ok(session.compare()?)
}

#[test]
fn test_equal_images_have_no_difference() -> Result<()> {
    let white = png(800, 600, [255, 255, 255, 255]);
    let outcome = compare(white.clone(), white)?;

    assert_eq!(outcome.result.diff_pixel_count, 0);
    assert_eq!(outcome.result.diff_percentage, "0.00");
    assert_eq!(outcome.result.total_pixels, 480_000);
    Ok(())
}

#[test]
fn test_white_against_black_differs_everywhere() -> Result<()> {
    let outcome = compare(png(800, 600, [255, 255, 255, 255]), png(800, 600, [0, 0, 0, 255]))?;

    assert_eq!(outcome.result.diff_pixel_count, 480_000);
    assert_eq!(outcome.result.diff_percentage, "100.00");

    let diff_image = image::load_from_memory(&outcome.result.diff_image_bytes)?.to_rgba8();
    assert_eq!(diff_image.dimensions(), (800, 600));
    assert_eq!(diff_image.get_pixel(0, 0).0, [255, 0, 0, 255]);
    Ok(())
}

#[test]
fn test_mismatched_sizes_are_centered() -> Result<()> {
    let small = png(400, 300, [0, 0, 0, 255]);
    let large = png(800, 600, [0, 0, 0, 255]);
    let pair = normalize(&small, &large, &CaptureLimits::default())?;

    assert_eq!((pair.width(), pair.height()), (800, 600));
    assert_eq!(pair.after.dimensions(), (800, 600));
    assert_eq!(pair.before.get_pixel(199, 150).0, [255, 255, 255, 255]);
    assert_eq!(pair.before.get_pixel(200, 149).0, [255, 255, 255, 255]);
    assert_eq!(pair.before.get_pixel(200, 150).0, [0, 0, 0, 255]);
    assert_eq!(pair.before.get_pixel(599, 449).0, [0, 0, 0, 255]);
    assert_eq!(pair.before.get_pixel(600, 450).0, [255, 255, 255, 255]);

    // Only the white frame around the smaller image differs
    let outcome = compare(small, large)?;
    assert_eq!(outcome.result.diff_pixel_count, 480_000 - 120_000);
    assert_eq!(outcome.result.diff_percentage, "75.00");
    Ok(())
}

#[test]
fn test_normalized_pairs_share_one_capped_shape() -> Result<()> {
    // Caps scaled down 10x so the grid stays cheap
    let limits = CaptureLimits {
        max_width: 200,
        max_height: 1000,
        max_source_dimension: 200,
    };
    let sizes = [(1, 1), (37, 210), (250, 40), (64, 48), (200, 1000), (300, 1500)];
    let images: Vec<Vec<u8>> = sizes.iter().map(|&(w, h)| png(w, h, [10, 10, 10, 255])).collect();

    for a in &images {
        for b in &images {
            let pair = normalize(a, b, &limits)?;
            assert_eq!(pair.before.dimensions(), pair.after.dimensions());
            assert!(pair.width() <= 200 && pair.height() <= 1000, "{}x{}", pair.width(), pair.height());
        }
    }
    Ok(())
}

#[test]
fn test_images_never_differ_from_themselves() -> Result<()> {
    let mut pixels = image::RgbaImage::new(64, 48);
    for (x, y, px) in pixels.enumerate_pixels_mut() {
        *px = image::Rgba([(x * 4) as u8, (y * 5) as u8, ((x ^ y) * 3) as u8, 255]);
    }
    let out = diff(pixels.as_raw(), pixels.as_raw(), 64, 48, &DiffOptions::default())?;
    assert_eq!(out.diff_pixel_count, 0);
    Ok(())
}

#[test]
fn test_threshold_only_ever_reduces_differences() -> Result<()> {
    let a = image::RgbaImage::from_fn(32, 32, |x, y| image::Rgba([(x * 8) as u8, (y * 8) as u8, 128, 255]));
    let b = image::RgbaImage::from_fn(32, 32, |x, y| image::Rgba([(y * 8) as u8, (x * 7) as u8, 100, 255]));

    let counts: Vec<u64> = (0..=20)
        .map(|step| {
            let options = DiffOptions {
                threshold: step as f64 / 20.0,
                ..Default::default()
            };
            diff(a.as_raw(), b.as_raw(), 32, 32, &options).map(|out| out.diff_pixel_count)
        })
        .collect::<Result<_, _>>()?;

    assert!(counts.windows(2).all(|w| w[1] <= w[0]), "{:?}", counts);
    assert!(counts[0] > 0);
    Ok(())
}

#[tokio::test]
async fn test_session_captures_and_compares_two_pages() -> Result<()> {
    let request = CaptureRequest {
        full_page: true,
        viewport_width: None,
    };
    let capturer = quick_capturer(&request);
    let mut session = ComparisonSession::new(&quick_settings());

    let mut before = MockSurface::new("https://example.com/v1")
        .with_content(30.0, 20.0)
        .with_frame(png(30, 20, [255, 255, 255, 255]));
    let mut after = MockSurface::new("https://example.com/v2")
        .with_content(30.0, 40.0)
        .with_frame(png(30, 40, [255, 255, 255, 255]));

    session.capture_before(&capturer, &mut before).await?;
    session.capture_after(&capturer, &mut after).await?;
    assert!(session.is_ready());

    let outcome = session.compare()?;
    assert_eq!(outcome.result.total_pixels, 30 * 40);
    assert_eq!(outcome.result.diff_pixel_count, 0);
    assert_eq!(outcome.result.before_url, "https://example.com/v1");
    assert_eq!(outcome.result.after_url, "https://example.com/v2");
    assert!(outcome.before.is_full_page && outcome.after.is_full_page);
    Ok(())
}
