//! Tolerance-based per-pixel comparison.
//!
//! Colors are compared in YIQ space, where a squared distance of 35215 is the
//! largest possible. A pixel counts as changed when its distance exceeds
//! `35215 * threshold²`. Unless anti-aliasing is included, changed pixels
//! that look like edge smoothing in either image are left out of the count.

use crate::error::{VrtError, VrtResult};
use crate::settings::VrtSettings;

const MAX_YIQ_DELTA: f64 = 35215.0;

/// Tuning for [`diff`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffOptions {
    /// Matching tolerance, 0..1; larger is more lenient
    pub threshold: f64,
    /// Count anti-aliased pixels as differences
    pub include_anti_aliasing: bool,
    /// Opacity of unchanged pixels in the diff image, 0..1
    pub diff_opacity: f64,
    pub diff_color: [u8; 3],
    /// Color for pixels excluded as anti-aliasing
    pub aa_color: [u8; 3],
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            include_anti_aliasing: false,
            diff_opacity: 0.1,
            diff_color: [255, 0, 0],
            aa_color: [255, 255, 0],
        }
    }
}

impl DiffOptions {
    /// Threshold and diff color from user settings, everything else default
    pub fn from_settings(settings: &VrtSettings) -> Self {
        Self {
            threshold: settings.diff_threshold,
            diff_color: settings.diff_rgb(),
            ..Self::default()
        }
    }
}

/// Changed pixel count plus an RGBA visualization of the same size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOutput {
    pub diff_pixel_count: u64,
    pub diff_buffer: Vec<u8>,
}

/// Compares two RGBA buffers of `width * height` pixels
pub fn diff(before: &[u8], after: &[u8], width: u32, height: u32, options: &DiffOptions) -> VrtResult<DiffOutput> {
    let (w, h) = (width as usize, height as usize);
    let expected = w * h * 4;
    for buffer in [before, after] {
        if buffer.len() != expected {
            return Err(VrtError::SizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }
    }

    let mut output = vec![0u8; expected];
    let opacity = options.diff_opacity.clamp(0.0, 1.0);

    if before == after {
        for pos in (0..expected).step_by(4) {
            draw_faded(before, pos, opacity, &mut output);
        }
        return Ok(DiffOutput {
            diff_pixel_count: 0,
            diff_buffer: output,
        });
    }

    let threshold = options.threshold.clamp(0.0, 1.0);
    let max_delta = MAX_YIQ_DELTA * threshold * threshold;
    let mut count = 0u64;

    for y in 0..h {
        for x in 0..w {
            let pos = (y * w + x) * 4;
            let delta = color_delta(before, after, pos, pos, false);

            if delta.abs() > max_delta {
                let anti_aliased = !options.include_anti_aliasing
                    && (antialiased(before, x, y, w, h, after) || antialiased(after, x, y, w, h, before));
                if anti_aliased {
                    draw_pixel(&mut output, pos, options.aa_color);
                } else {
                    draw_pixel(&mut output, pos, options.diff_color);
                    count += 1;
                }
            } else {
                draw_faded(before, pos, opacity, &mut output);
            }
        }
    }

    Ok(DiffOutput {
        diff_pixel_count: count,
        diff_buffer: output,
    })
}

/// Whether the pixel at `(x1, y1)` of `img` looks like anti-aliasing
///
/// It must have at most two identical neighbors, both a darker and a brighter
/// neighbor, and one of those extremes must sit in a flat region in both images.
fn antialiased(img: &[u8], x1: usize, y1: usize, width: usize, height: usize, other: &[u8]) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 * width + x1) * 4;

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    let mut min = 0.0;
    let mut max = 0.0;
    let mut darkest = (0, 0);
    let mut brightest = (0, 0);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let delta = color_delta(img, img, pos, (y * width + x) * 4, true);
            if delta == 0.0 {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                darkest = (x, y);
            } else if delta > max {
                max = delta;
                brightest = (x, y);
            }
        }
    }

    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, darkest.0, darkest.1, width, height)
        && has_many_siblings(other, darkest.0, darkest.1, width, height))
        || (has_many_siblings(img, brightest.0, brightest.1, width, height)
            && has_many_siblings(other, brightest.0, brightest.1, width, height))
}

/// More than two neighbors with exactly the same RGBA value
fn has_many_siblings(img: &[u8], x1: usize, y1: usize, width: usize, height: usize) -> bool {
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 * width + x1) * 4;

    let mut zeroes = u32::from(x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2);
    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let other = (y * width + x) * 4;
            if img[pos..pos + 4] == img[other..other + 4] {
                zeroes += 1;
            }
            if zeroes > 2 {
                return true;
            }
        }
    }
    false
}

/// Signed squared YIQ distance; negative when the first pixel is brighter
///
/// With `y_only` only the signed brightness difference is returned.
fn color_delta(a: &[u8], b: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    if a[k..k + 4] == b[m..m + 4] {
        return 0.0;
    }

    let (r1, g1, b1) = flatten(&a[k..k + 4]);
    let (r2, g2, b2) = flatten(&b[m..m + 4]);

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;
    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);
    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

/// Composites a pixel onto white by its alpha
fn flatten(px: &[u8]) -> (f64, f64, f64) {
    let (r, g, b, a) = (px[0] as f64, px[1] as f64, px[2] as f64, px[3]);
    if a == 255 {
        return (r, g, b);
    }
    let alpha = a as f64 / 255.0;
    (blend(r, alpha), blend(g, alpha), blend(b, alpha))
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.29889531 + g * 0.58662247 + b * 0.11448223
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.59597799 - g * 0.27417610 - b * 0.32180189
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.21147017 - g * 0.52261711 + b * 0.31114694
}

fn blend(c: f64, alpha: f64) -> f64 {
    255.0 + (c - 255.0) * alpha
}

fn draw_pixel(output: &mut [u8], pos: usize, rgb: [u8; 3]) {
    output[pos..pos + 3].copy_from_slice(&rgb);
    output[pos + 3] = 255;
}

/// The source pixel faded toward white, `opacity` of the way from white
fn draw_faded(source: &[u8], pos: usize, opacity: f64, output: &mut [u8]) {
    let (r, g, b) = flatten(&source[pos..pos + 4]);
    let fade = |c: f64| blend(c, opacity).round().clamp(0.0, 255.0) as u8;
    draw_pixel(output, pos, [fade(r), fade(g), fade(b)]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        rgba.iter().copied().cycle().take((width * height * 4) as usize).collect()
    }

    fn set(buf: &mut [u8], width: u32, x: u32, y: u32, rgba: [u8; 4]) {
        let pos = ((y * width + x) * 4) as usize;
        buf[pos..pos + 4].copy_from_slice(&rgba);
    }

    #[test]
    fn identical_buffers_have_no_differences() {
        let mut img = solid(16, 16, [30, 60, 90, 255]);
        set(&mut img, 16, 3, 4, [200, 10, 10, 255]);
        let out = diff(&img, &img, 16, 16, &DiffOptions::default()).unwrap();
        assert_eq!(out.diff_pixel_count, 0);
        assert_eq!(out.diff_buffer.len(), 16 * 16 * 4);
    }

    #[test]
    fn white_against_black_differs_everywhere() {
        let white = solid(10, 10, [255, 255, 255, 255]);
        let black = solid(10, 10, [0, 0, 0, 255]);
        let out = diff(&white, &black, 10, 10, &DiffOptions::default()).unwrap();
        assert_eq!(out.diff_pixel_count, 100);
        assert_eq!(&out.diff_buffer[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn unchanged_pixels_fade_toward_white() {
        let a = solid(4, 4, [0, 0, 0, 255]);
        let b = a.clone();
        let out = diff(&a, &b, 4, 4, &DiffOptions::default()).unwrap();
        // 255 + (0 - 255) * 0.1 = 229.5, rounded
        assert_eq!(&out.diff_buffer[0..4], &[230, 230, 230, 255]);
    }

    #[test]
    fn custom_color_marks_changes() {
        let a = solid(2, 2, [255, 255, 255, 255]);
        let mut b = a.clone();
        set(&mut b, 2, 1, 1, [0, 0, 0, 255]);
        let options = DiffOptions {
            diff_color: [0, 0, 255],
            include_anti_aliasing: true,
            ..Default::default()
        };
        let out = diff(&a, &b, 2, 2, &options).unwrap();
        assert_eq!(out.diff_pixel_count, 1);
        assert_eq!(&out.diff_buffer[12..16], &[0, 0, 255, 255]);
    }

    #[test]
    fn small_color_shifts_stay_within_tolerance() {
        let a = solid(8, 8, [100, 100, 100, 255]);
        let b = solid(8, 8, [104, 104, 104, 255]);
        assert_eq!(diff(&a, &b, 8, 8, &DiffOptions::default()).unwrap().diff_pixel_count, 0);
        let strict = DiffOptions {
            threshold: 0.0,
            ..Default::default()
        };
        assert_eq!(diff(&a, &b, 8, 8, &strict).unwrap().diff_pixel_count, 64);
    }

    /// A vertical edge between black and white with one gray transition pixel
    fn edge(gray_row: u32) -> Vec<u8> {
        let mut img = solid(9, 9, [255, 255, 255, 255]);
        for y in 0..9 {
            for x in 0..4 {
                set(&mut img, 9, x, y, [0, 0, 0, 255]);
            }
        }
        set(&mut img, 9, 4, gray_row, [128, 128, 128, 255]);
        img
    }

    #[test]
    fn anti_aliasing_is_excluded_unless_requested() {
        let a = edge(4);
        let mut b = a.clone();
        set(&mut b, 9, 4, 4, [255, 255, 255, 255]);

        let out = diff(&a, &b, 9, 9, &DiffOptions::default()).unwrap();
        assert_eq!(out.diff_pixel_count, 0);
        let pos = ((4 * 9 + 4) * 4) as usize;
        assert_eq!(&out.diff_buffer[pos..pos + 4], &[255, 255, 0, 255]);

        let strict = DiffOptions {
            include_anti_aliasing: true,
            ..Default::default()
        };
        assert_eq!(diff(&a, &b, 9, 9, &strict).unwrap().diff_pixel_count, 1);
    }

    #[test]
    fn raising_threshold_never_adds_differences() {
        let mut a = solid(12, 12, [255, 255, 255, 255]);
        let mut b = a.clone();
        for i in 0..12u32 {
            let shade = (i * 20) as u8;
            set(&mut a, 12, i, i, [shade, shade, shade, 255]);
            set(&mut b, 12, (i + 3) % 12, i, [shade, 255 - shade, 40, 255]);
        }
        let mut previous = u64::MAX;
        for step in 0..=10 {
            let options = DiffOptions {
                threshold: step as f64 / 10.0,
                ..Default::default()
            };
            let count = diff(&a, &b, 12, 12, &options).unwrap().diff_pixel_count;
            assert!(count <= previous, "threshold {} raised count to {}", options.threshold, count);
            previous = count;
        }
    }

    #[test]
    fn diffing_is_deterministic() {
        let a = edge(2);
        let b = edge(6);
        let options = DiffOptions::default();
        assert_eq!(diff(&a, &b, 9, 9, &options).unwrap(), diff(&a, &b, 9, 9, &options).unwrap());
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let a = solid(2, 2, [0, 0, 0, 255]);
        let b = solid(3, 2, [0, 0, 0, 255]);
        assert!(matches!(
            diff(&a, &b, 2, 2, &DiffOptions::default()),
            Err(VrtError::SizeMismatch { expected: 16, actual: 24 })
        ));
    }
}
