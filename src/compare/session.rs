use tracing::{debug, info, instrument};

use crate::capture::{CaptureLimits, CaptureResult, ControlSurface, PageCapturer};
use crate::compare::differ::{self, DiffOptions};
use crate::compare::{normalizer, result, ComparisonResult};
use crate::error::{VrtError, VrtResult};
use crate::settings::VrtSettings;

/// A finished comparison together with the captures it was built from
#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    pub result: ComparisonResult,
    pub before: CaptureResult,
    pub after: CaptureResult,
}

/// State of one before/after comparison, owned by the caller
///
/// Captures are collected one side at a time; [`ComparisonSession::compare`]
/// consumes the session once both are present.
#[derive(Debug, Clone)]
pub struct ComparisonSession {
    limits: CaptureLimits,
    diff_options: DiffOptions,
    before: Option<CaptureResult>,
    after: Option<CaptureResult>,
}

impl ComparisonSession {
    pub fn new(settings: &VrtSettings) -> Self {
        Self {
            limits: CaptureLimits::default(),
            diff_options: DiffOptions::from_settings(settings),
            before: None,
            after: None,
        }
    }

    pub fn with_limits(mut self, limits: CaptureLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_diff_options(mut self, diff_options: DiffOptions) -> Self {
        self.diff_options = diff_options;
        self
    }

    pub fn diff_options(&self) -> &DiffOptions {
        &self.diff_options
    }

    pub fn before(&self) -> Option<&CaptureResult> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&CaptureResult> {
        self.after.as_ref()
    }

    /// Replaces the "before" capture
    pub fn set_before(&mut self, capture: CaptureResult) {
        debug!("Before capture set from {}", capture.source_url);
        self.before = Some(capture);
    }

    /// Replaces the "after" capture
    pub fn set_after(&mut self, capture: CaptureResult) {
        debug!("After capture set from {}", capture.source_url);
        self.after = Some(capture);
    }

    pub fn is_ready(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }

    pub async fn capture_before<S>(&mut self, capturer: &PageCapturer, surface: &mut S) -> VrtResult<&CaptureResult>
    where
        S: ControlSurface + ?Sized,
    {
        let capture = capturer.capture(surface).await?;
        Ok(self.before.insert(capture))
    }

    pub async fn capture_after<S>(&mut self, capturer: &PageCapturer, surface: &mut S) -> VrtResult<&CaptureResult>
    where
        S: ControlSurface + ?Sized,
    {
        let capture = capturer.capture(surface).await?;
        Ok(self.after.insert(capture))
    }

    /// Normalizes, diffs and summarizes the two captures
    ///
    /// CPU-bound; async callers should run it on a blocking thread.
    #[instrument(skip_all)]
    pub fn compare(self) -> VrtResult<ComparisonOutcome> {
        let before = self.before.ok_or(VrtError::MissingCapture("before"))?;
        let after = self.after.ok_or(VrtError::MissingCapture("after"))?;

        let pair = normalizer::normalize(&before.image_bytes, &after.image_bytes, &self.limits)?;
        let (width, height) = (pair.width(), pair.height());
        let output = differ::diff(pair.before.as_raw(), pair.after.as_raw(), width, height, &self.diff_options)?;
        drop(pair);

        let result = result::build(output, width, height, before.source_url.clone(), after.source_url.clone())?;
        info!(
            "Compared {} with {}: {} of {} pixels differ ({}%)",
            result.before_url, result.after_url, result.diff_pixel_count, result.total_pixels, result.diff_percentage
        );
        Ok(ComparisonOutcome { result, before, after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RasterFormat;

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn compare_requires_both_sides() {
        let mut session = ComparisonSession::new(&VrtSettings::default());
        session.set_after(CaptureResult::viewport(png(2, 2, [0, 0, 0, 255]), RasterFormat::Png, "b".into()));
        assert!(!session.is_ready());
        assert!(matches!(session.compare(), Err(VrtError::MissingCapture("before"))));
    }

    #[test]
    fn compare_reports_urls_and_counts() {
        let mut session = ComparisonSession::new(&VrtSettings::default());
        session.set_before(CaptureResult::viewport(png(10, 10, [255, 255, 255, 255]), RasterFormat::Png, "https://a.test/".into()));
        session.set_after(CaptureResult::viewport(png(10, 10, [0, 0, 0, 255]), RasterFormat::Png, "https://b.test/".into()));
        assert!(session.is_ready());

        let outcome = session.compare().unwrap();
        assert_eq!(outcome.result.diff_pixel_count, 100);
        assert_eq!(outcome.result.diff_percentage, "100.00");
        assert_eq!(outcome.result.before_url, "https://a.test/");
        assert_eq!(outcome.after.source_url, "https://b.test/");
    }

    #[test]
    fn settings_color_reaches_the_differ() {
        let settings = VrtSettings {
            diff_color: "#00ff00".into(),
            diff_threshold: 0.3,
            ..Default::default()
        };
        let session = ComparisonSession::new(&settings);
        assert_eq!(session.diff_options().diff_color, [0, 255, 0]);
        assert_eq!(session.diff_options().threshold, 0.3);
    }
}
