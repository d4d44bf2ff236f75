//! Full-page capture through device-metrics emulation.
//!
//! One capture walks the target through
//! `Idle -> Attached -> PageEnabled -> Reloaded -> Scrolling -> MetricsOverridden -> Captured`
//! and then always through `MetricsCleared -> Detached`, whether the walk
//! succeeded or stopped in `Error`. The release path lives in one place,
//! [`EmulationRun::release`], and runs after every attached capture.

use std::fmt;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::capture::config::{CaptureLimits, CaptureTimings, MOBILE_WIDTH_MAX, PROVISIONAL_HEIGHT};
use crate::capture::model::{CaptureResult, Dimensions, RasterFormat};
use crate::capture::planner::{self, css_pixels};
use crate::capture::session::{ControlSurface, DeviceMetrics};
use crate::error::VrtResult;
use crate::stabilizer::{self, StabilizationReport, Stabilizer};

/// Where a single emulated capture currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Attached,
    PageEnabled,
    Reloaded,
    Scrolling,
    MetricsOverridden,
    Captured,
    Error,
    MetricsCleared,
    Detached,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Knobs for one emulated capture
#[derive(Debug, Clone)]
pub struct EmulationOptions {
    /// Emulate exactly this width instead of the page's own content width
    pub viewport_width: Option<u32>,
    pub format: RasterFormat,
    pub limits: CaptureLimits,
    pub timings: CaptureTimings,
}

impl Default for EmulationOptions {
    fn default() -> Self {
        Self {
            viewport_width: None,
            format: RasterFormat::Png,
            limits: CaptureLimits::default(),
            timings: CaptureTimings::default(),
        }
    }
}

impl EmulationOptions {
    fn requested_width(&self) -> Option<u32> {
        self.viewport_width.filter(|w| *w > 0)
    }
}

/// Captures a whole page by resizing the emulated device to fit it
#[derive(Debug)]
pub struct EmulationCapturer {
    options: EmulationOptions,
    stabilizer: Stabilizer,
}

impl EmulationCapturer {
    pub fn new(options: EmulationOptions, stabilizer: Stabilizer) -> Self {
        Self { options, stabilizer }
    }

    pub fn options(&self) -> &EmulationOptions {
        &self.options
    }

    /// Runs one capture against `surface`
    ///
    /// Attach failures propagate untouched. Any later failure still clears the
    /// metrics override and detaches before the original error is returned;
    /// failures during that release are only logged.
    #[instrument(skip_all, fields(page = %surface.target()))]
    pub async fn capture<S>(&self, surface: &mut S) -> VrtResult<CaptureResult>
    where
        S: ControlSurface + ?Sized,
    {
        let mut run = EmulationRun::new(surface);
        run.attach().await?;

        let outcome = self.drive(&mut run).await;
        run.release(outcome.is_err()).await;

        match &outcome {
            Ok(capture) => info!(
                "Full-page capture of {} finished at {:?}",
                capture.source_url, capture.dimensions
            ),
            Err(e) => warn!("Full-page capture failed: {}", e),
        }
        outcome
    }

    async fn drive<S>(&self, run: &mut EmulationRun<'_, S>) -> VrtResult<CaptureResult>
    where
        S: ControlSurface + ?Sized,
    {
        let timings = &self.options.timings;
        let requested = self.options.requested_width();

        run.surface.enable_domains().await?;
        run.advance(CaptureState::PageEnabled);

        if let Some(width) = requested {
            debug!("Applying provisional {}x{} override before reload", width, PROVISIONAL_HEIGHT);
            run.surface
                .set_device_metrics(DeviceMetrics::new(width, PROVISIONAL_HEIGHT, width <= MOBILE_WIDTH_MAX))
                .await?;
        }

        run.surface.reload(true).await?;
        sleep(timings.reload_settle).await;
        run.advance(CaptureState::Reloaded);

        run.advance(CaptureState::Scrolling);
        let value = run.surface.evaluate(&self.stabilizer.script()).await?;
        let report: StabilizationReport = serde_json::from_value(value).unwrap_or_default();
        stabilizer::log_report(&run.target, &report);
        sleep(timings.stabilize_settle).await;

        let content = run.surface.layout_metrics().await?;
        let plan = planner::plan(
            css_pixels(content.width),
            css_pixels(content.height),
            requested,
            &self.options.limits,
        );

        run.surface
            .set_device_metrics(DeviceMetrics::new(plan.viewport_width, plan.viewport_height, plan.is_mobile_like))
            .await?;
        run.advance(CaptureState::MetricsOverridden);
        sleep(timings.metrics_settle).await;

        let image_bytes = run.surface.capture_frame(self.options.format).await?;
        run.advance(CaptureState::Captured);
        debug!("Captured {} bytes", image_bytes.len());

        let source_url = match run.surface.current_url().await {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not read URL of {}: {}", run.target, e);
                run.target.clone()
            }
        };

        Ok(CaptureResult::full_page(
            image_bytes,
            self.options.format,
            source_url,
            Dimensions {
                width: plan.viewport_width,
                height: plan.viewport_height,
            },
        ))
    }
}

/// Exclusive hold on one target for the duration of a capture
struct EmulationRun<'a, S: ControlSurface + ?Sized> {
    surface: &'a mut S,
    target: String,
    state: CaptureState,
}

impl<'a, S: ControlSurface + ?Sized> EmulationRun<'a, S> {
    fn new(surface: &'a mut S) -> Self {
        let target = surface.target();
        Self {
            surface,
            target,
            state: CaptureState::Idle,
        }
    }

    fn advance(&mut self, next: CaptureState) {
        debug!("{}: {} -> {}", self.target, self.state, next);
        self.state = next;
    }

    async fn attach(&mut self) -> VrtResult<()> {
        self.surface.attach().await?;
        self.advance(CaptureState::Attached);
        Ok(())
    }

    /// Clears the override and detaches; never fails
    async fn release(&mut self, failed: bool) {
        if failed {
            self.advance(CaptureState::Error);
        }

        if let Err(e) = self.surface.clear_device_metrics().await {
            warn!("Failed to clear device metrics on {}: {}", self.target, e);
        }
        self.advance(CaptureState::MetricsCleared);

        if let Err(e) = self.surface.detach().await {
            warn!("Failed to detach from {}: {}", self.target, e);
        }
        self.advance(CaptureState::Detached);
    }
}
