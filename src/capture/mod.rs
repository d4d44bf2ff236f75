pub mod browser;
pub mod cdp;
pub mod config;
pub mod emulation;
pub mod model;
pub mod planner;
pub mod session;
pub mod viewport;

use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub use browser::BrowserHandle;
pub use config::{CaptureLimits, CaptureTimings};
pub use emulation::{CaptureState, EmulationCapturer, EmulationOptions};
pub use model::{CaptureResult, Dimensions, RasterFormat};
pub use planner::{plan, CapturePlan};
pub use session::{ContentSize, ControlSurface, DeviceMetrics};
pub use viewport::ViewportCapturer;

use crate::error::VrtResult;
use crate::settings::VrtSettings;
use crate::stabilizer::{StabilizeOptions, Stabilizer};

/// Per-capture request knobs that do not come from settings
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    /// Capture the whole page through emulation instead of the viewport
    pub full_page: bool,
    pub viewport_width: Option<u32>,
}

/// Takes one capture, preferring full-page emulation with a viewport fallback
#[derive(Debug)]
pub struct PageCapturer {
    emulation: EmulationCapturer,
    viewport: ViewportCapturer,
    full_page: bool,
    capture_delay: Duration,
}

impl PageCapturer {
    pub fn new(
        emulation: EmulationCapturer,
        viewport: ViewportCapturer,
        full_page: bool,
        capture_delay: Duration,
    ) -> Self {
        Self {
            emulation,
            viewport,
            full_page,
            capture_delay,
        }
    }

    /// Builds a capturer from settings with the documented timings and caps
    pub fn from_settings(settings: &VrtSettings, request: &CaptureRequest) -> Self {
        Self::with_limits(settings, request, CaptureLimits::default())
    }

    pub fn with_limits(settings: &VrtSettings, request: &CaptureRequest, limits: CaptureLimits) -> Self {
        Self::with_timings(
            settings,
            request,
            limits,
            CaptureTimings::default(),
            StabilizeOptions::default(),
        )
    }

    /// The stabilizer never scrolls past `limits.max_height`
    pub fn with_timings(
        settings: &VrtSettings,
        request: &CaptureRequest,
        limits: CaptureLimits,
        timings: CaptureTimings,
        mut stabilize: StabilizeOptions,
    ) -> Self {
        stabilize.max_scroll_height = stabilize.max_scroll_height.min(limits.max_height);
        let format = settings.image_quality.raster_format();
        let emulation = EmulationCapturer::new(
            EmulationOptions {
                viewport_width: request.viewport_width,
                format,
                limits,
                timings,
            },
            Stabilizer::new(stabilize),
        );
        let fallback_stabilizer = settings.auto_scroll.then(|| Stabilizer::new(stabilize));
        Self::new(
            emulation,
            ViewportCapturer::new(format, fallback_stabilizer),
            request.full_page,
            Duration::from_millis(settings.capture_delay_ms),
        )
    }

    /// Captures `surface`, falling back to a viewport capture if emulation fails
    ///
    /// Only the fallback's own failure is returned to the caller.
    pub async fn capture<S>(&self, surface: &mut S) -> VrtResult<CaptureResult>
    where
        S: ControlSurface + ?Sized,
    {
        if !self.capture_delay.is_zero() {
            sleep(self.capture_delay).await;
        }

        if !self.full_page {
            return self.viewport.capture(surface).await;
        }

        match self.emulation.capture(surface).await {
            Ok(capture) => Ok(capture),
            Err(e) => {
                warn!(
                    "Full-page capture of {} failed, falling back to viewport capture: {}",
                    surface.target(),
                    e
                );
                let capture = self.viewport.capture(surface).await?;
                info!("Viewport fallback capture of {} succeeded", surface.target());
                Ok(capture)
            }
        }
    }
}
