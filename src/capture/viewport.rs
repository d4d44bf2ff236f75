use tracing::{debug, instrument, warn};

use crate::capture::model::{CaptureResult, RasterFormat};
use crate::capture::session::ControlSurface;
use crate::error::VrtResult;
use crate::stabilizer::{self, scripts, Stabilizer};

/// Plain screenshot of whatever the target's viewport shows, no emulation
#[derive(Debug)]
pub struct ViewportCapturer {
    format: RasterFormat,
    /// Present when the page should be scrolled through before capture
    stabilizer: Option<Stabilizer>,
}

impl ViewportCapturer {
    pub fn new(format: RasterFormat, stabilizer: Option<Stabilizer>) -> Self {
        Self { format, stabilizer }
    }

    /// Attaches, captures the visible viewport, and detaches
    ///
    /// Detach failures are logged and never replace the capture outcome.
    #[instrument(skip_all, fields(page = %surface.target()))]
    pub async fn capture<S>(&self, surface: &mut S) -> VrtResult<CaptureResult>
    where
        S: ControlSurface + ?Sized,
    {
        surface.attach().await?;
        let outcome = self.shoot(surface).await;
        if let Err(e) = surface.detach().await {
            warn!("Failed to detach from {}: {}", surface.target(), e);
        }
        outcome
    }

    async fn shoot<S>(&self, surface: &mut S) -> VrtResult<CaptureResult>
    where
        S: ControlSurface + ?Sized,
    {
        match stabilizer::read_page_info(surface).await {
            Ok(info) => debug!(
                "Page {} is {}x{} (viewport {}x{}), lazy images: {}, animations: {}",
                info.url,
                info.scroll_width,
                info.scroll_height,
                info.viewport_width,
                info.viewport_height,
                info.has_lazy_images,
                info.has_animations
            ),
            Err(e) => debug!("Could not read page info of {}: {}", surface.target(), e),
        }

        match &self.stabilizer {
            Some(stabilizer) => {
                stabilizer.stabilize(surface).await;
            }
            None => {
                if let Err(e) = surface.evaluate(scripts::SCROLL_TO_TOP).await {
                    warn!("Failed to scroll {} to the top: {}", surface.target(), e);
                }
            }
        }

        let image_bytes = surface.capture_frame(self.format).await?;

        if let Some(stabilizer) = &self.stabilizer {
            stabilizer.restore(surface).await;
        }

        let source_url = match surface.current_url().await {
            Ok(url) => url,
            Err(e) => {
                warn!("Could not read URL of {}: {}", surface.target(), e);
                surface.target()
            }
        };
        Ok(CaptureResult::viewport(image_bytes, self.format, source_url))
    }
}
