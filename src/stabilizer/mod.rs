//! Makes a live page visually deterministic before it is captured.
//!
//! All work happens in a single in-page script so the target only sees one
//! evaluation per stabilization. Failures here are warnings: a partially
//! stabilized page is still captured.

pub mod scripts;
pub mod suppressors;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::capture::config::HEIGHT_CAP;
use crate::capture::session::ControlSurface;
use crate::error::VrtResult;
pub use suppressors::{default_suppressors, AnimationSuppressor};

/// What the stabilization pass should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizeOptions {
    pub disable_animations: bool,
    /// Scroll top to bottom in viewport steps before the lazy-load pass
    pub scroll_through: bool,
    pub trigger_lazy_loading: bool,
    pub scroll_step_delay: Duration,
    /// Scroll-through stops at this many CSS pixels even if the page is taller
    pub max_scroll_height: u32,
    /// Upper bound for waiting on incomplete `<img>` elements
    pub image_timeout: Duration,
    /// Final settle delay once the page is back at the top
    pub stabilization_delay: Duration,
}

impl Default for StabilizeOptions {
    fn default() -> Self {
        Self {
            disable_animations: true,
            scroll_through: true,
            trigger_lazy_loading: true,
            scroll_step_delay: Duration::from_millis(200),
            max_scroll_height: HEIGHT_CAP,
            image_timeout: Duration::from_millis(3000),
            stabilization_delay: Duration::from_millis(500),
        }
    }
}

impl StabilizeOptions {
    /// Smallest scroll step the in-page script takes, in CSS pixels
    pub const MIN_SCROLL_STEP: u32 = 100;

    /// Longest the in-page script can run before it resolves
    pub fn worst_case(&self) -> Duration {
        let steps = if self.scroll_through {
            self.max_scroll_height.div_ceil(Self::MIN_SCROLL_STEP)
        } else {
            0
        };
        self.scroll_step_delay * steps + self.image_timeout + self.stabilization_delay
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptOptions {
    disable_animations: bool,
    scroll_through: bool,
    trigger_lazy_loading: bool,
    scroll_step_delay_ms: u64,
    max_scroll_height: u32,
    image_timeout_ms: u64,
    settle_delay_ms: u64,
}

impl From<&StabilizeOptions> for ScriptOptions {
    fn from(o: &StabilizeOptions) -> Self {
        Self {
            disable_animations: o.disable_animations,
            scroll_through: o.scroll_through,
            trigger_lazy_loading: o.trigger_lazy_loading,
            scroll_step_delay_ms: o.scroll_step_delay.as_millis() as u64,
            max_scroll_height: o.max_scroll_height,
            image_timeout_ms: o.image_timeout.as_millis() as u64,
            settle_delay_ms: o.stabilization_delay.as_millis() as u64,
        }
    }
}

/// Outcome reported by the in-page script
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StabilizationReport {
    pub animations_disabled: bool,
    pub suppressor_failures: Vec<String>,
    /// Scrolling revealed more content and the pass stopped early
    pub infinite_scroll: bool,
    pub lazy_elements: u32,
    pub pending_images: u32,
    /// The image wait hit its bound; capture proceeds anyway
    pub images_timed_out: bool,
    pub error: Option<String>,
}

/// Page facts gathered for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
    pub scroll_width: f64,
    pub scroll_height: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub has_lazy_images: bool,
    pub has_animations: bool,
}

/// Runs the stabilization sequence against a target
pub struct Stabilizer {
    options: StabilizeOptions,
    suppressors: Vec<Box<dyn AnimationSuppressor>>,
}

impl std::fmt::Debug for Stabilizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stabilizer")
            .field("options", &self.options)
            .field("suppressors", &self.suppressors.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self::new(StabilizeOptions::default())
    }
}

impl Stabilizer {
    pub fn new(options: StabilizeOptions) -> Self {
        Self {
            options,
            suppressors: default_suppressors(),
        }
    }

    /// Appends a strategy after the built-in ones
    pub fn with_suppressor(mut self, suppressor: Box<dyn AnimationSuppressor>) -> Self {
        self.suppressors.push(suppressor);
        self
    }

    pub fn options(&self) -> &StabilizeOptions {
        &self.options
    }

    /// The complete in-page script, resolving to a [`StabilizationReport`]
    pub fn script(&self) -> String {
        let options = serde_json::to_string(&ScriptOptions::from(&self.options))
            .unwrap_or_else(|_| "{}".to_string());
        scripts::STABILIZE
            .replace("__OPTIONS__", &options)
            .replace("__SUPPRESSORS__", &suppressors::render(&self.suppressors))
    }

    /// Stabilizes the page, swallowing every failure
    ///
    /// On failure the page is still sent back to the top. Returns the script's
    /// report when the evaluation itself succeeded.
    pub async fn stabilize<S>(&self, surface: &mut S) -> Option<StabilizationReport>
    where
        S: ControlSurface + ?Sized,
    {
        debug!("Stabilizing {}", surface.target());
        match surface.evaluate(&self.script()).await {
            Ok(value) => {
                let report: StabilizationReport = serde_json::from_value(value).unwrap_or_default();
                log_report(&surface.target(), &report);
                Some(report)
            }
            Err(e) => {
                warn!("Stabilization warning for {}: {}", surface.target(), e);
                if let Err(e) = surface.evaluate(scripts::SCROLL_TO_TOP).await {
                    warn!("Failed to return {} to the top: {}", surface.target(), e);
                }
                None
            }
        }
    }

    /// Removes the injected animation style and restores scroll behavior
    pub async fn restore<S>(&self, surface: &mut S)
    where
        S: ControlSurface + ?Sized,
    {
        if let Err(e) = surface.evaluate(scripts::RESTORE_PAGE).await {
            warn!("Failed to restore {}: {}", surface.target(), e);
        }
    }
}

/// Reads page facts for diagnostics logging
pub async fn read_page_info<S>(surface: &mut S) -> VrtResult<PageInfo>
where
    S: ControlSurface + ?Sized,
{
    let value = surface.evaluate(scripts::PAGE_INFO).await?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

pub(crate) fn log_report(target: &str, report: &StabilizationReport) {
    if let Some(error) = &report.error {
        warn!("Stabilization warning for {}: {}", target, error);
    }
    if !report.suppressor_failures.is_empty() {
        debug!("Animation suppressors failed on {}: {:?}", target, report.suppressor_failures);
    }
    if report.infinite_scroll {
        info!("Content kept growing while scrolling {}, stopped early", target);
    }
    if report.images_timed_out {
        info!("Image wait on {} timed out with {} pending images", target, report.pending_images);
    }
}
