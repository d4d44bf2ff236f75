use std::time::Duration;

// Memory caps for captured and compared rasters
pub const WIDTH_CAP: u32 = 2000;               // Widest emulated viewport / normalized canvas
pub const HEIGHT_CAP: u32 = 10000;             // Tallest emulated viewport / normalized canvas
pub const SOURCE_DIMENSION_CAP: u32 = 2000;    // Largest source side placed without downscaling
pub const MOBILE_WIDTH_MAX: u32 = 768;         // Requested widths at or below this emulate mobile
pub const PROVISIONAL_HEIGHT: u32 = 800;       // Height used for the pre-reload override

/// Per-command DevTools deadline; must outlast the stabilization script
pub const DEVTOOLS_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Size caps applied by the planner and the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub max_source_dimension: u32,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_width: WIDTH_CAP,
            max_height: HEIGHT_CAP,
            max_source_dimension: SOURCE_DIMENSION_CAP,
        }
    }
}

/// Settle delays used while driving a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimings {
    /// After the cache-less reload
    pub reload_settle: Duration,
    /// After the in-page stabilization script returns
    pub stabilize_settle: Duration,
    /// After the final device-metrics override
    pub metrics_settle: Duration,
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            reload_settle: Duration::from_millis(2000),
            stabilize_settle: Duration::from_millis(3000),
            metrics_settle: Duration::from_millis(1000),
        }
    }
}

impl CaptureTimings {
    /// No settling at all, for scripted targets
    pub fn immediate() -> Self {
        Self {
            reload_settle: Duration::ZERO,
            stabilize_settle: Duration::ZERO,
            metrics_settle: Duration::ZERO,
        }
    }
}

// Extra Chrome arguments; the sandbox and headless switches come from the launcher
pub fn chrome_arguments() -> Vec<String> {
    [
        "--disable-gpu",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-notifications",
        "--disable-infobars",
        "--disable-popup-blocking",
        "--disable-background-networking",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-breakpad",
        "--disable-renderer-backgrounding",
        "--force-color-profile=srgb",
        "--force-device-scale-factor=1",
        "--hide-scrollbars",
        "--mute-audio",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launcher_switches_are_not_repeated() {
        let args = chrome_arguments();
        assert!(!args.iter().any(|a| a == "--no-sandbox"));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(args.iter().any(|a| a == "--force-device-scale-factor=1"));
    }
}
