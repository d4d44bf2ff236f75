use std::time::Duration;

use crate::capture::CaptureLimits;
use crate::settings::VrtSettings;

/// Default capacity for the job queue
pub const QUEUE_SIZE: usize = 10;

/// Default number of comparison workers
pub const WORKER_COUNT: usize = 2;

/// Configuration for the API
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Directory diff images are written to
    pub output_dir: String,

    /// Width of the browser window
    pub viewport_width: u32,

    /// Height of the browser window
    pub viewport_height: u32,

    /// Whether to run the browser in headless mode
    pub headless: bool,

    /// DevTools websocket of an already running browser (launches one if None)
    pub debugger_url: Option<String>,

    /// Timeout for a whole comparison request
    pub request_timeout: Duration,

    /// Number of workers pulling jobs off the queue
    pub workers: usize,

    /// Capacity of the job queue
    pub queue_size: usize,

    /// JSON file mirroring the comparison history (memory only if None)
    pub history_file: Option<String>,

    /// Capture and diff settings applied to every request
    pub settings: VrtSettings,

    /// Size caps for emulated viewports and the comparison canvas
    pub limits: CaptureLimits,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            output_dir: "comparisons".to_string(),
            viewport_width: 1280,
            viewport_height: 800,
            headless: true,
            debugger_url: None,
            request_timeout: Duration::from_secs(120),
            workers: WORKER_COUNT,
            queue_size: QUEUE_SIZE,
            history_file: None,
            settings: VrtSettings::default(),
            limits: CaptureLimits::default(),
        }
    }
}
