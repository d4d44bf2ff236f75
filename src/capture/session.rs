use async_trait::async_trait;
use serde_json::Value;

use crate::capture::model::RasterFormat;
use crate::error::VrtResult;

/// Device-metrics override applied to the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceMetrics {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}

impl DeviceMetrics {
    pub fn new(width: u32, height: u32, mobile: bool) -> Self {
        Self {
            width,
            height,
            device_scale_factor: 1.0,
            mobile,
        }
    }
}

/// Natural content size reported by the target's layout metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentSize {
    pub width: f64,
    pub height: f64,
}

/// Control surface over one renderable target
///
/// Every method may suspend. Implementations report failures as
/// `VrtError::Attach` from [`ControlSurface::attach`] and as
/// `VrtError::Command` everywhere else. Callers must not issue a second
/// capture against the same target before the first one resolves.
#[async_trait]
pub trait ControlSurface: Send {
    /// Human-readable identity of the target, used in logs and errors
    fn target(&self) -> String;

    async fn attach(&mut self) -> VrtResult<()>;

    /// Enables page and script-runtime event reporting
    async fn enable_domains(&mut self) -> VrtResult<()>;

    async fn reload(&mut self, ignore_cache: bool) -> VrtResult<()>;

    /// Evaluates a script in-page and awaits its completion (promises included)
    async fn evaluate(&mut self, script: &str) -> VrtResult<Value>;

    async fn layout_metrics(&mut self) -> VrtResult<ContentSize>;

    async fn set_device_metrics(&mut self, metrics: DeviceMetrics) -> VrtResult<()>;

    async fn clear_device_metrics(&mut self) -> VrtResult<()>;

    /// Full-frame raster snapshot of whatever the target currently renders
    async fn capture_frame(&mut self, format: RasterFormat) -> VrtResult<Vec<u8>>;

    /// URL of the page at the time of the call
    async fn current_url(&mut self) -> VrtResult<String>;

    async fn detach(&mut self) -> VrtResult<()>;
}
