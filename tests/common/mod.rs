#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::Value;
use std::io::Cursor;

use quick_vrt::capture::{
    CaptureLimits, CaptureRequest, CaptureTimings, ContentSize, ControlSurface, DeviceMetrics, PageCapturer,
    RasterFormat,
};
use quick_vrt::error::{VrtError, VrtResult};
use quick_vrt::settings::VrtSettings;
use quick_vrt::stabilizer::{scripts, StabilizeOptions};

/// Which in-page script an evaluation ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Stabilize,
    ScrollToTop,
    PageInfo,
    Restore,
    Other,
}

impl Script {
    fn of(source: &str) -> Self {
        if source == scripts::SCROLL_TO_TOP {
            Script::ScrollToTop
        } else if source == scripts::PAGE_INFO {
            Script::PageInfo
        } else if source == scripts::RESTORE_PAGE {
            Script::Restore
        } else if source.contains("\"maxScrollHeight\"") {
            Script::Stabilize
        } else {
            Script::Other
        }
    }
}

/// One control-surface call as observed by [`MockSurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Attach,
    EnableDomains,
    Reload(bool),
    Evaluate(Script),
    LayoutMetrics,
    SetDeviceMetrics(DeviceMetrics),
    ClearDeviceMetrics,
    CaptureFrame,
    CurrentUrl,
    Detach,
}

impl Call {
    fn command(&self) -> &'static str {
        match self {
            Call::Attach => "Target.attachToTarget",
            Call::EnableDomains => "Page.enable",
            Call::Reload(_) => "Page.reload",
            Call::Evaluate(_) => "Runtime.evaluate",
            Call::LayoutMetrics => "Page.getLayoutMetrics",
            Call::SetDeviceMetrics(_) => "Emulation.setDeviceMetricsOverride",
            Call::ClearDeviceMetrics => "Emulation.clearDeviceMetricsOverride",
            Call::CaptureFrame => "Page.captureScreenshot",
            Call::CurrentUrl => "Target.getTargetInfo",
            Call::Detach => "Target.closeTarget",
        }
    }
}

/// Scripted target that records every call and fails the commands it is told to
pub struct MockSurface {
    pub url: String,
    pub content: ContentSize,
    /// Encoded raster returned by every frame capture
    pub frame: Vec<u8>,
    pub calls: Vec<Call>,
    /// Source of every evaluated script, in order
    pub scripts: Vec<String>,
    failing: Vec<&'static str>,
}

impl MockSurface {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            content: ContentSize {
                width: 1280.0,
                height: 4000.0,
            },
            frame: png(4, 4, [255, 255, 255, 255]),
            calls: Vec::new(),
            scripts: Vec::new(),
            failing: Vec::new(),
        }
    }

    pub fn with_content(mut self, width: f64, height: f64) -> Self {
        self.content = ContentSize { width, height };
        self
    }

    pub fn with_frame(mut self, frame: Vec<u8>) -> Self {
        self.frame = frame;
        self
    }

    /// Makes every call of the given command fail, e.g. `"Runtime.evaluate"`
    pub fn failing(mut self, command: &'static str) -> Self {
        self.failing.push(command);
        self
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }

    fn record(&mut self, call: Call) -> VrtResult<()> {
        let command = call.command();
        let is_attach = call == Call::Attach;
        self.calls.push(call);
        if !self.failing.contains(&command) {
            return Ok(());
        }
        if is_attach {
            Err(VrtError::Attach {
                target: self.url.clone(),
                source: "connection refused".into(),
            })
        } else {
            Err(VrtError::command(command, "scripted failure"))
        }
    }
}

#[async_trait]
impl ControlSurface for MockSurface {
    fn target(&self) -> String {
        self.url.clone()
    }

    async fn attach(&mut self) -> VrtResult<()> {
        self.record(Call::Attach)
    }

    async fn enable_domains(&mut self) -> VrtResult<()> {
        self.record(Call::EnableDomains)
    }

    async fn reload(&mut self, ignore_cache: bool) -> VrtResult<()> {
        self.record(Call::Reload(ignore_cache))
    }

    async fn evaluate(&mut self, script: &str) -> VrtResult<Value> {
        self.scripts.push(script.to_string());
        self.record(Call::Evaluate(Script::of(script)))?;
        Ok(Value::Null)
    }

    async fn layout_metrics(&mut self) -> VrtResult<ContentSize> {
        self.record(Call::LayoutMetrics)?;
        Ok(self.content)
    }

    async fn set_device_metrics(&mut self, metrics: DeviceMetrics) -> VrtResult<()> {
        self.record(Call::SetDeviceMetrics(metrics))
    }

    async fn clear_device_metrics(&mut self) -> VrtResult<()> {
        self.record(Call::ClearDeviceMetrics)
    }

    async fn capture_frame(&mut self, _format: RasterFormat) -> VrtResult<Vec<u8>> {
        self.record(Call::CaptureFrame)?;
        Ok(self.frame.clone())
    }

    async fn current_url(&mut self) -> VrtResult<String> {
        self.record(Call::CurrentUrl)?;
        Ok(self.url.clone())
    }

    async fn detach(&mut self) -> VrtResult<()> {
        self.record(Call::Detach)
    }
}

/// Solid-color PNG
pub fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(rgba));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode test png");
    out.into_inner()
}

/// Settings with no capture delay
pub fn quick_settings() -> VrtSettings {
    VrtSettings {
        capture_delay_ms: 0,
        ..Default::default()
    }
}

/// A capturer that never sleeps
pub fn quick_capturer(request: &CaptureRequest) -> PageCapturer {
    capturer_with(&quick_settings(), request, CaptureLimits::default())
}

/// A capturer that never sleeps, built from the given settings and caps
pub fn capturer_with(settings: &VrtSettings, request: &CaptureRequest, limits: CaptureLimits) -> PageCapturer {
    PageCapturer::with_timings(
        settings,
        request,
        limits,
        CaptureTimings::immediate(),
        StabilizeOptions {
            scroll_step_delay: std::time::Duration::ZERO,
            image_timeout: std::time::Duration::ZERO,
            stabilization_delay: std::time::Duration::ZERO,
            ..Default::default()
        },
    )
}
