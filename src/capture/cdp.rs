use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chromiumoxide::cdp::browser_protocol::emulation::{
    ClearDeviceMetricsOverrideParams, SetDeviceMetricsOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, EnableParams as PageEnableParams,
    GetLayoutMetricsParams, ReloadParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EnableParams as RuntimeEnableParams, EvaluateParams};
use chromiumoxide::{Browser, Page};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::capture::model::RasterFormat;
use crate::capture::session::{ContentSize, ControlSurface, DeviceMetrics};
use crate::error::{VrtError, VrtResult};

/// A page in a DevTools-controlled browser, opened on attach and closed on detach
pub struct CdpTarget {
    browser: Arc<Browser>,
    url: String,
    page: Option<Page>,
}

impl CdpTarget {
    pub fn new(browser: Arc<Browser>, url: impl Into<String>) -> Self {
        Self {
            browser,
            url: url.into(),
            page: None,
        }
    }

    fn page(&self, command: &'static str) -> VrtResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| VrtError::command(command, "no session attached"))
    }
}

#[async_trait]
impl ControlSurface for CdpTarget {
    fn target(&self) -> String {
        self.url.clone()
    }

    async fn attach(&mut self) -> VrtResult<()> {
        debug!("Opening DevTools session for {}", self.url);
        let page = self
            .browser
            .new_page(self.url.as_str())
            .await
            .map_err(|e| VrtError::Attach {
                target: self.url.clone(),
                source: e.into(),
            })?;
        self.page = Some(page);
        Ok(())
    }

    async fn enable_domains(&mut self) -> VrtResult<()> {
        let page = self.page("Page.enable")?;
        page.execute(PageEnableParams::default())
            .await
            .map_err(|e| VrtError::command("Page.enable", e))?;
        page.execute(RuntimeEnableParams::default())
            .await
            .map_err(|e| VrtError::command("Runtime.enable", e))?;
        Ok(())
    }

    async fn reload(&mut self, ignore_cache: bool) -> VrtResult<()> {
        let page = self.page("Page.reload")?;
        page.execute(ReloadParams::builder().ignore_cache(ignore_cache).build())
            .await
            .map_err(|e| VrtError::command("Page.reload", e))?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> VrtResult<Value> {
        let page = self.page("Runtime.evaluate")?;
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| VrtError::command("Runtime.evaluate", e))?;
        let result = page
            .evaluate_expression(params)
            .await
            .map_err(|e| VrtError::command("Runtime.evaluate", e))?;
        trace!("Evaluation returned {:?}", result.value());
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn layout_metrics(&mut self) -> VrtResult<ContentSize> {
        let page = self.page("Page.getLayoutMetrics")?;
        let metrics = page
            .execute(GetLayoutMetricsParams::default())
            .await
            .map_err(|e| VrtError::command("Page.getLayoutMetrics", e))?;
        let content = &metrics.result.css_content_size;
        Ok(ContentSize {
            width: content.width,
            height: content.height,
        })
    }

    async fn set_device_metrics(&mut self, metrics: DeviceMetrics) -> VrtResult<()> {
        let page = self.page("Emulation.setDeviceMetricsOverride")?;
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(metrics.width))
            .height(i64::from(metrics.height))
            .device_scale_factor(metrics.device_scale_factor)
            .mobile(metrics.mobile)
            .build()
            .map_err(|e| VrtError::command("Emulation.setDeviceMetricsOverride", e))?;
        page.execute(params)
            .await
            .map_err(|e| VrtError::command("Emulation.setDeviceMetricsOverride", e))?;
        Ok(())
    }

    async fn clear_device_metrics(&mut self) -> VrtResult<()> {
        let page = self.page("Emulation.clearDeviceMetricsOverride")?;
        page.execute(ClearDeviceMetricsOverrideParams::default())
            .await
            .map_err(|e| VrtError::command("Emulation.clearDeviceMetricsOverride", e))?;
        Ok(())
    }

    async fn capture_frame(&mut self, format: RasterFormat) -> VrtResult<Vec<u8>> {
        let page = self.page("Page.captureScreenshot")?;
        let params = match format {
            RasterFormat::Png => CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build(),
            RasterFormat::Jpeg { quality } => CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(i64::from(quality))
                .build(),
        };
        let response = page
            .execute(params)
            .await
            .map_err(|e| VrtError::command("Page.captureScreenshot", e))?;
        let encoded: &str = response.result.data.as_ref();
        BASE64
            .decode(encoded)
            .map_err(|e| VrtError::command("Page.captureScreenshot", e))
    }

    async fn current_url(&mut self) -> VrtResult<String> {
        let page = self.page("Target.getTargetInfo")?;
        let url = page
            .url()
            .await
            .map_err(|e| VrtError::command("Target.getTargetInfo", e))?;
        Ok(url.unwrap_or_else(|| self.url.clone()))
    }

    async fn detach(&mut self) -> VrtResult<()> {
        if let Some(page) = self.page.take() {
            debug!("Closing DevTools session for {}", self.url);
            page.close()
                .await
                .map_err(|e| VrtError::command("Target.closeTarget", e))?;
        }
        Ok(())
    }
}
