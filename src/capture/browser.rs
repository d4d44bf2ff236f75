use anyhow::{Context, Result};
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::capture::cdp::CdpTarget;
use crate::capture::config;

/// A DevTools-controlled browser plus the task pumping its event stream
pub struct BrowserHandle {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
    launched: bool,
}

impl BrowserHandle {
    /// Launches a local Chrome/Chromium with capture-friendly arguments
    pub async fn launch(headless: bool, window_size: (u32, u32)) -> Result<Self> {
        debug!("Configuring Chrome with headless={}", headless);
        let args = config::chrome_arguments();
        trace!("Setting Chrome arguments: {:?}", args);

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(config::DEVTOOLS_REQUEST_TIMEOUT)
            .window_size(window_size.0, window_size.1)
            .args(args);
        builder = if headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };
        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Browser config error: {}", e))?;

        let (browser, handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;
        info!("Launched browser");
        Ok(Self::spawn(browser, handler, true))
    }

    /// Connects to an already running browser's DevTools websocket
    pub async fn connect(debugger_url: &str) -> Result<Self> {
        debug!("Connecting to DevTools at {}", debugger_url);
        let handler_config = HandlerConfig {
            request_timeout: config::DEVTOOLS_REQUEST_TIMEOUT,
            ..Default::default()
        };
        let (browser, handler) = match Browser::connect_with_config(debugger_url, handler_config).await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Failed to connect to DevTools at {}: {}", debugger_url, e);
                return Err(e).context(format!("Failed to connect to DevTools at {}", debugger_url));
            }
        };
        info!("Connected to browser at {}", debugger_url);
        Ok(Self::spawn(browser, handler, false))
    }

    fn spawn(browser: Browser, mut handler: chromiumoxide::Handler, launched: bool) -> Self {
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
            debug!("Browser handler stream ended");
        });
        Self {
            browser: Arc::new(browser),
            handler,
            launched,
        }
    }

    /// A control surface for `url`; the page opens when the surface attaches
    pub fn target(&self, url: &str) -> CdpTarget {
        CdpTarget::new(self.browser.clone(), url)
    }

    /// Closes a launched browser if no target still holds it
    ///
    /// Browsers reached through [`BrowserHandle::connect`] are left running.
    pub async fn close(self) -> Result<()> {
        if !self.launched {
            self.handler.abort();
            return Ok(());
        }
        match Arc::try_unwrap(self.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!("Error closing browser: {}", e);
                }
                if let Err(e) = browser.wait().await {
                    warn!("Error waiting for browser exit: {}", e);
                }
            }
            Err(_) => warn!("Browser still referenced by open targets, leaving it running"),
        }
        self.handler.abort();
        Ok(())
    }
}
