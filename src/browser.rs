//! Browser session management for the automation collaborator
//!
//! The orchestration layer only speaks the `BrowserSession`/`BrowserPage`
//! traits; `ChromeSession`/`ChromePage` back them with chromiumoxide. A
//! session lives for exactly one request: launched on a cache miss, closed
//! in the cleanup phase on every exit path.

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info};

use crate::{create_browser_config, Config, ServiceError};

/// One live browser session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>, ServiceError>;

    /// Whether the underlying automation worker has died. Checked after a
    /// pipeline failure to pick the crash-specific client messaging.
    fn is_crashed(&self) -> bool;

    async fn close(&self) -> Result<(), ServiceError>;
}

/// One open page within a session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn set_viewport(
        &self,
        width: u32,
        height: u32,
        device_scale_factor: f64,
    ) -> Result<(), ServiceError>;

    /// Navigate and wait for network idle, bounded by `timeout`.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ServiceError>;

    /// Wait until at least one element matches `selector`, returning the
    /// match count. `ContentNotReady` on deadline.
    async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<usize, ServiceError>;

    async fn title(&self) -> Option<String>;

    /// First `limit` characters of the rendered body, for diagnostics when
    /// the readiness wait times out.
    async fn body_excerpt(&self, limit: usize) -> Option<String>;

    async fn capture_jpeg(&self, quality: i64) -> Result<Vec<u8>, ServiceError>;

    async fn close(&self) -> Result<(), ServiceError>;
}

/// chromiumoxide-backed browser session.
///
/// The CDP handler is a stream that must be polled for the browser to make
/// progress; it runs in a spawned task whose completion doubles as the
/// crash signal.
pub struct ChromeSession {
    browser: Mutex<Browser>,
    handler: tokio::task::JoinHandle<Result<(), chromiumoxide::error::CdpError>>,
    mobile: bool,
}

impl ChromeSession {
    pub async fn launch(config: &Config) -> Result<Self, ServiceError> {
        let browser_config = create_browser_config(config).map_err(|e| {
            error!(error = %e, "browser binding is not configured");
            ServiceError::BrowserUnavailable(e)
        })?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            error!(error = %e, "browser launch failed; check the Chrome installation");
            ServiceError::BrowserUnavailable(e.to_string())
        })?;

        let handler_task = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!(error = %e, "CDP handler error");
                        return Err(e);
                    }
                    None => {
                        info!("CDP handler stream ended");
                        break;
                    }
                }
            }
            Ok(())
        });

        debug!("browser session launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler: handler_task,
            mobile: config.viewport.mobile,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>, ServiceError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| ServiceError::PageError(e.to_string()))?;

        Ok(Box::new(ChromePage {
            page,
            mobile: self.mobile,
        }))
    }

    fn is_crashed(&self) -> bool {
        self.handler.is_finished()
    }

    async fn close(&self) -> Result<(), ServiceError> {
        let result = self.browser.lock().await.close().await;
        self.handler.abort();
        result
            .map(|_| ())
            .map_err(|e| ServiceError::PageError(e.to_string()))
    }
}

pub struct ChromePage {
    page: Page,
    mobile: bool,
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn set_viewport(
        &self,
        width: u32,
        height: u32,
        device_scale_factor: f64,
    ) -> Result<(), ServiceError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width)
            .height(height)
            .device_scale_factor(device_scale_factor)
            .mobile(self.mobile)
            .build()
            .map_err(|e| ServiceError::PageError(e.to_string()))?;

        self.page
            .execute(params)
            .await
            .map_err(|e| ServiceError::PageError(e.to_string()))?;

        Ok(())
    }

    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), ServiceError> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match timeout(deadline, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServiceError::NavigationFailed(e.to_string())),
            Err(_) => Err(ServiceError::NavigationFailed(format!(
                "timed out after {deadline:?}"
            ))),
        }
    }

    async fn wait_for_element(
        &self,
        selector: &str,
        deadline: Duration,
    ) -> Result<usize, ServiceError> {
        let poll_interval = Duration::from_millis(250);
        let started = tokio::time::Instant::now();

        loop {
            if let Ok(elements) = self.page.find_elements(selector).await {
                if !elements.is_empty() {
                    return Ok(elements.len());
                }
            }

            if started.elapsed() >= deadline {
                return Err(ServiceError::ContentNotReady(format!(
                    "no `{selector}` element within {deadline:?}"
                )));
            }

            sleep(poll_interval).await;
        }
    }

    async fn title(&self) -> Option<String> {
        self.page.get_title().await.ok().flatten()
    }

    async fn body_excerpt(&self, limit: usize) -> Option<String> {
        let expr = format!("document.body.innerHTML.substring(0, {limit})");
        self.page
            .evaluate(expr)
            .await
            .ok()?
            .into_value::<String>()
            .ok()
    }

    async fn capture_jpeg(&self, quality: i64) -> Result<Vec<u8>, ServiceError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .quality(quality)
            .build();

        self.page
            .screenshot(params)
            .await
            .map_err(|e| ServiceError::CaptureFailed(e.to_string()))
    }

    async fn close(&self) -> Result<(), ServiceError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| ServiceError::PageError(e.to_string()))
    }
}
