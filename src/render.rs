//! Render pipeline: navigate, readiness wait, capture, size reduction
//!
//! This module owns the cache-miss path of a request. The flow mirrors the
//! capture contract exactly: viewport at device pixel ratio 2, navigation
//! bounded by 30 seconds, a best-effort wait for the readiness selector,
//! then a JPEG capture pushed under the size ceiling by a fixed three-step
//! quality ladder.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    format_bytes, metrics, BrowserPage, BrowserSession, ChromeSession, Config, ServiceError,
    Viewport,
};

/// Length of the body excerpt logged when the readiness wait times out.
const BODY_EXCERPT_CHARS: usize = 500;

/// Produces screenshot bytes for a normalized URL.
///
/// The seam between orchestration and browser automation: the service only
/// ever calls `render`, so tests can count renders without a browser.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &Url) -> Result<Vec<u8>, ServiceError>;
}

/// Chrome-backed renderer launching one session per request.
pub struct ChromeRenderer {
    config: Config,
    probe_client: reqwest::Client,
}

impl ChromeRenderer {
    pub fn new(config: Config) -> Self {
        let probe_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            probe_client,
        }
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, url: &Url) -> Result<Vec<u8>, ServiceError> {
        let session = ChromeSession::launch(&self.config).await?;
        render_with_session(&session, url, &self.config, Some(&self.probe_client)).await
    }
}

/// Run the capture flow against an open session, then tear everything down.
///
/// The cleanup phase runs on every exit path. Page close and session close
/// each swallow and log their own error so teardown can never mask the
/// pipeline failure. If the pipeline failed and the session reports its
/// worker dead, the error is re-tagged as a crash for client messaging.
pub async fn render_with_session(
    session: &dyn BrowserSession,
    url: &Url,
    config: &Config,
    probe_client: Option<&reqwest::Client>,
) -> Result<Vec<u8>, ServiceError> {
    let result = match session.open_page().await {
        Ok(page) => {
            let result = drive_page(page.as_ref(), url, config, probe_client).await;

            match page.close().await {
                Ok(()) => debug!("page closed"),
                Err(e) => warn!(error = %e, "page close failed during cleanup"),
            }

            result
        }
        Err(e) => Err(e),
    };

    match session.close().await {
        Ok(()) => debug!("browser session closed"),
        Err(e) => warn!(error = %e, "session close failed during cleanup"),
    }

    result.map_err(|e| {
        if session.is_crashed() {
            warn!(kind = e.kind(), "automation worker died during render");
            ServiceError::WorkerCrashed(e.to_string())
        } else {
            e
        }
    })
}

async fn drive_page(
    page: &dyn BrowserPage,
    url: &Url,
    config: &Config,
    probe_client: Option<&reqwest::Client>,
) -> Result<Vec<u8>, ServiceError> {
    let viewport = &config.viewport;
    page.set_viewport(viewport.width, viewport.height, viewport.device_scale_factor)
        .await?;
    debug!(
        width = viewport.width,
        height = viewport.height,
        dpr = viewport.device_scale_factor,
        "viewport configured"
    );

    if config.preflight_probe {
        if let Some(client) = probe_client {
            preflight_probe(client, url).await;
        }
    }

    info!(url = %url, "navigating");
    page.navigate(url.as_str(), config.navigation_timeout).await?;
    debug!("navigation completed");

    match page
        .wait_for_element(&config.readiness_selector, config.readiness_timeout)
        .await
    {
        Ok(count) => {
            let title = page.title().await.unwrap_or_default();
            info!(
                page_title = %title,
                matches = count,
                selector = %config.readiness_selector,
                "content ready"
            );
        }
        Err(e) => {
            // Partial content beats a hard failure; capture anyway.
            warn!(error = %e, "readiness wait gave up, capturing current state");
            let title = page.title().await.unwrap_or_default();
            let excerpt = page
                .body_excerpt(BODY_EXCERPT_CHARS)
                .await
                .unwrap_or_else(|| "<unavailable>".to_string());
            debug!(page_title = %title, body = %excerpt, "page state at capture time");
        }
    }

    capture_within_budget(page, config.size_ceiling, viewport).await
}

/// Capture a JPEG, downgrading along the fixed quality ladder until the
/// output fits the ceiling or the ladder is exhausted.
///
/// Steps: quality 100 -> quality 80 (same viewport) -> device pixel ratio
/// 1 at quality 85. A capture still over the ceiling after the last step
/// is accepted as-is; whether the downstream transport tolerates that is
/// unverified, so it is flagged loudly in the logs.
pub async fn capture_within_budget(
    page: &dyn BrowserPage,
    ceiling: usize,
    viewport: &Viewport,
) -> Result<Vec<u8>, ServiceError> {
    debug!("capturing at quality 100");
    let mut img = page.capture_jpeg(100).await?;

    if img.len() > ceiling {
        info!(
            size = %format_bytes(img.len()),
            "capture over budget, re-encoding at quality 80"
        );
        metrics::record_quality_downgrade("quality_80");
        img = page.capture_jpeg(80).await?;
    }

    if img.len() > ceiling {
        info!(
            size = %format_bytes(img.len()),
            "still over budget, dropping device pixel ratio to 1"
        );
        metrics::record_quality_downgrade("dpr_1_quality_85");
        page.set_viewport(viewport.width, viewport.height, 1.0)
            .await?;
        img = page.capture_jpeg(85).await?;
    }

    if img.len() > ceiling {
        warn!(
            size = %format_bytes(img.len()),
            ceiling,
            "capture exceeds ceiling after final reduction step, using as-is"
        );
    }

    info!(size = %format_bytes(img.len()), "final JPEG");
    Ok(img)
}

/// Informational reachability check. The outcome is logged and discarded;
/// navigation proceeds regardless.
async fn preflight_probe(client: &reqwest::Client, url: &Url) {
    match client.head(url.clone()).send().await {
        Ok(response) => debug!(status = %response.status(), "preflight probe"),
        Err(e) => debug!(error = %e, "preflight probe failed, continuing"),
    }
}
