//! Main screenshot service orchestrating the cache-then-render flow
//!
//! The service normalizes the requested URL, consults the cache, and only
//! drives the browser on a miss. Cache failures on either the read or the
//! write path are logged and swallowed; the cache is an optimization, not
//! a dependency the request is allowed to fail on.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    cache::{self, CacheLookup},
    metrics, normalize_url, Cache, ChromeRenderer, Config, MemoryCache, Renderer, ServiceError,
};

/// Where the returned bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Cache,
    Render,
}

#[derive(Debug)]
pub struct ScreenshotOutcome {
    pub bytes: Vec<u8>,
    pub source: ImageSource,
}

/// Screenshot orchestrator.
///
/// # Examples
///
/// ```rust,no_run
/// use screenshot_service::{Config, ScreenshotService};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = ScreenshotService::with_chrome(Config::default());
///     let outcome = service.fetch("https://example.com").await?;
///     println!("captured {} bytes", outcome.bytes.len());
///     Ok(())
/// }
/// ```
pub struct ScreenshotService {
    cache: Arc<dyn Cache>,
    renderer: Arc<dyn Renderer>,
    config: Config,
}

impl ScreenshotService {
    pub fn new(config: Config, cache: Arc<dyn Cache>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            cache,
            renderer,
            config,
        }
    }

    /// Wire the service with the in-process cache and the Chrome renderer.
    pub fn with_chrome(config: Config) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let renderer = Arc::new(ChromeRenderer::new(config.clone()));
        Self::new(config, cache, renderer)
    }

    /// Serve one screenshot request: validate, look up, render on miss,
    /// store, return.
    pub async fn fetch(&self, raw_url: &str) -> Result<ScreenshotOutcome, ServiceError> {
        let url = normalize_url(raw_url)?;
        debug!(url = %url, "normalized target URL");

        match cache::lookup(self.cache.as_ref(), url.as_str()).await {
            CacheLookup::Hit(bytes) => {
                info!(url = %url, size = bytes.len(), "cache hit");
                metrics::record_cache_hit();
                return Ok(ScreenshotOutcome {
                    bytes,
                    source: ImageSource::Cache,
                });
            }
            CacheLookup::Miss => {
                debug!(url = %url, "cache miss");
            }
            CacheLookup::ReadError(e) => {
                // The error stops here: a broken cache must not fail the
                // request, so it degrades to a miss.
                warn!(url = %url, error = %e, "cache read failed, treating as miss");
                metrics::record_cache_read_failure();
            }
        }
        metrics::record_cache_miss();

        let started = Instant::now();
        let rendered = self.renderer.render(&url).await;
        metrics::record_render(started.elapsed(), rendered.is_ok());
        let bytes = rendered?;

        match self
            .cache
            .put(url.as_str(), bytes.clone(), self.config.cache_ttl)
            .await
        {
            Ok(()) => debug!(url = %url, ttl = ?self.config.cache_ttl, "screenshot cached"),
            Err(e) => {
                warn!(url = %url, error = %e, "failed to cache screenshot");
                metrics::record_cache_write_failure();
            }
        }

        Ok(ScreenshotOutcome {
            bytes,
            source: ImageSource::Render,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
