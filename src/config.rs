//! Configuration management with serde serialization/deserialization
//!
//! This module provides all configuration structures for the screenshot
//! service, including the HTTP bind address, cache TTL, capture timeouts,
//! and browser launch settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard output-size ceiling in bytes, with headroom under the 8 MB limit
/// imposed by the downstream transport.
pub const SIZE_CEILING: usize = 7_900_000;

/// Main configuration structure for the screenshot service
///
/// # Examples
///
/// ```rust
/// use screenshot_service::Config;
///
/// // Use default configuration
/// let config = Config::default();
///
/// // Create custom configuration
/// let config = Config {
///     port: 9090,
///     preflight_probe: false,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Address the HTTP server binds to (default: "0.0.0.0")
    pub bind: String,

    /// Port the HTTP server listens on (default: 8080)
    pub port: u16,

    /// Time-to-live for cached screenshots (default: 24 hours)
    ///
    /// A second request for the same normalized URL within this window is
    /// served from the cache without touching the browser.
    pub cache_ttl: Duration,

    /// Timeout for page navigation including network idle (default: 30 seconds)
    pub navigation_timeout: Duration,

    /// How long to wait for the readiness selector before capturing anyway
    /// (default: 10 seconds)
    pub readiness_timeout: Duration,

    /// CSS selector used as the readiness heuristic (default: "svg")
    ///
    /// The expected content renders charts as SVG; waiting for one element
    /// is a proxy for "page finished meaningful rendering". Its absence
    /// never fails the request.
    pub readiness_selector: String,

    /// Maximum acceptable screenshot size in bytes (default: 7,900,000)
    ///
    /// Captures above this trigger the quality ladder. After the ladder is
    /// exhausted the oversized bytes are accepted as-is.
    pub size_ceiling: usize,

    /// Whether to issue an informational HEAD request against the target
    /// before navigating (default: true). Its outcome never gates capture.
    pub preflight_probe: bool,

    /// Browser viewport used for capture
    pub viewport: Viewport,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string for page loads (default: Chrome default)
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            cache_ttl: Duration::from_secs(60 * 60 * 24),
            navigation_timeout: Duration::from_secs(30),
            readiness_timeout: Duration::from_secs(10),
            readiness_selector: "svg".to_string(),
            size_ceiling: SIZE_CEILING,
            preflight_probe: true,
            viewport: Viewport::default(),
            chrome_path: None,
            user_agent: None,
        }
    }
}

/// Browser viewport configuration for captures
///
/// The default is a square 1080x1080 viewport at device pixel ratio 2 for
/// higher-resolution output. The second quality-ladder step drops the
/// ratio back to 1, halving linear resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1080)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,

    /// Device pixel ratio (default: 2.0)
    pub device_scale_factor: f64,

    /// Whether to emulate a mobile device (default: false)
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1080,
            device_scale_factor: 2.0,
            mobile: false,
        }
    }
}

/// Generate Chrome command-line arguments based on configuration
///
/// # Examples
///
/// ```rust
/// use screenshot_service::{Config, get_chrome_args};
///
/// let config = Config::default();
/// let args = get_chrome_args(&config);
/// assert!(args.contains(&"--headless".to_string()));
/// ```
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--headless".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--ignore-certificate-errors".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
    ];

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }

    args
}

/// Build the chromiumoxide launch configuration.
///
/// A builder failure here means the automation binding cannot be
/// configured at all, which callers surface as a deployment error rather
/// than a runtime one.
pub fn create_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, String> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build()
}

/// Validate configuration values that would otherwise fail at runtime.
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.port == 0 {
        return Err("port must be greater than 0".to_string());
    }

    if config.navigation_timeout.as_secs() == 0 {
        return Err("navigation timeout must be greater than 0".to_string());
    }

    if config.cache_ttl.as_secs() == 0 {
        return Err("cache TTL must be greater than 0".to_string());
    }

    if config.size_ceiling == 0 {
        return Err("size ceiling must be greater than 0".to_string());
    }

    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err("viewport dimensions must be greater than 0".to_string());
    }

    if config.readiness_selector.is_empty() {
        return Err("readiness selector must not be empty".to_string());
    }

    Ok(())
}
