//! # Screenshot Service
//!
//! A request-triggered web screenshot service written in Rust. Given a
//! target URL it returns a JPEG rendering of the page, caching results for
//! 24 hours to avoid redundant renders and applying an adaptive quality
//! ladder to keep output under a hard size ceiling.
//!
//! ## Request Flow
//!
//! ```text
//! GET /?url=...  ->  validate & normalize URL
//!                ->  cache lookup (read failure degrades to a miss)
//!                ->  hit:  return cached JPEG
//!                ->  miss: launch Chrome -> viewport 1080x1080 @ DPR 2
//!                          -> navigate (network idle, 30 s budget)
//!                          -> wait for readiness selector (10 s, best effort)
//!                          -> capture JPEG q100
//!                          -> over 7.9 MB? recapture q80, then DPR 1 + q85
//!                          -> cache (24 h TTL) and return
//! ```
//!
//! The browser session and page are torn down on every exit path; cleanup
//! errors are logged without masking the original failure.
//!
//! ## Responses
//!
//! | Condition | Status | Notes |
//! |-----------|--------|-------|
//! | Success | 200 | `content-type: image/jpeg`, `x-browser-worker: success` |
//! | Missing `url` | 400 | `x-browser-worker: error-no-url` |
//! | Invalid `url` | 400 | body `Invalid URL: <message>` |
//! | Worker crash | 500 | `x-error-code: 1042` |
//! | Other failure | 500 | body `Browser worker error: <message>` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use screenshot_service::{Config, ScreenshotService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ScreenshotService::with_chrome(Config::default());
//!     let outcome = service.fetch("https://example.com").await?;
//!     println!("captured {} bytes", outcome.bytes.len());
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! screenshot-service --port 8080 --cache-ttl 86400
//! curl 'http://localhost:8080/?url=https://example.com' -o shot.jpg
//! ```

/// Configuration and settings for the screenshot service
pub mod config;

/// Error types and response classification
pub mod error;

/// Screenshot cache keyed by normalized URL
pub mod cache;

/// Browser session management over the automation collaborator
pub mod browser;

/// Render pipeline: navigation, readiness wait, capture, size reduction
pub mod render;

/// Main screenshot service orchestrating the cache-then-render flow
pub mod screenshot_service;

/// HTTP server surface and response assembly
pub mod server;

/// Command-line interface
pub mod cli;

/// Performance metrics collection and monitoring
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use browser::*;
pub use cache::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use render::*;
pub use screenshot_service::*;
pub use server::*;
pub use utils::*;
