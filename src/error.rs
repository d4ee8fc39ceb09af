use thiserror::Error;

/// Error taxonomy for the screenshot pipeline.
///
/// Every failure carries a typed kind so response shaping and log fields
/// never have to match on message substrings.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("missing `url` query parameter")]
    MissingParameter,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("browser binding unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Failed to navigate to URL: {0}")]
    NavigationFailed(String),

    #[error("content not ready: {0}")]
    ContentNotReady(String),

    #[error("cache access failed: {0}")]
    CacheAccessFailed(String),

    #[error("page operation failed: {0}")]
    PageError(String),

    #[error("screenshot capture failed: {0}")]
    CaptureFailed(String),

    #[error("browser worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable tag used as a structured log field and in metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::MissingParameter => "missing_parameter",
            ServiceError::InvalidUrl(_) => "invalid_url",
            ServiceError::BrowserUnavailable(_) => "browser_unavailable",
            ServiceError::NavigationFailed(_) => "navigation_failed",
            ServiceError::ContentNotReady(_) => "content_not_ready",
            ServiceError::CacheAccessFailed(_) => "cache_access_failed",
            ServiceError::PageError(_) => "page_error",
            ServiceError::CaptureFailed(_) => "capture_failed",
            ServiceError::WorkerCrashed(_) => "worker_crashed",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// Client errors map to 400; everything else is a server-side 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::MissingParameter | ServiceError::InvalidUrl(_)
        )
    }

    /// Failures that never abort a request: the cache is an optimization
    /// and the readiness heuristic is best-effort.
    pub fn is_non_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::ContentNotReady(_) | ServiceError::CacheAccessFailed(_)
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ServiceError::MissingParameter | ServiceError::InvalidUrl(_) => ErrorSeverity::Low,
            ServiceError::ContentNotReady(_) | ServiceError::CacheAccessFailed(_) => {
                ErrorSeverity::Low
            }
            ServiceError::BrowserUnavailable(_) => ErrorSeverity::High,
            ServiceError::WorkerCrashed(_) => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}
