use crate::ServiceError;
use std::time::Duration;
use url::Url;

/// Canonicalize a raw URL string into its stable cache-key form.
///
/// Parsing and restringifying normalizes case, default ports, and percent
/// encoding, so `HTTPS://Example.com` and `https://example.com/` share one
/// cache entry. Only http(s) targets can be rendered.
pub fn normalize_url(raw: &str) -> Result<Url, ServiceError> {
    let parsed = Url::parse(raw).map_err(|e| ServiceError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ServiceError::InvalidUrl(format!(
            "unsupported scheme `{scheme}`"
        ))),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
