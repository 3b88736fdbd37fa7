use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Rate limited - write quota exhausted: {0}")]
    RateLimited(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - access token may be expired")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Marker the Sheets API puts in quota failures that come back as 403
const QUOTA_MARKER: &str = "Quota exceeded";

impl StoreError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    /// Classify a failed HTTP response. This is the only place a raw
    /// status or body is inspected for the rate-limit signal.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            429 => StoreError::RateLimited(truncated),
            403 if body.contains(QUOTA_MARKER) => StoreError::RateLimited(truncated),
            401 => StoreError::Unauthorized,
            403 => StoreError::AccessDenied(truncated),
            404 => StoreError::NotFound(truncated),
            500..=599 => StoreError::ServerError(truncated),
            _ => StoreError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Whether a retry with backoff can be expected to succeed.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, StoreError::RateLimited(_))
    }
}
