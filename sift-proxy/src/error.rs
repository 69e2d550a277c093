//! Error types for the proxy control-plane client

use thiserror::Error;

/// Result type alias for control-plane operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors that can occur when talking to the proxy admin API
#[derive(Debug, Error)]
pub enum ProxyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Admin API returned an error status code
    #[error("Admin API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error body returned by the proxy
        message: String,
    },

    /// Failed to parse a server document
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ProxyError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(ProxyError::api_error(404, "unknown key").is_not_found());
        assert!(!ProxyError::api_error(500, "boom").is_not_found());
        assert!(!ProxyError::ParseError("bad".into()).is_not_found());
    }
}
