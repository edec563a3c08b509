//! Commerce backend REST API client.
//!
//! # Architecture
//!
//! - The backend owns inventory, pricing, order state and payment settlement.
//!   The storefront keeps no database and never retries a failed call.
//! - Every customer call takes the visitor's bearer token explicitly.
//! - Product pages and product details are cached in memory via `moka`;
//!   admin product mutations invalidate the whole catalog cache.
//!
//! # Example
//!
//! ```rust,ignore
//! use modernstore_storefront::backend::BackendClient;
//!
//! let client = BackendClient::new(&config.backend)?;
//!
//! let page = client.list_products(1, 12).await?;
//! let cart = client.get_cart(&token).await?;
//! ```

mod cache;
mod client;
pub mod types;

pub use client::BackendClient;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bearer token missing, expired or revoked.
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed.
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("Not found")]
    NotFound,

    /// Request refused with a 4xx status.
    #[error("Rejected with status {status}: {}", message.as_deref().unwrap_or("(no message)"))]
    Rejected {
        status: u16,
        message: Option<String>,
    },

    /// Backend failed with a 5xx status.
    #[error("Backend server error (status {status})")]
    Server { status: u16 },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl BackendError {
    /// Message suitable for showing to the visitor.
    ///
    /// Uses the backend's own `message` when it sent one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::Unauthorized => "Please sign in again.".to_string(),
            Self::Forbidden => "You do not have permission to do that.".to_string(),
            Self::NotFound => "The requested item could not be found.".to_string(),
            Self::RateLimited(_) => "Too many requests. Please wait a moment and try again.".to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Whether the failure originates on the backend or the network
    /// rather than in the visitor's request.
    #[must_use]
    pub const fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Server { .. } | Self::Parse(_) | Self::InvalidUrl(_)
        )
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": "..."}` and `{"error": "..."}`.
fn error_message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Rejected {
            status: 400,
            message: Some("Out of stock".to_string()),
        };
        assert_eq!(err.to_string(), "Rejected with status 400: Out of stock");
        assert_eq!(
            BackendError::Server { status: 503 }.to_string(),
            "Backend server error (status 503)"
        );
    }

    #[test]
    fn test_user_message_prefers_backend_message() {
        let err = BackendError::Rejected {
            status: 400,
            message: Some("Only 2 items available".to_string()),
        };
        assert_eq!(err.user_message(), "Only 2 items available");

        let err = BackendError::Rejected {
            status: 400,
            message: None,
        };
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert_eq!(
            BackendError::Server { status: 500 }.user_message(),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn test_error_message_from_body() {
        assert_eq!(
            error_message_from_body(r#"{"message":"Insufficient stock"}"#).as_deref(),
            Some("Insufficient stock")
        );
        assert_eq!(
            error_message_from_body(r#"{"error":"Invalid token"}"#).as_deref(),
            Some("Invalid token")
        );
        assert_eq!(error_message_from_body(r#"{"message":"  "}"#), None);
        assert_eq!(error_message_from_body("<html>Bad Gateway</html>"), None);
    }

    #[test]
    fn test_upstream_failures() {
        assert!(BackendError::Server { status: 502 }.is_upstream_failure());
        assert!(!BackendError::NotFound.is_upstream_failure());
        assert!(!BackendError::Unauthorized.is_upstream_failure());
    }
}
