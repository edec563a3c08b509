//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side failures to
//! Sentry before responding. Route handlers return `Result<T, AppError>`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::filters;
use crate::middleware::LOGIN_PATH;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Signed in but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Standalone error page. Does not extend the base layout, since the header
/// needs session data that may be what failed.
#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub status: u16,
    pub title: &'static str,
    pub message: String,
}

impl AppError {
    /// Status code for the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Backend(BackendError::Unauthorized) => StatusCode::SEE_OTHER,
            Self::Backend(BackendError::Forbidden) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Backend(BackendError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the visitor. Never includes internal details.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Backend(BackendError::NotFound) | Self::NotFound(_) => {
                "The page you are looking for does not exist.".to_string()
            }
            Self::Backend(err) => err.user_message(),
            Self::Forbidden(_) => "You do not have access to this page.".to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::Session(_) | Self::Internal(_) => {
                "Something went wrong on our side. Please try again.".to_string()
            }
        }
    }

    const fn is_server_side(&self) -> bool {
        match self {
            Self::Backend(err) => err.is_upstream_failure(),
            Self::Session(_) | Self::Internal(_) => true,
            _ => false,
        }
    }
}

fn title_for(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Bad request",
        403 => "Access denied",
        404 => "Page not found",
        502 => "Store unavailable",
        _ => "Something went wrong",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // An expired token sends the visitor back through the login
        if matches!(self, Self::Backend(BackendError::Unauthorized)) {
            tracing::info!("Backend rejected token, redirecting to login");
            return Redirect::to(LOGIN_PATH).into_response();
        }

        if self.is_server_side() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::warn!(error = %self, "Request failed");
        }

        let status = self.status();
        let page = ErrorTemplate {
            status: status.as_u16(),
            title: title_for(status),
            message: self.public_message(),
        };

        (status, page).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after login.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a visitor action.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "42")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
