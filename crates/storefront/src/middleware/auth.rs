//! Authentication extractors.
//!
//! Customer pages need a backend bearer token in the session. Admin pages
//! additionally re-check the role against `/api/users/me` on every request,
//! so a demoted account loses access immediately.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::backend::{BackendError, User};
use crate::error::AppError;
use crate::session_state::{self, AuthToken, SessionUser};
use crate::state::AppState;

/// Where anonymous visitors are sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// Extractor that requires a signed-in customer.
///
/// If the visitor has no token, returns a redirect to the login route.
///
/// # Example
///
/// ```rust,ignore
/// async fn cart(RequireAuth { token, .. }: RequireAuth, State(state): State<AppState>) {
///     let cart = state.backend().get_cart(&token).await?;
/// }
/// ```
pub struct RequireAuth {
    pub token: AuthToken,
    /// Cached profile; absent when `/api/users/me` failed at login.
    pub user: Option<SessionUser>,
}

/// Error returned when a page needs a login or an admin role.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to the Discord login.
    RedirectToLogin,
    /// Signed in, but not an admin.
    Forbidden,
    /// Session layer missing from the stack.
    MissingSession,
    /// The role check could not reach the backend.
    Backend(BackendError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Forbidden => {
                AppError::Forbidden("Admin access required".to_string()).into_response()
            }
            Self::MissingSession => {
                tracing::error!("Session not found in request extensions");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Backend(err) => AppError::Backend(err).into_response(),
        }
    }
}

fn session_from(parts: &Parts) -> Result<Session, AuthRejection> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or(AuthRejection::MissingSession)
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;

        let token = session_state::auth_token(&session)
            .await
            .ok_or(AuthRejection::RedirectToLogin)?;
        let user = session_state::session_user(&session).await;

        Ok(Self { token, user })
    }
}

/// Extractor that requires a live admin role.
///
/// Fetches `/api/users/me` with the session token on every request. A 401
/// forgets the stored login and redirects to the login route; a non-admin
/// role is rejected with 403.
pub struct RequireAdmin {
    pub token: AuthToken,
    pub user: User,
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;

        let token = session_state::auth_token(&session)
            .await
            .ok_or(AuthRejection::RedirectToLogin)?;

        let user = match state.backend().current_user(&token).await {
            Ok(user) => user,
            Err(BackendError::Unauthorized) => {
                tracing::info!("Stored token rejected during admin check");
                if let Err(e) = session_state::forget_login(&session).await {
                    tracing::warn!(error = %e, "Failed to clear rejected login");
                }
                return Err(AuthRejection::RedirectToLogin);
            }
            Err(e) => return Err(AuthRejection::Backend(e)),
        };

        // Keep the navigation bar in step with the live role
        if let Err(e) = session_state::store_user(&session, &SessionUser::from(&user)).await {
            tracing::warn!(error = %e, "Failed to refresh session user");
        }

        if !user.role.is_admin() {
            tracing::warn!(user_id = %user.id, "Non-admin user denied admin access");
            return Err(AuthRejection::Forbidden);
        }

        Ok(Self { token, user })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::Request;
    use modernstore_core::{UserId, UserRole};
    use tower_sessions::MemoryStore;

    use super::*;

    fn parts_with(session: Option<Session>) -> Parts {
        let (mut parts, ()) = Request::builder()
            .uri("/cart")
            .body(())
            .unwrap()
            .into_parts();
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        parts
    }

    #[tokio::test]
    async fn test_anonymous_visitor_is_redirected() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let mut parts = parts_with(Some(session));

        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], LOGIN_PATH);
    }

    #[tokio::test]
    async fn test_signed_in_visitor_passes() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        let token = AuthToken::new("tok").unwrap();
        let user = SessionUser {
            id: UserId::new("7"),
            role: UserRole::User,
            display_name: "Mia".to_string(),
        };
        session_state::sign_in(&session, &token, Some(&user))
            .await
            .unwrap();

        let mut parts = parts_with(Some(session));
        let auth = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(auth.token, token);
        assert_eq!(auth.user, Some(user));
    }

    #[tokio::test]
    async fn test_missing_session_layer_is_server_error() {
        let mut parts = parts_with(None);
        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
