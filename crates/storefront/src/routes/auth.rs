//! Authentication route handlers.
//!
//! Login is delegated to the backend's Discord OAuth flow. The backend
//! redirects back to `/auth/discord/callback?token=...`; the token is kept in
//! the server-side session and never reaches the page again.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::PageContext;
use crate::session_state::{self, AuthToken, Notice, SessionUser};
use crate::state::AppState;

const LOGIN_ERROR_PATH: &str = "/login-error";

/// Login error page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login_error.html")]
pub struct LoginErrorTemplate {
    pub page: PageContext,
}

/// Query parameters on the OAuth callback.
#[derive(Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

/// Redirect to the backend's Discord OAuth entry point.
#[instrument(skip(state))]
pub async fn login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let url = state.backend().discord_login_url()?;
    Ok(Redirect::to(url.as_str()))
}

/// Handle the OAuth callback.
///
/// Stores the token (cycling the session id) and caches the user for the
/// navigation bar. A failed profile fetch does not fail the login.
#[instrument(skip_all)]
pub async fn discord_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(token) = query.token.as_deref().and_then(AuthToken::new) else {
        tracing::warn!("Discord callback without a token");
        return Redirect::to(LOGIN_ERROR_PATH).into_response();
    };

    let user = match state.backend().current_user(&token).await {
        Ok(user) => {
            set_sentry_user(&user.id, user.discord_username.as_deref());
            Some(SessionUser::from(&user))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not fetch user after login");
            None
        }
    };

    if let Err(e) = session_state::sign_in(&session, &token, user.as_ref()).await {
        tracing::error!(error = %e, "Failed to store login in session");
        return Redirect::to(LOGIN_ERROR_PATH).into_response();
    }

    tracing::info!(user_id = ?user.as_ref().map(|u| u.id.as_str()), "User signed in");
    let greeting = user.as_ref().map_or_else(
        || "You are signed in.".to_string(),
        |u| format!("Welcome back, {}!", u.display_name),
    );
    session_state::flash(&session, Notice::success(greeting)).await;

    Redirect::to("/").into_response()
}

/// Static login failure page with a retry link.
pub async fn login_error(page: PageContext) -> LoginErrorTemplate {
    LoginErrorTemplate { page }
}

/// Sign out: drop the whole session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = session_state::sign_out(&session).await {
        tracing::error!(error = %e, "Failed to flush session on logout");
    }
    clear_sentry_user();
    Redirect::to("/")
}
