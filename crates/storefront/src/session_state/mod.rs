//! Per-visitor state kept in the server-side session.
//!
//! The session holds what a browser client would keep in local storage: the
//! bearer token from the Discord login, a cached copy of the signed-in user,
//! a mirror of the cart for the header badge, a one-shot notice and the
//! checkout draft between the two checkout steps.
//!
//! Reads are forgiving: a missing or unreadable entry is treated as absent.

mod cart_mirror;
mod notice;

pub use cart_mirror::CartMirror;
pub use notice::{Notice, NoticeLevel};

use modernstore_core::{UserId, UserRole};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::backend::{ShippingInfo, User};

/// Session keys.
pub mod keys {
    /// Bearer token issued by the backend after Discord login.
    pub const AUTH_TOKEN: &str = "auth_token";

    /// Cached `/api/users/me` result for the navigation bar.
    pub const SESSION_USER: &str = "session_user";

    /// Best-effort copy of the server cart.
    pub const CART_MIRROR: &str = "cart_mirror";

    /// One-shot flash notice.
    pub const NOTICE: &str = "notice";

    /// Shipping details between checkout steps.
    pub const CHECKOUT_DRAFT: &str = "checkout_draft";
}

type SessionResult<T> = Result<T, tower_sessions::session::Error>;

/// Backend bearer token.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a token. Blank input yields `None`.
    #[must_use]
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    /// The raw token for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

/// Signed-in user as shown in the navigation bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub role: UserRole,
    pub display_name: String,
}

impl SessionUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
            display_name: user.display_name().to_string(),
        }
    }
}

/// Shipping details validated at checkout step 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDraft {
    pub shipping: ShippingInfo,
}

// =============================================================================
// Authentication
// =============================================================================

pub async fn auth_token(session: &Session) -> Option<AuthToken> {
    session
        .get::<AuthToken>(keys::AUTH_TOKEN)
        .await
        .ok()
        .flatten()
}

pub async fn session_user(session: &Session) -> Option<SessionUser> {
    session
        .get::<SessionUser>(keys::SESSION_USER)
        .await
        .ok()
        .flatten()
}

/// Store a fresh login.
///
/// Cycles the session id first so a pre-login session id cannot be reused,
/// and drops the previous account's cart mirror and checkout draft.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn sign_in(
    session: &Session,
    token: &AuthToken,
    user: Option<&SessionUser>,
) -> SessionResult<()> {
    session.cycle_id().await?;
    forget_login(session).await?;
    session.insert(keys::AUTH_TOKEN, token).await?;
    match user {
        Some(user) => session.insert(keys::SESSION_USER, user).await,
        None => {
            session.remove::<SessionUser>(keys::SESSION_USER).await?;
            Ok(())
        }
    }
}

/// Refresh the cached user.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn store_user(session: &Session, user: &SessionUser) -> SessionResult<()> {
    session.insert(keys::SESSION_USER, user).await
}

/// Forget the token and cached user after the backend rejected the token.
///
/// The cart mirror goes too, since it belonged to that login.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn forget_login(session: &Session) -> SessionResult<()> {
    session.remove::<AuthToken>(keys::AUTH_TOKEN).await?;
    session.remove::<SessionUser>(keys::SESSION_USER).await?;
    session.remove::<CartMirror>(keys::CART_MIRROR).await?;
    session.remove::<CheckoutDraft>(keys::CHECKOUT_DRAFT).await?;
    Ok(())
}

/// Drop everything (logout).
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn sign_out(session: &Session) -> SessionResult<()> {
    session.flush().await
}

// =============================================================================
// Cart mirror
// =============================================================================

pub async fn cart_mirror(session: &Session) -> CartMirror {
    session
        .get::<CartMirror>(keys::CART_MIRROR)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Apply `change` to the cart mirror and save it.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn update_cart_mirror<F>(session: &Session, change: F) -> SessionResult<CartMirror>
where
    F: FnOnce(&mut CartMirror),
{
    let mut mirror = cart_mirror(session).await;
    change(&mut mirror);
    session.insert(keys::CART_MIRROR, &mirror).await?;
    Ok(mirror)
}

// =============================================================================
// Notices
// =============================================================================

/// Queue a notice for the next rendered page.
///
/// Failures are logged rather than returned: losing a notice never blocks
/// the action that produced it.
pub async fn flash(session: &Session, notice: Notice) {
    if let Err(e) = session.insert(keys::NOTICE, &notice).await {
        tracing::warn!(error = %e, "Failed to store notice in session");
    }
}

/// Take the pending notice, if any. It will not be shown again.
pub async fn take_notice(session: &Session) -> Option<Notice> {
    session.remove::<Notice>(keys::NOTICE).await.ok().flatten()
}

// =============================================================================
// Checkout draft
// =============================================================================

pub async fn checkout_draft(session: &Session) -> Option<CheckoutDraft> {
    session
        .get::<CheckoutDraft>(keys::CHECKOUT_DRAFT)
        .await
        .ok()
        .flatten()
}

/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn store_checkout_draft(session: &Session, draft: &CheckoutDraft) -> SessionResult<()> {
    session.insert(keys::CHECKOUT_DRAFT, draft).await
}

/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_checkout_draft(session: &Session) -> SessionResult<()> {
    session
        .remove::<CheckoutDraft>(keys::CHECKOUT_DRAFT)
        .await?;
    Ok(())
}
