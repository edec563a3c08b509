//! Shared header data for full-page templates.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use super::csp::CspNonce;
use crate::session_state::{self, Notice, SessionUser};

/// Everything the base layout needs: nonce, navigation user, cart badge and
/// the pending notice.
///
/// Extracting a `PageContext` consumes the pending notice. Handlers that may
/// still redirect should call [`PageContext::load`] once they know they
/// will render.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub nonce: String,
    pub user: Option<SessionUser>,
    pub cart_count: usize,
    pub notice: Option<Notice>,
}

impl PageContext {
    pub async fn load(session: &Session, nonce: CspNonce) -> Self {
        Self {
            nonce: nonce.0,
            user: session_state::session_user(session).await,
            cart_count: session_state::cart_mirror(session).await.badge_count(),
            notice: session_state::take_notice(session).await,
        }
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Whether to show the Admin link. The admin routes re-check the role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(SessionUser::is_admin)
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        self.user
            .as_ref()
            .map_or("Account", |user| user.display_name.as_str())
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let nonce = CspNonce::from_request_parts(parts, state).await?;
        match parts.extensions.get::<Session>().cloned() {
            Some(session) => Ok(Self::load(&session, nonce).await),
            None => Ok(Self {
                nonce: nonce.0,
                ..Self::default()
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use modernstore_core::{UserId, UserRole};
    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_load_takes_notice_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session_state::flash(&session, Notice::success("Item quantity has been updated.")).await;

        let first = PageContext::load(&session, CspNonce("n".to_string())).await;
        assert!(first.notice.is_some());
        assert!(!first.is_signed_in());

        let second = PageContext::load(&session, CspNonce("n".to_string())).await;
        assert!(second.notice.is_none());
    }

    #[test]
    fn test_admin_link_follows_cached_role() {
        let mut page = PageContext::default();
        assert!(!page.is_admin());
        assert_eq!(page.user_name(), "Account");

        page.user = Some(SessionUser {
            id: UserId::new("1"),
            role: UserRole::Admin,
            display_name: "Root".to_string(),
        });
        assert!(page.is_admin());
        assert_eq!(page.user_name(), "Root");
    }
}
