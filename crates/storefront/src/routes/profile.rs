//! Profile page with orders, addresses and settings tabs.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use modernstore_core::OrderStatus;

use crate::backend::{Address, BackendError, Order, User};
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAuth};
use crate::routes::{expire_login, page_failure};
use crate::session_state::{self, Notice, SessionUser};
use crate::state::AppState;

/// Profile tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileTab {
    #[default]
    Profile,
    Orders,
    Addresses,
    Settings,
}

impl ProfileTab {
    pub const ALL: [Self; 4] = [Self::Profile, Self::Orders, Self::Addresses, Self::Settings];

    /// Unknown or missing values select the profile tab.
    #[must_use]
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("orders") => Self::Orders,
            Some("addresses") => Self::Addresses,
            Some("settings") => Self::Settings,
            _ => Self::Profile,
        }
    }

    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Orders => "orders",
            Self::Addresses => "addresses",
            Self::Settings => "settings",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Orders => "Orders",
            Self::Addresses => "Addresses",
            Self::Settings => "Settings",
        }
    }
}

/// Query parameters for the profile page.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub tab: Option<String>,
    pub q: Option<String>,
    pub status: Option<String>,
}

/// Keep orders whose id or any item name contains `search`
/// (case-insensitive) and whose status matches `status` exactly.
///
/// A blank search and a blank or `all` status match everything.
#[must_use]
pub fn filter_orders(orders: Vec<Order>, search: &str, status: &str) -> Vec<Order> {
    let needle = search.trim().to_lowercase();
    let status = status.trim();
    let any_status = status.is_empty() || status.eq_ignore_ascii_case("all");

    orders
        .into_iter()
        .filter(|order| {
            needle.is_empty()
                || order.id.as_str().to_lowercase().contains(&needle)
                || order
                    .items
                    .iter()
                    .any(|item| item.name.to_lowercase().contains(&needle))
        })
        .filter(|order| any_status || order.status.as_str() == status)
        .collect()
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile/show.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub user: User,
    pub tab: ProfileTab,
    pub tabs: [ProfileTab; 4],
    pub orders: Vec<Order>,
    pub addresses: Vec<Address>,
    pub search: String,
    pub status: String,
    pub statuses: [OrderStatus; 6],
}

/// Display the profile page.
///
/// A rejected token is forgotten and the visitor sent back through the
/// Discord login.
#[instrument(skip(state, token, session, nonce))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<ProfileQuery>,
) -> Response {
    let user = match state.backend().current_user(&token).await {
        Ok(user) => user,
        Err(BackendError::Unauthorized) => return expire_login(&session).await,
        Err(e) => return page_failure(&session, e).await,
    };
    if let Err(e) = session_state::store_user(&session, &SessionUser::from(&user)).await {
        tracing::warn!(error = %e, "Failed to refresh session user");
    }

    let tab = ProfileTab::from_query(query.tab.as_deref());
    let search = query.q.unwrap_or_default();
    let status = query.status.unwrap_or_default();
    let mut page = PageContext::load(&session, nonce).await;

    let mut orders = Vec::new();
    let mut addresses = Vec::new();
    match tab {
        ProfileTab::Orders => match state.backend().list_orders(&token).await {
            Ok(all) => orders = filter_orders(all, &search, &status),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load orders");
                page.notice.get_or_insert_with(|| Notice::error(e.user_message()));
            }
        },
        ProfileTab::Addresses => match state.backend().list_addresses(&token).await {
            Ok(list) => addresses = list,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load addresses");
                page.notice.get_or_insert_with(|| Notice::error(e.user_message()));
            }
        },
        ProfileTab::Profile | ProfileTab::Settings => {}
    }

    ProfileTemplate {
        page,
        user,
        tab,
        tabs: ProfileTab::ALL,
        orders,
        addresses,
        search,
        status,
        statuses: OrderStatus::ALL,
    }
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn orders() -> Vec<Order> {
        serde_json::from_value(serde_json::json!([
            {"id": "ORD-100", "status": "PAID", "total": 10,
             "items": [{"name": "Desk Lamp", "price": 10, "quantity": 1}]},
            {"id": "ORD-200", "status": "SHIPPED", "total": 20,
             "items": "[{\"name\":\"Coffee Beans\",\"price\":20,\"quantity\":1}]"},
        ]))
        .unwrap()
    }

    fn ids(orders: &[Order]) -> Vec<&str> {
        orders.iter().map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_tab_from_query() {
        assert_eq!(ProfileTab::from_query(Some("orders")), ProfileTab::Orders);
        assert_eq!(ProfileTab::from_query(Some("bogus")), ProfileTab::Profile);
        assert_eq!(ProfileTab::from_query(None), ProfileTab::Profile);
        assert_eq!(ProfileTab::Addresses.slug(), "addresses");
    }

    #[test]
    fn test_filter_by_id_or_item_name() {
        assert_eq!(ids(&filter_orders(orders(), "ord-1", "")), ["ORD-100"]);
        assert_eq!(ids(&filter_orders(orders(), "COFFEE", "all")), ["ORD-200"]);
        assert_eq!(filter_orders(orders(), "  ", "").len(), 2);
    }

    #[test]
    fn test_filter_by_status() {
        assert_eq!(ids(&filter_orders(orders(), "", "SHIPPED")), ["ORD-200"]);
        assert!(filter_orders(orders(), "lamp", "SHIPPED").is_empty());
    }
}
