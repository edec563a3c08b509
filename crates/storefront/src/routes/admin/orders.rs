//! Admin order management.

use std::collections::HashMap;
use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use modernstore_core::{OrderId, OrderStatus, Price, UserId};

use super::AdminSection;
use crate::backend::Order;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAdmin};
use crate::routes::{backend_failure, flash_redirect, local_path};
use crate::session_state::{AuthToken, Notice};
use crate::state::AppState;

/// An order with its customer resolved for display.
#[derive(Debug, Clone)]
pub struct AdminOrderRow {
    pub order: Order,
    pub customer: String,
}

/// Resolve customer names with one batch call over the unique user ids.
///
/// Failure falls back to raw ids.
async fn customer_names(
    state: &AppState,
    token: &AuthToken,
    orders: &[Order],
) -> HashMap<UserId, String> {
    let mut ids: Vec<UserId> = orders.iter().filter_map(|o| o.user_id.clone()).collect();
    ids.sort();
    ids.dedup();

    if ids.is_empty() {
        return HashMap::new();
    }

    match state.backend().users_by_id(token, &ids).await {
        Ok(users) => users
            .into_iter()
            .map(|user| {
                let name = user.display_name().to_string();
                (user.id, name)
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "User batch lookup failed, showing raw ids");
            HashMap::new()
        }
    }
}

/// Attach customer names, falling back to the raw user id or `Guest`.
#[must_use]
pub fn to_rows(orders: Vec<Order>, names: &HashMap<UserId, String>) -> Vec<AdminOrderRow> {
    orders
        .into_iter()
        .map(|order| {
            let customer = order.user_id.as_ref().map_or_else(
                || "Guest".to_string(),
                |id| names.get(id).cloned().unwrap_or_else(|| id.to_string()),
            );
            AdminOrderRow { order, customer }
        })
        .collect()
}

/// Search by order id or customer (case-insensitive), filter by status
/// wire name. Blank values and `all` match everything.
#[must_use]
pub fn filter_rows(rows: Vec<AdminOrderRow>, search: &str, status: &str) -> Vec<AdminOrderRow> {
    let needle = search.trim().to_lowercase();
    let status = status.trim();
    let any_status = status.is_empty() || status.eq_ignore_ascii_case("all");

    rows.into_iter()
        .filter(|row| {
            needle.is_empty()
                || row.order.id.as_str().to_lowercase().contains(&needle)
                || row.customer.to_lowercase().contains(&needle)
        })
        .filter(|row| any_status || row.order.status.as_str() == status)
        .collect()
}

/// Query parameters for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub q: Option<String>,
    pub status: Option<String>,
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    pub return_to: Option<String>,
}

/// Shipping fee form.
#[derive(Debug, Deserialize)]
pub struct ShippingFeeForm {
    pub shipping_fee: String,
    pub return_to: Option<String>,
}

/// Admin order list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders.html")]
pub struct AdminOrdersTemplate {
    pub page: PageContext,
    pub section: AdminSection,
    pub sections: [AdminSection; 2],
    pub rows: Vec<AdminOrderRow>,
    pub total_count: usize,
    pub search: String,
    pub status: String,
    pub statuses: [OrderStatus; 6],
}

/// Admin order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/order_show.html")]
pub struct AdminOrderShowTemplate {
    pub page: PageContext,
    pub section: AdminSection,
    pub sections: [AdminSection; 2],
    pub row: AdminOrderRow,
    pub statuses: [OrderStatus; 6],
}

/// List all orders.
#[instrument(skip(state, admin, page))]
pub async fn index(
    State(state): State<AppState>,
    admin: RequireAdmin,
    page: PageContext,
    Query(query): Query<OrderListQuery>,
) -> Result<AdminOrdersTemplate, AppError> {
    let orders = state.backend().admin_list_orders(&admin.token).await?;
    let total_count = orders.len();
    let names = customer_names(&state, &admin.token, &orders).await;

    let search = query.q.unwrap_or_default();
    let status = query.status.unwrap_or_default();
    let rows = filter_rows(to_rows(orders, &names), &search, &status);

    Ok(AdminOrdersTemplate {
        page,
        section: AdminSection::Orders,
        sections: AdminSection::ALL,
        rows,
        total_count,
        search,
        status,
        statuses: OrderStatus::ALL,
    })
}

/// Show one order with the status and shipping fee forms.
///
/// The backend has no admin single-order read, so the order is picked from
/// the admin list.
#[instrument(skip(state, admin, session, nonce), fields(order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    admin: RequireAdmin,
    session: Session,
    nonce: CspNonce,
    Path(id): Path<OrderId>,
) -> Result<AdminOrderShowTemplate, AppError> {
    let orders = state.backend().admin_list_orders(&admin.token).await?;
    let order = orders
        .into_iter()
        .find(|order| order.id == id)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    let names = customer_names(&state, &admin.token, std::slice::from_ref(&order)).await;
    let Some(row) = to_rows(vec![order], &names).pop() else {
        return Err(AppError::Internal("order row missing".to_string()));
    };

    Ok(AdminOrderShowTemplate {
        page: PageContext::load(&session, nonce).await,
        section: AdminSection::Orders,
        sections: AdminSection::ALL,
        row,
        statuses: OrderStatus::ALL,
    })
}

fn back_to(return_to: Option<&str>, id: &OrderId) -> String {
    local_path(return_to).map_or_else(|| format!("/admin/orders/{id}"), String::from)
}

/// Move an order to another status.
#[instrument(skip(state, admin, session), fields(order_id = %id))]
pub async fn update_status(
    State(state): State<AppState>,
    admin: RequireAdmin,
    session: Session,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Response {
    let back = back_to(form.return_to.as_deref(), &id);

    let Ok(status) = OrderStatus::from_str(form.status.trim()) else {
        return flash_redirect(&session, Notice::error("Unknown order status."), &back).await;
    };

    match state
        .backend()
        .admin_update_order_status(&admin.token, &id, &status)
        .await
    {
        Ok(()) => {
            tracing::info!(admin = %admin.user.id, status = %status, "Order status updated");
            let notice = Notice::success(format!(
                "Order {id} is now \"{}\".",
                status.admin_label()
            ));
            flash_redirect(&session, notice, &back).await
        }
        Err(e) => backend_failure(&session, e, &back).await,
    }
}

/// Set the shipping fee of an order.
#[instrument(skip(state, admin, session), fields(order_id = %id))]
pub async fn update_shipping_fee(
    State(state): State<AppState>,
    admin: RequireAdmin,
    session: Session,
    Path(id): Path<OrderId>,
    Form(form): Form<ShippingFeeForm>,
) -> Response {
    let back = back_to(form.return_to.as_deref(), &id);

    let fee = match Price::parse_input(&form.shipping_fee) {
        Ok(fee) => fee,
        Err(e) => {
            return flash_redirect(
                &session,
                Notice::error(format!("Invalid shipping fee: {e}.")),
                &back,
            )
            .await;
        }
    };

    match state
        .backend()
        .admin_update_shipping_fee(&admin.token, &id, fee)
        .await
    {
        Ok(()) => {
            flash_redirect(
                &session,
                Notice::success(format!("Shipping fee for order {id} set to {}.", fee.display())),
                &back,
            )
            .await
        }
        Err(e) => backend_failure(&session, e, &back).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn orders() -> Vec<Order> {
        serde_json::from_value(serde_json::json!([
            {"id": "A-1", "userId": "u1", "status": "PROCESSING", "total": 5, "items": []},
            {"id": "B-2", "userId": "u2", "status": "PAID", "total": 7, "items": "not json"},
            {"id": "C-3", "status": "PAID", "total": 9},
        ]))
        .unwrap()
    }

    fn names() -> HashMap<UserId, String> {
        HashMap::from([(UserId::new("u1"), "Grace Hopper".to_string())])
    }

    #[test]
    fn test_rows_fall_back_to_raw_ids() {
        let rows = to_rows(orders(), &names());
        let customers: Vec<_> = rows.iter().map(|r| r.customer.as_str()).collect();
        assert_eq!(customers, ["Grace Hopper", "u2", "Guest"]);
        assert!(rows[1].order.items.is_empty());
    }

    #[test]
    fn test_search_matches_id_or_customer() {
        let rows = to_rows(orders(), &names());
        let found = filter_rows(rows.clone(), "grace", "");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].order.id.as_str(), "A-1");

        let found = filter_rows(rows, "b-", "all");
        assert_eq!(found[0].order.id.as_str(), "B-2");
    }

    #[test]
    fn test_status_filter_uses_wire_names() {
        let rows = to_rows(orders(), &names());
        assert_eq!(filter_rows(rows.clone(), "", "PAID").len(), 2);
        assert!(filter_rows(rows, "", "Paid").is_empty());
    }

    #[test]
    fn test_back_to_only_local() {
        let id = OrderId::new("A-1");
        assert_eq!(back_to(Some("/admin/orders?status=PAID"), &id), "/admin/orders?status=PAID");
        assert_eq!(back_to(Some("https://evil.example"), &id), "/admin/orders/A-1");
        assert_eq!(back_to(None, &id), "/admin/orders/A-1");
    }
}
