//! Order detail and cancellation.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use modernstore_core::{OrderId, UserId};

use crate::backend::{BackendError, Order};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAuth};
use crate::routes::{backend_failure, flash_redirect, page_failure};
use crate::session_state::{self, AuthToken, Notice, SessionUser};
use crate::state::AppState;

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub page: PageContext,
    pub order: Order,
    pub can_cancel: bool,
}

/// Id of the signed-in user, from the session cache or the backend.
async fn viewer_id(
    state: &AppState,
    session: &Session,
    token: &AuthToken,
    cached: Option<SessionUser>,
) -> Result<UserId, BackendError> {
    if let Some(user) = cached {
        return Ok(user.id);
    }
    let user = state.backend().current_user(token).await?;
    if let Err(e) = session_state::store_user(session, &SessionUser::from(&user)).await {
        tracing::warn!(error = %e, "Failed to cache session user");
    }
    Ok(user.id)
}

/// Whether `viewer` may cancel `order` from the storefront.
#[must_use]
pub fn customer_can_cancel(order: &Order, viewer: &UserId) -> bool {
    order.is_owned_by(viewer) && order.status.is_customer_cancelable()
}

async fn fetch_order(
    state: &AppState,
    session: &Session,
    token: &AuthToken,
    id: &OrderId,
) -> Result<Order, Response> {
    match state.backend().get_order(token, id).await {
        Ok(order) => Ok(order),
        Err(BackendError::NotFound) => {
            Err(AppError::NotFound(format!("order {id}")).into_response())
        }
        Err(e) => Err(page_failure(session, e).await),
    }
}

/// Display an order.
#[instrument(skip(state, token, user, session, nonce), fields(order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth { token, user }: RequireAuth,
    session: Session,
    nonce: CspNonce,
    Path(id): Path<OrderId>,
) -> Response {
    let order = match fetch_order(&state, &session, &token, &id).await {
        Ok(order) => order,
        Err(response) => return response,
    };

    let can_cancel = match viewer_id(&state, &session, &token, user).await {
        Ok(viewer) => customer_can_cancel(&order, &viewer),
        Err(e) => {
            tracing::warn!(error = %e, "Could not resolve viewer, hiding cancel");
            false
        }
    };

    OrderShowTemplate {
        page: PageContext::load(&session, nonce).await,
        order,
        can_cancel,
    }
    .into_response()
}

/// Cancel an order the visitor owns.
///
/// Ownership and status are re-checked against a fresh copy of the order;
/// the backend has the final say.
#[instrument(skip(state, token, user, session), fields(order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth { token, user }: RequireAuth,
    session: Session,
    Path(id): Path<OrderId>,
) -> Response {
    let back = format!("/orders/{id}");

    let order = match fetch_order(&state, &session, &token, &id).await {
        Ok(order) => order,
        Err(response) => return response,
    };
    let viewer = match viewer_id(&state, &session, &token, user).await {
        Ok(viewer) => viewer,
        Err(e) => return backend_failure(&session, e, &back).await,
    };

    if !order.is_owned_by(&viewer) {
        return flash_redirect(
            &session,
            Notice::error("You can only cancel your own orders."),
            &back,
        )
        .await;
    }
    if !order.status.is_customer_cancelable() {
        return flash_redirect(
            &session,
            Notice::error("This order can no longer be canceled."),
            &back,
        )
        .await;
    }

    match state.backend().cancel_order(&token, &id).await {
        Ok(()) => {
            flash_redirect(&session, Notice::success("Your order has been canceled."), &back)
                .await
        }
        Err(e) => backend_failure(&session, e, &back).await,
    }
}
