//! Cart route handlers.
//!
//! The cart lives on the backend. Every successful mutation here is mirrored
//! into the session so the header badge renders without a cart request.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use futures::future::join_all;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use modernstore_core::{CartTotals, Price, ProductId};

use crate::backend::{AddCartItem, BackendError, CartItem};
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAuth};
use crate::routes::{backend_failure, expire_login, flash_redirect};
use crate::session_state::{self, AuthToken, CartMirror, Notice};
use crate::state::AppState;

const CART_PATH: &str = "/cart";

/// A cart line with the live stock it was checked against.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub item: CartItem,
    pub stock: u32,
}

impl CartLineView {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.item.price.line_total(self.item.quantity)
    }

    /// Whether the visitor wants more than the shop has.
    #[must_use]
    pub const fn exceeds_stock(&self) -> bool {
        self.item.quantity > self.stock
    }
}

/// Split lines into purchasable and out-of-stock, keeping cart order.
#[must_use]
pub fn partition_by_stock(lines: Vec<CartLineView>) -> (Vec<CartLineView>, Vec<CartLineView>) {
    lines.into_iter().partition(|line| line.stock > 0)
}

/// Look up live stock for every line concurrently.
///
/// A failed lookup counts as out of stock.
async fn with_live_stock(state: &AppState, items: Vec<CartItem>) -> Vec<CartLineView> {
    let backend = state.backend();
    let lookups = items
        .iter()
        .map(|item| backend.get_product_fresh(&item.product_id));
    let stocks = join_all(lookups).await;

    items
        .into_iter()
        .zip(stocks)
        .map(|(item, stock)| {
            let stock = stock.map_or_else(
                |e| {
                    tracing::warn!(error = %e, product_id = %item.product_id, "Stock lookup failed");
                    0
                },
                |product| product.stock,
            );
            CartLineView { item, stock }
        })
        .collect()
}

/// Re-fetch the server cart into the session mirror.
async fn refresh_mirror(state: &AppState, session: &Session, token: &AuthToken) {
    match state.backend().get_cart(token).await {
        Ok(cart) => {
            if let Err(e) =
                session_state::update_cart_mirror(session, |m| m.replace(cart.items)).await
            {
                tracing::warn!(error = %e, "Failed to store cart mirror");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to refresh cart mirror"),
    }
}

async fn mirror_change<F>(session: &Session, change: F)
where
    F: FnOnce(&mut CartMirror),
{
    if let Err(e) = session_state::update_cart_mirror(session, change).await {
        tracing::warn!(error = %e, "Failed to store cart mirror");
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
    /// Present when the "Buy now" button was used.
    pub buy_now: Option<String>,
}

/// Update cart form data. Signed so that zero and negative values can be
/// treated as a removal.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub in_stock: Vec<CartLineView>,
    pub out_of_stock: Vec<CartLineView>,
    pub totals: CartTotals,
    pub free_threshold: Price,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: usize,
}

/// Display cart page.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
    nonce: CspNonce,
) -> Response {
    let cart = match state.backend().get_cart(&token).await {
        Ok(cart) => cart,
        Err(BackendError::Unauthorized) => return expire_login(&session).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch cart");
            let mut page = PageContext::load(&session, nonce).await;
            page.notice = Some(Notice::error(e.user_message()));
            return CartShowTemplate {
                page,
                in_stock: Vec::new(),
                out_of_stock: Vec::new(),
                totals: CartTotals::estimate(Vec::<CartItem>::new(), &state.config().catalog.shipping),
                free_threshold: state.config().catalog.shipping.free_threshold,
            }
            .into_response();
        }
    };

    let policy = state.config().catalog.shipping;
    let totals = CartTotals::estimate(&cart.items, &policy);

    mirror_change(&session, |m| m.replace(cart.items.clone())).await;

    let lines = with_live_stock(&state, cart.items).await;
    let (in_stock, out_of_stock) = partition_by_stock(lines);

    CartShowTemplate {
        page: PageContext::load(&session, nonce).await,
        in_stock,
        out_of_stock,
        totals,
        free_threshold: policy.free_threshold,
    }
    .into_response()
}

/// Add a product to the cart.
///
/// Validates the quantity against live stock, copies name, price and image
/// from the product, then re-fetches the cart into the mirror.
#[instrument(skip(state, token, session), fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let product_path = format!("/products/{}", form.product_id);

    let product = match state.backend().get_product_fresh(&form.product_id).await {
        Ok(product) => product,
        Err(e) => return backend_failure(&session, e, &product_path).await,
    };

    let quantity = form.quantity.unwrap_or(1);
    if product.stock == 0 {
        return flash_redirect(
            &session,
            Notice::error("This product is out of stock."),
            &product_path,
        )
        .await;
    }
    if quantity < 1 {
        return flash_redirect(
            &session,
            Notice::error("Please choose a quantity of at least 1."),
            &product_path,
        )
        .await;
    }
    if quantity > product.stock {
        return flash_redirect(
            &session,
            Notice::error(format!("Only {} items available.", product.stock)),
            &product_path,
        )
        .await;
    }

    let line = AddCartItem::from_product(&product, quantity);
    if let Err(e) = state.backend().add_cart_item(&token, &line).await {
        return backend_failure(&session, e, &product_path).await;
    }

    refresh_mirror(&state, &session, &token).await;
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", product.id.as_str())]),
    );

    let notice = Notice::success(format!(
        "{quantity} x {} has been added to your cart.",
        product.name
    ));
    let target = if form.buy_now.is_some() {
        "/checkout"
    } else {
        product_path.as_str()
    };
    flash_redirect(&session, notice, target).await
}

/// Change the quantity of a cart line.
#[instrument(skip(state, token, session), fields(product_id = %form.product_id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let Ok(quantity) = u32::try_from(form.quantity) else {
        return remove_line(&state, &token, &session, &form.product_id).await;
    };
    if quantity == 0 {
        return remove_line(&state, &token, &session, &form.product_id).await;
    }

    let stock = match state.backend().get_product_fresh(&form.product_id).await {
        Ok(product) => product.stock,
        Err(e) => return backend_failure(&session, e, CART_PATH).await,
    };
    if quantity > stock {
        return flash_redirect(
            &session,
            Notice::error(format!("Only {stock} items available.")),
            CART_PATH,
        )
        .await;
    }

    match state
        .backend()
        .update_cart_item(&token, &form.product_id, quantity)
        .await
    {
        Ok(()) => {
            mirror_change(&session, |m| m.set_quantity(&form.product_id, quantity)).await;
            flash_redirect(
                &session,
                Notice::success("Item quantity has been updated."),
                CART_PATH,
            )
            .await
        }
        Err(e) => backend_failure(&session, e, CART_PATH).await,
    }
}

/// Remove a line from the cart.
#[instrument(skip(state, token, session), fields(product_id = %form.product_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    remove_line(&state, &token, &session, &form.product_id).await
}

async fn remove_line(
    state: &AppState,
    token: &AuthToken,
    session: &Session,
    product_id: &ProductId,
) -> Response {
    match state.backend().remove_cart_item(token, product_id).await {
        Ok(()) => {
            mirror_change(session, |m| m.remove(product_id)).await;
            flash_redirect(
                session,
                Notice::success("The item has been removed from your cart."),
                CART_PATH,
            )
            .await
        }
        Err(e) => backend_failure(session, e, CART_PATH).await,
    }
}

/// Cart badge fragment, rendered from the session mirror.
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: session_state::cart_mirror(&session).await.badge_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, quantity: u32, stock: u32) -> CartLineView {
        CartLineView {
            item: CartItem {
                product_id: ProductId::new(id),
                name: format!("Item {id}"),
                price: Price::from_dollars(15),
                quantity,
                image: None,
                image_url: None,
            },
            stock,
        }
    }

    #[test]
    fn test_partition_keeps_order() {
        let (in_stock, out) =
            partition_by_stock(vec![line("1", 1, 3), line("2", 1, 0), line("3", 2, 1)]);
        let ids: Vec<_> = in_stock.iter().map(|l| l.item.product_id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].item.product_id.as_str(), "2");
    }

    #[test]
    fn test_exceeds_stock_warning() {
        assert!(line("3", 2, 1).exceeds_stock());
        assert!(!line("1", 3, 3).exceeds_stock());
        assert_eq!(line("1", 3, 3).line_total(), Price::from_dollars(45));
    }
}
