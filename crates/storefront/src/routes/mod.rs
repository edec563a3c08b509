//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page (hero + first product page)
//!
//! # Catalog
//! GET  /products?page=N           - Product grid (HTMX fragment for infinite scroll)
//! GET  /products/{id}             - Product detail
//!
//! # Cart (requires sign-in)
//! GET  /cart                      - Cart page with live stock
//! POST /cart/add                  - Add to cart (or buy now)
//! POST /cart/update               - Change quantity
//! POST /cart/remove               - Remove line
//! GET  /cart/count                - Cart badge (fragment)
//!
//! # Checkout (requires sign-in)
//! GET  /checkout                  - Step 1: shipping form
//! POST /checkout/shipping         - Validate shipping, continue to payment
//! GET  /checkout/payment          - Step 2: review and Solana Pay notice
//! POST /checkout/place            - Place the order
//!
//! # Orders and profile (requires sign-in)
//! GET  /orders/{id}               - Order detail
//! POST /orders/{id}/cancel        - Cancel own order
//! GET  /profile                   - Profile tabs (profile, orders, addresses, settings)
//!
//! # Auth
//! GET  /auth/login                - Redirect to Discord OAuth on the backend
//! GET  /auth/discord/callback     - Store the issued token
//! GET  /login-error               - Login failure page
//! POST /auth/logout               - Sign out
//!
//! # Admin (live ADMIN role check)
//! GET  /admin                     - Redirect to orders
//! GET  /admin/orders              - All orders, search and status filter
//! GET  /admin/orders/{id}         - Order detail with status and fee forms
//! POST /admin/orders/{id}/status
//! POST /admin/orders/{id}/shipping-fee
//! GET  /admin/products            - Product table, stats, create form
//! POST /admin/products            - Create product
//! GET  /admin/products/{id}/edit  - Edit form
//! POST /admin/products/{id}       - Update product
//! POST /admin/products/{id}/delete
//!
//! # Operational
//! GET  /health                    - Liveness
//! GET  /health/ready              - Backend reachability
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod home;
pub mod orders;
pub mod products;
pub mod profile;

use axum::{
    Router,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_sessions::Session;

use crate::backend::BackendError;
use crate::error::AppError;
use crate::middleware::{LOGIN_PATH, auth_rate_limiter, cart_rate_limiter};
use crate::session_state::{self, Notice};
use crate::state::AppState;

// =============================================================================
// Shared handler helpers
// =============================================================================

/// Whether the request was issued by HTMX.
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Accept a redirect target only if it stays on this site.
pub fn local_path(candidate: Option<&str>) -> Option<&str> {
    candidate
        .map(str::trim)
        .filter(|p| p.starts_with('/') && !p.starts_with("//") && !p.contains('\\'))
}

/// Per-field validation messages for re-rendered forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<(&'static str, String)>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Flash a notice and redirect.
pub async fn flash_redirect(session: &Session, notice: Notice, to: &str) -> Response {
    session_state::flash(session, notice).await;
    Redirect::to(to).into_response()
}

/// Turn a failed customer call into a response.
///
/// A rejected token is forgotten and the visitor sent to log in again;
/// anything else becomes an error notice on `back_to`.
pub async fn backend_failure(session: &Session, err: BackendError, back_to: &str) -> Response {
    if matches!(err, BackendError::Unauthorized) {
        return expire_login(session).await;
    }
    tracing::warn!(error = %err, "Backend call failed");
    flash_redirect(session, Notice::error(err.user_message()), back_to).await
}

/// Forget a login the backend no longer accepts and restart the login flow.
pub async fn expire_login(session: &Session) -> Response {
    if let Err(e) = session_state::forget_login(session).await {
        tracing::warn!(error = %e, "Failed to clear expired login");
    }
    Redirect::to(LOGIN_PATH).into_response()
}

/// Like [`backend_failure`] for pages that cannot fall back to a notice.
pub async fn page_failure(session: &Session, err: BackendError) -> Response {
    if matches!(err, BackendError::Unauthorized) {
        return expire_login(session).await;
    }
    AppError::Backend(err).into_response()
}

// =============================================================================
// Routers
// =============================================================================

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
///
/// Mutations are rate limited; every one of them costs several backend calls.
pub fn cart_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .layer(cart_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/shipping", post(checkout::save_shipping))
        .route("/place", post(checkout::place))
        .layer(cart_rate_limiter());

    Router::new()
        .route("/", get(checkout::shipping))
        .route("/payment", get(checkout::payment))
        .merge(mutations)
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/discord/callback", get(auth::discord_callback))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create all page routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .route("/profile", get(profile::show))
        .nest("/auth", auth_routes())
        .route("/login-error", get(auth::login_error))
        .nest("/admin", admin::routes())
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}
