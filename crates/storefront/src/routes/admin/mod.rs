//! Admin console route handlers.
//!
//! Every handler takes [`RequireAdmin`], which re-checks the role against
//! `/api/users/me` on each request. Order state transitions and product
//! data are owned by the backend; concurrent edits are last-write-wins.

pub mod orders;
pub mod products;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Sidebar entries of the admin portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminSection {
    Orders,
    Products,
}

impl AdminSection {
    pub const ALL: [Self; 2] = [Self::Orders, Self::Products];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Orders => "Orders",
            Self::Products => "Products",
        }
    }

    #[must_use]
    pub const fn href(self) -> &'static str {
        match self {
            Self::Orders => "/admin/orders",
            Self::Products => "/admin/products",
        }
    }
}

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/orders/{id}/shipping-fee", post(orders::update_shipping_fee))
        .route("/products", get(products::index).post(products::create))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit))
        .route("/products/{id}/delete", post(products::delete))
}

/// Portal entry: orders is the landing section.
pub async fn index(_admin: RequireAdmin) -> Redirect {
    Redirect::to(AdminSection::Orders.href())
}
