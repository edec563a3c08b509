//! Product route handlers.
//!
//! The grid loads page by page: the last card carries an HTMX sentinel that
//! fetches `/products?page=N+1` when revealed and swaps itself for the next
//! batch of cards.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use modernstore_core::ProductId;

use crate::backend::{BackendError, Product};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, PageContext};
use crate::routes::is_htmx;
use crate::session_state::Notice;
use crate::state::AppState;

/// A loaded slice of the product grid.
#[derive(Debug, Clone, Default)]
pub struct ProductGrid {
    pub products: Vec<Product>,
    /// Page the sentinel should fetch next, `None` at the end of the catalog.
    pub next_page: Option<u32>,
}

/// Fetch one catalog page for the grid.
///
/// # Errors
///
/// Returns the backend error; callers decide whether to degrade.
pub async fn load_grid(state: &AppState, page: u32) -> Result<ProductGrid, BackendError> {
    let limit = state.config().catalog.page_size;
    let page = state.backend().list_products(page, limit).await?;
    Ok(ProductGrid {
        next_page: page.has_more.then(|| page.page.saturating_add(1)),
        products: page.products,
    })
}

/// Grid for a full page: empty with an error notice when the backend fails.
pub async fn load_grid_or_notice(state: &AppState, page: u32, ctx: &mut PageContext) -> ProductGrid {
    match load_grid(state, page).await {
        Ok(grid) => grid,
        Err(e) => {
            tracing::error!(error = %e, page, "Failed to load products");
            ctx.notice = Some(Notice::error(
                "We could not load products right now. Please try again shortly.",
            ));
            ProductGrid::default()
        }
    }
}

/// Query parameters for the product listing.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: PageContext,
    pub grid: ProductGrid,
}

/// Product cards fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/product_cards.html")]
pub struct ProductCardsTemplate {
    pub grid: ProductGrid,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: Product,
}

/// Display the product grid, or the next batch of cards for HTMX.
#[instrument(skip(state, headers, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Session,
    nonce: CspNonce,
    Query(query): Query<ListQuery>,
) -> Response {
    let page = query.page.unwrap_or(1).max(1);

    if is_htmx(&headers) {
        // A failed batch ends the scroll instead of breaking the page
        let grid = load_grid(&state, page).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, page, "Failed to load next product page");
            ProductGrid::default()
        });
        return ProductCardsTemplate { grid }.into_response();
    }

    let mut ctx = PageContext::load(&session, nonce).await;
    let grid = load_grid_or_notice(&state, page, &mut ctx).await;
    ProductsIndexTemplate { page: ctx, grid }.into_response()
}

/// Display product detail page.
#[instrument(skip(state, session, nonce), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    session: Session,
    nonce: CspNonce,
) -> Result<ProductShowTemplate, AppError> {
    let product = state.backend().get_product(&id).await.map_err(|e| match e {
        BackendError::NotFound => AppError::NotFound(format!("product {id}")),
        other => AppError::Backend(other),
    })?;

    let ctx = PageContext::load(&session, nonce).await;
    Ok(ProductShowTemplate { page: ctx, product })
}
