//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use crate::filters;
use crate::middleware::PageContext;
use crate::routes::products::{ProductGrid, load_grid_or_notice};
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub grid: ProductGrid,
}

/// Display the home page: hero and the first page of products.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, mut ctx: PageContext) -> HomeTemplate {
    let grid = load_grid_or_notice(&state, 1, &mut ctx).await;
    HomeTemplate { page: ctx, grid }
}
