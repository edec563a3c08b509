//! Admin product management.

use std::collections::BTreeSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use modernstore_core::{Price, ProductId, StockLevel};

use super::AdminSection;
use crate::backend::{BackendError, Product, ProductInput};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAdmin};
use crate::routes::{FieldErrors, backend_failure, flash_redirect};
use crate::session_state::Notice;
use crate::state::AppState;

const PRODUCTS_PATH: &str = "/admin/products";

/// The admin table shows the whole catalog on one page.
const CATALOG_LIMIT: u32 = 1000;

// =============================================================================
// Form
// =============================================================================

/// Raw product form. Every field arrives as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductForm {
    pub name: String,
    pub category: String,
    pub price: String,
    pub stock: String,
    pub description: String,
    pub image: String,
}

impl ProductForm {
    /// Prefill the edit form.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            category: product.category.clone(),
            price: product.price.amount().round_dp(2).to_string(),
            stock: product.stock.to_string(),
            description: product.description.clone().unwrap_or_default(),
            image: product
                .image_url
                .clone()
                .or_else(|| product.images.first().cloned())
                .unwrap_or_default(),
        }
    }
}

/// Validate the product form.
///
/// Name and category are required, price is a non-negative decimal and stock
/// a non-negative integer. Blank description and image are omitted.
///
/// # Errors
///
/// Returns the form as typed with per-field messages.
pub fn validate_product(form: ProductForm) -> Result<ProductInput, (ProductForm, FieldErrors)> {
    let mut errors = FieldErrors::default();

    let name = form.name.trim();
    if name.is_empty() {
        errors.add("name", "Name is required.");
    }
    let category = form.category.trim();
    if category.is_empty() {
        errors.add("category", "Category is required.");
    }

    let price = match Price::parse_input(&form.price) {
        Ok(price) => Some(price),
        Err(e) => {
            errors.add("price", format!("Price: {e}."));
            None
        }
    };

    let stock = match form.stock.trim().parse::<u32>() {
        Ok(stock) => Some(stock),
        Err(_) => {
            errors.add("stock", "Stock must be a whole number of at least 0.");
            None
        }
    };

    let non_blank = |s: &str| Some(s.trim()).filter(|s| !s.is_empty()).map(String::from);

    match (price, stock) {
        (Some(price), Some(stock)) if errors.is_empty() => Ok(ProductInput {
            name: name.to_string(),
            category: category.to_string(),
            price,
            stock,
            description: non_blank(&form.description),
            image: non_blank(&form.image),
        }),
        _ => Err((form, errors)),
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Summary cards above the product table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStats {
    pub total: usize,
    pub inventory_value: Price,
    pub low_stock: usize,
    pub categories: usize,
}

impl ProductStats {
    /// Compute the stats over the whole catalog.
    ///
    /// Low stock counts 1 to 5 units; sold-out products are not included.
    #[must_use]
    pub fn from_products(products: &[Product]) -> Self {
        Self {
            total: products.len(),
            inventory_value: products.iter().map(|p| p.price.line_total(p.stock)).sum(),
            low_stock: products
                .iter()
                .filter(|p| StockLevel::from_stock(p.stock) == StockLevel::Low)
                .count(),
            categories: categories(products).len(),
        }
    }
}

/// Distinct non-empty categories, sorted.
#[must_use]
pub fn categories(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|p| p.category.trim())
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Search name or category (case-insensitive) and filter by exact category.
#[must_use]
pub fn filter_products(products: Vec<Product>, search: &str, category: &str) -> Vec<Product> {
    let needle = search.trim().to_lowercase();
    let category = category.trim();
    let any_category = category.is_empty() || category.eq_ignore_ascii_case("all");

    products
        .into_iter()
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.category.to_lowercase().contains(&needle)
        })
        .filter(|p| any_category || p.category.trim() == category)
        .collect()
}

/// A product table row.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub product: Product,
    pub level: StockLevel,
}

impl From<Product> for ProductRow {
    fn from(product: Product) -> Self {
        let level = StockLevel::from_stock(product.stock);
        Self { product, level }
    }
}

/// Query parameters for the product table.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Product table, stats and the create form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products.html")]
pub struct AdminProductsTemplate {
    pub page: PageContext,
    pub section: AdminSection,
    pub sections: [AdminSection; 2],
    pub stats: ProductStats,
    pub rows: Vec<ProductRow>,
    pub categories: Vec<String>,
    pub search: String,
    pub category: String,
    pub form: ProductForm,
    pub errors: FieldErrors,
}

/// Edit form for one product.
#[derive(Template, WebTemplate)]
#[template(path = "admin/product_edit.html")]
pub struct AdminProductEditTemplate {
    pub page: PageContext,
    pub section: AdminSection,
    pub sections: [AdminSection; 2],
    pub product_id: ProductId,
    pub form: ProductForm,
    pub errors: FieldErrors,
}

async fn products_page(
    state: &AppState,
    page: PageContext,
    query: ProductListQuery,
    form: ProductForm,
    errors: FieldErrors,
) -> Result<AdminProductsTemplate, AppError> {
    let catalog = state.backend().list_products(1, CATALOG_LIMIT).await?.products;
    let stats = ProductStats::from_products(&catalog);
    let categories = categories(&catalog);

    let search = query.q.unwrap_or_default();
    let category = query.category.unwrap_or_default();
    let rows = filter_products(catalog, &search, &category)
        .into_iter()
        .map(ProductRow::from)
        .collect();

    Ok(AdminProductsTemplate {
        page,
        section: AdminSection::Products,
        sections: AdminSection::ALL,
        stats,
        rows,
        categories,
        search,
        category,
        form,
        errors,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Product table with stats and the create form.
#[instrument(skip(state, _admin, page))]
pub async fn index(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    page: PageContext,
    Query(query): Query<ProductListQuery>,
) -> Result<AdminProductsTemplate, AppError> {
    products_page(&state, page, query, ProductForm::default(), FieldErrors::default()).await
}

/// Create a product. Invalid input re-renders the table with a 422.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    admin: RequireAdmin,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<ProductForm>,
) -> Response {
    let input = match validate_product(form) {
        Ok(input) => input,
        Err((form, errors)) => {
            let page = PageContext::load(&session, nonce).await;
            return match products_page(&state, page, ProductListQuery::default(), form, errors)
                .await
            {
                Ok(template) => (StatusCode::UNPROCESSABLE_ENTITY, template).into_response(),
                Err(e) => e.into_response(),
            };
        }
    };

    match state.backend().admin_create_product(&admin.token, &input).await {
        Ok(()) => {
            tracing::info!(admin = %admin.user.id, name = %input.name, "Product created");
            flash_redirect(&session, Notice::success("Product created."), PRODUCTS_PATH).await
        }
        Err(e) => backend_failure(&session, e, PRODUCTS_PATH).await,
    }
}

/// Edit form, prefilled from a fresh read.
#[instrument(skip(state, _admin, session, nonce), fields(product_id = %id))]
pub async fn edit(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    session: Session,
    nonce: CspNonce,
    Path(id): Path<ProductId>,
) -> Result<AdminProductEditTemplate, AppError> {
    let product = state
        .backend()
        .get_product_fresh(&id)
        .await
        .map_err(|e| match e {
            BackendError::NotFound => AppError::NotFound(format!("product {id}")),
            other => AppError::Backend(other),
        })?;

    Ok(AdminProductEditTemplate {
        page: PageContext::load(&session, nonce).await,
        section: AdminSection::Products,
        sections: AdminSection::ALL,
        form: ProductForm::from_product(&product),
        product_id: product.id,
        errors: FieldErrors::default(),
    })
}

/// Update a product. Invalid input re-renders the edit form with a 422.
#[instrument(skip(state, admin, session, nonce, form), fields(product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    admin: RequireAdmin,
    session: Session,
    nonce: CspNonce,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> Response {
    let input = match validate_product(form) {
        Ok(input) => input,
        Err((form, errors)) => {
            let template = AdminProductEditTemplate {
                page: PageContext::load(&session, nonce).await,
                section: AdminSection::Products,
                sections: AdminSection::ALL,
                product_id: id,
                form,
                errors,
            };
            return (StatusCode::UNPROCESSABLE_ENTITY, template).into_response();
        }
    };

    let edit_path = format!("{PRODUCTS_PATH}/{id}/edit");
    match state
        .backend()
        .admin_update_product(&admin.token, &id, &input)
        .await
    {
        Ok(()) => {
            tracing::info!(admin = %admin.user.id, "Product updated");
            flash_redirect(&session, Notice::success("Product updated."), PRODUCTS_PATH).await
        }
        Err(e) => backend_failure(&session, e, &edit_path).await,
    }
}

/// Delete a product.
#[instrument(skip(state, admin, session), fields(product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    admin: RequireAdmin,
    session: Session,
    Path(id): Path<ProductId>,
) -> Response {
    match state.backend().admin_delete_product(&admin.token, &id).await {
        Ok(()) => {
            tracing::info!(admin = %admin.user.id, "Product deleted");
            flash_redirect(&session, Notice::success("Product deleted."), PRODUCTS_PATH).await
        }
        Err(e) => backend_failure(&session, e, PRODUCTS_PATH).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Product> {
        serde_json::from_value(serde_json::json!([
            {"id": 1, "name": "Trail Shoe", "price": 120, "stock": 3, "category": "Footwear"},
            {"id": 2, "name": "Rain Shell", "price": "80.50", "stock": 10, "category": "Outerwear"},
            {"id": 3, "name": "Wool Sock", "price": 12, "stock": 0, "category": "Footwear"},
        ]))
        .unwrap()
    }

    fn form() -> ProductForm {
        ProductForm {
            name: " Trail Shoe ".to_string(),
            category: "Footwear".to_string(),
            price: "$119.99".to_string(),
            stock: "7".to_string(),
            description: "  ".to_string(),
            image: "https://cdn.example/shoe.jpg".to_string(),
        }
    }

    #[test]
    fn test_stats() {
        let stats = ProductStats::from_products(&catalog());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.inventory_value, Price::from_cents(116_500));
        assert_eq!(stats.low_stock, 1);
        assert_eq!(stats.categories, 2);
    }

    #[test]
    fn test_filter_by_search_and_category() {
        let found = filter_products(catalog(), "outer", "");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Rain Shell");

        let found = filter_products(catalog(), "", "Footwear");
        assert_eq!(found.len(), 2);

        let found = filter_products(catalog(), "sock", "Footwear");
        assert_eq!(found[0].id, ProductId::new("3"));
    }

    #[test]
    fn test_valid_form() {
        let input = validate_product(form()).unwrap();
        assert_eq!(input.name, "Trail Shoe");
        assert_eq!(input.price, Price::from_cents(11_999));
        assert_eq!(input.stock, 7);
        assert_eq!(input.description, None);
        assert_eq!(input.image.as_deref(), Some("https://cdn.example/shoe.jpg"));
    }

    #[test]
    fn test_invalid_form_keeps_input() {
        let bad = ProductForm {
            name: String::new(),
            price: "-3".to_string(),
            stock: "2.5".to_string(),
            ..form()
        };
        let (kept, errors) = validate_product(bad).unwrap_err();
        assert_eq!(kept.price, "-3");
        assert_eq!(errors.get("name"), Some("Name is required."));
        assert!(errors.get("price").is_some());
        assert!(errors.get("stock").is_some());
        assert_eq!(errors.get("category"), None);
    }

    #[test]
    fn test_negative_stock_rejected() {
        let bad = ProductForm {
            stock: "-1".to_string(),
            ..form()
        };
        assert!(validate_product(bad).is_err());
    }

    #[test]
    fn test_form_prefill() {
        let product = &catalog()[1];
        let form = ProductForm::from_product(product);
        assert_eq!(form.price, "80.50");
        assert_eq!(form.stock, "10");
        assert_eq!(form.image, "");
    }
}
