//! Checkout route handlers.
//!
//! Two steps: shipping details, then a review with the Solana Pay notice.
//! The shipping fee is set later by the merchant, so the sidebar shows it as
//! pending and the total equals the subtotal.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use modernstore_core::{CartTotals, Email};

use crate::backend::{Cart, CartItem, ShippingInfo};
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{CspNonce, PageContext, RequireAuth};
use crate::routes::{FieldErrors, backend_failure, flash_redirect, page_failure};
use crate::session_state::{self, AuthToken, CheckoutDraft, Notice};
use crate::state::AppState;

const SHIPPING_PATH: &str = "/checkout";
const PAYMENT_PATH: &str = "/checkout/payment";

// =============================================================================
// Shipping form validation
// =============================================================================

/// Raw step 1 form. Missing fields arrive as empty strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShippingForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl ShippingForm {
    fn into_info(self) -> ShippingInfo {
        ShippingInfo {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            zip_code: self.zip_code.trim().to_string(),
            country: self.country.trim().to_string(),
        }
    }
}

/// One rendered input of the shipping form.
#[derive(Debug, Clone)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub value: String,
    pub error: Option<String>,
}

/// Shipping form fields in display order: name, label, input type.
const SHIPPING_FIELDS: [(&str, &str, &str); 9] = [
    ("first_name", "First Name", "text"),
    ("last_name", "Last Name", "text"),
    ("email", "Email", "email"),
    ("phone", "Phone Number", "tel"),
    ("address", "Address", "text"),
    ("city", "City", "text"),
    ("state", "State", "text"),
    ("zip_code", "ZIP Code", "text"),
    ("country", "Country", "text"),
];

fn field_value<'a>(info: &'a ShippingInfo, name: &str) -> &'a str {
    match name {
        "first_name" => &info.first_name,
        "last_name" => &info.last_name,
        "email" => &info.email,
        "phone" => &info.phone,
        "address" => &info.address,
        "city" => &info.city,
        "state" => &info.state,
        "zip_code" => &info.zip_code,
        "country" => &info.country,
        _ => "",
    }
}

/// Build the inputs for the template.
#[must_use]
pub fn field_views(info: &ShippingInfo, errors: &FieldErrors) -> Vec<FieldView> {
    SHIPPING_FIELDS
        .iter()
        .map(|&(name, label, input_type)| FieldView {
            name,
            label,
            input_type,
            value: field_value(info, name).to_string(),
            error: errors.get(name).map(String::from),
        })
        .collect()
}

/// Validate step 1: every field is required and the email must be valid.
///
/// # Errors
///
/// Returns the trimmed input with per-field messages.
pub fn validate_shipping(form: ShippingForm) -> Result<ShippingInfo, (ShippingInfo, FieldErrors)> {
    let info = form.into_info();
    let mut errors = FieldErrors::default();

    for (name, label, _) in SHIPPING_FIELDS {
        if field_value(&info, name).is_empty() {
            errors.add(name, format!("{label} is required."));
        }
    }

    if !info.email.is_empty() {
        if let Err(e) = Email::parse(&info.email) {
            errors.add("email", format!("Enter a valid email address ({e})."));
        }
    }

    if errors.is_empty() {
        Ok(info)
    } else {
        Err((info, errors))
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Step 1: shipping details.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/shipping.html")]
pub struct ShippingTemplate {
    pub page: PageContext,
    pub fields: Vec<FieldView>,
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}

/// Step 2: review and place the order.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/payment.html")]
pub struct PaymentTemplate {
    pub page: PageContext,
    pub shipping: ShippingInfo,
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}

fn shipping_page(
    page: PageContext,
    info: &ShippingInfo,
    errors: &FieldErrors,
    items: Vec<CartItem>,
) -> ShippingTemplate {
    let totals = CartTotals::pending_shipping(&items);
    ShippingTemplate {
        page,
        fields: field_views(info, errors),
        items,
        totals,
    }
}

/// Fetch the cart, or the response to send instead.
async fn load_cart(state: &AppState, session: &Session, token: &AuthToken) -> Result<Cart, Response> {
    match state.backend().get_cart(token).await {
        Ok(cart) if cart.items.is_empty() => {
            Err(flash_redirect(session, Notice::error("Your cart is empty."), "/cart").await)
        }
        Ok(cart) => Ok(cart),
        Err(e) => Err(page_failure(session, e).await),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Step 1: shipping form, prefilled from the draft.
#[instrument(skip_all)]
pub async fn shipping(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
    nonce: CspNonce,
) -> Response {
    let cart = match load_cart(&state, &session, &token).await {
        Ok(cart) => cart,
        Err(response) => return response,
    };

    let info = session_state::checkout_draft(&session)
        .await
        .map(|draft| draft.shipping)
        .unwrap_or_default();

    let page = PageContext::load(&session, nonce).await;
    shipping_page(page, &info, &FieldErrors::default(), cart.items).into_response()
}

/// Validate step 1 and continue to payment.
#[instrument(skip_all)]
pub async fn save_shipping(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
    nonce: CspNonce,
    Form(form): Form<ShippingForm>,
) -> Response {
    match validate_shipping(form) {
        Ok(shipping) => {
            let draft = CheckoutDraft { shipping };
            if let Err(e) = session_state::store_checkout_draft(&session, &draft).await {
                tracing::error!(error = %e, "Failed to store checkout draft");
                return flash_redirect(
                    &session,
                    Notice::error("We could not save your shipping details. Please try again."),
                    SHIPPING_PATH,
                )
                .await;
            }
            Redirect::to(PAYMENT_PATH).into_response()
        }
        Err((info, errors)) => {
            // Sidebar is best effort on a validation failure
            let items = state
                .backend()
                .get_cart(&token)
                .await
                .map(|cart| cart.items)
                .unwrap_or_default();
            let page = PageContext::load(&session, nonce).await;
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                shipping_page(page, &info, &errors, items),
            )
                .into_response()
        }
    }
}

/// Step 2: review items and address.
#[instrument(skip_all)]
pub async fn payment(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
    nonce: CspNonce,
) -> Response {
    let Some(draft) = session_state::checkout_draft(&session).await else {
        return Redirect::to(SHIPPING_PATH).into_response();
    };

    let cart = match load_cart(&state, &session, &token).await {
        Ok(cart) => cart,
        Err(response) => return response,
    };

    let totals = CartTotals::pending_shipping(&cart.items);
    PaymentTemplate {
        page: PageContext::load(&session, nonce).await,
        shipping: draft.shipping,
        items: cart.items,
        totals,
    }
    .into_response()
}

/// Place the order with the stored shipping details.
#[instrument(skip_all)]
pub async fn place(
    State(state): State<AppState>,
    RequireAuth { token, .. }: RequireAuth,
    session: Session,
) -> Response {
    let Some(draft) = session_state::checkout_draft(&session).await else {
        return Redirect::to(SHIPPING_PATH).into_response();
    };

    if let Err(e) = state.backend().place_order(&token, &draft.shipping).await {
        return backend_failure(&session, e, PAYMENT_PATH).await;
    }

    add_breadcrumb("checkout", "Order placed", None);
    if let Err(e) = session_state::update_cart_mirror(&session, |m| m.clear()).await {
        tracing::warn!(error = %e, "Failed to clear cart mirror");
    }
    if let Err(e) = session_state::clear_checkout_draft(&session).await {
        tracing::warn!(error = %e, "Failed to clear checkout draft");
    }

    flash_redirect(
        &session,
        Notice::success("Your order has been placed. Follow the payment instructions to complete it."),
        "/profile?tab=orders",
    )
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_page_renders_line_totals_and_badge() {
        let items: Vec<CartItem> = serde_json::from_value(serde_json::json!([
            {"productId": 2, "name": "Rain Shell", "price": "80.50", "quantity": 2}
        ]))
        .unwrap();
        let page = PageContext {
            cart_count: 1,
            ..PageContext::default()
        };
        let html = PaymentTemplate {
            page,
            shipping: complete_form().into_info(),
            totals: CartTotals::pending_shipping(&items),
            items,
        }
        .render()
        .unwrap();

        assert!(html.contains("Rain Shell &times; 2"));
        assert!(html.contains("$161.00"));
        assert!(html.contains("hx-swap=\"outerHTML\">1</span>"));
    }

    fn complete_form() -> ShippingForm {
        ShippingForm {
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "555-0100".to_string(),
            address: "1 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "LDN".to_string(),
            zip_code: "00001".to_string(),
            country: ShippingInfo::DEFAULT_COUNTRY.to_string(),
        }
    }

    #[test]
    fn test_valid_form_is_trimmed() {
        let info = validate_shipping(complete_form()).unwrap();
        assert_eq!(info.first_name, "Ada");
        assert_eq!(info.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_blank_fields_are_reported() {
        let form = ShippingForm {
            city: "   ".to_string(),
            zip_code: String::new(),
            ..complete_form()
        };
        let (info, errors) = validate_shipping(form).unwrap_err();
        assert_eq!(info.city, "");
        assert_eq!(errors.get("city"), Some("City is required."));
        assert_eq!(errors.get("zip_code"), Some("ZIP Code is required."));
        assert_eq!(errors.get("first_name"), None);
    }

    #[test]
    fn test_invalid_email_is_reported() {
        let form = ShippingForm {
            email: "not-an-email".to_string(),
            ..complete_form()
        };
        let (_, errors) = validate_shipping(form).unwrap_err();
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn test_field_views_carry_values_and_errors() {
        let info = ShippingInfo::default();
        let mut errors = FieldErrors::default();
        errors.add("email", "Email is required.");

        let views = field_views(&info, &errors);
        assert_eq!(views.len(), 9);
        let country = views.iter().find(|v| v.name == "country").unwrap();
        assert_eq!(country.value, "United States");
        let email = views.iter().find(|v| v.name == "email").unwrap();
        assert_eq!(email.input_type, "email");
        assert_eq!(email.error.as_deref(), Some("Email is required."));
    }
}
