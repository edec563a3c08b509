//! Wire types for the commerce backend REST API.
//!
//! The backend speaks camelCase JSON. Several fields are loosely typed on the
//! wire (ids as strings or numbers, prices as numbers or strings, order items
//! as an array or a JSON-encoded string); the deserializers here accept every
//! shape the backend is known to send.

use modernstore_core::{
    AddressId, CartLine, OrderId, OrderStatus, Price, ProductId, UserId, UserRole,
};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

/// Image shown when a product or line item has none.
pub const PLACEHOLDER_IMAGE: &str = "/static/img/placeholder.svg";

// =============================================================================
// Lenient field deserializers
// =============================================================================

/// Treat `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read a count that may arrive as a number, a numeric string or `null`.
/// Negative values clamp to zero.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let count = match Option::<Count>::deserialize(deserializer)? {
        None => 0,
        Some(Count::Int(n)) => n,
        #[allow(clippy::cast_possible_truncation)]
        Some(Count::Float(f)) => f as i64,
        Some(Count::Text(s)) => s.trim().parse::<i64>().unwrap_or(0),
    };
    Ok(u32::try_from(count.max(0)).unwrap_or(u32::MAX))
}

/// Read a list that may arrive as a JSON array or as a string holding a
/// JSON-encoded array. An unparsable string yields an empty list.
fn array_or_encoded<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(encoded)) => {
            serde_json::from_str(&encoded).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding unparsable encoded item list");
                Vec::new()
            })
        }
        Some(value @ serde_json::Value::Array(_)) => {
            serde_json::from_value(value).map_err(serde::de::Error::custom)?
        }
        _ => Vec::new(),
    })
}

fn first_image<'a>(primary: Option<&'a str>, fallback: Option<&'a str>) -> &'a str {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(PLACEHOLDER_IMAGE)
}

// =============================================================================
// Products
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default, deserialize_with = "lenient_count")]
    pub stock: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Product {
    /// First image, then `imageUrl`, then the placeholder.
    #[must_use]
    pub fn primary_image(&self) -> &str {
        first_image(
            self.images.first().map(String::as_str),
            self.image_url.as_deref(),
        )
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Description text, empty when the backend sent none.
    #[must_use]
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Product listing as sent by the backend: either a bare array or a paged
/// envelope, depending on the backend version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawProductPage {
    List(Vec<Product>),
    #[serde(rename_all = "camelCase")]
    Paged {
        products: Vec<Product>,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default)]
        total_pages: Option<u32>,
    },
}

/// One page of the catalog.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: u32,
    pub has_more: bool,
}

impl ProductPage {
    /// Normalize a backend listing fetched with `page` and `limit`.
    #[must_use]
    pub fn from_raw(raw: RawProductPage, page: u32, limit: u32) -> Self {
        let full_page = |len: usize| u32::try_from(len).is_ok_and(|len| len >= limit);
        match raw {
            RawProductPage::List(products) => Self {
                has_more: full_page(products.len()),
                products,
                page,
            },
            RawProductPage::Paged {
                products,
                total,
                page: reported,
                total_pages,
            } => {
                let page = reported.unwrap_or(page);
                let has_more = match (total_pages, total) {
                    (Some(pages), _) => page < pages,
                    (None, Some(total)) => u64::from(page) * u64::from(limit) < total,
                    (None, None) => full_page(products.len()),
                };
                Self {
                    products,
                    page,
                    has_more,
                }
            }
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A line in the server-side cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub price: Price,
    #[serde(default, deserialize_with = "lenient_count")]
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CartItem {
    #[must_use]
    pub fn image_src(&self) -> &str {
        first_image(self.image.as_deref(), self.image_url.as_deref())
    }
}

impl CartLine for CartItem {
    fn unit_price(&self) -> Price {
        self.price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// The visitor's server-side cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<CartItem>,
}

// =============================================================================
// Orders
// =============================================================================

/// A line item captured on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub price: Price,
    #[serde(default, deserialize_with = "lenient_count")]
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
}

impl OrderItem {
    #[must_use]
    pub fn image_src(&self) -> &str {
        first_image(self.image.as_deref(), None)
    }

    #[must_use]
    pub fn total(&self) -> Price {
        self.line_total()
    }
}

impl CartLine for OrderItem {
    fn unit_price(&self) -> Price {
        self.price
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// An order as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "array_or_encoded")]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total: Price,
    #[serde(default)]
    pub shipping_fee: Option<Price>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Order {
    /// Merchandise total plus shipping fee.
    #[must_use]
    pub fn grand_total(&self) -> Price {
        self.total + self.shipping_fee()
    }

    /// Shipping fee, zero until the merchant sets one.
    #[must_use]
    pub fn shipping_fee(&self) -> Price {
        self.shipping_fee.unwrap_or(Price::ZERO)
    }

    /// `YYYY-MM-DD` part of `createdAt`, or `-` when unknown.
    #[must_use]
    pub fn created_date(&self) -> &str {
        match self.created_at.as_deref().map(str::trim) {
            Some(created) if !created.is_empty() => created.get(..10).unwrap_or(created),
            _ => "-",
        }
    }

    #[must_use]
    pub fn address_text(&self) -> &str {
        self.address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or("-")
    }

    /// Whether `user` placed this order.
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.user_id.as_ref() == Some(user)
    }
}

// =============================================================================
// Users
// =============================================================================

/// A backend user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub discord_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub join_date: Option<String>,
    #[serde(default)]
    pub total_orders: Option<u32>,
    #[serde(default)]
    pub total_spent: Option<Price>,
}

impl User {
    /// Name, then Discord username, then the raw id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        [self.name.as_deref(), self.discord_username.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| self.id.as_str())
    }
}

/// A saved shipping address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default)]
    pub is_default: bool,
}

// =============================================================================
// Request bodies
// =============================================================================

/// Shipping details collected at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
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

impl ShippingInfo {
    pub const DEFAULT_COUNTRY: &'static str = "United States";

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Default for ShippingInfo {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            country: Self::DEFAULT_COUNTRY.to_string(),
        }
    }
}

/// `POST /api/cart/items`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    pub image: String,
}

impl AddCartItem {
    /// Build a cart line from a product, copying its name, price and image.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            quantity,
            image: product.primary_image().to_string(),
        }
    }
}

/// `PUT /api/cart/items/:id`
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCartItem {
    pub quantity: u32,
}

/// `POST /api/orders`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder<'a> {
    pub shipping_info: &'a ShippingInfo,
}

/// Status change for `PUT /api/orders/:id` and `PUT /api/admin/orders/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusUpdate<'a> {
    pub status: &'a OrderStatus,
}

/// `PUT /api/admin/orders/:id` shipping fee change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingFeeUpdate {
    pub shipping_fee: Price,
}

/// Create or update a product from the admin console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub category: String,
    pub price: Price,
    pub stock: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// `POST /api/users/batch`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBatchRequest<'a> {
    pub user_ids: &'a [UserId],
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_primary_image_fallbacks() {
        let product: Product = serde_json::from_str(
            r#"{"id":1,"name":"Lamp","price":"89.00","stock":4,"images":["/a.jpg","/b.jpg"],"imageUrl":"/c.jpg"}"#,
        )
        .unwrap();
        assert_eq!(product.primary_image(), "/a.jpg");

        let product: Product =
            serde_json::from_str(r#"{"id":"2","name":"Bag","price":159,"imageUrl":"/bag.jpg"}"#)
                .unwrap();
        assert_eq!(product.primary_image(), "/bag.jpg");
        assert_eq!(product.stock, 0);
        assert!(!product.in_stock());

        let product: Product =
            serde_json::from_str(r#"{"id":"3","name":"Pot","price":45,"images":null}"#).unwrap();
        assert_eq!(product.primary_image(), PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_product_stock_is_lenient() {
        let product: Product =
            serde_json::from_str(r#"{"id":1,"name":"x","price":1,"stock":"7"}"#).unwrap();
        assert_eq!(product.stock, 7);
        let product: Product =
            serde_json::from_str(r#"{"id":1,"name":"x","price":1,"stock":-3}"#).unwrap();
        assert_eq!(product.stock, 0);
    }

    #[test]
    fn test_product_page_bare_array() {
        let raw: RawProductPage = serde_json::from_str(
            r#"[{"id":1,"name":"a","price":1},{"id":2,"name":"b","price":2}]"#,
        )
        .unwrap();
        let page = ProductPage::from_raw(raw, 1, 2);
        assert_eq!(page.products.len(), 2);
        assert!(page.has_more);

        let raw: RawProductPage =
            serde_json::from_str(r#"[{"id":1,"name":"a","price":1}]"#).unwrap();
        assert!(!ProductPage::from_raw(raw, 2, 2).has_more);
    }

    #[test]
    fn test_product_page_envelope() {
        let raw: RawProductPage = serde_json::from_str(
            r#"{"products":[{"id":1,"name":"a","price":1}],"total":25,"page":2,"totalPages":3}"#,
        )
        .unwrap();
        let page = ProductPage::from_raw(raw, 2, 12);
        assert_eq!(page.page, 2);
        assert!(page.has_more);

        let raw: RawProductPage =
            serde_json::from_str(r#"{"products":[],"total":24,"page":2}"#).unwrap();
        assert!(!ProductPage::from_raw(raw, 2, 12).has_more);
    }

    #[test]
    fn test_cart_missing_or_null_items() {
        let cart: Cart = serde_json::from_str("{}").unwrap();
        assert!(cart.items.is_empty());
        let cart: Cart = serde_json::from_str(r#"{"items":null}"#).unwrap();
        assert!(cart.items.is_empty());
    }

    #[test]
    fn test_order_items_as_array_or_string() {
        let order: Order = serde_json::from_str(
            r#"{"id":7,"status":"PAID","items":[{"productId":1,"name":"Lamp","price":10,"quantity":2}],"total":20,"shippingFee":5}"#,
        )
        .unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].total(), Price::from_dollars(20));
        assert_eq!(order.grand_total(), Price::from_dollars(25));

        let order: Order = serde_json::from_str(
            r#"{"id":"8","status":"PROCESSING","items":"[{\"productId\":\"1\",\"name\":\"Lamp\",\"price\":10,\"quantity\":3}]","total":30}"#,
        )
        .unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(order.grand_total(), Price::from_dollars(30));
    }

    #[test]
    fn test_order_unparsable_item_string_is_empty() {
        let order: Order =
            serde_json::from_str(r#"{"id":9,"status":"SHIPPED","items":"not json","total":1}"#)
                .unwrap();
        assert!(order.items.is_empty());
    }

    #[test]
    fn test_order_list_tolerates_null_status() {
        let orders: Vec<Order> = serde_json::from_str(
            r#"[{"id":"A","status":null,"total":1},{"id":"B","status":"PAID","total":2}]"#,
        )
        .unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].status, OrderStatus::Processing);
        assert_eq!(orders[1].status, OrderStatus::Paid);
    }

    #[test]
    fn test_order_created_date() {
        let mut order: Order = serde_json::from_str(
            r#"{"id":1,"status":"PAID","createdAt":"2025-03-14T09:26:53.589Z"}"#,
        )
        .unwrap();
        assert_eq!(order.created_date(), "2025-03-14");
        order.created_at = None;
        assert_eq!(order.created_date(), "-");
        order.created_at = Some("2025".to_string());
        assert_eq!(order.created_date(), "2025");
    }

    #[test]
    fn test_order_ownership() {
        let order: Order =
            serde_json::from_str(r#"{"id":1,"userId":42,"status":"PAID"}"#).unwrap();
        assert!(order.is_owned_by(&UserId::new("42")));
        assert!(!order.is_owned_by(&UserId::new("43")));
    }

    #[test]
    fn test_user_display_name() {
        let user: User = serde_json::from_str(
            r#"{"id":"u1","role":"ADMIN","discordUsername":"shopkeeper","name":"  "}"#,
        )
        .unwrap();
        assert_eq!(user.display_name(), "shopkeeper");
        assert!(user.role.is_admin());

        let user: User = serde_json::from_str(r#"{"id":"u2"}"#).unwrap();
        assert_eq!(user.display_name(), "u2");
        assert_eq!(user.role, UserRole::User);
    }

    #[test]
    fn test_request_bodies_are_camel_case() {
        let info = ShippingInfo {
            first_name: "Ada".to_string(),
            zip_code: "12345".to_string(),
            ..ShippingInfo::default()
        };
        let body = serde_json::to_value(PlaceOrder {
            shipping_info: &info,
        })
        .unwrap();
        assert_eq!(body["shippingInfo"]["firstName"], "Ada");
        assert_eq!(body["shippingInfo"]["zipCode"], "12345");
        assert_eq!(body["shippingInfo"]["country"], "United States");

        let body = serde_json::to_value(ShippingFeeUpdate {
            shipping_fee: Price::from_cents(1250),
        })
        .unwrap();
        assert_eq!(body["shippingFee"], 12.5);

        let ids = [UserId::new("1"), UserId::new("2")];
        let body = serde_json::to_value(UserBatchRequest { user_ids: &ids }).unwrap();
        assert_eq!(body["userIds"], serde_json::json!(["1", "2"]));
    }

    #[test]
    fn test_add_cart_item_copies_product() {
        let product: Product = serde_json::from_str(
            r#"{"id":5,"name":"Watch","price":299,"stock":3,"imageUrl":"/watch.jpg"}"#,
        )
        .unwrap();
        let body = serde_json::to_value(AddCartItem::from_product(&product, 2)).unwrap();
        assert_eq!(body["productId"], "5");
        assert_eq!(body["name"], "Watch");
        assert_eq!(body["price"], 299.0);
        assert_eq!(body["quantity"], 2);
        assert_eq!(body["image"], "/watch.jpg");
    }
}
