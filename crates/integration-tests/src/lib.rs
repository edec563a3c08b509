//! Integration test harness for the ModernStore storefront.
//!
//! Every test gets its own in-process mock of the commerce backend and its
//! own storefront, both bound to ephemeral ports on 127.0.0.1. Requests go
//! through the real router with every middleware layer.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p modernstore-integration-tests
//! ```
//!
//! # Mock accounts
//!
//! | Token            | User | Role  |
//! |------------------|------|-------|
//! | `customer-token` | `u1` | USER  |
//! | `admin-token`    | `u2` | ADMIN |

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router, ServiceExt};
use modernstore_storefront::config::{BackendConfig, CatalogConfig, StorefrontConfig};
use modernstore_storefront::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};

pub const CUSTOMER_TOKEN: &str = "customer-token";
pub const ADMIN_TOKEN: &str = "admin-token";

const TEST_SESSION_SECRET: &str = "k3Jx9!qLm2#Vb7@Rt5$Wn8&Zp4*Hc6^Y";

// ============================================================================
// Mock backend state
// ============================================================================

/// Everything the mock backend knows. Entities are kept as raw JSON so the
/// tests exercise the storefront's lenient wire parsing.
#[derive(Debug, Default)]
pub struct MockState {
    pub products: Vec<Value>,
    /// Cart lines by user id.
    pub carts: HashMap<String, Vec<Value>>,
    pub orders: Vec<Value>,
    pub users: Vec<Value>,
    /// Bearer token to user id.
    pub tokens: HashMap<String, String>,
    /// Make `POST /api/users/batch` fail with a 500.
    pub fail_user_batch: bool,
    next_id: u64,
}

impl MockState {
    /// Three products, a customer with two orders, an admin and a guest order.
    #[must_use]
    pub fn seeded() -> Self {
        Self {
            products: vec![
                json!({"id": 1, "name": "Trail Shoe", "price": 120, "stock": 3,
                       "category": "Footwear", "images": ["https://cdn.test/shoe.jpg"],
                       "description": "Grippy and light."}),
                json!({"id": 2, "name": "Rain Shell", "price": "80.50", "stock": 10,
                       "category": "Outerwear", "imageUrl": "https://cdn.test/shell.jpg"}),
                json!({"id": 3, "name": "Wool Sock", "price": 12, "stock": 0,
                       "category": "Footwear", "images": null}),
            ],
            carts: HashMap::new(),
            orders: vec![
                json!({"id": "ORD-1", "userId": "u1", "status": "PROCESSING", "total": 120,
                       "createdAt": "2024-05-01T10:00:00Z", "address": "1 Analytical Way, London",
                       "items": [{"productId": 1, "name": "Trail Shoe", "price": 120, "quantity": 1}]}),
                json!({"id": "ORD-2", "userId": "u1", "status": "SHIPPED", "total": 24,
                       "shippingFee": 5, "createdAt": "2024-04-02T09:00:00Z",
                       "items": "[{\"productId\":3,\"name\":\"Wool Sock\",\"price\":12,\"quantity\":2}]"}),
                json!({"id": "ORD-3", "userId": "u9", "status": "PAID", "total": 80.5,
                       "items": [{"productId": 2, "name": "Rain Shell", "price": 80.5, "quantity": 1}]}),
            ],
            users: vec![
                json!({"id": "u1", "role": "USER", "name": "Ada Lovelace",
                       "discordUsername": "ada", "email": "ada@example.com",
                       "joinDate": "2023-01-15", "totalOrders": 2, "totalSpent": 144}),
                json!({"id": "u2", "role": "ADMIN", "name": "Grace Hopper",
                       "discordUsername": "grace"}),
            ],
            tokens: HashMap::from([
                (CUSTOMER_TOKEN.to_string(), "u1".to_string()),
                (ADMIN_TOKEN.to_string(), "u2".to_string()),
            ]),
            fail_user_batch: false,
            next_id: 100,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: &str) -> Option<&Value> {
        self.users.iter().find(|u| id_of(u) == id)
    }

    fn is_admin(&self, id: &str) -> bool {
        self.user(id)
            .and_then(|u| u.get("role"))
            .and_then(Value::as_str)
            .is_some_and(|role| role == "ADMIN")
    }

    fn product_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.products.iter_mut().find(|p| id_of(p) == id)
    }

    fn order_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.orders.iter_mut().find(|o| id_of(o) == id)
    }
}

type Shared = Arc<Mutex<MockState>>;

/// String form of an entity's `id`, whether sent as a number or a string.
#[must_use]
pub fn id_of(value: &Value) -> String {
    match value.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn field_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn field_f64(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().expect("mock backend state poisoned")
}

fn rejected(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"message": message}))).into_response()
}

/// Resolve the bearer token to a user id.
fn caller(state: &MockState, headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| state.tokens.get(token).cloned())
        .ok_or_else(|| rejected(StatusCode::UNAUTHORIZED, "Invalid token"))
}

fn admin_caller(state: &MockState, headers: &HeaderMap) -> Result<String, Response> {
    let id = caller(state, headers)?;
    if state.is_admin(&id) {
        Ok(id)
    } else {
        Err(rejected(StatusCode::FORBIDDEN, "Admin access required"))
    }
}

// ============================================================================
// Mock backend handlers
// ============================================================================

async fn list_products(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let state = lock(&state);
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(12).max(1);
    let products: Vec<Value> = state
        .products
        .iter()
        .skip((page - 1) * limit)
        .take(limit)
        .cloned()
        .collect();
    let total_pages = state.products.len().div_ceil(limit);
    Json(json!({"products": products, "page": page, "totalPages": total_pages,
                "total": state.products.len()}))
}

async fn get_product(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let state = lock(&state);
    state
        .products
        .iter()
        .find(|p| id_of(p) == id)
        .map_or_else(
            || rejected(StatusCode::NOT_FOUND, "Product not found"),
            |p| Json(p.clone()).into_response(),
        )
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let items = state.carts.get(&user).cloned().unwrap_or_default();
    Json(json!({"items": items})).into_response()
}

async fn add_cart_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let product_id = field_str(&body, "productId").to_string();
    let quantity = body.get("quantity").and_then(Value::as_u64).unwrap_or(0);

    let cart = state.carts.entry(user).or_default();
    if let Some(line) = cart.iter_mut().find(|l| field_str(l, "productId") == product_id) {
        let current = line.get("quantity").and_then(Value::as_u64).unwrap_or(0);
        line["quantity"] = json!(current + quantity);
    } else {
        cart.push(body);
    }
    StatusCode::CREATED.into_response()
}

async fn update_cart_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let quantity = body.get("quantity").and_then(Value::as_u64).unwrap_or(0);
    let cart = state.carts.entry(user).or_default();
    match cart.iter_mut().find(|l| field_str(l, "productId") == product_id) {
        Some(line) => {
            line["quantity"] = json!(quantity);
            StatusCode::OK.into_response()
        }
        None => rejected(StatusCode::NOT_FOUND, "Item not in cart"),
    }
}

async fn remove_cart_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Response {
    let mut state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    state
        .carts
        .entry(user)
        .or_default()
        .retain(|l| field_str(l, "productId") != product_id);
    StatusCode::NO_CONTENT.into_response()
}

async fn place_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let items = state.carts.remove(&user).unwrap_or_default();
    if items.is_empty() {
        return rejected(StatusCode::BAD_REQUEST, "Cart is empty");
    }

    let total: f64 = items
        .iter()
        .map(|i| field_f64(i, "price") * field_f64(i, "quantity"))
        .sum();
    let shipping = body.get("shippingInfo").cloned().unwrap_or_default();
    let address = format!(
        "{}, {}, {} {}, {}",
        field_str(&shipping, "address"),
        field_str(&shipping, "city"),
        field_str(&shipping, "state"),
        field_str(&shipping, "zipCode"),
        field_str(&shipping, "country"),
    );
    let id = format!("ORD-{}", state.next_id());
    state.orders.push(json!({
        "id": id,
        "userId": user,
        "status": "PROCESSING",
        "total": total,
        "createdAt": "2024-06-01T12:00:00Z",
        "address": address,
        // Encoded the way older backends store line items
        "items": Value::Array(items).to_string(),
    }));
    (StatusCode::CREATED, Json(json!({"id": id}))).into_response()
}

async fn list_orders(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let orders: Vec<Value> = state
        .orders
        .iter()
        .filter(|o| field_str(o, "userId") == user)
        .cloned()
        .collect();
    Json(orders).into_response()
}

async fn get_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    state
        .orders
        .iter()
        .find(|o| id_of(o) == id && field_str(o, "userId") == user)
        .map_or_else(
            || rejected(StatusCode::NOT_FOUND, "Order not found"),
            |o| Json(o.clone()).into_response(),
        )
}

async fn cancel_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if field_str(&body, "status") != "CANCELED" {
        return rejected(StatusCode::BAD_REQUEST, "Customers can only cancel orders");
    }
    let Some(order) = state.order_mut(&id) else {
        return rejected(StatusCode::NOT_FOUND, "Order not found");
    };
    if field_str(order, "userId") != user {
        return rejected(StatusCode::NOT_FOUND, "Order not found");
    }
    if !matches!(field_str(order, "status"), "PROCESSING" | "WAITING_FOR_PAYMENT") {
        return rejected(StatusCode::BAD_REQUEST, "Order can no longer be canceled");
    }
    order["status"] = json!("CANCELED");
    StatusCode::OK.into_response()
}

async fn current_user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    let user = match caller(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    state.user(&user).map_or_else(
        || rejected(StatusCode::UNAUTHORIZED, "Unknown user"),
        |u| Json(u.clone()).into_response(),
    )
}

async fn list_addresses(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    if let Err(response) = caller(&state, &headers) {
        return response;
    }
    Json(json!([
        {"id": 1, "name": "Home", "address": "1 Analytical Way, London", "isDefault": true},
        {"id": 2, "name": "Office", "address": null, "isDefault": false},
    ]))
    .into_response()
}

async fn users_batch(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let state = lock(&state);
    if let Err(response) = caller(&state, &headers) {
        return response;
    }
    if state.fail_user_batch {
        return rejected(StatusCode::INTERNAL_SERVER_ERROR, "Batch lookup unavailable");
    }
    let ids: Vec<&str> = body
        .get("userIds")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let users: Vec<Value> = state
        .users
        .iter()
        .filter(|u| ids.contains(&id_of(u).as_str()))
        .cloned()
        .collect();
    Json(users).into_response()
}

async fn admin_list_orders(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    if let Err(response) = admin_caller(&state, &headers) {
        return response;
    }
    Json(state.orders.clone()).into_response()
}

async fn admin_update_order(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = admin_caller(&state, &headers) {
        return response;
    }
    let Some(order) = state.order_mut(&id) else {
        return rejected(StatusCode::NOT_FOUND, "Order not found");
    };
    if let Some(status) = body.get("status") {
        order["status"] = status.clone();
    }
    if let Some(fee) = body.get("shippingFee") {
        order["shippingFee"] = fee.clone();
    }
    StatusCode::OK.into_response()
}

async fn admin_create_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = admin_caller(&state, &headers) {
        return response;
    }
    body["id"] = json!(state.next_id());
    state.products.push(body);
    StatusCode::CREATED.into_response()
}

async fn admin_update_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = admin_caller(&state, &headers) {
        return response;
    }
    let Some(product) = state.product_mut(&id) else {
        return rejected(StatusCode::NOT_FOUND, "Product not found");
    };
    if let (Some(target), Some(changes)) = (product.as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
    StatusCode::OK.into_response()
}

async fn admin_delete_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = admin_caller(&state, &headers) {
        return response;
    }
    let before = state.products.len();
    state.products.retain(|p| id_of(p) != id);
    if state.products.len() == before {
        return rejected(StatusCode::NOT_FOUND, "Product not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

fn mock_router(state: Shared) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .route("/api/cart", get(get_cart))
        .route("/api/cart/items", post(add_cart_item))
        .route(
            "/api/cart/items/{id}",
            put(update_cart_item).delete(remove_cart_item),
        )
        .route("/api/orders", get(list_orders).post(place_order))
        .route("/api/orders/{id}", get(get_order).put(cancel_order))
        .route("/api/users/me", get(current_user))
        .route("/api/users/addresses", get(list_addresses))
        .route("/api/users/batch", post(users_batch))
        .route("/api/admin/orders", get(admin_list_orders))
        .route("/api/admin/orders/{id}", put(admin_update_order))
        .route("/api/admin/products", post(admin_create_product))
        .route(
            "/api/admin/products/{id}",
            put(admin_update_product).delete(admin_delete_product),
        )
        .with_state(state)
}

// ============================================================================
// Servers
// ============================================================================

/// A running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub url: String,
    state: Shared,
}

impl MockBackend {
    /// Start a mock backend on an ephemeral port.
    pub async fn start(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");
        let router = mock_router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Mock backend failed");
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Inspect or change the backend state.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut lock(&self.state))
    }

    #[must_use]
    pub fn order(&self, id: &str) -> Option<Value> {
        self.with_state(|s| s.orders.iter().find(|o| id_of(o) == id).cloned())
    }

    #[must_use]
    pub fn product(&self, id: &str) -> Option<Value> {
        self.with_state(|s| s.products.iter().find(|p| id_of(p) == id).cloned())
    }

    #[must_use]
    pub fn cart(&self, user_id: &str) -> Vec<Value> {
        self.with_state(|s| s.carts.get(user_id).cloned().unwrap_or_default())
    }
}

/// Start the storefront against `backend_url` and return its base URL.
pub async fn spawn_storefront(backend_url: &str) -> String {
    let config = StorefrontConfig {
        host: "127.0.0.1".parse().expect("valid host"),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        session_secret: SecretString::from(TEST_SESSION_SECRET.to_string()),
        backend: BackendConfig::new(backend_url).expect("valid backend URL"),
        catalog: CatalogConfig {
            page_size: 2,
            ..CatalogConfig::default()
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    };
    let state = AppState::new(config).expect("Failed to build storefront state");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind storefront");
    let addr = listener.local_addr().expect("Storefront has no address");
    let service = ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(
        modernstore_storefront::app(state),
    );
    tokio::spawn(async move {
        axum::serve(listener, service).await.expect("Storefront failed");
    });

    format!("http://{addr}")
}

// ============================================================================
// Test context
// ============================================================================

/// A seeded backend, a storefront and a browser-like client.
pub struct TestContext {
    pub backend: MockBackend,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_state(MockState::seeded()).await
    }

    pub async fn with_state(state: MockState) -> Self {
        let backend = MockBackend::start(state).await;
        let base_url = spawn_storefront(&backend.url).await;
        Self {
            backend,
            base_url,
            client: browser(),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// GET and return the body, asserting a 200.
    pub async fn page(&self, path: &str) -> String {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK, "GET {path}");
        resp.text().await.expect("Failed to read body")
    }

    /// Complete the Discord callback with `token`.
    pub async fn login(&self, token: &str) {
        let resp = self.get(&format!("/auth/discord/callback?token={token}")).await;
        assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
    }
}

/// A cookie-keeping client that does not follow redirects.
#[must_use]
pub fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(resp: &reqwest::Response) -> &str {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
