//! Commerce backend REST client implementation.
//!
//! Uses `reqwest` 0.13 for HTTP and caches catalog reads using `moka`.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use modernstore_core::{OrderId, OrderStatus, Price, ProductId, UserId};

use super::cache::{CacheKey, CacheValue};
use super::types::{
    AddCartItem, Address, Cart, Order, OrderStatusUpdate, PlaceOrder, Product, ProductInput,
    ProductPage, RawProductPage, ShippingFeeUpdate, ShippingInfo, UpdateCartItem, User,
    UserBatchRequest,
};
use super::{BackendError, error_message_from_body};
use crate::config::BackendConfig;
use crate::session_state::AuthToken;

/// Longest response body excerpt written to logs.
const LOG_BODY_LIMIT: usize = 500;

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the commerce backend REST API.
///
/// Cheap to clone. Product pages and product details are cached for the
/// configured TTL; nothing else is cached.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("modernstore-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase)
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, segments: &[&str]) -> Result<RequestBuilder, BackendError> {
        Ok(self.inner.client.get(self.endpoint(segments)?))
    }

    fn authed(
        &self,
        method: reqwest::Method,
        segments: &[&str],
        token: &AuthToken,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(self
            .inner
            .client
            .request(method, self.endpoint(segments)?)
            .bearer_auth(token.expose()))
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
        let response = check_status(request.send().await?).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(&body),
                "Failed to parse backend response"
            );
            BackendError::Parse(e)
        })
    }

    /// Send a request whose response body is not needed.
    async fn send_empty(request: RequestBuilder) -> Result<(), BackendError> {
        check_status(request.send().await?).await?;
        Ok(())
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Get one page of the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, page: u32, limit: u32) -> Result<ProductPage, BackendError> {
        let page = page.max(1);
        let cache_key = CacheKey::Products { page, limit };

        if let Some(CacheValue::Products(cached)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product page");
            return Ok(cached);
        }

        let request = self
            .get(&["api", "products"])?
            .query(&[("page", page), ("limit", limit)]);
        let raw: RawProductPage = Self::send_json(request).await?;
        let products = ProductPage::from_raw(raw, page, limit);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;

        Ok(products)
    }

    /// Get a product by id, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, BackendError> {
        let cache_key = CacheKey::Product(id.clone());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product = self.get_product_fresh(id).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get a product by id, bypassing the cache.
    ///
    /// Used wherever the live stock level matters.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product_fresh(&self, id: &ProductId) -> Result<Product, BackendError> {
        Self::send_json(self.get(&["api", "products", id.as_str()])?).await
    }

    /// Drop every cached product page and product.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Get the visitor's server-side cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn get_cart(&self, token: &AuthToken) -> Result<Cart, BackendError> {
        Self::send_json(self.authed(reqwest::Method::GET, &["api", "cart"], token)?).await
    }

    /// Add a line to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend rejects it.
    #[instrument(skip(self, token), fields(product_id = %item.product_id, quantity = item.quantity))]
    pub async fn add_cart_item(
        &self,
        token: &AuthToken,
        item: &AddCartItem,
    ) -> Result<(), BackendError> {
        let request = self
            .authed(reqwest::Method::POST, &["api", "cart", "items"], token)?
            .json(item);
        Self::send_empty(request).await
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend rejects it.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn update_cart_item(
        &self,
        token: &AuthToken,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let request = self
            .authed(
                reqwest::Method::PUT,
                &["api", "cart", "items", product_id.as_str()],
                token,
            )?
            .json(&UpdateCartItem { quantity });
        Self::send_empty(request).await
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn remove_cart_item(
        &self,
        token: &AuthToken,
        product_id: &ProductId,
    ) -> Result<(), BackendError> {
        let request = self.authed(
            reqwest::Method::DELETE,
            &["api", "cart", "items", product_id.as_str()],
            token,
        )?;
        Self::send_empty(request).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Place an order for the current cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend rejects it.
    #[instrument(skip_all)]
    pub async fn place_order(
        &self,
        token: &AuthToken,
        shipping_info: &ShippingInfo,
    ) -> Result<(), BackendError> {
        let request = self
            .authed(reqwest::Method::POST, &["api", "orders"], token)?
            .json(&PlaceOrder { shipping_info });
        Self::send_empty(request).await
    }

    /// List the visitor's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn list_orders(&self, token: &AuthToken) -> Result<Vec<Order>, BackendError> {
        Self::send_json(self.authed(reqwest::Method::GET, &["api", "orders"], token)?).await
    }

    /// Get one order.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the order does not exist.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn get_order(&self, token: &AuthToken, id: &OrderId) -> Result<Order, BackendError> {
        let request = self.authed(reqwest::Method::GET, &["api", "orders", id.as_str()], token)?;
        Self::send_json(request).await
    }

    /// Cancel one of the visitor's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend refuses.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn cancel_order(&self, token: &AuthToken, id: &OrderId) -> Result<(), BackendError> {
        let request = self
            .authed(reqwest::Method::PUT, &["api", "orders", id.as_str()], token)?
            .json(&OrderStatusUpdate {
                status: &OrderStatus::Canceled,
            });
        Self::send_empty(request).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get the user the token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` if the token is not valid.
    #[instrument(skip_all)]
    pub async fn current_user(&self, token: &AuthToken) -> Result<User, BackendError> {
        Self::send_json(self.authed(reqwest::Method::GET, &["api", "users", "me"], token)?).await
    }

    /// List the visitor's saved addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn list_addresses(&self, token: &AuthToken) -> Result<Vec<Address>, BackendError> {
        let request = self.authed(
            reqwest::Method::GET,
            &["api", "users", "addresses"],
            token,
        )?;
        Self::send_json(request).await
    }

    /// Resolve several users in one call.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(count = ids.len()))]
    pub async fn users_by_id(
        &self,
        token: &AuthToken,
        ids: &[UserId],
    ) -> Result<Vec<User>, BackendError> {
        let request = self
            .authed(reqwest::Method::POST, &["api", "users", "batch"], token)?
            .json(&UserBatchRequest { user_ids: ids });
        Self::send_json(request).await
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// List every order in the store.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Forbidden` for non-admin tokens.
    #[instrument(skip_all)]
    pub async fn admin_list_orders(&self, token: &AuthToken) -> Result<Vec<Order>, BackendError> {
        let request = self.authed(reqwest::Method::GET, &["api", "admin", "orders"], token)?;
        Self::send_json(request).await
    }

    /// Move an order to another status.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend refuses.
    #[instrument(skip(self, token), fields(order_id = %id, status = %status))]
    pub async fn admin_update_order_status(
        &self,
        token: &AuthToken,
        id: &OrderId,
        status: &OrderStatus,
    ) -> Result<(), BackendError> {
        let request = self
            .authed(
                reqwest::Method::PUT,
                &["api", "admin", "orders", id.as_str()],
                token,
            )?
            .json(&OrderStatusUpdate { status });
        Self::send_empty(request).await
    }

    /// Set the shipping fee on an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend refuses.
    #[instrument(skip(self, token), fields(order_id = %id, shipping_fee = %shipping_fee))]
    pub async fn admin_update_shipping_fee(
        &self,
        token: &AuthToken,
        id: &OrderId,
        shipping_fee: Price,
    ) -> Result<(), BackendError> {
        let request = self
            .authed(
                reqwest::Method::PUT,
                &["api", "admin", "orders", id.as_str()],
                token,
            )?
            .json(&ShippingFeeUpdate { shipping_fee });
        Self::send_empty(request).await
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend refuses.
    #[instrument(skip(self, token), fields(name = %input.name))]
    pub async fn admin_create_product(
        &self,
        token: &AuthToken,
        input: &ProductInput,
    ) -> Result<(), BackendError> {
        let request = self
            .authed(reqwest::Method::POST, &["api", "admin", "products"], token)?
            .json(input);
        let result = Self::send_empty(request).await;
        self.invalidate_catalog();
        result
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend refuses.
    #[instrument(skip(self, token, input), fields(product_id = %id))]
    pub async fn admin_update_product(
        &self,
        token: &AuthToken,
        id: &ProductId,
        input: &ProductInput,
    ) -> Result<(), BackendError> {
        let request = self
            .authed(
                reqwest::Method::PUT,
                &["api", "admin", "products", id.as_str()],
                token,
            )?
            .json(input);
        let result = Self::send_empty(request).await;
        self.invalidate_catalog();
        result
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend refuses.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn admin_delete_product(
        &self,
        token: &AuthToken,
        id: &ProductId,
    ) -> Result<(), BackendError> {
        let request = self.authed(
            reqwest::Method::DELETE,
            &["api", "admin", "products", id.as_str()],
            token,
        )?;
        let result = Self::send_empty(request).await;
        self.invalidate_catalog();
        result
    }

    // =========================================================================
    // Auth and health
    // =========================================================================

    /// Browser entry point of the backend's Discord OAuth flow.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn discord_login_url(&self) -> Result<Url, BackendError> {
        self.endpoint(&["api", "auth", "discord"])
    }

    /// Cheap request used by the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<(), BackendError> {
        let request = self.get(&["api", "products"])?.query(&[("limit", 1)]);
        Self::send_empty(request).await
    }
}

/// Map non-success statuses to [`BackendError`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized),
        StatusCode::FORBIDDEN => Err(BackendError::Forbidden),
        StatusCode::NOT_FOUND => Err(BackendError::NotFound),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            Err(BackendError::RateLimited(retry_after))
        }
        status if status.is_server_error() => {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %excerpt(&body),
                "Backend returned server error"
            );
            Err(BackendError::Server {
                status: status.as_u16(),
            })
        }
        status => {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %excerpt(&body), "Backend rejected request");
            Err(BackendError::Rejected {
                status: status.as_u16(),
                message: error_message_from_body(&body),
            })
        }
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(&BackendConfig::new(base).unwrap()).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client("http://localhost:3000");
        let url = client.endpoint(&["api", "products", "42"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/products/42");
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_ids() {
        let client = client("https://api.modernstore.test/v1/");
        let url = client.endpoint(&["api", "orders", "a/b c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.modernstore.test/v1/api/orders/a%2Fb%20c"
        );
    }

    #[test]
    fn test_discord_login_url() {
        let client = client("http://localhost:3000");
        assert_eq!(
            client.discord_login_url().unwrap().as_str(),
            "http://localhost:3000/api/auth/discord"
        );
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(LOG_BODY_LIMIT + 10);
        assert_eq!(excerpt(&long).len(), LOG_BODY_LIMIT);
        assert_eq!(excerpt("short"), "short");
    }
}
