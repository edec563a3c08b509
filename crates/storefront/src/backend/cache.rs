//! Cache types for catalog responses.

use modernstore_core::ProductId;

use super::types::{Product, ProductPage};

/// Cache key for product listings and product details.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products { page: u32, limit: u32 },
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(ProductPage),
}
