//! Catalog pages, health checks and path normalization.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use modernstore_integration_tests::TestContext;
use reqwest::StatusCode;

#[tokio::test]
async fn test_product_grid_pages() {
    let ctx = TestContext::new().await;

    let first = ctx.page("/products").await;
    assert!(first.contains("Trail Shoe"));
    assert!(first.contains("Rain Shell"));
    assert!(!first.contains("Wool Sock"));
    assert!(first.contains("hx-get=\"/products?page=2\""));

    let resp = ctx
        .client
        .get(ctx.url("/products?page=2"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fragment = resp.text().await.unwrap();
    assert!(fragment.contains("Wool Sock"));
    assert!(fragment.contains("Out of Stock"));
    assert!(!fragment.contains("<html"));
    assert!(!fragment.contains("grid-sentinel"));
}

#[tokio::test]
async fn test_product_detail() {
    let ctx = TestContext::new().await;

    let page = ctx.page("/products/2").await;
    assert!(page.contains("Rain Shell"));
    assert!(page.contains("$80.50"));
    assert!(page.contains("https://cdn.test/shell.jpg"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let ctx = TestContext::new().await;
    assert_eq!(ctx.get("/products/999").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_checks() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(ctx.get("/health/ready").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_trailing_slash_is_trimmed() {
    let ctx = TestContext::new().await;

    let page = ctx.page("/products/").await;
    assert!(page.contains("Trail Shoe"));
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/").await;
    let headers = resp.headers();
    assert!(headers.contains_key("content-security-policy"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("x-request-id"));
}
