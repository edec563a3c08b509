//! Admin console access and edits.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use modernstore_integration_tests::{
    ADMIN_TOKEN, CUSTOMER_TOKEN, MockState, TestContext, location,
};
use reqwest::StatusCode;

#[tokio::test]
async fn test_anonymous_visitor_is_sent_to_login() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/admin/orders").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login");
}

#[tokio::test]
async fn test_customer_is_forbidden() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;

    assert_eq!(ctx.get("/admin/orders").await.status(), StatusCode::FORBIDDEN);
    assert!(!ctx.page("/").await.contains("href=\"/admin\""));
}

#[tokio::test]
async fn test_admin_sees_orders_with_customers() {
    let ctx = TestContext::new().await;
    ctx.login(ADMIN_TOKEN).await;

    let resp = ctx.get("/admin").await;
    assert_eq!(location(&resp), "/admin/orders");

    let page = ctx.page("/admin/orders").await;
    assert!(page.contains("ORD-1"));
    assert!(page.contains("ORD-3"));
    assert!(page.contains("Ada Lovelace"));
    // Unknown user falls back to the raw id
    assert!(page.contains("u9"));

    let filtered = ctx.page("/admin/orders?status=PAID").await;
    assert!(filtered.contains("ORD-3"));
    assert!(!filtered.contains("/admin/orders/ORD-1\""));
}

#[tokio::test]
async fn test_failed_name_lookup_shows_raw_ids() {
    let mut state = MockState::seeded();
    state.fail_user_batch = true;
    let ctx = TestContext::with_state(state).await;
    ctx.login(ADMIN_TOKEN).await;

    let page = ctx.page("/admin/orders").await;
    assert!(page.contains("u1"));
    assert!(!page.contains("Ada Lovelace"));
}

#[tokio::test]
async fn test_order_without_status_still_lists() {
    let mut state = MockState::seeded();
    state.orders.push(serde_json::json!({
        "id": "ORD-NULL", "userId": "u1", "status": null, "total": 3, "items": []
    }));
    let ctx = TestContext::with_state(state).await;

    ctx.login(ADMIN_TOKEN).await;
    let page = ctx.page("/admin/orders").await;
    assert!(page.contains("ORD-NULL"));
    assert!(page.contains("ORD-1"));
}

#[tokio::test]
async fn test_admin_updates_status_and_fee() {
    let ctx = TestContext::new().await;
    ctx.login(ADMIN_TOKEN).await;

    let resp = ctx
        .post_form(
            "/admin/orders/ORD-1/status",
            &[("status", "SHIPPED"), ("return_to", "/admin/orders")],
        )
        .await;
    assert_eq!(location(&resp), "/admin/orders");
    assert!(ctx.page("/admin/orders").await.contains("Order ORD-1 is now"));
    assert_eq!(ctx.backend.order("ORD-1").unwrap()["status"], "SHIPPED");

    ctx.post_form("/admin/orders/ORD-1/status", &[("status", "LOST")])
        .await;
    assert!(ctx.page("/admin/orders/ORD-1").await.contains("Unknown order status."));

    let resp = ctx
        .post_form("/admin/orders/ORD-1/shipping-fee", &[("shipping_fee", "7.5")])
        .await;
    assert_eq!(location(&resp), "/admin/orders/ORD-1");
    let page = ctx.page("/admin/orders/ORD-1").await;
    assert!(page.contains("Shipping fee for order ORD-1 set to $7.50."));
    assert_eq!(ctx.backend.order("ORD-1").unwrap()["shippingFee"], 7.5);

    ctx.post_form("/admin/orders/ORD-1/shipping-fee", &[("shipping_fee", "-1")])
        .await;
    assert!(ctx.page("/admin/orders/ORD-1").await.contains("Invalid shipping fee"));
}

#[tokio::test]
async fn test_admin_product_stats() {
    let ctx = TestContext::new().await;
    ctx.login(ADMIN_TOKEN).await;

    let page = ctx.page("/admin/products").await;
    assert!(page.contains("$1165.00"));
    assert!(page.contains("Wool Sock"));

    let filtered = ctx.page("/admin/products?category=Outerwear").await;
    assert!(filtered.contains("Rain Shell"));
    assert!(!filtered.contains("/admin/products/1/edit"));
}

#[tokio::test]
async fn test_admin_creates_and_deletes_products() {
    let ctx = TestContext::new().await;
    ctx.login(ADMIN_TOKEN).await;

    let resp = ctx
        .post_form(
            "/admin/products",
            &[("name", ""), ("category", "Hats"), ("price", "abc"), ("stock", "2")],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Name is required."));
    assert_eq!(ctx.backend.with_state(|s| s.products.len()), 3);

    let resp = ctx
        .post_form(
            "/admin/products",
            &[
                ("name", "Beanie"),
                ("category", "Hats"),
                ("price", "19.99"),
                ("stock", "4"),
                ("description", "Warm."),
                ("image", "https://cdn.test/beanie.jpg"),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/admin/products");
    assert!(ctx.page("/admin/products").await.contains("Product created."));
    let beanie = ctx.backend.product("101").unwrap();
    assert_eq!(beanie["name"], "Beanie");
    assert_eq!(beanie["imageUrl"], "https://cdn.test/beanie.jpg");

    let resp = ctx
        .post_form(
            "/admin/products/101",
            &[("name", "Beanie"), ("category", "Hats"), ("price", "17"), ("stock", "9")],
        )
        .await;
    assert_eq!(location(&resp), "/admin/products");
    assert_eq!(ctx.backend.product("101").unwrap()["stock"], 9);

    let resp = ctx.post_form("/admin/products/101/delete", &[]).await;
    assert_eq!(location(&resp), "/admin/products");
    assert!(ctx.page("/admin/products").await.contains("Product deleted."));
    assert!(ctx.backend.product("101").is_none());
}

#[tokio::test]
async fn test_customer_cannot_post_admin_forms() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;

    let resp = ctx
        .post_form("/admin/orders/ORD-1/status", &[("status", "DELIVERED")])
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.backend.order("ORD-1").unwrap()["status"], "PROCESSING");
}

#[tokio::test]
async fn test_missing_order_keeps_pending_notice() {
    let ctx = TestContext::new().await;
    ctx.login(ADMIN_TOKEN).await;
    ctx.post_form("/admin/orders/ORD-1/status", &[("status", "PAID")])
        .await;

    assert_eq!(
        ctx.get("/admin/orders/ORD-404").await.status(),
        StatusCode::NOT_FOUND
    );
    assert!(ctx.page("/admin/orders/ORD-1").await.contains("Order ORD-1 is now"));
}
