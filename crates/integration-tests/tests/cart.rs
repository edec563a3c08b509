//! Cart mutations against live stock.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use modernstore_integration_tests::{CUSTOMER_TOKEN, TestContext, location};
use reqwest::StatusCode;

fn badge(html: &str) -> Option<&str> {
    let start = html.find("id=\"cart-count\"")?;
    let rest = &html[start..];
    let open = rest.find('>')? + 1;
    let close = rest[open..].find('<')?;
    Some(rest[open..open + close].trim())
}

#[tokio::test]
async fn test_add_to_cart_updates_badge() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;
    assert_eq!(badge(&ctx.page("/").await), Some("0"));

    let resp = ctx
        .post_form("/cart/add", &[("product_id", "1"), ("quantity", "2")])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/products/1");

    let page = ctx.page("/products/1").await;
    assert!(page.contains("2 x Trail Shoe has been added to your cart."));
    assert_eq!(badge(&page), Some("1"));

    let fragment = ctx.page("/cart/count").await;
    assert_eq!(badge(&fragment), Some("1"));

    let cart = ctx.backend.cart("u1");
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0]["quantity"], 2);
    assert_eq!(cart[0]["name"], "Trail Shoe");
}

#[tokio::test]
async fn test_buy_now_goes_to_checkout() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;

    let resp = ctx
        .post_form(
            "/cart/add",
            &[("product_id", "2"), ("quantity", "1"), ("buy_now", "1")],
        )
        .await;
    assert_eq!(location(&resp), "/checkout");
}

#[tokio::test]
async fn test_quantity_above_stock_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;

    let resp = ctx
        .post_form("/cart/add", &[("product_id", "1"), ("quantity", "4")])
        .await;
    assert_eq!(location(&resp), "/products/1");
    assert!(ctx.page("/products/1").await.contains("Only 3 items available."));
    assert!(ctx.backend.cart("u1").is_empty());
}

#[tokio::test]
async fn test_out_of_stock_product_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;

    ctx.post_form("/cart/add", &[("product_id", "3"), ("quantity", "1")])
        .await;
    assert!(ctx.page("/products/3").await.contains("This product is out of stock."));
    assert!(ctx.backend.cart("u1").is_empty());
}

#[tokio::test]
async fn test_update_quantity_and_remove() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;
    ctx.post_form("/cart/add", &[("product_id", "2"), ("quantity", "1")])
        .await;

    let resp = ctx
        .post_form("/cart/update", &[("product_id", "2"), ("quantity", "5")])
        .await;
    assert_eq!(location(&resp), "/cart");
    assert!(ctx.page("/cart").await.contains("Item quantity has been updated."));
    assert_eq!(ctx.backend.cart("u1")[0]["quantity"], 5);

    ctx.post_form("/cart/update", &[("product_id", "2"), ("quantity", "11")])
        .await;
    assert!(ctx.page("/cart").await.contains("Only 10 items available."));
    assert_eq!(ctx.backend.cart("u1")[0]["quantity"], 5);

    ctx.post_form("/cart/update", &[("product_id", "2"), ("quantity", "0")])
        .await;
    let page = ctx.page("/cart").await;
    assert!(page.contains("The item has been removed from your cart."));
    assert_eq!(badge(&page), Some("0"));
    assert!(ctx.backend.cart("u1").is_empty());
}

#[tokio::test]
async fn test_cart_splits_out_of_stock_lines() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;
    ctx.post_form("/cart/add", &[("product_id", "1"), ("quantity", "1")])
        .await;
    ctx.backend.with_state(|s| s.products[0]["stock"] = 0.into());

    let page = ctx.page("/cart").await;
    assert!(page.contains("Trail Shoe"));
    assert!(page.contains("This item is currently out of stock."));
    assert!(!page.contains("href=\"/checkout\""));
}

#[tokio::test]
async fn test_scroll_fragment_keeps_pending_notice() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;
    ctx.post_form("/cart/add", &[("product_id", "1"), ("quantity", "1")])
        .await;

    let resp = ctx
        .client
        .get(ctx.url("/products?page=2"))
        .header("HX-Request", "true")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let page = ctx.page("/products/1").await;
    assert!(page.contains("1 x Trail Shoe has been added to your cart."));
}
