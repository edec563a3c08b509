//! Login, logout and route protection.

use modernstore_integration_tests::{ADMIN_TOKEN, CUSTOMER_TOKEN, TestContext, location};
use reqwest::StatusCode;

#[tokio::test]
async fn test_callback_signs_in_and_greets() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;

    let home = ctx.page("/").await;
    assert!(home.contains("Welcome back, Ada Lovelace!"));
    assert!(home.contains("/auth/logout"));
    assert!(!home.contains("Sign in with Discord"));
}

#[tokio::test]
async fn test_callback_without_token_goes_to_login_error() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/auth/discord/callback").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login-error");

    let page = ctx.page("/login-error").await;
    assert!(page.contains("Sign in with Discord"));
}

#[tokio::test]
async fn test_login_redirects_to_backend_oauth() {
    let ctx = TestContext::new().await;

    let resp = ctx.get("/auth/login").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("{}/api/auth/discord", ctx.backend.url));
}

#[tokio::test]
async fn test_cart_requires_login() {
    let ctx = TestContext::new().await;

    for path in ["/cart", "/checkout", "/profile", "/orders/ORD-1"] {
        let resp = ctx.get(path).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&resp), "/auth/login", "{path}");
    }
}

#[tokio::test]
async fn test_logout_forgets_token() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;
    assert_eq!(ctx.get("/cart").await.status(), StatusCode::OK);

    let resp = ctx.post_form("/auth/logout", &[]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let resp = ctx.get("/cart").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login");
}

#[tokio::test]
async fn test_revoked_token_restarts_login() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;
    ctx.backend.with_state(|s| s.tokens.clear());

    let resp = ctx.get("/cart").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login");
}

#[tokio::test]
async fn test_second_login_starts_with_clean_checkout() {
    let ctx = TestContext::new().await;
    ctx.login(CUSTOMER_TOKEN).await;
    ctx.post_form("/cart/add", &[("product_id", "2"), ("quantity", "1")])
        .await;
    let shipping = [
        ("first_name", "Ada"),
        ("last_name", "Lovelace"),
        ("email", "ada-private@example.com"),
        ("phone", "555-0100"),
        ("address", "1 Secret Way"),
        ("city", "London"),
        ("state", "LDN"),
        ("zip_code", "00001"),
        ("country", "United Kingdom"),
    ];
    let resp = ctx.post_form("/checkout/shipping", &shipping).await;
    assert_eq!(location(&resp), "/checkout/payment");

    ctx.login(ADMIN_TOKEN).await;
    let home = ctx.page("/").await;
    assert!(home.contains("hx-swap=\"outerHTML\">0</span>"));

    ctx.post_form("/cart/add", &[("product_id", "1"), ("quantity", "1")])
        .await;
    let form = ctx.page("/checkout").await;
    assert!(!form.contains("ada-private@example.com"));
    assert!(!form.contains("1 Secret Way"));
}
