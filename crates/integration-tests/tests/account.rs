//! Wishlist, cart, checkout and preferences for a signed-in shopper.

use axum::http::{Method, StatusCode};
use serde_json::json;
use shopsmarter_integration_tests::TestApp;

const PASSWORD: &str = "correct horse battery";

async fn signed_in() -> TestApp {
    let mut app = TestApp::with_catalog(None).await;
    app.signup("shopper", PASSWORD).await;
    app
}

#[tokio::test]
async fn test_anonymous_requests_are_rejected() {
    let mut app = TestApp::with_catalog(None).await;

    for path in ["/api/wishlist", "/api/cart", "/api/preferences"] {
        let response = app.get(path).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(response.json()["error"], "Authentication required");
    }

    let response = app
        .post_json("/api/cart", &json!({ "product_id": "1001" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.post_empty("/api/mock_checkout_process").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wishlist_add_list_remove() {
    let mut app = signed_in().await;

    let added = app
        .post_json("/api/wishlist", &json!({ "product_id": "1002" }))
        .await;
    assert_eq!(added.status, StatusCode::CREATED);

    let again = app
        .post_json("/api/wishlist", &json!({ "product_id": "1002" }))
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.json()["message"], "Product already in wishlist");

    // Numeric ids are accepted
    let numeric = app
        .post_json("/api/wishlist", &json!({ "product_id": 1003 }))
        .await;
    assert_eq!(numeric.status, StatusCode::CREATED);

    let listed = app.get("/api/wishlist").await.json();
    assert_eq!(listed["wishlist"], json!(["1002", "1003"]));
    assert_eq!(listed["products"][0]["name"], "Red Floral Dress");

    let status = app.get("/api/current_user_status").await.json();
    assert_eq!(status["user"]["wishlist"], json!(["1002", "1003"]));

    let removed = app
        .json(Method::DELETE, "/api/wishlist", &json!({ "product_id": "1002" }))
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let missing = app
        .json(Method::DELETE, "/api/wishlist", &json!({ "product_id": "1002" }))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let listed = app.get("/api/wishlist").await.json();
    assert_eq!(listed["wishlist"], json!(["1003"]));
}

#[tokio::test]
async fn test_wishlist_requires_product_id() {
    let mut app = signed_in().await;
    let response = app
        .post_json("/api/wishlist", &json!({ "product_id": "  " }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "Product ID is required");
}

#[tokio::test]
async fn test_cart_accumulates_and_totals() {
    let mut app = signed_in().await;

    let first = app
        .post_json("/api/cart", &json!({ "product_id": "1001" }))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["quantity"], 1);

    let second = app
        .post_json("/api/cart", &json!({ "product_id": "1001", "quantity": 1 }))
        .await;
    assert_eq!(second.json()["quantity"], 2);

    app.post_json("/api/cart", &json!({ "product_id": "1002" }))
        .await;

    let cart = app.get("/api/cart").await.json();
    assert_eq!(cart["item_count"], 3);
    assert_eq!(cart["total"], "179.48");
    assert_eq!(cart["items"][0]["product"]["name"], "Navy Linen Shirt");

    let status = app.get("/api/current_user_status").await.json();
    assert_eq!(
        status["user"]["cart"][0],
        json!({ "product_id": "1001", "quantity": 2 })
    );
}

#[tokio::test]
async fn test_cart_rejects_bad_quantity() {
    let mut app = signed_in().await;
    for quantity in [0, -3] {
        let response = app
            .post_json(
                "/api/cart",
                &json!({ "product_id": "1001", "quantity": quantity }),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json()["error"], "Quantity must be at least 1");
    }
}

#[tokio::test]
async fn test_cart_quantity_is_capped() {
    let mut app = signed_in().await;

    for _ in 0..2 {
        let response = app
            .post_json("/api/cart", &json!({ "product_id": "1001", "quantity": 999 }))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json()["quantity"], 999);
    }

    for quantity in [1000_i64, 4_294_967_295] {
        let response = app
            .post_json(
                "/api/cart",
                &json!({ "product_id": "1001", "quantity": quantity }),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json()["error"], "Quantity must be at most 999");
    }

    let cart = app.get("/api/cart").await;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.json()["item_count"], 999);

    let status = app.get("/api/current_user_status").await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.json()["user"]["cart"][0]["quantity"], 999);

    let order = app.post_empty("/api/mock_checkout_process").await;
    assert_eq!(order.status, StatusCode::OK);
}

#[tokio::test]
async fn test_writes_after_account_deleted() {
    let mut app = signed_in().await;
    sqlx::query("DELETE FROM users")
        .execute(&app.pool)
        .await
        .expect("delete users");

    for (path, body) in [
        ("/api/wishlist", json!({ "product_id": "1001" })),
        ("/api/cart", json!({ "product_id": "1001" })),
    ] {
        let response = app.post_json(path, &body).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(response.json()["error"], "Authentication required");
    }

    let response = app
        .json(Method::PUT, "/api/preferences", &json!({ "size": "M" }))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let status = app.get("/api/current_user_status").await.json();
    assert_eq!(status["logged_in"], false);
}

#[tokio::test]
async fn test_cart_remove() {
    let mut app = signed_in().await;
    app.post_json("/api/cart", &json!({ "product_id": "1001", "quantity": 4 }))
        .await;

    let removed = app
        .json(Method::DELETE, "/api/cart", &json!({ "product_id": "1001" }))
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let missing = app
        .json(Method::DELETE, "/api/cart", &json!({ "product_id": "1001" }))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let cart = app.get("/api/cart").await.json();
    assert_eq!(cart["items"], json!([]));
}

#[tokio::test]
async fn test_mock_checkout_clears_cart() {
    let mut app = signed_in().await;
    app.post_json("/api/cart", &json!({ "product_id": "1003", "quantity": 2 }))
        .await;
    // Unknown products are reported but not charged
    app.post_json("/api/cart", &json!({ "product_id": "9999" }))
        .await;

    let response = app.post_empty("/api/mock_checkout_process").await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["message"], "Checkout successful");
    assert_eq!(body["order"]["total"], "240.00");
    assert_eq!(body["order"]["missing_products"], json!(["9999"]));
    assert!(body["order"]["order_id"].is_string());

    let cart = app.get("/api/cart").await.json();
    assert_eq!(cart["items"], json!([]));

    let empty = app.post_empty("/api/mock_checkout_process").await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.json()["error"], "Cart is empty");
}

#[tokio::test]
async fn test_preferences_roundtrip() {
    let mut app = signed_in().await;

    let initial = app.get("/api/preferences").await.json();
    assert_eq!(initial["preferences"], json!({}));

    let prefs = json!({ "colors": ["navy", "red"], "size": "M" });
    let updated = app.json(Method::PUT, "/api/preferences", &prefs).await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["preferences"], prefs);

    let stored = app.get("/api/preferences").await.json();
    assert_eq!(stored["preferences"], prefs);

    let rejected = app
        .json(Method::PUT, "/api/preferences", &json!(["navy"]))
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.json()["error"], "Preferences must be a JSON object");
}

#[tokio::test]
async fn test_accounts_are_isolated() {
    let mut app = signed_in().await;
    app.post_json("/api/wishlist", &json!({ "product_id": "1001" }))
        .await;
    app.post_empty("/api/logout").await;

    app.signup("other", PASSWORD).await;
    let listed = app.get("/api/wishlist").await.json();
    assert_eq!(listed["wishlist"], json!([]));
}
