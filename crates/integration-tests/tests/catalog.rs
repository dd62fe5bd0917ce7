//! Catalog reads and admin-only writes.

use axum::http::{Method, StatusCode};
use serde_json::json;

use cartwheel_integration_tests::{ASSET_BASE_URL, TestApp};

#[tokio::test]
async fn test_non_admin_cannot_mutate_items() {
    let app = TestApp::new();
    let admin = app.create_admin("root").await;
    let user = app.register("alice").await;
    let item = app.create_item(&admin, "Lamp", 1_999, 3, &[]).await;
    let uri = format!("/api/items/{}", item["id"]);

    let create = app
        .post(
            "/api/items",
            Some(&user.token),
            json!({ "item_name": "Chair", "price": 100, "stock": 1 }),
        )
        .await;
    let update = app
        .request(
            Method::PUT,
            &uri,
            Some(&user.token),
            Some(json!({ "item_name": "Lamp", "price": 1, "stock": 3 })),
        )
        .await;
    let delete = app.request(Method::DELETE, &uri, Some(&user.token), None).await;

    assert_eq!(create.status, StatusCode::FORBIDDEN);
    assert_eq!(update.status, StatusCode::FORBIDDEN);
    assert_eq!(delete.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get(&uri, Some(&user.token)).await.body["price"], 1_999);
}

#[tokio::test]
async fn test_create_item_resolves_image_urls() {
    let app = TestApp::new();
    let admin = app.create_admin("root").await;

    let item = app
        .create_item(&admin, "Lamp", 1_999, 3, &["uploads/lamp.png", "/uploads/lamp-2.png"])
        .await;

    assert_eq!(item["item_name"], "Lamp");
    assert_eq!(item["desc"], "Lamp description");
    assert_eq!(item["created_by"], json!(admin.user_id));
    let urls: Vec<&str> = item["images"]
        .as_array()
        .map(|images| images.iter().filter_map(|i| i["image_url"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(
        urls,
        [
            format!("{ASSET_BASE_URL}uploads/lamp.png"),
            format!("{ASSET_BASE_URL}uploads/lamp-2.png"),
        ]
    );
}

#[tokio::test]
async fn test_list_items_in_creation_order() {
    let app = TestApp::new();
    let admin = app.create_admin("root").await;
    let user = app.register("alice").await;
    for name in ["First", "Second", "Third"] {
        app.create_item(&admin, name, 100, 1, &[]).await;
    }

    let response = app.get("/api/items", Some(&user.token)).await;

    assert_eq!(response.status, StatusCode::OK);
    let names: Vec<&str> = response
        .body
        .as_array()
        .map(|items| items.iter().filter_map(|i| i["item_name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(names, ["First", "Second", "Third"]);
}

#[tokio::test]
async fn test_update_and_delete_item() {
    let app = TestApp::new();
    let admin = app.create_admin("root").await;
    let item = app.create_item(&admin, "Lamp", 1_999, 3, &["uploads/lamp.png"]).await;
    let uri = format!("/api/items/{}", item["id"]);

    let updated = app
        .request(
            Method::PUT,
            &uri,
            Some(&admin.token),
            Some(json!({ "item_name": "Desk lamp", "desc": "brass", "price": 2_499, "stock": 9 })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["item_name"], "Desk lamp");
    assert_eq!(updated.body["stock"], 9);
    assert_eq!(updated.body["images"].as_array().map(Vec::len), Some(1));

    let deleted = app.request(Method::DELETE, &uri, Some(&admin.token), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, Some(&admin.token)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_item_rejected() {
    let app = TestApp::new();
    let admin = app.create_admin("root").await;

    let response = app
        .post(
            "/api/items",
            Some(&admin.token),
            json!({ "item_name": "Lamp", "price": -5, "stock": 1 }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_item_not_found() {
    let app = TestApp::new();
    let admin = app.create_admin("root").await;

    let response = app.get("/api/items/424242", Some(&admin.token)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app
        .request(Method::DELETE, "/api/items/424242", Some(&admin.token), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_item_in_cart_cannot_be_deleted() {
    let app = TestApp::new();
    let admin = app.create_admin("root").await;
    let user = app.register("alice").await;
    let item = app.create_item(&admin, "Lamp", 1_999, 3, &[]).await;
    let cart = app
        .post(
            "/api/carts",
            Some(&user.token),
            json!({ "items": [{ "item_id": item["id"], "quantity": 1 }], "payment_method": "card" }),
        )
        .await;
    assert_eq!(cart.status, StatusCode::CREATED);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/items/{}", item["id"]),
            Some(&admin.token),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}
