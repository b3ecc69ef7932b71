mod common;

use axum::http::{Method, StatusCode};
use rstest::rstest;
use sea_orm::ConnectionTrait;
use serde_json::{json, Value};

use common::{response_json, TestApp};

#[tokio::test]
async fn create_returns_record_without_description() {
    let app = TestApp::new().await;

    let created = app
        .create_product("Stussy 8-Ball Tee", "Cotton, Black, Size L")
        .await;

    assert!(created["id"].as_i64().is_some());
    assert_eq!(created["name"], "Stussy 8-Ball Tee");
    assert_eq!(created["attributes"], "Cotton, Black, Size L");
    assert!(created["description"].is_null());
    assert!(created["createdAt"].as_str().is_some());

    let other = app.create_product("Canvas Tote", "Natural, Heavyweight").await;
    assert_ne!(created["id"], other["id"]);
}

#[tokio::test]
async fn create_trims_surrounding_whitespace() {
    let app = TestApp::new().await;

    let created = app.create_product("  Beanie  ", " Wool, Grey ").await;

    assert_eq!(created["name"], "Beanie");
    assert_eq!(created["attributes"], "Wool, Grey");
}

#[rstest]
#[case::missing_name(json!({ "attributes": "Cotton" }))]
#[case::missing_attributes(json!({ "name": "Tee" }))]
#[case::blank_name(json!({ "name": "   ", "attributes": "Cotton" }))]
#[case::blank_attributes(json!({ "name": "Tee", "attributes": "" }))]
#[case::null_fields(json!({ "name": null, "attributes": null }))]
#[case::empty_object(json!({}))]
#[case::overlong_name(json!({ "name": "x".repeat(256), "attributes": "Cotton" }))]
#[case::wrong_type(json!({ "name": 42, "attributes": "Cotton" }))]
#[tokio::test]
async fn invalid_create_is_rejected_without_creating(#[case] payload: Value) {
    let app = TestApp::new().await;
    app.create_product("Existing", "Kept").await;

    let response = app
        .request(Method::POST, "/api/products", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));

    assert_eq!(app.list_products().await.len(), 1);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;

    let response = app
        .request_raw(Method::POST, "/api/products", "{\"name\": \"Tee\",")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.list_products().await.is_empty());
}

#[tokio::test]
async fn list_returns_newest_first() {
    let app = TestApp::new().await;
    let r1 = app.create_product("First", "a").await;
    let r2 = app.create_product("Second", "b").await;
    let r3 = app.create_product("Third", "c").await;

    let ids: Vec<Value> = app
        .list_products()
        .await
        .into_iter()
        .map(|p| p["id"].clone())
        .collect();

    assert_eq!(ids, vec![r3["id"].clone(), r2["id"].clone(), r1["id"].clone()]);
}

#[tokio::test]
async fn list_is_empty_array_when_no_products() {
    let app = TestApp::new().await;
    assert!(app.list_products().await.is_empty());
}

#[rstest]
#[case("/api/products/999")]
#[case("/api/products/not-a-number")]
#[tokio::test]
async fn get_unknown_id_is_not_found(#[case] uri: &str) {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, uri, None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Product not found");
}

#[tokio::test]
async fn fetched_record_round_trips_unchanged() {
    let app = TestApp::new().await;
    let created = app.create_product("Hoodie", "Fleece, Navy").await;
    let uri = format!("/api/products/{}", created["id"]);

    let first = response_json(app.request(Method::GET, &uri, None).await).await;
    let second = response_json(app.request(Method::GET, &uri, None).await).await;

    assert_eq!(first, created);
    assert_eq!(first, second);
}

#[tokio::test]
async fn update_sets_only_the_description() {
    let app = TestApp::new().await;
    let created = app.create_product("Cap", "Snapback, Red").await;
    let uri = format!("/api/products/{}", created["id"]);

    let response = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "description": "A bold red snapback." })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = response_json(response).await;

    assert_eq!(updated["description"], "A bold red snapback.");
    assert_eq!(updated["name"], created["name"]);
    assert_eq!(updated["attributes"], created["attributes"]);
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let fetched = response_json(app.request(Method::GET, &uri, None).await).await;
    assert_eq!(fetched, updated);
}

#[rstest]
#[case::absent(json!({}))]
#[case::null(json!({ "description": null }))]
#[tokio::test]
async fn update_without_description_clears_it(#[case] payload: Value) {
    let app = TestApp::new().await;
    let created = app.create_product("Cap", "Snapback, Red").await;
    let uri = format!("/api/products/{}", created["id"]);
    app.request(Method::PUT, &uri, Some(json!({ "description": "Old copy" })))
        .await;

    let response = app.request(Method::PUT, &uri, Some(payload)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response_json(response).await["description"].is_null());
}

#[tokio::test]
async fn update_unknown_id_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/products/12345",
            Some(json!({ "description": "Nothing to see" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(response).await["error"], "Product not found");
}

#[tokio::test]
async fn update_with_empty_body_on_unknown_id_is_not_found() {
    let app = TestApp::new().await;

    let response = app.request(Method::PUT, "/api/products/999", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response_json(response).await["error"], "Product not found");
}

#[tokio::test]
async fn update_with_empty_body_clears_the_description() {
    let app = TestApp::new().await;
    let created = app.create_product("Cap", "Snapback, Red").await;
    let uri = format!("/api/products/{}", created["id"]);
    app.request(Method::PUT, &uri, Some(json!({ "description": "Old copy" })))
        .await;

    let response = app.request(Method::PUT, &uri, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let updated = response_json(response).await;
    assert!(updated["description"].is_null());
    assert_eq!(updated["name"], created["name"]);
}

#[tokio::test]
async fn update_with_malformed_body_is_a_bad_request() {
    let app = TestApp::new().await;
    let created = app.create_product("Cap", "Snapback, Red").await;
    let uri = format!("/api/products/{}", created["id"]);

    let response = app.request_raw(Method::PUT, &uri, "{\"description\": ").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_removes_the_record() {
    let app = TestApp::new().await;
    let created = app.create_product("Socks", "Wool, 3-pack").await;
    let uri = format!("/api/products/{}", created["id"]);

    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Product deleted successfully");
    assert!(body.get("id").is_none());

    let response = app.request(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ids_are_not_reused_after_delete() {
    let app = TestApp::new().await;
    let first = app.create_product("One", "a").await;
    let second = app.create_product("Two", "b").await;
    app.request(
        Method::DELETE,
        &format!("/api/products/{}", second["id"]),
        None,
    )
    .await;

    let third = app.create_product("Three", "c").await;

    let id = |v: &Value| v["id"].as_i64().unwrap();
    assert!(id(&third) > id(&second));
    assert!(id(&second) > id(&first));
}

#[tokio::test]
async fn error_responses_carry_request_id_header_and_body() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/products/77", None).await;
    let header = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("request id header");

    let body = response_json(response).await;
    assert_eq!(body["request_id"], header.as_str());
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn health_and_metrics_endpoints_respond() {
    let app = TestApp::new().await;
    app.create_product("Scarf", "Silk").await;

    let response = app.request(Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "up");

    let response = app.request(Method::GET, "/health/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "ready");

    let response = app.request(Method::GET, "/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("products_created_total 1"));
    assert!(text.contains("# TYPE http_requests_total counter"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let doc = response_json(response).await;
    assert!(doc["paths"]["/api/products"].is_object());
}

#[tokio::test]
async fn store_failures_are_generic_server_errors() {
    let app = TestApp::new().await;
    let created = app.create_product("Scarf", "Silk").await;
    let uri = format!("/api/products/{}", created["id"]);
    app.state
        .db
        .execute_unprepared("DROP TABLE products")
        .await
        .unwrap();

    let requests = [
        (Method::GET, "/api/products".to_string(), None),
        (Method::GET, uri.clone(), None),
        (
            Method::POST,
            "/api/products".to_string(),
            Some(json!({ "name": "Tee", "attributes": "Cotton" })),
        ),
        (
            Method::PUT,
            uri.clone(),
            Some(json!({ "description": "New copy" })),
        ),
        (Method::DELETE, uri.clone(), None),
        (Method::POST, format!("{}/generate-description", uri), None),
    ];

    for (method, uri, body) in requests {
        let response = app.request(method.clone(), &uri, body).await;
        assert_eq!(
            response.status(),
            StatusCode::INTERNAL_SERVER_ERROR,
            "{method} {uri}"
        );
        let body = response_json(response).await;
        assert_eq!(body["error"], "Internal server error", "{method} {uri}");
    }
}
