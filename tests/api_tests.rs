use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use base64::Engine;
use http_body_util::BodyExt;
use tower::ServiceExt;

use bazaar::events::{EventPublisher, PublishError, StockUpdateEvent};
use bazaar::{create_router, init_pool, run_migrations, AppState, Config};

const USER: &str = "admin";
const PASS: &str = "password";

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        rate_limit_max: 1000,
        ..Config::default()
    }
}

async fn create_test_state(config: &Config) -> AppState {
    let pool = init_pool(&config.database_url, 1).await.unwrap();
    run_migrations(&pool).await.unwrap();
    AppState::new(pool, config)
}

/// Create a test app with in-memory database.
async fn create_test_app() -> axum::Router {
    let config = test_config();
    create_router(create_test_state(&config).await)
}

fn basic(user: &str, pass: &str) -> String {
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass))
    )
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, basic(USER, PASS))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, basic(USER, PASS))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Helper to get response body as JSON.
async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Send a request and return status plus JSON body.
async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response.into_body()).await)
}

async fn create_store(app: &axum::Router, name: &str) -> i64 {
    let (status, json) = send(app, post_json("/stores", serde_json::json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    json["store"]["id"].as_i64().unwrap()
}

async fn create_product(app: &axum::Router, name: &str) -> i64 {
    let request = post_json("/products", serde_json::json!({ "name": name }));
    let (status, json) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    json["product"]["id"].as_i64().unwrap()
}

async fn record(
    app: &axum::Router,
    store_id: i64,
    product_id: i64,
    kind: &str,
    quantity: i64,
) -> (StatusCode, serde_json::Value) {
    send(
        app,
        post_json(
            &format!("/stores/{}/stock-movements", store_id),
            serde_json::json!({ "productId": product_id, "type": kind, "quantity": quantity }),
        ),
    )
    .await
}

// ============================================================================
// Health, index and auth tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_needs_no_credentials() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_index_lists_endpoints() {
    let app = create_test_app().await;

    let (status, json) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["endpoints"]["products"], "/products");
}

#[tokio::test]
async fn test_missing_credentials_challenged() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/products")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Basic realm=\"Restricted Area\""
    );
    let json = body_json(response.into_body()).await;
    assert_eq!(json["error"], "Authentication required.");
}

#[tokio::test]
async fn test_wrong_credentials_rejected() {
    let app = create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/products")
                .header(header::AUTHORIZATION, basic(USER, "wrong"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    let json = body_json(response.into_body()).await;
    assert_eq!(json["error"], "Invalid credentials.");
}

#[tokio::test]
async fn test_rate_limit_applies_before_auth() {
    let config = Config {
        rate_limit_max: 2,
        rate_limit_window: Duration::from_secs(60),
        ..test_config()
    };
    let app = create_router(create_test_state(&config).await);

    let (status, _) = send(&app, get("/products")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, get("/stores")).await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/products")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
}

// ============================================================================
// Product and store tests
// ============================================================================

#[tokio::test]
async fn test_create_and_list_products() {
    let app = create_test_app().await;

    let request = post_json("/products", serde_json::json!({ "name": "Widget" }));
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "Product added successfully");
    assert_eq!(json["product"]["name"], "Widget");
    assert!(json["product"]["createdAt"].is_string());

    create_product(&app, "Anvil").await;

    let (status, json) = send(&app, get("/products")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Anvil", "Widget"]);
}

#[tokio::test]
async fn test_create_product_missing_name() {
    let app = create_test_app().await;

    let (status, json) = send(&app, post_json("/products", serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Product name is required.");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = create_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/products")
        .header(header::AUTHORIZATION, basic(USER, PASS))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_duplicate_names_conflict() {
    let app = create_test_app().await;

    let store_id = create_store(&app, "A").await;
    let (status, json) = send(
        &app,
        post_json("/stores", serde_json::json!({ "name": "A", "location": "Elsewhere" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "Store name already exists.");

    let (status, json) = send(&app, get(&format!("/stores/{}", store_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["location"].is_null());

    create_product(&app, "Widget").await;
    let request = post_json("/products", serde_json::json!({ "name": "Widget" }));
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, json) = send(&app, get("/products")).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_by_id() {
    let app = create_test_app().await;
    let product_id = create_product(&app, "Widget").await;

    let (status, json) = send(&app, get(&format!("/products/{}", product_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Widget");

    let (status, json) = send(&app, get("/products/404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Product with ID 404 not found.");

    let (status, _) = send(&app, get("/stores/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Stock movement and inventory tests
// ============================================================================

#[tokio::test]
async fn test_record_movement_and_inventory() {
    let app = create_test_app().await;
    let store_id = create_store(&app, "A").await;
    let product_id = create_product(&app, "Widget").await;

    let (status, json) = record(&app, store_id, product_id, "in", 10).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "Stock movement recorded successfully");
    assert_eq!(json["movement"]["type"], "in");
    assert_eq!(json["movement"]["quantity"], 10);
    assert_eq!(json["movement"]["storeId"], store_id);

    let (status, _) = record(&app, store_id, product_id, "out", 3).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(&app, get(&format!("/stores/{}/inventory", store_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["storeId"], store_id);
    assert_eq!(
        json["inventory"],
        serde_json::json!([
            { "productId": product_id, "productName": "Widget", "currentQuantity": 7 }
        ])
    );
}

#[tokio::test]
async fn test_net_zero_product_omitted() {
    let app = create_test_app().await;
    let store_id = create_store(&app, "A").await;
    let product_id = create_product(&app, "Widget").await;

    record(&app, store_id, product_id, "in", 5).await;
    record(&app, store_id, product_id, "out", 5).await;

    let (_, json) = send(&app, get(&format!("/stores/{}/inventory", store_id))).await;
    assert_eq!(json["inventory"], serde_json::json!([]));
}

#[tokio::test]
async fn test_record_movement_validation_order() {
    let app = create_test_app().await;
    let store_id = create_store(&app, "A").await;
    let product_id = create_product(&app, "Widget").await;

    // Invalid type wins over an invalid quantity and a missing store
    let (status, json) = record(&app, 999, product_id, "transfer", 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid type. Must be one of: in, out, manual");

    let (status, json) = record(&app, 999, product_id, "in", 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Quantity must be a positive integer.");

    let (status, json) = send(
        &app,
        post_json(
            &format!("/stores/{}/stock-movements", store_id),
            serde_json::json!({ "productId": product_id, "type": "in", "quantity": "7" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Quantity must be a positive integer.");

    let (status, json) = record(&app, 999, 998, "in", 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Store with ID 999 not found.");

    let (status, json) = record(&app, store_id, 998, "in", 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Product with ID 998 not found.");

    let (_, json) = send(&app, get("/stock-movements")).await;
    assert_eq!(json["totalItems"], 0);
}

#[tokio::test]
async fn test_inventory_unknown_store() {
    let app = create_test_app().await;

    let (status, json) = send(&app, get("/stores/12/inventory")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Store with ID 12 not found.");
}

#[tokio::test]
async fn test_out_of_range_path_id_is_bad_request() {
    let app = create_test_app().await;

    let (status, json) = send(&app, get("/stores/99999999999999999999/inventory")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "storeId must be an integer.");

    let (status, _) = send(&app, get("/products/99999999999999999999")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_quantity_upper_bound() {
    let app = create_test_app().await;
    let store_id = create_store(&app, "A").await;
    let product_id = create_product(&app, "Widget").await;

    let largest = i64::from(i32::MAX);
    let (status, json) = record(&app, store_id, product_id, "in", largest + 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Quantity must be a positive integer.");

    let (status, _) = record(&app, store_id, product_id, "in", i64::MAX).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for _ in 0..2 {
        let (status, _) = record(&app, store_id, product_id, "in", largest).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send(&app, get(&format!("/stores/{}/inventory", store_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["inventory"][0]["currentQuantity"], 2 * largest);
}

struct CollectingPublisher {
    events: Mutex<Vec<StockUpdateEvent>>,
}

#[async_trait]
impl EventPublisher for CollectingPublisher {
    async fn publish(&self, event: &StockUpdateEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_movement_audited_as_authenticated_user_and_published() {
    let config = test_config();
    let publisher = Arc::new(CollectingPublisher {
        events: Mutex::new(Vec::new()),
    });
    let state = create_test_state(&config)
        .await
        .with_publisher(publisher.clone());
    let pool = state.pool.clone();
    let app = create_router(state);

    let store_id = create_store(&app, "A").await;
    let product_id = create_product(&app, "Widget").await;
    let (_, json) = record(&app, store_id, product_id, "manual", 2).await;
    let movement_id = json["movement"]["id"].as_i64().unwrap();

    let entries = bazaar::audit::entries_for(&pool, "StockMovement", &movement_id.to_string())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user_id.as_deref(), Some(USER));
    assert_eq!(entries[0].action_type, "STOCK_MANUAL");

    let events = publisher.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].movement_id, movement_id);
    assert_eq!(events[0].store_id, store_id);
}

// ============================================================================
// Movement listing tests
// ============================================================================

#[tokio::test]
async fn test_list_movements_pagination() {
    let app = create_test_app().await;
    let store_id = create_store(&app, "A").await;
    let product_id = create_product(&app, "Widget").await;

    let (_, first) = record(&app, store_id, product_id, "in", 1).await;
    let (_, second) = record(&app, store_id, product_id, "in", 2).await;

    let (status, page1) = send(&app, get("/stock-movements?limit=1&offset=0")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, page2) = send(&app, get("/stock-movements?limit=1&offset=1")).await;

    assert_eq!(page1["totalItems"], 2);
    assert_eq!(page1["totalPages"], 2);
    assert_eq!(page1["currentPage"], 1);
    assert_eq!(page2["currentPage"], 2);

    assert_eq!(page1["movements"][0]["id"], second["movement"]["id"]);
    assert_eq!(page2["movements"][0]["id"], first["movement"]["id"]);
    assert_eq!(page1["movements"][0]["product"]["name"], "Widget");
    assert_eq!(page1["movements"][0]["store"]["name"], "A");
}

#[tokio::test]
async fn test_list_movements_filters() {
    let app = create_test_app().await;
    let a = create_store(&app, "A").await;
    let b = create_store(&app, "B").await;
    let widget = create_product(&app, "Widget").await;

    record(&app, a, widget, "in", 1).await;
    record(&app, b, widget, "in", 2).await;

    let (_, json) = send(&app, get(&format!("/stock-movements?storeId={}", b))).await;
    assert_eq!(json["totalItems"], 1);
    assert_eq!(json["movements"][0]["quantity"], 2);

    let (_, json) = send(&app, get("/stock-movements?startDate=2100-01-01")).await;
    assert_eq!(json["totalItems"], 0);

    let (_, json) = send(&app, get("/stock-movements?endDate=2100-01-01T00:00:00Z")).await;
    assert_eq!(json["totalItems"], 2);
}

#[tokio::test]
async fn test_list_movements_validation_errors() {
    let app = create_test_app().await;

    let (status, json) = send(
        &app,
        get("/stock-movements?limit=500&offset=-2&storeId=abc&startDate=nope"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = json["errors"].as_array().unwrap();
    let fields: Vec<&str> = errors.iter().map(|e| e["field"].as_str().unwrap()).collect();
    assert_eq!(fields, vec!["limit", "offset", "storeId", "startDate"]);
    assert_eq!(errors[0]["value"], "500");
    assert_eq!(errors[0]["message"], "Limit must be an integer between 1 and 100");
}

#[tokio::test]
async fn test_list_movements_huge_offset() {
    let app = create_test_app().await;
    let store_id = create_store(&app, "A").await;
    let product_id = create_product(&app, "Widget").await;
    record(&app, store_id, product_id, "in", 1).await;

    let uri = format!("/stock-movements?limit=1&offset={}", i64::MAX);
    let (status, json) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalItems"], 1);
    assert_eq!(json["currentPage"], i64::MAX);
    assert_eq!(json["movements"], serde_json::json!([]));
}
