pub mod catalog;
pub mod inventory;

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::Path,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::InventoryError;
use crate::middleware::{basic_auth, rate_limit};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let request_timeout = state.request_timeout;

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        // Catalog
        .route(
            "/products",
            post(catalog::create_product).get(catalog::list_products),
        )
        .route("/products/{product_id}", get(catalog::get_product))
        .route(
            "/stores",
            post(catalog::create_store).get(catalog::list_stores),
        )
        .route("/stores/{store_id}", get(catalog::get_store))
        // Ledger
        .route(
            "/stores/{store_id}/stock-movements",
            post(inventory::record_movement),
        )
        .route("/stores/{store_id}/inventory", get(inventory::get_inventory))
        .route("/stock-movements", get(inventory::list_movements))
        // Innermost first: auth runs after the rate limiter.
        .layer(from_fn_with_state(state.clone(), basic_auth))
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unwrap a JSON body, reporting malformed input as a validation error.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, InventoryError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| InventoryError::Validation(rejection.body_text()))
}

/// Unwrap an integer path id.
pub(crate) fn path_id(
    path: Result<Path<i64>, PathRejection>,
    name: &str,
) -> Result<i64, InventoryError> {
    path.map(|Path(id)| id)
        .map_err(|_| InventoryError::Validation(format!("{} must be an integer.", name)))
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Welcome to Bazaar API",
        "endpoints": {
            "products": "/products",
            "stores": "/stores",
            "inventory": "/stores/:storeId/inventory",
            "stockMovements": "/stores/:storeId/stock-movements",
            "movementLog": "/stock-movements",
        }
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
