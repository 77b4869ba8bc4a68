use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::catalog;
use crate::error::InventoryError;
use crate::models::{
    CreateProductRequest, CreateProductResponse, CreateStoreRequest, CreateStoreResponse, Product,
    Store,
};
use crate::routes::{json_body, path_id};
use crate::state::AppState;

/// POST /products - Create a product.
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, InventoryError> {
    let req = json_body(payload)?;
    let product = catalog::create_product(&state.pool, req.name.as_deref()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateProductResponse {
            message: "Product added successfully",
            product,
        }),
    ))
}

/// GET /products - All products by name.
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, InventoryError> {
    Ok(Json(catalog::list_products(&state.pool).await?))
}

/// GET /products/{product_id}
pub async fn get_product(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Product>, InventoryError> {
    let id = path_id(path, "productId")?;
    Ok(Json(catalog::get_product(&state.pool, id).await?))
}

/// POST /stores - Create a store.
pub async fn create_store(
    State(state): State<AppState>,
    payload: Result<Json<CreateStoreRequest>, JsonRejection>,
) -> Result<impl IntoResponse, InventoryError> {
    let req = json_body(payload)?;
    let store =
        catalog::create_store(&state.pool, req.name.as_deref(), req.location.as_deref()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateStoreResponse {
            message: "Store added successfully",
            store,
        }),
    ))
}

/// GET /stores - All stores by name.
pub async fn list_stores(
    State(state): State<AppState>,
) -> Result<Json<Vec<Store>>, InventoryError> {
    Ok(Json(catalog::list_stores(&state.pool).await?))
}

/// GET /stores/{store_id}
pub async fn get_store(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Store>, InventoryError> {
    let id = path_id(path, "storeId")?;
    Ok(Json(catalog::get_store(&state.pool, id).await?))
}
