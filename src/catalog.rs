//! Products and stores: create, list and look up.

use sqlx::SqlitePool;

use crate::db;
use crate::error::InventoryError;
use crate::models::{Product, Store};

fn required_name<'a>(name: Option<&'a str>, what: &str) -> Result<&'a str, InventoryError> {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => Ok(n),
        _ => Err(InventoryError::Validation(format!("{} name is required.", what))),
    }
}

pub async fn create_product(
    pool: &SqlitePool,
    name: Option<&str>,
) -> Result<Product, InventoryError> {
    let name = required_name(name, "Product")?;

    match db::insert_product(pool, name).await {
        Ok(product) => {
            tracing::debug!("[CACHE STUB] Invalidating cache for all products list");
            Ok(product)
        }
        Err(e) if db::is_unique_violation(&e) => Err(InventoryError::Conflict(
            "Product name already exists.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_products(pool: &SqlitePool) -> Result<Vec<Product>, InventoryError> {
    Ok(db::list_products(pool).await?)
}

pub async fn get_product(pool: &SqlitePool, id: i64) -> Result<Product, InventoryError> {
    db::find_product(pool, id)
        .await?
        .ok_or_else(|| product_not_found(id))
}

pub async fn create_store(
    pool: &SqlitePool,
    name: Option<&str>,
    location: Option<&str>,
) -> Result<Store, InventoryError> {
    let name = required_name(name, "Store")?;
    let location = location.map(str::trim).filter(|l| !l.is_empty());

    match db::insert_store(pool, name, location).await {
        Ok(store) => {
            tracing::debug!("[CACHE STUB] Invalidating cache for all stores list");
            Ok(store)
        }
        Err(e) if db::is_unique_violation(&e) => Err(InventoryError::Conflict(
            "Store name already exists.".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_stores(pool: &SqlitePool) -> Result<Vec<Store>, InventoryError> {
    Ok(db::list_stores(pool).await?)
}

pub async fn get_store(pool: &SqlitePool, id: i64) -> Result<Store, InventoryError> {
    db::find_store(pool, id).await?.ok_or_else(|| store_not_found(id))
}

pub(crate) fn store_not_found(id: i64) -> InventoryError {
    InventoryError::NotFound(format!("Store with ID {} not found.", id))
}

pub(crate) fn product_not_found(id: i64) -> InventoryError {
    InventoryError::NotFound(format!("Product with ID {} not found.", id))
}
