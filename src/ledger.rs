//! Stock movement ledger.
//!
//! Movements are append-only. Stock levels are never stored; they are summed
//! from the ledger on every read, so a store's inventory for a product is
//! always `Σ in − Σ (out + manual)` over its movements.

use serde_json::{json, Value};
use sqlx::{SqliteConnection, SqlitePool};

use crate::audit::{AuditSink, NewAuditEntry};
use crate::catalog::{product_not_found, store_not_found};
use crate::db::{self, current_epoch_ms};
use crate::error::InventoryError;
use crate::events::{EventPublisher, StockUpdateEvent};
use crate::models::{InventoryItem, MovementType, RecordMovementRequest, StockMovement};

/// Actor recorded in the audit trail when no user is attached to the call.
pub const SYSTEM_ACTOR: &str = "system";

/// Largest quantity a single movement may carry.
pub const MAX_QUANTITY: i64 = i32::MAX as i64;

/// A validated movement, ready to be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMovement {
    pub store_id: i64,
    pub product_id: i64,
    pub movement_type: MovementType,
    pub quantity: i64,
}

fn invalid_type() -> InventoryError {
    let names: Vec<&str> = MovementType::ALL.iter().map(|t| t.as_str()).collect();
    InventoryError::Validation(format!("Invalid type. Must be one of: {}", names.join(", ")))
}

fn invalid_quantity() -> InventoryError {
    InventoryError::Validation("Quantity must be a positive integer.".to_string())
}

fn parse_quantity(value: Option<&Value>) -> Result<i64, InventoryError> {
    match value.and_then(Value::as_i64) {
        Some(q) if (1..=MAX_QUANTITY).contains(&q) => Ok(q),
        _ => Err(invalid_quantity()),
    }
}

fn parse_product_id(value: Option<&Value>) -> Result<i64, InventoryError> {
    let id = match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| InventoryError::Validation("productId must be an integer.".to_string()))
}

impl NewMovement {
    /// Validate a request body. Type is checked before quantity, and both
    /// before the product id.
    pub fn from_request(
        store_id: i64,
        req: &RecordMovementRequest,
    ) -> Result<Self, InventoryError> {
        let movement_type = req
            .movement_type
            .as_deref()
            .and_then(MovementType::parse)
            .ok_or_else(invalid_type)?;
        let quantity = parse_quantity(req.quantity.as_ref())?;
        let product_id = parse_product_id(req.product_id.as_ref())?;

        Ok(NewMovement {
            store_id,
            product_id,
            movement_type,
            quantity,
        })
    }
}

async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: &NewMovement,
) -> Result<StockMovement, sqlx::Error> {
    sqlx::query_as::<_, StockMovement>(
        r#"
        INSERT INTO stock_movements (store_id, product_id, type, quantity, created_at_ms)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, store_id, product_id, type, quantity, created_at_ms
        "#,
    )
    .bind(movement.store_id)
    .bind(movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(current_epoch_ms())
    .fetch_one(conn)
    .await
}

/// Record a movement and its audit entry in one transaction, then publish a
/// stock update event.
///
/// Fails with `NotFound` if the store or product is missing (store first).
/// If the audit write fails nothing is persisted. A publish failure is logged
/// and does not affect the result.
pub async fn record_movement(
    pool: &SqlitePool,
    audit: &dyn AuditSink,
    events: &dyn EventPublisher,
    actor: &str,
    movement: NewMovement,
) -> Result<StockMovement, InventoryError> {
    if !(1..=MAX_QUANTITY).contains(&movement.quantity) {
        return Err(invalid_quantity());
    }

    let mut tx = pool.begin().await?;

    if db::find_store(&mut *tx, movement.store_id).await?.is_none() {
        return Err(store_not_found(movement.store_id));
    }
    if db::find_product(&mut *tx, movement.product_id)
        .await?
        .is_none()
    {
        return Err(product_not_found(movement.product_id));
    }

    let recorded = insert_movement(&mut *tx, &movement).await.map_err(|e| {
        if db::is_constraint_violation(&e) {
            InventoryError::Validation(format!("Invalid stock movement: {}", e))
        } else {
            e.into()
        }
    })?;

    let entry = NewAuditEntry {
        user_id: actor.to_string(),
        action_type: format!("STOCK_{}", recorded.movement_type.as_str().to_uppercase()),
        entity_type: "StockMovement",
        entity_id: recorded.id.to_string(),
        details: json!({
            "storeId": recorded.store_id,
            "productId": recorded.product_id,
            "quantity": recorded.quantity,
        }),
    };
    audit.record(&mut *tx, &entry).await?;

    tx.commit().await?;

    tracing::info!(
        movement_id = recorded.id,
        store_id = recorded.store_id,
        product_id = recorded.product_id,
        movement_type = %recorded.movement_type,
        quantity = recorded.quantity,
        "Stock movement recorded"
    );

    let event = StockUpdateEvent {
        movement_id: recorded.id,
        store_id: recorded.store_id,
        product_id: recorded.product_id,
        movement_type: recorded.movement_type,
    };
    if let Err(e) = events.publish(&event).await {
        tracing::error!(movement_id = recorded.id, "Failed to queue stock update event: {}", e);
    }

    tracing::debug!(
        "[CACHE STUB] Invalidating cache for store inventory ID: {}",
        recorded.store_id
    );

    Ok(recorded)
}

#[derive(sqlx::FromRow)]
struct InventoryRow {
    product_id: i64,
    product_name: String,
    total_in: i64,
    total_out: i64,
}

/// Current stock of every product with a non-zero balance in the store,
/// ordered by product id. Negative balances are reported.
pub async fn get_inventory(
    pool: &SqlitePool,
    store_id: i64,
) -> Result<Vec<InventoryItem>, InventoryError> {
    tracing::debug!("[CACHE STUB] Cache MISS for store inventory ID: {}", store_id);

    if db::find_store(pool, store_id).await?.is_none() {
        return Err(store_not_found(store_id));
    }

    let rows = sqlx::query_as::<_, InventoryRow>(
        r#"
        SELECT
            m.product_id AS product_id,
            COALESCE(p.name, 'N/A') AS product_name,
            SUM(CASE WHEN m.type = 'in' THEN m.quantity ELSE 0 END) AS total_in,
            SUM(CASE WHEN m.type IN ('out', 'manual') THEN m.quantity ELSE 0 END) AS total_out
        FROM stock_movements m
        LEFT JOIN products p ON p.id = m.product_id
        WHERE m.store_id = ?
        GROUP BY m.product_id
        ORDER BY m.product_id ASC
        "#,
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    let inventory = rows
        .into_iter()
        .map(|row| InventoryItem {
            product_id: row.product_id,
            product_name: row.product_name,
            current_quantity: row.total_in - row.total_out,
        })
        .filter(|item| item.current_quantity != 0)
        .collect();

    Ok(inventory)
}
