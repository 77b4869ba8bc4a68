use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Render an epoch-milliseconds column as an RFC 3339 timestamp.
fn serialize_epoch_ms<S: Serializer>(ms: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    match DateTime::<Utc>::from_timestamp_millis(*ms) {
        Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
        None => serializer.serialize_i64(*ms),
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(rename = "createdAt", serialize_with = "serialize_epoch_ms")]
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    #[serde(rename = "createdAt", serialize_with = "serialize_epoch_ms")]
    pub created_at_ms: i64,
}

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MovementType {
    In,
    Out,
    Manual,
}

impl MovementType {
    pub const ALL: [MovementType; 3] = [MovementType::In, MovementType::Out, MovementType::Manual];

    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry (append-only).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: i64,
    pub store_id: i64,
    pub product_id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    #[serde(rename = "createdAt", serialize_with = "serialize_epoch_ms")]
    pub created_at_ms: i64,
}

/// Derived stock level for one product in one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub product_id: i64,
    pub product_name: String,
    pub current_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub id: i64,
    pub name: String,
}

/// A movement with its product and store attached for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementView {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub product: EntityRef,
    pub store: EntityRef,
}

/// One page of the movement ledger.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementPage {
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub movements: Vec<MovementView>,
}

/// Persisted audit trail row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: i64,
    pub user_id: Option<String>,
    pub action_type: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    #[serde(rename = "createdAt", serialize_with = "serialize_epoch_ms")]
    pub created_at_ms: i64,
}

/// Request to create a product.
#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: Option<String>,
}

/// Request to create a store.
#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: Option<String>,
    pub location: Option<String>,
}

/// Request to record a stock movement. Fields stay loosely typed so the
/// ledger can report them in a fixed validation order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovementRequest {
    pub product_id: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub movement_type: Option<String>,
    pub quantity: Option<serde_json::Value>,
}

/// Raw query parameters for the movement listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub store_id: Option<String>,
    pub product_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateProductResponse {
    pub message: &'static str,
    pub product: Product,
}

#[derive(Debug, Serialize)]
pub struct CreateStoreResponse {
    pub message: &'static str,
    pub store: Store,
}

#[derive(Debug, Serialize)]
pub struct RecordMovementResponse {
    pub message: &'static str,
    pub movement: StockMovement,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub store_id: i64,
    pub inventory: Vec<InventoryItem>,
}
