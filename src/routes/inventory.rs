use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::error::InventoryError;
use crate::ledger::{self, NewMovement};
use crate::middleware::AuthenticatedUser;
use crate::models::{
    InventoryResponse, MovementPage, MovementQuery, RecordMovementRequest, RecordMovementResponse,
};
use crate::query;
use crate::routes::{json_body, path_id};
use crate::state::AppState;

/// POST /stores/{store_id}/stock-movements - Append a movement to the ledger.
pub async fn record_movement(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RecordMovementRequest>, JsonRejection>,
) -> Result<impl IntoResponse, InventoryError> {
    let store_id = path_id(path, "storeId")?;
    let req = json_body(payload)?;
    let movement = NewMovement::from_request(store_id, &req)?;
    let actor = user
        .as_ref()
        .map_or(ledger::SYSTEM_ACTOR, |Extension(AuthenticatedUser(name))| name.as_str());

    let movement = ledger::record_movement(
        &state.pool,
        state.audit.as_ref(),
        state.events.as_ref(),
        actor,
        movement,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(RecordMovementResponse {
            message: "Stock movement recorded successfully",
            movement,
        }),
    ))
}

/// GET /stores/{store_id}/inventory - Derived stock levels.
pub async fn get_inventory(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<InventoryResponse>, InventoryError> {
    let store_id = path_id(path, "storeId")?;
    let inventory = ledger::get_inventory(&state.pool, store_id).await?;

    Ok(Json(InventoryResponse {
        store_id,
        inventory,
    }))
}

/// GET /stock-movements - Filtered, paginated movement log.
pub async fn list_movements(
    State(state): State<AppState>,
    Query(params): Query<MovementQuery>,
) -> Result<Json<MovementPage>, InventoryError> {
    let filter = params.validate()?;
    Ok(Json(query::list_movements(&state.pool, &filter).await?))
}
