//! Bazaar - inventory tracking over an append-only stock movement ledger.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod query;
pub mod routes;
pub mod state;

pub use config::Config;
pub use db::{current_epoch_ms, init_pool, run_migrations};
pub use error::{FieldError, InventoryError};
pub use models::{InventoryItem, MovementType, Product, StockMovement, Store};
pub use routes::create_router;
pub use state::AppState;
