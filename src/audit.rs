//! Audit trail for ledger writes.
//!
//! An [`AuditSink`] is handed the connection of the transaction that is
//! recording the audited change. If it fails, the caller rolls the whole
//! transaction back, so an audited row never exists without its entry.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::current_epoch_ms;
use crate::models::AuditLog;

/// Audit entry before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: String,
    pub action_type: String,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub details: Value,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Write one entry using the caller's transaction.
    async fn record(
        &self,
        conn: &mut SqliteConnection,
        entry: &NewAuditEntry,
    ) -> Result<(), sqlx::Error>;
}

/// Stores entries in the `audit_logs` table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlAuditLog;

#[async_trait]
impl AuditSink for SqlAuditLog {
    async fn record(
        &self,
        conn: &mut SqliteConnection,
        entry: &NewAuditEntry,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action_type, entity_type, entity_id, details, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.user_id)
        .bind(&entry.action_type)
        .bind(entry.entity_type)
        .bind(&entry.entity_id)
        .bind(entry.details.to_string())
        .bind(current_epoch_ms())
        .execute(conn)
        .await?;

        tracing::info!(
            details = %entry.details,
            "[AUDIT] User {} performed {} on {} {}",
            entry.user_id,
            entry.action_type,
            entry.entity_type,
            entry.entity_id
        );
        Ok(())
    }
}

/// Audit entries recorded for one entity, oldest first.
pub async fn entries_for(
    pool: &SqlitePool,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(
        r#"
        SELECT id, user_id, action_type, entity_type, entity_id, details, created_at_ms
        FROM audit_logs
        WHERE entity_type = ? AND entity_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(entity_type)
    .bind(entity_id)
    .fetch_all(pool)
    .await
}
