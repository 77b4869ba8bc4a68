use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::models::{Product, Store};

/// Get current time as milliseconds since Unix epoch.
pub fn current_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Initialize database connection pool with recommended pragmas.
///
/// In-memory databases live and die with their connection, so they get a
/// single connection that is never recycled.
pub async fn init_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections.max(1))
    };

    pool_options.connect_with(options).await
}

/// Run database migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(include_str!("../migrations/001_create_inventory.sql"))
        .execute(pool)
        .await?;
    Ok(())
}

/// True if the error is a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// True for any integrity constraint (unique, foreign key, check, not null).
pub fn is_constraint_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation()
                || matches!(db.kind(), sqlx::error::ErrorKind::NotNullViolation)
        }
        _ => false,
    }
}

pub async fn insert_product(pool: &SqlitePool, name: &str) -> Result<Product, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "INSERT INTO products (name, created_at_ms) VALUES (?, ?) RETURNING id, name, created_at_ms",
    )
    .bind(name)
    .bind(current_epoch_ms())
    .fetch_one(pool)
    .await
}

pub async fn list_products(pool: &SqlitePool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        "SELECT id, name, created_at_ms FROM products ORDER BY name ASC, id ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_product<'e, E>(executor: E, id: i64) -> Result<Option<Product>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Product>("SELECT id, name, created_at_ms FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_store(
    pool: &SqlitePool,
    name: &str,
    location: Option<&str>,
) -> Result<Store, sqlx::Error> {
    sqlx::query_as::<_, Store>(
        r#"
        INSERT INTO stores (name, location, created_at_ms)
        VALUES (?, ?, ?)
        RETURNING id, name, location, created_at_ms
        "#,
    )
    .bind(name)
    .bind(location)
    .bind(current_epoch_ms())
    .fetch_one(pool)
    .await
}

pub async fn list_stores(pool: &SqlitePool) -> Result<Vec<Store>, sqlx::Error> {
    sqlx::query_as::<_, Store>(
        "SELECT id, name, location, created_at_ms FROM stores ORDER BY name ASC, id ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn find_store<'e, E>(executor: E, id: i64) -> Result<Option<Store>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Store>(
        "SELECT id, name, location, created_at_ms FROM stores WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

#[cfg(test)]
pub(crate) async fn setup_test_db() -> SqlitePool {
    let pool = init_pool("sqlite::memory:", 1).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
