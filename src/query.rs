//! Filtered, paginated reads over the movement ledger.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{FieldError, InventoryError};
use crate::models::{
    EntityRef, MovementPage, MovementQuery, MovementType, MovementView, StockMovement,
};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Validated listing filter. All bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementFilter {
    pub limit: i64,
    pub offset: i64,
    pub store_id: Option<i64>,
    pub product_id: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Default for MovementFilter {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            store_id: None,
            product_id: None,
            start_date: None,
            end_date: None,
        }
    }
}

/// Parse an ISO 8601 date or date-time. Values without an offset are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

struct FieldCheck {
    errors: Vec<FieldError>,
}

impl FieldCheck {
    fn int(
        &mut self,
        field: &'static str,
        raw: Option<&str>,
        accept: impl Fn(i64) -> bool,
        message: &'static str,
    ) -> Option<i64> {
        let raw = raw?;
        match raw.trim().parse::<i64>() {
            Ok(v) if accept(v) => Some(v),
            _ => {
                self.errors.push(FieldError {
                    field,
                    value: raw.to_string(),
                    message,
                });
                None
            }
        }
    }

    fn timestamp(
        &mut self,
        field: &'static str,
        raw: Option<&str>,
        message: &'static str,
    ) -> Option<DateTime<Utc>> {
        let raw = raw?;
        let parsed = parse_timestamp(raw);
        if parsed.is_none() {
            self.errors.push(FieldError {
                field,
                value: raw.to_string(),
                message,
            });
        }
        parsed
    }
}

impl MovementQuery {
    /// Check every parameter and report all failures together.
    pub fn validate(&self) -> Result<MovementFilter, InventoryError> {
        let mut check = FieldCheck { errors: Vec::new() };

        let limit = check.int(
            "limit",
            self.limit.as_deref(),
            |v| (1..=MAX_LIMIT).contains(&v),
            "Limit must be an integer between 1 and 100",
        );
        let offset = check.int(
            "offset",
            self.offset.as_deref(),
            |v| v >= 0,
            "Offset must be a non-negative integer",
        );
        let store_id = check.int(
            "storeId",
            self.store_id.as_deref(),
            |_| true,
            "storeId must be an integer",
        );
        let product_id = check.int(
            "productId",
            self.product_id.as_deref(),
            |_| true,
            "productId must be an integer",
        );
        let start_date = check.timestamp(
            "startDate",
            self.start_date.as_deref(),
            "startDate must be a valid ISO8601 date",
        );
        let end_date = check.timestamp(
            "endDate",
            self.end_date.as_deref(),
            "endDate must be a valid ISO8601 date",
        );

        if !check.errors.is_empty() {
            return Err(InventoryError::InvalidFields(check.errors));
        }

        Ok(MovementFilter {
            limit: limit.unwrap_or(DEFAULT_LIMIT),
            offset: offset.unwrap_or(0),
            store_id,
            product_id,
            start_date,
            end_date,
        })
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &MovementFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(store_id) = filter.store_id {
        builder.push(" AND m.store_id = ").push_bind(store_id);
    }
    if let Some(product_id) = filter.product_id {
        builder.push(" AND m.product_id = ").push_bind(product_id);
    }
    if let Some(start) = filter.start_date {
        builder
            .push(" AND m.created_at_ms >= ")
            .push_bind(start.timestamp_millis());
    }
    if let Some(end) = filter.end_date {
        builder
            .push(" AND m.created_at_ms <= ")
            .push_bind(end.timestamp_millis());
    }
}

#[derive(sqlx::FromRow)]
struct MovementRow {
    id: i64,
    store_id: i64,
    product_id: i64,
    #[sqlx(rename = "type")]
    movement_type: MovementType,
    quantity: i64,
    created_at_ms: i64,
    product_name: String,
    store_name: String,
}

impl From<MovementRow> for MovementView {
    fn from(row: MovementRow) -> Self {
        Self {
            product: EntityRef {
                id: row.product_id,
                name: row.product_name,
            },
            store: EntityRef {
                id: row.store_id,
                name: row.store_name,
            },
            movement: StockMovement {
                id: row.id,
                store_id: row.store_id,
                product_id: row.product_id,
                movement_type: row.movement_type,
                quantity: row.quantity,
                created_at_ms: row.created_at_ms,
            },
        }
    }
}

/// List movements matching the filter, most recent first.
pub async fn list_movements(
    pool: &SqlitePool,
    filter: &MovementFilter,
) -> Result<MovementPage, InventoryError> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM stock_movements m");
    push_filters(&mut count, filter);
    let total_items: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT m.id, m.store_id, m.product_id, m.type, m.quantity, m.created_at_ms,
               p.name AS product_name, s.name AS store_name
        FROM stock_movements m
        JOIN products p ON p.id = m.product_id
        JOIN stores s ON s.id = m.store_id
        "#,
    );
    push_filters(&mut select, filter);
    select
        .push(" ORDER BY m.created_at_ms DESC, m.id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let rows: Vec<MovementRow> = select.build_query_as::<MovementRow>().fetch_all(pool).await?;

    Ok(MovementPage {
        total_items,
        total_pages: (total_items + filter.limit - 1) / filter.limit,
        current_page: (filter.offset / filter.limit).saturating_add(1),
        movements: rows.into_iter().map(MovementView::from).collect(),
    })
}
