//! Postgres-backed inventory ledger.
//!
//! Rows live in a single `event_inventory` table keyed by `(event_id, product_id)`.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | InventoryError | Scenario |
//! |------------|----------------------|----------------|----------|
//! | Database (unique violation) | `23505` | `Domain(InvalidState)` | Row for the same product inserted concurrently |
//! | Database (check constraint violation) | `23514` | `Domain(Validation)` | Negative stock or quantities reached the table |
//! | Database (numeric overflow) | `22003` | `Domain(Validation)` | Money or margin beyond `NUMERIC(14, 2)` |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! ## Locking
//!
//! - Batches run inside one transaction that first locks every existing row of
//!   the event with `SELECT ... FOR UPDATE`. New rows are written with an
//!   upsert that only overwrites inactive rows, so two batches racing to
//!   insert the same product cannot both succeed.
//! - Edits lock their row with `SELECT ... FOR UPDATE` before applying.
//! - Stock adjustments are one conditional `UPDATE ... RETURNING`; the
//!   decrement guard `current_qty >= $qty` is evaluated by Postgres under the
//!   row lock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::{Span, instrument};
use uuid::Uuid;

use eventory_core::{DomainError, EventId, ProductId};
use eventory_inventory::{
    EventInventory, EventRows, InventoryKey, StockAdjustment, StoredInventory,
};

use super::r#trait::{BatchPlan, InventoryLedger, RowEdit};
use crate::error::InventoryError;

/// DDL for the ledger table. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS event_inventory (
    event_id      UUID           NOT NULL,
    product_id    UUID           NOT NULL,
    product_name  TEXT           NOT NULL,
    initial_qty   BIGINT         NOT NULL CHECK (initial_qty >= 0),
    current_qty   BIGINT         NOT NULL CHECK (current_qty >= 0),
    min_qty       BIGINT         NOT NULL CHECK (min_qty >= 0),
    cost          NUMERIC(14, 2) NOT NULL,
    sale_price    NUMERIC(14, 2) NOT NULL,
    profit_margin NUMERIC(14, 2) NOT NULL,
    has_recipe    BOOLEAN        NOT NULL,
    is_active     BOOLEAN        NOT NULL DEFAULT TRUE,
    version       BIGINT         NOT NULL CHECK (version > 0),
    updated_at    TIMESTAMPTZ    NOT NULL DEFAULT NOW(),
    PRIMARY KEY (event_id, product_id)
)
"#;

const ACTIVE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS event_inventory_active_idx
    ON event_inventory (event_id)
    WHERE is_active
"#;

const COLUMNS: &str = "event_id, product_id, product_name, initial_qty, current_qty, min_qty, \
     cost, sale_price, profit_margin, has_recipe, is_active, version, updated_at";

const MISSING_RUNTIME: &str = "PostgresInventoryLedger requires a tokio runtime; call it from a \
     blocking context such as tokio::task::spawn_blocking";

/// Postgres-backed inventory ledger.
///
/// `Send + Sync`; all connections come from the shared SQLx pool.
#[derive(Debug, Clone)]
pub struct PostgresInventoryLedger {
    pool: Arc<PgPool>,
}

impl PostgresInventoryLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the ledger table and its index if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), InventoryError> {
        for ddl in [SCHEMA, ACTIVE_INDEX] {
            sqlx::query(ddl)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(event_id = %key.event_id, product_id = %key.product_id), err)]
    pub async fn fetch_row(&self, key: InventoryKey) -> Result<Option<EventInventory>, InventoryError> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM event_inventory WHERE event_id = $1 AND product_id = $2"
        ))
        .bind(*key.event_id.as_uuid())
        .bind(*key.product_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_row", e))?;

        row.map(|r| decode_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(event_id = %event_id, row_count = tracing::field::Empty), err)]
    pub async fn fetch_event(&self, event_id: EventId) -> Result<Vec<EventInventory>, InventoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM event_inventory WHERE event_id = $1"
        ))
        .bind(*event_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_event", e))?;

        let decoded = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        Span::current().record("row_count", decoded.len());
        Ok(decoded)
    }

    /// Run a batch plan and persist its rows in one transaction.
    #[instrument(skip(self, plan), fields(event_id = %event_id, committed = tracing::field::Empty), err)]
    pub async fn commit_planned(
        &self,
        event_id: EventId,
        plan: &mut BatchPlan<'_>,
    ) -> Result<Vec<EventInventory>, InventoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let locked = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM event_inventory WHERE event_id = $1 FOR UPDATE"
        ))
        .bind(*event_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_event_rows", e))?;

        let mut existing = EventRows::with_capacity(locked.len());
        for row in &locked {
            let row = decode_row(row)?;
            existing.insert(row.product_id(), row);
        }

        let planned = match plan(&existing) {
            Ok(rows) => rows,
            Err(err) => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(err.into());
            }
        };

        for row in &planned {
            if row.event_id() != event_id {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(InventoryError::storage(format!(
                    "planned row {} does not belong to event {event_id}",
                    row.key()
                )));
            }
            upsert_inactive_or_new(&mut tx, row).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("committed", planned.len());
        Ok(planned)
    }

    /// Lock one row, apply an edit and write it back.
    #[instrument(skip(self, edit), fields(event_id = %key.event_id, product_id = %key.product_id), err)]
    pub async fn modify_row(
        &self,
        key: InventoryKey,
        edit: &mut RowEdit<'_>,
    ) -> Result<Option<EventInventory>, InventoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let locked = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM event_inventory \
             WHERE event_id = $1 AND product_id = $2 FOR UPDATE"
        ))
        .bind(*key.event_id.as_uuid())
        .bind(*key.product_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_row", e))?;

        let Some(locked) = locked else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        };

        let mut row = decode_row(&locked)?;
        if let Err(err) = edit(&mut row) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err.into());
        }

        overwrite(&mut tx, &row).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some(row))
    }

    /// Apply a stock movement with a single conditional update.
    ///
    /// When the guarded update matches nothing the row is re-read and the
    /// movement replayed in memory to report why (missing row, inactive row,
    /// bad quantity, insufficient stock). If the replay succeeds the row moved
    /// in between and the update is attempted again.
    #[instrument(
        skip(self),
        fields(event_id = %key.event_id, product_id = %key.product_id, adjustment = ?adjustment),
        err
    )]
    pub async fn apply_adjustment(
        &self,
        key: InventoryKey,
        adjustment: StockAdjustment,
    ) -> Result<Option<EventInventory>, InventoryError> {
        const ATTEMPTS: usize = 3;

        for _ in 0..ATTEMPTS {
            let now = Utc::now();
            if let Some(row) = self.conditional_adjust(key, adjustment, now).await? {
                return Ok(Some(row));
            }

            let Some(mut current) = self.fetch_row(key).await? else {
                return Ok(None);
            };
            current.adjust_stock(adjustment, now)?;
        }

        Err(InventoryError::storage(format!(
            "stock of {key} kept changing; gave up after {ATTEMPTS} attempts"
        )))
    }

    async fn conditional_adjust(
        &self,
        key: InventoryKey,
        adjustment: StockAdjustment,
        now: DateTime<Utc>,
    ) -> Result<Option<EventInventory>, InventoryError> {
        let qty = adjustment.quantity();
        if qty <= 0 {
            return Ok(None);
        }

        let sql = match adjustment {
            StockAdjustment::Decrease(_) => format!(
                "UPDATE event_inventory \
                 SET current_qty = current_qty - $3, version = version + 1, updated_at = $4 \
                 WHERE event_id = $1 AND product_id = $2 AND is_active AND current_qty >= $3 \
                 RETURNING {COLUMNS}"
            ),
            StockAdjustment::Increase(_) => format!(
                "UPDATE event_inventory \
                 SET current_qty = current_qty + $3, version = version + 1, updated_at = $4 \
                 WHERE event_id = $1 AND product_id = $2 AND is_active \
                   AND current_qty <= {} - $3 \
                 RETURNING {COLUMNS}",
                i64::MAX
            ),
        };

        let row = sqlx::query(&sql)
            .bind(*key.event_id.as_uuid())
            .bind(*key.product_id.as_uuid())
            .bind(qty)
            .bind(now)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("adjust_stock", e))?;

        row.map(|r| decode_row(&r)).transpose()
    }
}

/// Insert a new row, or overwrite an existing one only if it is inactive.
async fn upsert_inactive_or_new(
    tx: &mut Transaction<'_, Postgres>,
    row: &EventInventory,
) -> Result<(), InventoryError> {
    let stored = row.to_stored();
    let result = sqlx::query(
        r#"
        INSERT INTO event_inventory (
            event_id, product_id, product_name, initial_qty, current_qty, min_qty,
            cost, sale_price, profit_margin, has_recipe, is_active, version, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (event_id, product_id)
        DO UPDATE SET
            product_name = EXCLUDED.product_name,
            initial_qty = EXCLUDED.initial_qty,
            current_qty = EXCLUDED.current_qty,
            min_qty = EXCLUDED.min_qty,
            cost = EXCLUDED.cost,
            sale_price = EXCLUDED.sale_price,
            profit_margin = EXCLUDED.profit_margin,
            has_recipe = EXCLUDED.has_recipe,
            is_active = EXCLUDED.is_active,
            version = EXCLUDED.version,
            updated_at = EXCLUDED.updated_at
        WHERE NOT event_inventory.is_active
        "#,
    );
    let result = bind_stored(result, &stored)?
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_row", e))?;

    if result.rows_affected() == 0 {
        return Err(DomainError::invalid_state(format!(
            "product \"{}\" is already in the event inventory",
            stored.product_name
        ))
        .into());
    }
    Ok(())
}

async fn overwrite(
    tx: &mut Transaction<'_, Postgres>,
    row: &EventInventory,
) -> Result<(), InventoryError> {
    let stored = row.to_stored();
    let query = sqlx::query(
        r#"
        UPDATE event_inventory SET
            product_name = $3,
            initial_qty = $4,
            current_qty = $5,
            min_qty = $6,
            cost = $7,
            sale_price = $8,
            profit_margin = $9,
            has_recipe = $10,
            is_active = $11,
            version = $12,
            updated_at = $13
        WHERE event_id = $1 AND product_id = $2
        "#,
    );
    bind_stored(query, &stored)?
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_row", e))?;
    Ok(())
}

/// Bind every column in `COLUMNS` order as `$1..$13`.
fn bind_stored<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    stored: &StoredInventory,
) -> Result<sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>, InventoryError> {
    let version = i64::try_from(stored.version).map_err(|_| {
        InventoryError::storage(format!("row version {} does not fit BIGINT", stored.version))
    })?;
    Ok(query
        .bind(*stored.event_id.as_uuid())
        .bind(*stored.product_id.as_uuid())
        .bind(stored.product_name.clone())
        .bind(stored.initial_qty)
        .bind(stored.current_qty)
        .bind(stored.min_qty)
        .bind(stored.cost)
        .bind(stored.sale_price)
        .bind(stored.profit_margin)
        .bind(stored.has_recipe)
        .bind(stored.is_active)
        .bind(version)
        .bind(stored.updated_at))
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<EventInventory, InventoryError> {
    let row = InventoryRow::from_row(row)
        .map_err(|e| InventoryError::storage(format!("failed to decode inventory row: {e}")))?;
    Ok(EventInventory::restore(row.try_into()?))
}

/// Map SQLx errors to `InventoryError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> InventoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::invalid_state(msg).into(),
                Some("23514") | Some("22003") => DomainError::validation(msg).into(),
                _ => InventoryError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            InventoryError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => InventoryError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[derive(Debug)]
struct InventoryRow {
    event_id: Uuid,
    product_id: Uuid,
    product_name: String,
    initial_qty: i64,
    current_qty: i64,
    min_qty: i64,
    cost: Decimal,
    sale_price: Decimal,
    profit_margin: Decimal,
    has_recipe: bool,
    is_active: bool,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for InventoryRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(InventoryRow {
            event_id: row.try_get("event_id")?,
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            initial_qty: row.try_get("initial_qty")?,
            current_qty: row.try_get("current_qty")?,
            min_qty: row.try_get("min_qty")?,
            cost: row.try_get("cost")?,
            sale_price: row.try_get("sale_price")?,
            profit_margin: row.try_get("profit_margin")?,
            has_recipe: row.try_get("has_recipe")?,
            is_active: row.try_get("is_active")?,
            version: row.try_get("version")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<InventoryRow> for StoredInventory {
    type Error = InventoryError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        Ok(StoredInventory {
            event_id: EventId::from_uuid(row.event_id),
            product_id: ProductId::from_uuid(row.product_id),
            product_name: row.product_name,
            initial_qty: row.initial_qty,
            current_qty: row.current_qty,
            min_qty: row.min_qty,
            cost: row.cost,
            sale_price: row.sale_price,
            profit_margin: row.profit_margin,
            has_recipe: row.has_recipe,
            is_active: row.is_active,
            version: u64::try_from(row.version).map_err(|_| {
                InventoryError::storage(format!("negative row version {}", row.version))
            })?,
            updated_at: row.updated_at,
        })
    }
}

fn runtime() -> Result<tokio::runtime::Handle, InventoryError> {
    tokio::runtime::Handle::try_current().map_err(|_| InventoryError::storage(MISSING_RUNTIME))
}

// The ledger trait is synchronous; the async methods above are driven with
// `block_on` on the ambient tokio runtime.
impl InventoryLedger for PostgresInventoryLedger {
    fn get(&self, key: InventoryKey) -> Result<Option<EventInventory>, InventoryError> {
        runtime()?.block_on(self.fetch_row(key))
    }

    fn list_event(&self, event_id: EventId) -> Result<Vec<EventInventory>, InventoryError> {
        runtime()?.block_on(self.fetch_event(event_id))
    }

    fn commit_batch(
        &self,
        event_id: EventId,
        plan: &mut BatchPlan<'_>,
    ) -> Result<Vec<EventInventory>, InventoryError> {
        runtime()?.block_on(self.commit_planned(event_id, plan))
    }

    fn modify(
        &self,
        key: InventoryKey,
        edit: &mut RowEdit<'_>,
    ) -> Result<Option<EventInventory>, InventoryError> {
        runtime()?.block_on(self.modify_row(key, edit))
    }

    fn adjust_stock(
        &self,
        key: InventoryKey,
        adjustment: StockAdjustment,
    ) -> Result<Option<EventInventory>, InventoryError> {
        runtime()?.block_on(self.apply_adjustment(key, adjustment))
    }
}
