//! Postgres-backed shipment store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Constraint` | Shipment id reused |
//! | Database (foreign key violation) | `23503` | `Constraint` | Item or track without its shipment |
//! | Database (check constraint violation) | `23514` | `Constraint` | Non-positive item quantity |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` | Database unreachable |
//! | Other | N/A | `Storage` | Decode errors, protocol errors, etc. |
//!
//! ## Runtime
//!
//! [`ShipmentStore`] is synchronous; every call is bridged onto the current
//! tokio runtime with `Handle::block_on`. Call it from a context where
//! blocking is allowed (e.g. inside `tokio::task::spawn_blocking`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::{debug, instrument};
use uuid::Uuid;

use quickship_core::{OrderId, ShipmentId};
use quickship_shipping::{ShipmentRequest, ShipmentStore, ShipmentTransaction, StoreError};

use super::resolve_recorded_source;
use crate::config::DEFAULT_SOURCE_CODE;

/// Tables backing [`PostgresShipmentStore`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS shipments (
    shipment_id UUID PRIMARY KEY,
    order_id UUID NOT NULL,
    source_code TEXT NOT NULL,
    deduction_skipped BOOLEAN NOT NULL DEFAULT FALSE,
    comment_text TEXT,
    comment_visible_on_front BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS shipments_order_id_idx ON shipments (order_id);

CREATE TABLE IF NOT EXISTS shipment_items (
    shipment_id UUID NOT NULL REFERENCES shipments (shipment_id) ON DELETE CASCADE,
    line_no INTEGER NOT NULL,
    order_item_id UUID NOT NULL,
    sku TEXT NOT NULL,
    qty DOUBLE PRECISION NOT NULL CHECK (qty > 0),
    PRIMARY KEY (shipment_id, line_no)
);

CREATE TABLE IF NOT EXISTS shipment_tracks (
    shipment_id UUID NOT NULL REFERENCES shipments (shipment_id) ON DELETE CASCADE,
    track_number TEXT NOT NULL,
    title TEXT NOT NULL,
    carrier_code TEXT NOT NULL
);
"#;

/// Shipment header row as read back from `shipments`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentRow {
    pub shipment_id: Uuid,
    pub order_id: Uuid,
    pub source_code: String,
    pub deduction_skipped: bool,
    pub comment_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ShipmentRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ShipmentRow {
            shipment_id: row.try_get("shipment_id")?,
            order_id: row.try_get("order_id")?,
            source_code: row.try_get("source_code")?,
            deduction_skipped: row.try_get("deduction_skipped")?,
            comment_text: row.try_get("comment_text")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PostgresShipmentStore {
    pool: Arc<PgPool>,
    default_source: String,
}

impl PostgresShipmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            default_source: DEFAULT_SOURCE_CODE.to_string(),
        }
    }

    pub fn with_default_source(mut self, default_source: impl Into<String>) -> Self {
        self.default_source = default_source.into();
        self
    }

    /// Create the shipment tables if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Shipment headers for one order, oldest first.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn shipments_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<ShipmentRow>, StoreError> {
        sqlx::query_as::<_, ShipmentRow>(
            r#"
            SELECT shipment_id, order_id, source_code, deduction_skipped, comment_text, created_at
            FROM shipments
            WHERE order_id = $1
            ORDER BY created_at ASC, shipment_id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("shipments_for_order", e))
    }
}

/// An open pool transaction; dropping it without commit rolls back.
pub struct PostgresShipmentTransaction {
    tx: Transaction<'static, Postgres>,
    handle: Handle,
    default_source: String,
}

impl std::fmt::Debug for PostgresShipmentTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresShipmentTransaction")
            .finish_non_exhaustive()
    }
}

impl ShipmentStore for PostgresShipmentStore {
    type Transaction<'a>
        = PostgresShipmentTransaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, StoreError> {
        let handle = Handle::try_current().map_err(|_| {
            StoreError::Unavailable(
                "PostgresShipmentStore requires a tokio runtime; call it from within one"
                    .to_string(),
            )
        })?;

        let tx = handle
            .block_on(self.pool.begin())
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        Ok(PostgresShipmentTransaction {
            tx,
            handle,
            default_source: self.default_source.clone(),
        })
    }
}

impl PostgresShipmentTransaction {
    #[instrument(
        skip(self, request),
        fields(order_id = %request.order_id, items = request.items.len()),
        err
    )]
    async fn insert_shipment(&mut self, request: &ShipmentRequest) -> Result<ShipmentId, StoreError> {
        let shipment_id = ShipmentId::new();
        let source = resolve_recorded_source(request, &self.default_source);
        let (comment_text, visible_on_front) = match &request.comment {
            Some(c) => (Some(c.text.as_str()), c.visible_on_front),
            None => (None, false),
        };

        sqlx::query(
            r#"
            INSERT INTO shipments (
                shipment_id, order_id, source_code, deduction_skipped,
                comment_text, comment_visible_on_front, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(shipment_id.as_uuid())
        .bind(request.order_id.as_uuid())
        .bind(source.code())
        .bind(request.deduction_skipped)
        .bind(comment_text)
        .bind(visible_on_front)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_shipment", e))?;

        for (line_no, item) in request.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO shipment_items (shipment_id, line_no, order_item_id, sku, qty)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(shipment_id.as_uuid())
            .bind(line_no as i32)
            .bind(item.order_item_id.as_uuid())
            .bind(item.sku.as_str())
            .bind(item.quantity.value())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_shipment_item", e))?;
        }

        if let Some(track) = &request.track {
            sqlx::query(
                r#"
                INSERT INTO shipment_tracks (shipment_id, track_number, title, carrier_code)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(shipment_id.as_uuid())
            .bind(&track.track_number)
            .bind(&track.title)
            .bind(&track.carrier_code)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_shipment_track", e))?;
        }

        debug!(%shipment_id, source = %source, "shipment row staged");
        Ok(shipment_id)
    }
}

impl ShipmentTransaction for PostgresShipmentTransaction {
    fn create_shipment(&mut self, request: &ShipmentRequest) -> Result<ShipmentId, StoreError> {
        let handle = self.handle.clone();
        handle.block_on(self.insert_shipment(request))
    }

    fn commit(self) -> Result<(), StoreError> {
        self.handle
            .block_on(self.tx.commit())
            .map_err(|e| map_sqlx_error("commit", e))
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.handle
            .block_on(self.tx.rollback())
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // unique, foreign key, check
                Some("23505") | Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {}", operation))
        }
        sqlx::Error::Io(io) => {
            StoreError::Unavailable(format!("io error in {}: {}", operation, io))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
