//! PostgreSQL store implementation
//!
//! Production implementation of the repository ports (feature `postgres`).
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE shipments (
//!     id              UUID PRIMARY KEY,
//!     order_id        TEXT NOT NULL,
//!     carrier         TEXT NOT NULL,
//!     tracking_number TEXT NOT NULL UNIQUE,
//!     status          TEXT NOT NULL,
//!     pickup          JSONB NOT NULL,
//!     delivery        JSONB NOT NULL,
//!     history         JSONB NOT NULL,
//!     version         BIGINT NOT NULL,
//!     created_at      TIMESTAMPTZ NOT NULL,
//!     updated_at      TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE processed_webhook_events (
//!     dedup_key TEXT PRIMARY KEY,
//!     seen_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use crate::error::StoreError;
use crate::repository::{ProcessedEventRepository, ShipmentRepository, Store};
use async_trait::async_trait;
use courier_domain::{
    Address, HistoryEntry, OrderId, Shipment, ShipmentId, ShipmentStatus, TrackingNumber,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool (for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_shipment(row: &PgRow) -> Result<Shipment, StoreError> {
    let order_id: String = row.try_get("order_id")?;
    let carrier: String = row.try_get("carrier")?;
    let tracking_number: String = row.try_get("tracking_number")?;
    let status: String = row.try_get("status")?;

    let pickup: serde_json::Value = row.try_get("pickup")?;
    let delivery: serde_json::Value = row.try_get("delivery")?;
    let history: serde_json::Value = row.try_get("history")?;

    let pickup: Address = serde_json::from_value(pickup)
        .map_err(|e| StoreError::Serialization(format!("pickup: {}", e)))?;
    let delivery: Address = serde_json::from_value(delivery)
        .map_err(|e| StoreError::Serialization(format!("delivery: {}", e)))?;
    let history: Vec<HistoryEntry> = serde_json::from_value(history)
        .map_err(|e| StoreError::Serialization(format!("history: {}", e)))?;

    Ok(Shipment {
        id: row.try_get("id")?,
        order_id: OrderId::new(order_id)?,
        carrier: courier_domain::CarrierId::from_str(&carrier)?,
        tracking_number: TrackingNumber::new(tracking_number)?,
        status: ShipmentStatus::from_str(&status)?,
        pickup,
        delivery,
        history,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn to_json<T: serde::Serialize>(field: &str, value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value)
        .map_err(|e| StoreError::Serialization(format!("{}: {}", field, e)))
}

#[async_trait]
impl ShipmentRepository for PgStore {
    async fn insert(&self, shipment: &Shipment) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO shipments (
                id, order_id, carrier, tracking_number, status,
                pickup, delivery, history, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(shipment.id)
        .bind(shipment.order_id.as_str())
        .bind(shipment.carrier.as_str())
        .bind(shipment.tracking_number.as_str())
        .bind(shipment.status.as_str())
        .bind(to_json("pickup", &shipment.pickup)?)
        .bind(to_json("delivery", &shipment.delivery)?)
        .bind(to_json("history", &shipment.history)?)
        .bind(shipment.version)
        .bind(shipment.created_at)
        .bind(shipment.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::duplicate(
                "shipment",
                shipment.tracking_number.as_str(),
            ));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        let row = sqlx::query("SELECT * FROM shipments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_shipment).transpose()
    }

    async fn find_by_tracking_number(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<Shipment>, StoreError> {
        let row = sqlx::query("SELECT * FROM shipments WHERE tracking_number = $1")
            .bind(tracking_number.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_shipment).transpose()
    }

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Vec<Shipment>, StoreError> {
        let rows = sqlx::query("SELECT * FROM shipments WHERE order_id = $1 ORDER BY created_at")
            .bind(order_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_shipment).collect()
    }

    async fn find_by_status(&self, status: ShipmentStatus) -> Result<Vec<Shipment>, StoreError> {
        let rows = sqlx::query("SELECT * FROM shipments WHERE status = $1 ORDER BY created_at")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_shipment).collect()
    }

    async fn update(
        &self,
        shipment: &Shipment,
        expected_version: i64,
    ) -> Result<i64, StoreError> {
        // Single conditional write: status and history land together or
        // not at all, keyed on the version the writer loaded.
        let result = sqlx::query(
            r#"
            UPDATE shipments
            SET status = $1, history = $2, updated_at = $3, version = version + 1
            WHERE id = $4 AND version = $5
            "#,
        )
        .bind(shipment.status.as_str())
        .bind(to_json("history", &shipment.history)?)
        .bind(shipment.updated_at)
        .bind(shipment.id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing record from a lost race
            let exists = sqlx::query("SELECT 1 FROM shipments WHERE id = $1")
                .bind(shipment.id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();

            return if exists {
                Err(StoreError::VersionConflict {
                    id: shipment.id.to_string(),
                    expected: expected_version,
                })
            } else {
                Err(StoreError::not_found("shipment", shipment.id.to_string()))
            };
        }

        Ok(expected_version + 1)
    }
}

#[async_trait]
impl ProcessedEventRepository for PgStore {
    async fn claim(&self, key: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (dedup_key)
            VALUES ($1)
            ON CONFLICT (dedup_key) DO NOTHING
            "#,
        )
        .bind(key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::duplicate("processed event", key));
        }
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM processed_webhook_events WHERE dedup_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn seen(&self, key: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM processed_webhook_events WHERE dedup_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

impl Store for PgStore {
    fn shipments(&self) -> &dyn ShipmentRepository {
        self
    }

    fn processed_events(&self) -> &dyn ProcessedEventRepository {
        self
    }
}
