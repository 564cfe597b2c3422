use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use triplock_core::models::{ItemType, Lock, LockStatus, LockUpdate};
use triplock_core::store::{LockStore, StoreError};

/// Postgres-backed lock store.
///
/// The at-most-one-active rule is enforced twice: callers pre-check before
/// taking a supplier hold, and a partial unique index catches the race.
#[derive(Clone)]
pub struct PgLockStore {
    pool: PgPool,
}

// Internal struct for type-safe row mapping
#[derive(sqlx::FromRow)]
struct LockRow {
    id: Uuid,
    itinerary_token: String,
    inquiry_token: String,
    item_type: String,
    item_id: String,
    reference_id: String,
    supplier_reference: String,
    status: String,
    expires_at: DateTime<Utc>,
    city_name: Option<String>,
    date: Option<NaiveDate>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LockRow {
    fn into_lock(self) -> Result<Lock, StoreError> {
        let item_type = ItemType::parse(&self.item_type).ok_or_else(|| {
            backend(format!("unknown item_type '{}' in lock row", self.item_type))
        })?;
        let status = LockStatus::parse(&self.status)
            .ok_or_else(|| backend(format!("unknown status '{}' in lock row", self.status)))?;

        Ok(Lock {
            id: self.id,
            itinerary_token: self.itinerary_token,
            inquiry_token: self.inquiry_token,
            item_type,
            item_id: self.item_id,
            reference_id: self.reference_id,
            supplier_reference: self.supplier_reference,
            status,
            expires_at: self.expires_at,
            city_name: self.city_name,
            date: self.date,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PgLockStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn from_config(config: &crate::app_config::Config) -> Result<Self, sqlx::Error> {
        Self::connect(&config.database.url, config.database.max_connections).await
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the lock table and its query indexes if they do not exist
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        info!("Ensuring inventory_locks schema");
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        for stmt in CREATE_INDEXES {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }
}

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS inventory_locks (
    id UUID PRIMARY KEY,
    itinerary_token TEXT NOT NULL,
    inquiry_token TEXT NOT NULL,
    item_type TEXT NOT NULL,
    item_id TEXT NOT NULL,
    reference_id TEXT NOT NULL,
    supplier_reference TEXT NOT NULL,
    status TEXT NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL,
    city_name TEXT,
    date DATE,
    metadata JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_locks_session
     ON inventory_locks (itinerary_token, inquiry_token)",
    "CREATE INDEX IF NOT EXISTS idx_locks_item
     ON inventory_locks (itinerary_token, item_type, item_id)",
    "CREATE INDEX IF NOT EXISTS idx_locks_sweep
     ON inventory_locks (status, expires_at)",
    // Backstop for the at-most-one-active rule
    "CREATE UNIQUE INDEX IF NOT EXISTS uniq_locks_active_item
     ON inventory_locks (itinerary_token, item_type, item_id)
     WHERE status = 'ACTIVE'",
];

#[async_trait]
impl LockStore for PgLockStore {
    async fn insert(&self, lock: &Lock) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_locks (
                id, itinerary_token, inquiry_token, item_type, item_id,
                reference_id, supplier_reference, status, expires_at,
                city_name, date, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(lock.id)
        .bind(&lock.itinerary_token)
        .bind(&lock.inquiry_token)
        .bind(lock.item_type.as_str())
        .bind(&lock.item_id)
        .bind(&lock.reference_id)
        .bind(&lock.supplier_reference)
        .bind(lock.status.as_str())
        .bind(lock.expires_at)
        .bind(&lock.city_name)
        .bind(lock.date)
        .bind(&lock.metadata)
        .bind(lock.created_at)
        .bind(lock.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateActive {
                item_type: lock.item_type,
                item_id: lock.item_id.clone(),
            }),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Lock>, StoreError> {
        let row = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT id, itinerary_token, inquiry_token, item_type, item_id,
                   reference_id, supplier_reference, status, expires_at,
                   city_name, date, metadata, created_at, updated_at
            FROM inventory_locks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(LockRow::into_lock).transpose()
    }

    async fn active_for_inquiry(
        &self,
        itinerary_token: &str,
        inquiry_token: &str,
    ) -> Result<Vec<Lock>, StoreError> {
        let rows = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT id, itinerary_token, inquiry_token, item_type, item_id,
                   reference_id, supplier_reference, status, expires_at,
                   city_name, date, metadata, created_at, updated_at
            FROM inventory_locks
            WHERE itinerary_token = $1 AND inquiry_token = $2 AND status = $3
            ORDER BY created_at ASC
            "#,
        )
        .bind(itinerary_token)
        .bind(inquiry_token)
        .bind(LockStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(LockRow::into_lock).collect()
    }

    async fn find_active_item(
        &self,
        itinerary_token: &str,
        item_type: ItemType,
        item_id: &str,
    ) -> Result<Option<Lock>, StoreError> {
        let row = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT id, itinerary_token, inquiry_token, item_type, item_id,
                   reference_id, supplier_reference, status, expires_at,
                   city_name, date, metadata, created_at, updated_at
            FROM inventory_locks
            WHERE itinerary_token = $1 AND item_type = $2 AND item_id = $3 AND status = $4
            LIMIT 1
            "#,
        )
        .bind(itinerary_token)
        .bind(item_type.as_str())
        .bind(item_id)
        .bind(LockStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(LockRow::into_lock).transpose()
    }

    async fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<Lock>, StoreError> {
        let rows = sqlx::query_as::<_, LockRow>(
            r#"
            SELECT id, itinerary_token, inquiry_token, item_type, item_id,
                   reference_id, supplier_reference, status, expires_at,
                   city_name, date, metadata, created_at, updated_at
            FROM inventory_locks
            WHERE status = $1 AND expires_at < $2
            ORDER BY expires_at ASC
            "#,
        )
        .bind(LockStatus::Active.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(LockRow::into_lock).collect()
    }

    async fn update(
        &self,
        id: Uuid,
        expected: LockStatus,
        changes: LockUpdate,
    ) -> Result<Option<Lock>, StoreError> {
        let row = sqlx::query_as::<_, LockRow>(
            r#"
            UPDATE inventory_locks
            SET status = COALESCE($3, status),
                expires_at = COALESCE($4, expires_at),
                updated_at = $5
            WHERE id = $1 AND status = $2
            RETURNING id, itinerary_token, inquiry_token, item_type, item_id,
                      reference_id, supplier_reference, status, expires_at,
                      city_name, date, metadata, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.expires_at)
        .bind(changes.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(LockRow::into_lock).transpose()
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM inventory_locks
            WHERE status IN ($1, $2) AND updated_at < $3
            "#,
        )
        .bind(LockStatus::Expired.as_str())
        .bind(LockStatus::Released.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(e))
}

fn backend(message: String) -> StoreError {
    StoreError::Backend(message.into())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
