//! SQL implementation of the slot repository

use super::{from_ts, placeholders, query_failed, to_ts};
use crate::client::{Backend, DbConnection};
use crate::error::DbError;
use crate::repositories::slot::{Slot, SlotId, SlotRepository};
use crate::DbClient;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, info};

const SLOT_COLUMNS: &str = "id, start_ts, duration_min, is_taken, hold_until, hold_key";

/// SQL implementation of the slot repository
#[derive(Debug, Clone)]
pub struct SqlSlotRepository {
    db_client: DbClient,
}

impl SqlSlotRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    fn schema(backend: Backend) -> [&'static str; 2] {
        let table = match backend {
            Backend::Sqlite => {
                r#"
                CREATE TABLE IF NOT EXISTS slots (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    start_ts INTEGER NOT NULL UNIQUE,
                    duration_min INTEGER NOT NULL DEFAULT 15,
                    is_taken INTEGER NOT NULL DEFAULT 0,
                    hold_until INTEGER NULL,
                    hold_key TEXT NULL
                )
            "#
            }
            Backend::Postgres => {
                r#"
                CREATE TABLE IF NOT EXISTS slots (
                    id BIGSERIAL PRIMARY KEY,
                    start_ts BIGINT NOT NULL UNIQUE,
                    duration_min BIGINT NOT NULL DEFAULT 15,
                    is_taken BIGINT NOT NULL DEFAULT 0,
                    hold_until BIGINT NULL,
                    hold_key TEXT NULL
                )
            "#
            }
        };
        [
            table,
            "CREATE INDEX IF NOT EXISTS idx_slots_start_ts ON slots (start_ts)",
        ]
    }

    fn from_row(row: &AnyRow) -> Result<Slot, DbError> {
        let hold_until: Option<i64> = row.try_get("hold_until")?;
        Ok(Slot {
            id: row.try_get("id")?,
            start_time: from_ts(row.try_get("start_ts")?)?,
            duration_min: row.try_get("duration_min")?,
            is_taken: row.try_get::<i64, _>("is_taken")? != 0,
            hold_until: hold_until.map(from_ts).transpose()?,
            hold_key: row.try_get("hold_key")?,
        })
    }

    pub async fn find_by_id_in(conn: &mut DbConnection, id: SlotId) -> Result<Option<Slot>, DbError> {
        let query = format!("SELECT {} FROM slots WHERE id = $1", SLOT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_failed("find slot"))?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Every slot, taken or not, starting in `[from, to)`, ascending. This is the
    /// candidate set for block resolution.
    pub async fn list_range_in(
        conn: &mut DbConnection,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, DbError> {
        let query = format!(
            "SELECT {} FROM slots WHERE start_ts >= $1 AND start_ts < $2 ORDER BY start_ts ASC",
            SLOT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(to_ts(from))
            .bind(to_ts(to))
            .fetch_all(&mut *conn)
            .await
            .map_err(query_failed("list slots"))?;
        rows.iter().map(Self::from_row).collect()
    }

    pub async fn list_free_range_in(
        conn: &mut DbConnection,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, DbError> {
        let query = format!(
            "SELECT {} FROM slots WHERE start_ts >= $1 AND start_ts < $2 AND is_taken = 0 ORDER BY start_ts ASC",
            SLOT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(to_ts(from))
            .bind(to_ts(to))
            .fetch_all(&mut *conn)
            .await
            .map_err(query_failed("list free slots"))?;
        rows.iter().map(Self::from_row).collect()
    }

    /// Flip `ids` to taken where they are still free, dropping their holds.
    ///
    /// Returns the number of slots that actually transitioned; fewer than
    /// `ids.len()` means some were missing or already taken.
    pub async fn mark_taken_if_free_in(conn: &mut DbConnection, ids: &[SlotId]) -> Result<u64, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "UPDATE slots SET is_taken = 1, hold_until = NULL, hold_key = NULL WHERE is_taken = 0 AND id IN ({})",
            placeholders(1, ids.len())
        );
        let mut q = sqlx::query(&query);
        for id in ids {
            q = q.bind(*id);
        }
        let result = q
            .execute(&mut *conn)
            .await
            .map_err(query_failed("mark slots taken"))?;
        debug!(
            "Marked {} of {} slots taken",
            result.rows_affected(),
            ids.len()
        );
        Ok(result.rows_affected())
    }

    pub async fn set_hold_in(
        conn: &mut DbConnection,
        id: SlotId,
        until: DateTime<Utc>,
        key: Option<&str>,
    ) -> Result<u64, DbError> {
        let result = sqlx::query("UPDATE slots SET hold_until = $1, hold_key = $2 WHERE id = $3")
            .bind(to_ts(until))
            .bind(key.map(str::to_string))
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(query_failed("set hold"))?;
        Ok(result.rows_affected())
    }

    pub async fn clear_hold_in(conn: &mut DbConnection, id: SlotId) -> Result<u64, DbError> {
        let result = sqlx::query("UPDATE slots SET hold_until = NULL, hold_key = NULL WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(query_failed("clear hold"))?;
        Ok(result.rows_affected())
    }

    /// Drop the hold on `ids` that were held under `key`. Holds taken over by someone
    /// else are left alone.
    pub async fn release_holds_in(
        conn: &mut DbConnection,
        ids: &[SlotId],
        key: &str,
    ) -> Result<u64, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "UPDATE slots SET hold_until = NULL, hold_key = NULL WHERE hold_key = $1 AND id IN ({})",
            placeholders(2, ids.len())
        );
        let mut q = sqlx::query(&query).bind(key.to_string());
        for id in ids {
            q = q.bind(*id);
        }
        let result = q
            .execute(&mut *conn)
            .await
            .map_err(query_failed("release holds"))?;
        Ok(result.rows_affected())
    }

    pub async fn insert_grid_in(
        conn: &mut DbConnection,
        starts: &[DateTime<Utc>],
        duration_min: i64,
    ) -> Result<u64, DbError> {
        let mut created = 0;
        for start in starts {
            let result = sqlx::query(
                "INSERT INTO slots (start_ts, duration_min, is_taken) VALUES ($1, $2, 0) ON CONFLICT(start_ts) DO NOTHING",
            )
            .bind(to_ts(*start))
            .bind(duration_min)
            .execute(&mut *conn)
            .await
            .map_err(query_failed("insert slot"))?;
            created += result.rows_affected();
        }
        Ok(created)
    }
}

impl SlotRepository for SqlSlotRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing slot schema");
        for statement in Self::schema(self.db_client.backend()) {
            self.db_client.execute(statement).await?;
        }
        info!("Slot schema initialized successfully");
        Ok(())
    }

    async fn find_by_id(&self, id: SlotId) -> Result<Option<Slot>, DbError> {
        let mut conn = self.db_client.pool().acquire().await?;
        Self::find_by_id_in(&mut conn, id).await
    }

    async fn list_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Slot>, DbError> {
        let mut conn = self.db_client.pool().acquire().await?;
        Self::list_range_in(&mut conn, from, to).await
    }

    async fn list_free_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, DbError> {
        let mut conn = self.db_client.pool().acquire().await?;
        Self::list_free_range_in(&mut conn, from, to).await
    }

    async fn insert_grid(&self, starts: &[DateTime<Utc>], duration_min: i64) -> Result<u64, DbError> {
        let mut tx = self.db_client.begin_write().await?;
        let created = Self::insert_grid_in(&mut tx, starts, duration_min).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;
        info!("Inserted {} of {} grid slots", created, starts.len());
        Ok(created)
    }

    async fn bulk_set_taken(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        taken: bool,
    ) -> Result<u64, DbError> {
        let query = if taken {
            "UPDATE slots SET is_taken = 1 WHERE start_ts >= $1 AND start_ts < $2"
        } else {
            "UPDATE slots SET is_taken = 0, hold_until = NULL, hold_key = NULL WHERE start_ts >= $1 AND start_ts < $2"
        };
        let result = sqlx::query(query)
            .bind(to_ts(from))
            .bind(to_ts(to))
            .execute(self.db_client.pool())
            .await
            .map_err(query_failed("bulk update slots"))?;
        Ok(result.rows_affected())
    }

    async fn bulk_delete(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM slots WHERE start_ts >= $1 AND start_ts < $2")
            .bind(to_ts(from))
            .bind(to_ts(to))
            .execute(self.db_client.pool())
            .await
            .map_err(query_failed("delete slots"))?;
        Ok(result.rows_affected())
    }
}
