//! SQL implementation of the processed-event ledger

use super::{query_failed, to_ts};
use crate::client::DbConnection;
use crate::error::DbError;
use crate::repositories::processed_event::ProcessedEventRepository;
use crate::DbClient;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SqlProcessedEventRepository {
    db_client: DbClient,
}

impl SqlProcessedEventRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    /// Record `event_id` as processed.
    ///
    /// Returns `false` when the id is already in the ledger. The duplicate is
    /// absorbed by `ON CONFLICT DO NOTHING` so the surrounding transaction stays
    /// usable.
    pub async fn try_insert_in(
        conn: &mut DbConnection,
        event_id: &str,
        provider: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT INTO processed_events (id, provider, created_at) VALUES ($1, $2, $3) ON CONFLICT(id) DO NOTHING",
        )
        .bind(event_id.to_string())
        .bind(provider.to_string())
        .bind(to_ts(at))
        .execute(&mut *conn)
        .await
        .map_err(query_failed("record processed event"))?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!("Event {} already in ledger", event_id);
        }
        Ok(inserted)
    }
}

impl ProcessedEventRepository for SqlProcessedEventRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing processed event schema");
        let query = r#"
            CREATE TABLE IF NOT EXISTS processed_events (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                created_at BIGINT NOT NULL
            )
        "#;
        self.db_client.execute(query).await?;
        info!("Processed event schema initialized successfully");
        Ok(())
    }

    async fn exists(&self, event_id: &str) -> Result<bool, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM processed_events WHERE id = $1")
            .bind(event_id.to_string())
            .fetch_one(self.db_client.pool())
            .await
            .map_err(query_failed("look up processed event"))?;
        Ok(row.try_get::<i64, _>("n")? > 0)
    }

    async fn count(&self) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM processed_events")
            .fetch_one(self.db_client.pool())
            .await
            .map_err(query_failed("count processed events"))?;
        Ok(row.try_get("n")?)
    }
}
