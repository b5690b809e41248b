//! Test fixtures for the storage tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use coachbook_config::DatabaseConfig;
use coachbook_db::{init_schema, DbClient};

/// A fresh in-memory database with the schema applied.
///
/// One connection only: every SQLite in-memory connection is its own database.
pub async fn memory_db() -> DbClient {
    let db = DbClient::from_config(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
    })
    .await
    .expect("in-memory database");
    init_schema(&db).await.expect("schema");
    db
}

/// A fresh SQLite file with the schema applied and a pool of several
/// connections, so transactions really run side by side. Returns the file path
/// for cleanup.
pub async fn file_db() -> (DbClient, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("coachbook-{}.db", uuid::Uuid::new_v4()));
    let db = DbClient::from_config(&DatabaseConfig {
        url: format!("sqlite://{}", path.display()),
        max_connections: Some(5),
    })
    .await
    .expect("file database");
    init_schema(&db).await.expect("schema");
    (db, path)
}

pub fn day_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
}

/// `count` quarter-hour start times beginning at `first`.
pub fn quarter_hours(first: DateTime<Utc>, count: i64) -> Vec<DateTime<Utc>> {
    (0..count).map(|i| first + Duration::minutes(15 * i)).collect()
}
