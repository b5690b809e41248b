//! SQL implementation of the booking repository

use super::{from_ts, query_failed, to_ts};
use crate::client::{Backend, DbConnection};
use crate::error::DbError;
use crate::repositories::booking::{Booking, BookingRepository, BookingStatus, SlotId};
use crate::DbClient;
use chrono::{DateTime, Utc};
use coachbook_common::models::{join_ids, parse_id_csv, PaymentProvider};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, info};

/// What [`SqlBookingRepository::upsert_paid_in`] did with the payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaidUpsert {
    /// The booking now carries this payment.
    Recorded(String),
    /// The anchor was already paid by another payment; nothing was written.
    AlreadyPaid(String),
}

impl PaidUpsert {
    pub fn booking_id(&self) -> &str {
        match self {
            PaidUpsert::Recorded(id) | PaidUpsert::AlreadyPaid(id) => id,
        }
    }
}

const BOOKING_COLUMNS: &str = "id, slot_id, session_type, live_minutes, block_csv, status, discord, in_game, followups, notes, amount_cents, currency, provider, provider_ref, payer_email, created_at";

/// SQL implementation of the booking repository
#[derive(Debug, Clone)]
pub struct SqlBookingRepository {
    db_client: DbClient,
}

impl SqlBookingRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    fn schema(backend: Backend) -> &'static str {
        match backend {
            Backend::Sqlite => {
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id TEXT PRIMARY KEY,
                    slot_id INTEGER NOT NULL UNIQUE,
                    session_type TEXT NOT NULL,
                    live_minutes INTEGER NOT NULL,
                    block_csv TEXT NOT NULL,
                    status TEXT NOT NULL,
                    discord TEXT NOT NULL,
                    in_game INTEGER NOT NULL DEFAULT 0,
                    followups INTEGER NOT NULL DEFAULT 0,
                    notes TEXT NULL,
                    amount_cents INTEGER NULL,
                    currency TEXT NULL,
                    provider TEXT NULL,
                    provider_ref TEXT NULL,
                    payer_email TEXT NULL,
                    created_at INTEGER NOT NULL
                )
            "#
            }
            Backend::Postgres => {
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id TEXT PRIMARY KEY,
                    slot_id BIGINT NOT NULL UNIQUE,
                    session_type TEXT NOT NULL,
                    live_minutes BIGINT NOT NULL,
                    block_csv TEXT NOT NULL,
                    status TEXT NOT NULL,
                    discord TEXT NOT NULL,
                    in_game BIGINT NOT NULL DEFAULT 0,
                    followups BIGINT NOT NULL DEFAULT 0,
                    notes TEXT NULL,
                    amount_cents BIGINT NULL,
                    currency TEXT NULL,
                    provider TEXT NULL,
                    provider_ref TEXT NULL,
                    payer_email TEXT NULL,
                    created_at BIGINT NOT NULL
                )
            "#
            }
        }
    }

    fn from_row(row: &AnyRow) -> Result<Booking, DbError> {
        let block_csv: String = row.try_get("block_csv")?;
        let status: String = row.try_get("status")?;
        let provider: Option<String> = row.try_get("provider")?;
        Ok(Booking {
            id: row.try_get("id")?,
            slot_id: row.try_get("slot_id")?,
            session_type: row.try_get("session_type")?,
            live_minutes: row.try_get("live_minutes")?,
            block: parse_id_csv(&block_csv),
            status: BookingStatus::parse(&status),
            discord: row.try_get("discord")?,
            in_game: row.try_get::<i64, _>("in_game")? != 0,
            followups: row.try_get("followups")?,
            notes: row.try_get("notes")?,
            amount_cents: row.try_get("amount_cents")?,
            currency: row.try_get("currency")?,
            provider: provider.as_deref().and_then(PaymentProvider::parse),
            provider_ref: row.try_get("provider_ref")?,
            payer_email: row.try_get("payer_email")?,
            created_at: from_ts(row.try_get("created_at")?)?,
        })
    }

    /// Insert a new booking. Fails on an existing booking for the same anchor slot.
    pub async fn insert_in(conn: &mut DbConnection, booking: &Booking) -> Result<(), DbError> {
        let query = format!(
            "INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            BOOKING_COLUMNS
        );
        sqlx::query(&query)
            .bind(booking.id.clone())
            .bind(booking.slot_id)
            .bind(booking.session_type.clone())
            .bind(booking.live_minutes)
            .bind(join_ids(&booking.block, ","))
            .bind(booking.status.as_str())
            .bind(booking.discord.clone())
            .bind(i64::from(booking.in_game))
            .bind(booking.followups)
            .bind(booking.notes.clone())
            .bind(booking.amount_cents)
            .bind(booking.currency.clone())
            .bind(booking.provider.map(|p| p.as_str()))
            .bind(booking.provider_ref.clone())
            .bind(booking.payer_email.clone())
            .bind(to_ts(booking.created_at))
            .execute(&mut *conn)
            .await
            .map_err(query_failed("insert booking"))?;
        debug!("Inserted booking {} for slot {}", booking.id, booking.slot_id);
        Ok(())
    }

    /// Insert `booking` as paid, or move the existing booking for the same anchor
    /// slot to paid with the new payment fields.
    ///
    /// A booking already paid through a different provider reference is left as it
    /// is; the caller gets [`PaidUpsert::AlreadyPaid`] with its id.
    pub async fn upsert_paid_in(
        conn: &mut DbConnection,
        booking: &Booking,
    ) -> Result<PaidUpsert, DbError> {
        let query = format!(
            r#"
            INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5, 'paid', $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT(slot_id) DO UPDATE SET
                status = 'paid',
                block_csv = excluded.block_csv,
                amount_cents = excluded.amount_cents,
                currency = excluded.currency,
                provider = excluded.provider,
                provider_ref = excluded.provider_ref,
                payer_email = COALESCE(excluded.payer_email, bookings.payer_email)
            WHERE bookings.status <> 'paid'
                OR bookings.provider_ref IS NULL
                OR bookings.provider_ref = excluded.provider_ref
            RETURNING id
            "#,
            BOOKING_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(booking.id.clone())
            .bind(booking.slot_id)
            .bind(booking.session_type.clone())
            .bind(booking.live_minutes)
            .bind(join_ids(&booking.block, ","))
            .bind(booking.discord.clone())
            .bind(i64::from(booking.in_game))
            .bind(booking.followups)
            .bind(booking.notes.clone())
            .bind(booking.amount_cents)
            .bind(booking.currency.clone())
            .bind(booking.provider.map(|p| p.as_str()))
            .bind(booking.provider_ref.clone())
            .bind(booking.payer_email.clone())
            .bind(to_ts(booking.created_at))
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_failed("upsert paid booking"))?;

        if let Some(row) = row {
            let id: String = row.try_get("id")?;
            debug!("Booking {} for slot {} is paid", id, booking.slot_id);
            return Ok(PaidUpsert::Recorded(id));
        }

        let existing = Self::find_by_slot_in(conn, booking.slot_id)
            .await?
            .ok_or_else(|| {
                DbError::QueryError(format!(
                    "paid booking for slot {} vanished during upsert",
                    booking.slot_id
                ))
            })?;
        debug!(
            "Slot {} already paid as booking {}; keeping the first payment",
            booking.slot_id, existing.id
        );
        Ok(PaidUpsert::AlreadyPaid(existing.id))
    }

    pub async fn find_by_slot_in(
        conn: &mut DbConnection,
        slot_id: SlotId,
    ) -> Result<Option<Booking>, DbError> {
        let query = format!("SELECT {} FROM bookings WHERE slot_id = $1", BOOKING_COLUMNS);
        let row = sqlx::query(&query)
            .bind(slot_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(query_failed("find booking by slot"))?;
        row.as_ref().map(Self::from_row).transpose()
    }
}

impl BookingRepository for SqlBookingRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing booking schema");
        self.db_client
            .execute(Self::schema(self.db_client.backend()))
            .await?;
        info!("Booking schema initialized successfully");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, DbError> {
        let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(query_failed("find booking"))?;
        row.as_ref().map(Self::from_row).transpose()
    }

    async fn find_by_slot(&self, slot_id: SlotId) -> Result<Option<Booking>, DbError> {
        let mut conn = self.db_client.pool().acquire().await?;
        Self::find_by_slot_in(&mut conn, slot_id).await
    }

    async fn list_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Booking>, DbError> {
        let columns = BOOKING_COLUMNS
            .split(", ")
            .map(|c| format!("b.{}", c))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT {} FROM bookings b JOIN slots s ON s.id = b.slot_id WHERE s.start_ts >= $1 AND s.start_ts < $2 ORDER BY s.start_ts ASC",
            columns
        );
        let rows = sqlx::query(&query)
            .bind(to_ts(from))
            .bind(to_ts(to))
            .fetch_all(self.db_client.pool())
            .await
            .map_err(query_failed("list bookings"))?;
        rows.iter().map(Self::from_row).collect()
    }

    async fn count(&self) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM bookings")
            .fetch_one(self.db_client.pool())
            .await
            .map_err(query_failed("count bookings"))?;
        Ok(row.try_get("n")?)
    }
}
