//! Admin slot maintenance: grid generation, bulk status changes and seeding.

use crate::error::BookingError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use coachbook_config::BookingConfig;
use coachbook_db::{DbClient, SlotRepository, SqlSlotRepository};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info, warn};

const MINUTES_PER_DAY: u32 = 24 * 60;

fn default_open_hour() -> u32 {
    13
}

fn default_close_hour() -> u32 {
    24
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GenerateSlotsRequest {
    pub from: DateTime<Utc>,
    /// Exclusive.
    pub to: DateTime<Utc>,
    #[serde(default = "default_open_hour")]
    pub open_hour: u32,
    /// Exclusive; 24 means the grid runs up to midnight.
    #[serde(default = "default_close_hour")]
    pub close_hour: u32,
    /// Must equal the configured slot length when given; blocks are built from
    /// contiguous slots of that length.
    #[serde(default)]
    pub step_min: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum BulkAction {
    MarkTaken,
    MarkFree,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BulkRequest {
    pub action: BulkAction,
    pub from: DateTime<Utc>,
    /// Exclusive.
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenerateSlotsResponse {
    pub created: u64,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BulkResponse {
    pub affected: u64,
}

/// Parses an IANA zone name, falling back to UTC.
pub fn parse_time_zone(name: &str) -> Tz {
    Tz::from_str(name).unwrap_or_else(|_| {
        warn!("Unknown time zone '{}', using UTC", name);
        Tz::UTC
    })
}

/// Start times of a daily grid in local time, converted to UTC.
///
/// Covers the local dates `first..=last`, minutes `[open_hour*60, close_hour*60)` in
/// steps of `step_min`. Local times that don't exist (DST gaps) are skipped; ambiguous
/// ones use the earlier instant.
pub fn grid_starts(
    tz: Tz,
    first: NaiveDate,
    last: NaiveDate,
    open_hour: u32,
    close_hour: u32,
    step_min: u32,
) -> Vec<DateTime<Utc>> {
    let mut starts = Vec::new();
    if step_min == 0 {
        return starts;
    }
    let close = (close_hour * 60).min(MINUTES_PER_DAY);
    for day in first.iter_days().take_while(|d| *d <= last) {
        let mut minute = open_hour * 60;
        while minute < close {
            let Some(time) = NaiveTime::from_hms_opt(minute / 60, minute % 60, 0) else {
                break;
            };
            if let Some(local) = tz.from_local_datetime(&day.and_time(time)).earliest() {
                starts.push(local.with_timezone(&Utc));
            } else {
                debug!(%day, minute, "Skipping nonexistent local time");
            }
            minute += step_min;
        }
    }
    starts
}

fn check_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), BookingError> {
    if to <= from {
        return Err(BookingError::validation("'to' must be after 'from'"));
    }
    Ok(())
}

/// Creates the grid for `[from, to)`. Existing start times are left alone.
pub async fn generate_slots(
    db: &DbClient,
    config: &BookingConfig,
    request: &GenerateSlotsRequest,
) -> Result<u64, BookingError> {
    check_range(request.from, request.to)?;
    if request.open_hour >= request.close_hour || request.close_hour > 24 {
        return Err(BookingError::validation(
            "openHour must be before closeHour and closeHour at most 24",
        ));
    }
    let step_min = request
        .step_min
        .unwrap_or_else(|| u32::try_from(config.slot_minutes).unwrap_or(0));
    if step_min == 0 || i64::from(step_min) != config.slot_minutes {
        return Err(BookingError::validation(format!(
            "stepMin must equal the slot length of {} minutes",
            config.slot_minutes
        )));
    }

    let tz = parse_time_zone(&config.time_zone);
    let first = request.from.with_timezone(&tz).date_naive();
    let last = request.to.with_timezone(&tz).date_naive();
    let starts: Vec<_> = grid_starts(
        tz,
        first,
        last,
        request.open_hour,
        request.close_hour,
        step_min,
    )
    .into_iter()
    .filter(|start| *start >= request.from && *start < request.to)
    .collect();

    let created = SqlSlotRepository::new(db.clone())
        .insert_grid(&starts, config.slot_minutes)
        .await?;
    info!(
        from = %request.from,
        to = %request.to,
        candidates = starts.len(),
        created,
        "Generated slots"
    );
    Ok(created)
}

/// Applies `request.action` to every slot starting in `[from, to)`.
pub async fn bulk_update(db: &DbClient, request: &BulkRequest) -> Result<u64, BookingError> {
    check_range(request.from, request.to)?;
    let repo = SqlSlotRepository::new(db.clone());
    let affected = match request.action {
        BulkAction::MarkTaken => repo.bulk_set_taken(request.from, request.to, true).await?,
        BulkAction::MarkFree => repo.bulk_set_taken(request.from, request.to, false).await?,
        BulkAction::Delete => repo.bulk_delete(request.from, request.to).await?,
    };
    info!(action = ?request.action, from = %request.from, to = %request.to, affected, "Bulk slot update");
    Ok(affected)
}

/// Seeds `seed_days` local days starting at `today` with the configured opening hours.
/// Re-running it only fills in missing start times.
pub async fn seed_default_window(
    db: &DbClient,
    config: &BookingConfig,
    today: NaiveDate,
) -> Result<u64, BookingError> {
    if config.seed_days <= 0 {
        return Ok(0);
    }
    let tz = parse_time_zone(&config.time_zone);
    let last = today + Duration::days(config.seed_days - 1);
    let step = u32::try_from(config.slot_minutes)
        .map_err(|_| BookingError::Internal("slot_minutes out of range".to_string()))?;
    let starts = grid_starts(tz, today, last, config.open_hour, config.close_hour, step);
    let created = SqlSlotRepository::new(db.clone())
        .insert_grid(&starts, config.slot_minutes)
        .await?;
    info!(
        days = config.seed_days,
        candidates = starts.len(),
        created,
        "Seeded slot window"
    );
    Ok(created)
}
