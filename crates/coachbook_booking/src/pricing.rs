//! Session pricing. All amounts are integer minor units (cents).

use crate::error::BookingError;
use coachbook_config::BookingConfig;
use serde::{Deserialize, Serialize};

/// Price of a session up to [`INCLUDED_MINUTES`] long, without add-ons.
pub const BASE_CENTS: i64 = 5000;
pub const INCLUDED_MINUTES: i64 = 60;
/// Each live minute beyond [`INCLUDED_MINUTES`] costs half a currency unit.
pub const EXTRA_CENTS_PER_MINUTE: i64 = 50;
pub const FOLLOWUP_CENTS: i64 = 1000;

/// Server-side price for a session; the client never supplies an amount.
pub fn price_cents(live_minutes: i64, followups: i64) -> i64 {
    let extra = (live_minutes - INCLUDED_MINUTES).max(0) * EXTRA_CENTS_PER_MINUTE;
    let follow = followups.max(0) * FOLLOWUP_CENTS;
    BASE_CENTS + extra + follow
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub amount_cents: i64,
    /// ISO 4217, upper case.
    pub currency: String,
    /// Major units with two decimals, e.g. "65.00".
    pub display_value: String,
}

pub fn quote(live_minutes: i64, followups: i64, currency: &str) -> PriceQuote {
    let amount_cents = price_cents(live_minutes, followups);
    PriceQuote {
        amount_cents,
        currency: currency.to_uppercase(),
        display_value: format_amount(amount_cents),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[serde(rename_all = "camelCase")]
pub struct PriceQuery {
    pub live_minutes: i64,
    #[serde(default)]
    pub followups: Option<i64>,
}

/// Quote for a checkout-sized session in the configured currency. Bounds match the
/// ones checkout enforces, so a quoted price is always one a checkout can charge.
pub fn quote_for(query: &PriceQuery, config: &BookingConfig) -> Result<PriceQuote, BookingError> {
    if query.live_minutes < config.checkout_min_minutes
        || query.live_minutes > config.checkout_max_minutes
    {
        return Err(BookingError::validation(format!(
            "liveMinutes must be between {} and {}",
            config.checkout_min_minutes, config.checkout_max_minutes
        )));
    }
    let followups = query.followups.unwrap_or(0);
    if !(0..=config.max_followups).contains(&followups) {
        return Err(BookingError::validation(format!(
            "followups must be between 0 and {}",
            config.max_followups
        )));
    }
    Ok(quote(query.live_minutes, followups, &config.currency))
}

/// "x.xx" rendering of a cent amount.
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parses a provider amount such as "65.00" or "65.5" into cents.
pub fn parse_amount(value: &str) -> Option<i64> {
    let value = value.trim();
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    let sign = if whole < 0 || value.starts_with('-') { -1 } else { 1 };
    Some(whole * 100 + sign * frac_cents)
}
