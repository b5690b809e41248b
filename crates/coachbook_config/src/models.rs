// --- File: crates/coachbook_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
        }
    }
}

// --- Database Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite://data/coachbook.db, via COACHBOOK__DATABASE__URL
    #[serde(default)]
    pub max_connections: Option<u32>,
}

// --- Public site settings ---
/// Values used to build the buyer-facing redirect targets.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_brand_name")]
    pub brand_name: String,
}

impl SiteConfig {
    pub fn success_url(&self) -> String {
        format!("{}/checkout/success", self.base_url.trim_end_matches('/'))
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/checkout/cancel", self.base_url.trim_end_matches('/'))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            brand_name: default_brand_name(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_brand_name() -> String {
    "Coaching".to_string()
}

// --- Booking rules ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BookingConfig {
    /// Length of one atomic slot.
    pub slot_minutes: i64,
    pub hold_ttl_minutes: i64,
    pub currency: String,
    /// IANA zone used for operating hours, e.g. "Europe/Berlin".
    pub time_zone: String,
    pub checkout_min_minutes: i64,
    pub checkout_max_minutes: i64,
    pub direct_min_minutes: i64,
    pub direct_max_minutes: i64,
    pub max_followups: i64,
    pub seed_on_startup: bool,
    pub seed_days: i64,
    pub open_hour: u32,
    pub close_hour: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            slot_minutes: 15,
            hold_ttl_minutes: 10,
            currency: "EUR".to_string(),
            time_zone: "UTC".to_string(),
            checkout_min_minutes: 30,
            checkout_max_minutes: 120,
            direct_min_minutes: 15,
            direct_max_minutes: 120,
            max_followups: 4,
            seed_on_startup: false,
            seed_days: 7,
            open_hour: 13,
            close_hour: 24,
        }
    }
}

// --- Availability filter ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AvailabilityConfig {
    pub min_lead_minutes: i64,
    pub max_advance_days: i64,
    pub hours_start: u32,
    pub hours_end: u32,
    /// Allowed minute-of-hour for a start. Empty means every grid position.
    pub minute_starts: Vec<u32>,
    /// Maximum starts returned per local day, 0 = unlimited.
    pub per_day_cap: usize,
    /// Skip starts whose block overlaps someone else's live hold.
    pub hide_held: bool,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            min_lead_minutes: 240,
            max_advance_days: 45,
            hours_start: 13,
            hours_end: 24,
            minute_starts: vec![0, 30],
            per_day_cap: 0,
            hide_held: true,
        }
    }
}

// --- Stripe Config ---
// Secrets fall back to STRIPE_SECRET_KEY / STRIPE_WEBHOOK_SECRET when not set here.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StripeConfig {
    pub api_base: String,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com".to_string(),
            secret_key: None,
            webhook_secret: None,
            webhook_tolerance_secs: 600,
            success_url: None,
            cancel_url: None,
        }
    }
}

// --- PayPal Config ---
// Credentials fall back to PAYPAL_CLIENT_ID / PAYPAL_SECRET.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PaypalConfig {
    /// "live" or "sandbox".
    pub env: String,
    /// Overrides the base derived from `env`.
    pub api_base: Option<String>,
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub custom_id_limit: usize,
}

impl PaypalConfig {
    pub fn base_url(&self) -> String {
        if let Some(base) = self.api_base.as_deref().filter(|b| !b.is_empty()) {
            return base.trim_end_matches('/').to_string();
        }
        if self.env.eq_ignore_ascii_case("live") {
            "https://api-m.paypal.com".to_string()
        } else {
            "https://api-m.sandbox.paypal.com".to_string()
        }
    }
}

impl Default for PaypalConfig {
    fn default() -> Self {
        Self {
            env: "sandbox".to_string(),
            api_base: None,
            client_id: None,
            secret: None,
            custom_id_limit: 127,
        }
    }
}

// --- Admin Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AdminConfig {
    #[serde(default, skip_serializing)]
    pub key: Option<String>, // falls back to ADMIN_KEY
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    // Server config is mandatory
    pub server: ServerConfig,

    // --- Runtime Flags (optional in config file, default to false) ---
    #[serde(default)]
    pub use_stripe: bool,
    #[serde(default)]
    pub use_paypal: bool,

    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub availability: AvailabilityConfig,
    #[serde(default)]
    pub stripe: Option<StripeConfig>,
    #[serde(default)]
    pub paypal: Option<PaypalConfig>,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paypal_base_url_follows_env() {
        let mut cfg = PaypalConfig::default();
        assert_eq!(cfg.base_url(), "https://api-m.sandbox.paypal.com");
        cfg.env = "LIVE".to_string();
        assert_eq!(cfg.base_url(), "https://api-m.paypal.com");
        cfg.api_base = Some("http://127.0.0.1:9999/".to_string());
        assert_eq!(cfg.base_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let cfg: AppConfig = serde_json::from_value(serde_json::json!({
            "server": { "host": "0.0.0.0", "port": 9000 },
            "availability": { "per_day_cap": 3 },
            "booking": { "time_zone": "Europe/Berlin" }
        }))
        .expect("config parses");

        assert_eq!(cfg.availability.per_day_cap, 3);
        assert_eq!(cfg.availability.min_lead_minutes, 240);
        assert_eq!(cfg.availability.minute_starts, vec![0, 30]);
        assert_eq!(cfg.booking.time_zone, "Europe/Berlin");
        assert_eq!(cfg.booking.slot_minutes, 15);
        assert!(!cfg.use_stripe);
        assert!(cfg.stripe.is_none());
    }

    #[test]
    fn redirect_urls_strip_trailing_slash() {
        let site = SiteConfig {
            base_url: "https://coach.example/".to_string(),
            brand_name: "Coach".to_string(),
        };
        assert_eq!(site.success_url(), "https://coach.example/checkout/success");
        assert_eq!(site.cancel_url(), "https://coach.example/checkout/cancel");
    }
}
