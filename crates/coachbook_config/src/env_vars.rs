//! Environment variable naming for the coachbook services.
//!
//! Plain settings live under the prefixed, `__`-separated scheme understood by
//! [`crate::load_config`]. Secrets may additionally be supplied under their
//! conventional provider names (`STRIPE_SECRET_KEY`, `PAYPAL_CLIENT_ID`, `ADMIN_KEY`),
//! which is what deployment dashboards usually expose.

use std::env;

/// The default prefix for configuration environment variables
pub const DEFAULT_PREFIX: &str = "COACHBOOK";

/// The separator for configuration environment variables
pub const CONFIG_SEPARATOR: &str = "__";

/// The separator used in conventional secret names
pub const SECRET_SEPARATOR: &str = "_";

/// Get the prefix for configuration environment variables
pub fn get_config_prefix() -> String {
    env::var("PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string())
}

/// Convert a configuration path to an environment variable name
///
/// `server.host` becomes `COACHBOOK__SERVER__HOST`.
pub fn config_path_to_env_var(path: &str) -> String {
    let prefix = get_config_prefix();
    let path = path.replace('.', CONFIG_SEPARATOR);
    format!("{}{}{}", prefix, CONFIG_SEPARATOR, path).to_uppercase()
}

/// Convert a secret path to its conventional environment variable name
///
/// `stripe.secret_key` becomes `STRIPE_SECRET_KEY`, `admin.key` becomes `ADMIN_KEY`.
pub fn secret_path_to_env_var(path: &str) -> String {
    path.replace('.', SECRET_SEPARATOR).to_uppercase()
}

/// Resolve a secret: the configured value wins, then the conventional env var.
///
/// Empty strings count as unset so a blank placeholder in a config file does not
/// shadow the environment.
pub fn secret(path: &str, configured: Option<&str>) -> Option<String> {
    configured
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            env::var(secret_path_to_env_var(path))
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_to_env_var() {
        assert_eq!(
            config_path_to_env_var("server.host"),
            "COACHBOOK__SERVER__HOST"
        );
        assert_eq!(
            config_path_to_env_var("availability.min_lead_minutes"),
            "COACHBOOK__AVAILABILITY__MIN_LEAD_MINUTES"
        );
    }

    #[test]
    fn test_secret_path_to_env_var() {
        assert_eq!(secret_path_to_env_var("stripe.secret_key"), "STRIPE_SECRET_KEY");
        assert_eq!(secret_path_to_env_var("paypal.client_id"), "PAYPAL_CLIENT_ID");
        assert_eq!(secret_path_to_env_var("admin.key"), "ADMIN_KEY");
    }

    #[test]
    fn configured_secret_wins_and_blank_is_ignored() {
        assert_eq!(
            secret("coachbook_test.never_set_anywhere", Some("abc")).as_deref(),
            Some("abc")
        );
        assert_eq!(secret("coachbook_test.never_set_anywhere", Some("  ")), None);
        assert_eq!(secret("coachbook_test.never_set_anywhere", None), None);
    }
}
