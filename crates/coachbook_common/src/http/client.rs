// --- File: crates/coachbook_common/src/http/client.rs ---
use once_cell::sync::Lazy;
use reqwest::{Client, Error as ReqwestError};
use std::time::Duration;

/// Default timeout for outbound provider calls in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Shared outbound client for payment provider calls.
///
/// Falls back to a default client if the builder fails, which only happens when the
/// TLS backend cannot initialise.
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    create_client(DEFAULT_TIMEOUT_SECS, true).unwrap_or_else(|e| {
        tracing::error!("Failed to build configured HTTP client, using defaults: {}", e);
        Client::new()
    })
});

/// Creates a new HTTP client with custom configuration.
pub fn create_client(timeout_secs: u64, follow_redirects: bool) -> Result<Client, ReqwestError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(if follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        })
        .build()
}

/// Pulls a human readable message out of a provider error body.
///
/// Understands Stripe's `{"error": {"message": ...}}`, PayPal's
/// `{"message": ...}` / `{"error_description": ...}`, and falls back to the raw text.
pub fn provider_error_message(body_text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body_text) {
        Ok(json_body) => json_body
            .get("error")
            .and_then(|e| e.get("message"))
            .or_else(|| json_body.get("message"))
            .or_else(|| json_body.get("error_description"))
            .and_then(|m| m.as_str())
            .unwrap_or(body_text)
            .to_string(),
        Err(_) => body_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_provider_messages() {
        assert_eq!(
            provider_error_message(r#"{"error":{"message":"No such price"}}"#),
            "No such price"
        );
        assert_eq!(
            provider_error_message(r#"{"name":"INVALID_REQUEST","message":"Request is not well-formed"}"#),
            "Request is not well-formed"
        );
        assert_eq!(
            provider_error_message(r#"{"error":"invalid_client","error_description":"Client Authentication failed"}"#),
            "Client Authentication failed"
        );
        assert_eq!(provider_error_message("gateway timeout"), "gateway timeout");
    }
}
