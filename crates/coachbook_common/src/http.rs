// --- File: crates/coachbook_common/src/http.rs ---
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{CoachbookError, HttpStatusCode};

pub mod client;

/// Builds the JSON error body used by every coachbook endpoint:
/// `{"error": {"message": ..., "code": <status>, "kind": ...}}`.
pub fn error_response(status_code: StatusCode, message: &str, kind: &str) -> Response {
    let body = Json(json!({
        "error": {
            "message": message,
            "code": status_code.as_u16(),
            "kind": kind,
        }
    }));
    (status_code, body).into_response()
}

/// Extension trait for CoachbookError to convert it to an Axum HTTP response.
pub trait IntoHttpResponse {
    fn into_http_response(self) -> Response;
}

impl IntoHttpResponse for CoachbookError {
    fn into_http_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(status_code, &self.public_message(), self.kind())
    }
}

impl IntoResponse for CoachbookError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}
