#[cfg(test)]
mod tests {
    use crate::routes::routes;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use coachbook_config::{AdminConfig, AppConfig, DatabaseConfig};
    use coachbook_db::{init_schema, DbClient};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY: &str = "test-admin-key";

    async fn app(admin_key: Option<&str>) -> Router {
        let db = DbClient::from_config(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
        })
        .await
        .expect("in-memory database");
        init_schema(&db).await.expect("schema");

        let config = AppConfig {
            admin: AdminConfig {
                key: admin_key.map(str::to_string),
            },
            ..AppConfig::default()
        };
        routes(Arc::new(config), db)
    }

    fn post_json(uri: &str, body: Value, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("x-admin-key", key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn generate_body() -> Value {
        json!({ "from": "2030-01-07T00:00:00Z", "to": "2030-01-08T00:00:00Z" })
    }

    #[tokio::test]
    async fn admin_routes_require_the_key() {
        let app = app(Some(KEY)).await;

        let missing = app
            .clone()
            .oneshot(post_json("/admin/slots/generate", generate_body(), None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(post_json("/admin/slots/generate", generate_body(), Some("nope")))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let ok = app
            .oneshot(post_json("/admin/slots/generate", generate_body(), Some(KEY)))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(json_body(ok).await["created"], 44);
    }

    #[tokio::test]
    async fn public_routes_do_not_need_the_key() {
        let app = app(Some(KEY)).await;
        let response = app
            .oneshot(get("/slots?from=2030-01-07T00:00:00Z&to=2030-01-08T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn direct_booking_then_conflict() {
        let app = app(Some(KEY)).await;
        app.clone()
            .oneshot(post_json("/admin/slots/generate", generate_body(), Some(KEY)))
            .await
            .unwrap();

        let slots = json_body(
            app.clone()
                .oneshot(get("/slots?from=2030-01-07T13:00:00Z&to=2030-01-07T14:00:00Z"))
                .await
                .unwrap(),
        )
        .await;
        let anchor = slots[0]["id"].as_i64().unwrap();

        let booking = json!({
            "slotId": anchor,
            "sessionType": "Replay Analysis",
            "liveMinutes": 60,
            "discord": "player#1234"
        });
        let created = app
            .clone()
            .oneshot(post_json("/bookings", booking.clone(), None))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let body = json_body(created).await;
        assert_eq!(body["status"], "pending");
        assert_eq!(body["block"].as_array().unwrap().len(), 4);

        let again = app
            .oneshot(post_json("/bookings", booking, None))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(again).await["error"]["kind"], "unavailable");
    }

    #[tokio::test]
    async fn price_is_quoted_in_configured_currency() {
        let app = app(None).await;

        let response = app
            .clone()
            .oneshot(get("/price?liveMinutes=60&followups=2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["amountCents"], 7000);
        assert_eq!(body["currency"], "EUR");
        assert_eq!(body["displayValue"], "70.00");

        let out_of_range = app.oneshot(get("/price?liveMinutes=5")).await.unwrap();
        assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn inverted_window_is_a_bad_request() {
        let app = app(None).await;
        let response = app
            .oneshot(get("/slots?from=2030-01-08T00:00:00Z&to=2030-01-07T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn window_past_the_last_representable_day_is_a_bad_request() {
        let app = app(None).await;
        let last_day = chrono::DateTime::<chrono::Utc>::MAX_UTC
            .format("%Y-%m-%dT00:00:00Z")
            .to_string()
            .replace('+', "%2B");

        for uri in [
            format!("/slots?from={}", last_day),
            format!("/availability?from={}", last_day),
            format!("/availability?from={}&liveMinutes=60", last_day),
        ] {
            let response = app.clone().oneshot(get(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[tokio::test]
    async fn ics_is_served_as_attachment() {
        let app = app(None).await;
        let response = app
            .oneshot(get("/ics?start=2030-01-07T13:00:00Z&minutes=45&title=Review"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/calendar; charset=utf-8"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("DTEND:20300107T134500Z\r\n"));
        assert!(text.contains("SUMMARY:Review\r\n"));
    }

    #[tokio::test]
    async fn health_reports_database() {
        let app = app(None).await;
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["database"], true);
    }
}
