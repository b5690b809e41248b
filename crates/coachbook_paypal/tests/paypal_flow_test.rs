//! Order creation and capture against a mock PayPal API and an in-memory database.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, TimeZone, Utc};
use coachbook_booking::pricing::price_cents;
use coachbook_common::models::{BookingStatus, Slot};
use coachbook_config::{AppConfig, DatabaseConfig, PaypalConfig};
use coachbook_db::{
    init_schema, BookingRepository, DbClient, ProcessedEventRepository, SlotRepository,
    SqlBookingRepository, SqlProcessedEventRepository, SqlSlotRepository,
};
use coachbook_paypal::{encode_custom_id, routes, CustomFields};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn memory_db() -> DbClient {
    let db = DbClient::from_config(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
    })
    .await
    .expect("in-memory database");
    init_schema(&db).await.expect("schema");
    db
}

/// Four quarter hours on 2030-01-07 from 14:00 UTC.
async fn seed_block(db: &DbClient) -> Vec<Slot> {
    let first = Utc.with_ymd_and_hms(2030, 1, 7, 14, 0, 0).unwrap();
    let repo = SqlSlotRepository::new(db.clone());
    let starts: Vec<_> = (0..4).map(|i| first + Duration::minutes(15 * i)).collect();
    repo.insert_grid(&starts, 15).await.expect("seed");
    repo.list_range(first, first + Duration::hours(1)).await.expect("list")
}

/// PayPal tokens are cached per API base and client id, and wiremock hands
/// out pooled servers, so every test signs in as its own client.
fn config(api_base: &str, client_id: &str) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        use_paypal: true,
        paypal: Some(PaypalConfig {
            api_base: Some(api_base.to_string()),
            client_id: Some(client_id.to_string()),
            secret: Some("secret".to_string()),
            ..PaypalConfig::default()
        }),
        ..AppConfig::default()
    })
}

async fn mount_token(server: &MockServer, client_id: &str, expected_calls: u64) {
    let basic = format!("Basic {}", STANDARD.encode(format!("{}:secret", client_id)));
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .and(header_eq("authorization", basic.as_str()))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A21AA-test",
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn custom_id_for(anchor: i64) -> String {
    encode_custom_id(
        &CustomFields {
            a: anchor,
            m: 60,
            t: "VOD Review".to_string(),
            d: "player#1234".to_string(),
            g: false,
            f: 0,
            p: price_cents(60, 0),
        },
        127,
    )
    .unwrap()
}

fn completed_capture(order_id: &str, custom_id: &str) -> Value {
    json!({
        "id": order_id,
        "status": "COMPLETED",
        "payer": { "email_address": "buyer@example.com" },
        "purchase_units": [{
            "reference_id": "1",
            "custom_id": custom_id,
            "payments": { "captures": [{
                "id": "CAP-1",
                "status": "COMPLETED",
                "amount": { "currency_code": "EUR", "value": "50.00" }
            }]}
        }]
    })
}

#[tokio::test]
async fn create_order_reuses_the_cached_token() {
    let server = MockServer::start().await;
    mount_token(&server, "client-reuse", 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(header_eq("authorization", "Bearer A21AA-test"))
        .and(header_eq("prefer", "return=representation"))
        .and(body_string_contains("\"intent\":\"CAPTURE\""))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-1",
            "status": "CREATED",
            "links": [
                { "href": "https://api.sandbox.paypal.com/v2/checkout/orders/ORDER-1", "rel": "self" },
                { "href": "https://www.sandbox.paypal.com/checkoutnow?token=ORDER-1", "rel": "approve" }
            ]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let db = memory_db().await;
    let slots = seed_block(&db).await;
    let app = routes(config(&server.uri(), "client-reuse"), db.clone());
    let body = json!({ "slotId": slots[0].id, "sessionType": "VOD Review", "liveMinutes": 60 });

    let (status, first) = call(&app, post_json("/paypal/create-order", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], "ORDER-1");
    assert_eq!(
        first["approveUrl"],
        "https://www.sandbox.paypal.com/checkoutnow?token=ORDER-1"
    );

    // A retry with the returned key refreshes the same hold.
    let mut retry = body;
    retry["holdKey"] = first["holdKey"].clone();
    let (status, second) = call(&app, post_json("/paypal/create-order", retry)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["holdKey"], first["holdKey"]);

    let requests = server.received_requests().await.unwrap();
    let order_request = requests
        .iter()
        .find(|r| r.url.path() == "/v2/checkout/orders")
        .unwrap();
    let expected_id = format!(
        "{}:{}:paypal",
        slots.iter().map(|s| s.id.to_string()).collect::<Vec<_>>().join("|"),
        price_cents(60, 0)
    );
    assert_eq!(
        order_request.headers.get("paypal-request-id").unwrap().to_str().unwrap(),
        expected_id
    );
}

#[tokio::test]
async fn oversized_custom_id_is_rejected_before_calling_paypal() {
    let server = MockServer::start().await;
    let db = memory_db().await;
    let slots = seed_block(&db).await;
    let app = routes(config(&server.uri(), "client-oversized"), db.clone());

    let (status, body) = call(
        &app,
        post_json(
            "/paypal/create-order",
            json!({
                "slotId": slots[0].id,
                "sessionType": "Extended Replay Analysis With Personal Training Plan",
                "liveMinutes": 60,
                "discord": "a-rather-long-discord-handle-that-still-passes-validation#0001",
                "followups": 4
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("custom_id"));
    assert!(server.received_requests().await.unwrap().is_empty());

    // The hold taken for the attempt is given back.
    let after = SqlSlotRepository::new(db.clone())
        .list_range(slots[0].start_time, slots[3].start_time + Duration::minutes(15))
        .await
        .unwrap();
    assert!(after.iter().all(|s| s.hold_key.is_none()));
}

#[tokio::test]
async fn capture_books_the_derived_block_once() {
    let server = MockServer::start().await;
    mount_token(&server, "client-capture", 1).await;
    let db = memory_db().await;
    let slots = seed_block(&db).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-7/capture"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(completed_capture("ORDER-7", &custom_id_for(slots[0].id))),
        )
        .mount(&server)
        .await;
    let app = routes(config(&server.uri(), "client-capture"), db.clone());

    let (status, body) = call(&app, post_json("/paypal/capture", json!({ "orderId": "ORDER-7" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["outcome"], "finalized");

    let booking = SqlBookingRepository::new(db.clone())
        .find_by_slot(slots[0].id)
        .await
        .unwrap()
        .expect("booking");
    assert_eq!(booking.status, BookingStatus::Paid);
    assert_eq!(booking.block, slots.iter().map(|s| s.id).collect::<Vec<_>>());
    assert_eq!(booking.amount_cents, Some(5000));
    assert_eq!(booking.provider_ref.as_deref(), Some("ORDER-7"));

    let (status, again) = call(&app, post_json("/paypal/capture", json!({ "orderId": "ORDER-7" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["outcome"], "alreadyProcessed");
    assert_eq!(SqlProcessedEventRepository::new(db.clone()).count().await.unwrap(), 1);
}

#[tokio::test]
async fn pending_capture_is_not_completed() {
    let server = MockServer::start().await;
    mount_token(&server, "client-pending", 1).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-8/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-8",
            "status": "PAYER_ACTION_REQUIRED",
            "purchase_units": []
        })))
        .mount(&server)
        .await;
    let db = memory_db().await;
    let app = routes(config(&server.uri(), "client-pending"), db.clone());

    let (status, body) = call(&app, post_json("/paypal/capture", json!({ "orderId": "ORDER-8" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "not_completed");
    assert_eq!(SqlBookingRepository::new(db).count().await.unwrap(), 0);
}

#[tokio::test]
async fn failed_finalization_refunds_the_capture() {
    let server = MockServer::start().await;
    mount_token(&server, "client-refund", 1).await;
    let db = memory_db().await;
    let slots = seed_block(&db).await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-9/capture"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(completed_capture("ORDER-9", &custom_id_for(slots[0].id))),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/payments/captures/CAP-1/refund"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "REF-1",
            "status": "COMPLETED",
            "amount": { "currency_code": "EUR", "value": "50.00" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    db.execute("DROP TABLE bookings").await.unwrap();
    let app = routes(config(&server.uri(), "client-refund"), db.clone());

    let (status, _) = call(&app, post_json("/paypal/capture", json!({ "orderId": "ORDER-9" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // The refund runs detached from the request.
    for _ in 0..50 {
        let refunded = server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .any(|r| r.url.path().ends_with("/refund"));
        if refunded {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(SqlProcessedEventRepository::new(db.clone()).count().await.unwrap(), 0);
    server.verify().await;
}

#[tokio::test]
async fn blank_order_id_is_a_validation_error() {
    let db = memory_db().await;
    let app = routes(config("http://127.0.0.1:9", "client-blank"), db);
    let (status, body) = call(&app, post_json("/paypal/capture", json!({ "orderId": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");
}
