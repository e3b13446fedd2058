//! HTTP surface tests: the full router against the stub carrier and the
//! in-memory store, driven through tower without binding a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use courier_dispatch::StubCarrier;
use courier_store::{MemoryStore, ShipmentRepository, Store};
use courier_testkit::test_address;
use courierd::{create_router, Config, Daemon};

struct TestApp {
    router: Router,
    carrier: Arc<StubCarrier>,
    store: Arc<MemoryStore>,
}

fn app_with_config(config: Config) -> TestApp {
    let carrier = Arc::new(StubCarrier::new());
    let store = Arc::new(MemoryStore::new());
    let daemon = Daemon::assemble(config, carrier.clone(), store.clone()).unwrap();

    TestApp {
        router: create_router(daemon.state()),
        carrier,
        store,
    }
}

fn app() -> TestApp {
    app_with_config(Config::test())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

fn create_body() -> Value {
    json!({
        "order_id": "O1",
        "pickup": test_address(),
        "delivery": test_address(),
    })
}

async fn create_shipment(app: &TestApp) -> Value {
    let (status, body) = post_json(&app.router, "/delhivery/create-shipment", create_body()).await;
    assert_eq!(status, StatusCode::OK);
    body
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_create_shipment_returns_created_record() {
    let app = app();

    let body = create_shipment(&app).await;

    assert_eq!(body["status"], "CREATED");
    assert_eq!(body["order_id"], "O1");
    assert_eq!(body["carrier"], "delhivery");
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
    assert!(body["tracking_number"].as_str().unwrap().starts_with("STUB-"));
    assert_eq!(app.store.shipment_count(), 1);
}

#[tokio::test]
async fn test_create_shipment_unknown_carrier() {
    let app = app();

    let (status, body) =
        post_json(&app.router, "/pigeon-post/create-shipment", create_body()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Unknown carrier"));
    assert_eq!(app.store.shipment_count(), 0);
}

#[tokio::test]
async fn test_create_shipment_carrier_rejection_is_502() {
    let app = app();
    app.carrier.reject_next("Pincode not serviceable");

    let (status, _) = post_json(&app.router, "/delhivery/create-shipment", create_body()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(app.store.shipment_count(), 0);
}

#[tokio::test]
async fn test_create_shipment_carrier_unreachable_is_503() {
    let app = app();
    app.carrier.fail_times(10);

    let (status, body) =
        post_json(&app.router, "/delhivery/create-shipment", create_body()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("3 attempts"));
    assert_eq!(app.store.shipment_count(), 0);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_shipment() {
    let app = app();
    let created = create_shipment(&app).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = post_json(
        &app.router,
        &format!("/delhivery/cancel/{}", id),
        Value::Null,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
}

#[tokio::test]
async fn test_cancel_delivered_shipment_is_400() {
    let app = app();
    let created = create_shipment(&app).await;
    let id = created["id"].as_str().unwrap();
    let tracking = created["tracking_number"].as_str().unwrap();

    let (status, _) = post_json(
        &app.router,
        "/delhivery/webhook",
        json!({ "shipmentId": tracking, "event": "DELIVERED" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app.router,
        &format!("/delhivery/cancel/{}", id),
        Value::Null,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("terminal"));
    // The terminal check fires before any carrier call
    assert_eq!(app.carrier.call_count("cancel"), 0);
}

#[tokio::test]
async fn test_cancel_rejected_by_carrier_is_502_and_state_unchanged() {
    let app = app();
    let created = create_shipment(&app).await;
    let id = created["id"].as_str().unwrap();
    app.carrier.refuse_cancel(true);

    let (status, _) = post_json(
        &app.router,
        &format!("/delhivery/cancel/{}", id),
        Value::Null,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let shipment_id = uuid::Uuid::parse_str(id).unwrap();
    let stored = app
        .store
        .shipments()
        .find_by_id(shipment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, courier_domain::ShipmentStatus::Created);
}

// =============================================================================
// Webhooks
// =============================================================================

#[tokio::test]
async fn test_webhook_duplicate_delivery() {
    let app = app();
    let created = create_shipment(&app).await;
    let tracking = created["tracking_number"].as_str().unwrap();

    let payload = json!({ "shipmentId": tracking, "event": "DELIVERED" });

    let (status, body) = post_json(&app.router, "/delhivery/webhook", payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let (status, body) = post_json(&app.router, "/delhivery/webhook", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");

    // Exactly one DELIVERED history entry despite two deliveries
    let tracking_number = courier_domain::TrackingNumber::new(tracking).unwrap();
    let stored = app
        .store
        .shipments()
        .find_by_tracking_number(&tracking_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, courier_domain::ShipmentStatus::Delivered);
    let delivered = stored
        .history
        .iter()
        .filter(|e| e.status == courier_domain::ShipmentStatus::Delivered)
        .count();
    assert_eq!(delivered, 1);
}

#[tokio::test]
async fn test_webhook_unknown_shipment_is_acknowledged() {
    let app = app();

    let (status, body) = post_json(
        &app.router,
        "/delhivery/webhook",
        json!({ "shipmentId": "D999", "event": "DELIVERED" }),
    )
    .await;

    // Acknowledged so the carrier stops redelivering; anomaly is logged
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "unknown_shipment");
}

#[tokio::test]
async fn test_webhook_unknown_event_type_is_400() {
    let app = app();
    let created = create_shipment(&app).await;
    let tracking = created["tracking_number"].as_str().unwrap();

    let (status, _) = post_json(
        &app.router,
        "/delhivery/webhook",
        json!({ "shipmentId": tracking, "event": "TELEPORTED" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_accepts_event_type_field_name() {
    let app = app();
    let created = create_shipment(&app).await;
    let tracking = created["tracking_number"].as_str().unwrap();

    let (status, body) = post_json(
        &app.router,
        "/delhivery/webhook",
        json!({ "shipmentId": tracking, "eventType": "IN_TRANSIT" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
}

// =============================================================================
// Tracking and rates
// =============================================================================

#[tokio::test]
async fn test_track_unknown_shipment_is_404() {
    let app = app();

    let (status, _) = get(
        &app.router,
        &format!("/delhivery/track/{}", uuid::Uuid::now_v7()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_track_returns_live_snapshot() {
    let app = app();
    let created = create_shipment(&app).await;
    let id = created["id"].as_str().unwrap();
    let tracking = created["tracking_number"].as_str().unwrap();
    app.carrier
        .set_status(tracking, courier_domain::ShipmentStatus::InTransit);

    let (status, body) = get(&app.router, &format!("/delhivery/track/{}", id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "IN_TRANSIT");
}

#[tokio::test]
async fn test_rates() {
    let app = app();

    let (status, body) = get(
        &app.router,
        "/delhivery/rates?pickup_postal_code=560001&delivery_postal_code=110001&weight_grams=1500",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

// =============================================================================
// Admin gate
// =============================================================================

#[tokio::test]
async fn test_admin_token_required_when_configured() {
    let mut config = Config::test();
    config.auth.admin_token = Some("s3cret".to_string());
    let app = app_with_config(config);

    // No token
    let (status, _) = post_json(&app.router, "/delhivery/create-shipment", create_body()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct token
    let request = Request::builder()
        .method("POST")
        .uri("/delhivery/create-shipment")
        .header("content-type", "application/json")
        .header("Authorization", "Bearer s3cret")
        .body(Body::from(create_body().to_string()))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CREATED");

    // Webhooks are carrier-facing, not admin-gated
    let tracking = body["tracking_number"].as_str().unwrap();
    let (status, _) = post_json(
        &app.router,
        "/delhivery/webhook",
        json!({ "shipmentId": tracking, "event": "IN_TRANSIT" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Listing and metrics
// =============================================================================

#[tokio::test]
async fn test_list_shipments_by_status() {
    let app = app();
    create_shipment(&app).await;
    create_shipment(&app).await;

    let (status, body) = get(&app.router, "/shipments?status=CREATED").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = get(&app.router, "/shipments").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_count_webhook_outcomes() {
    let app = app();
    let created = create_shipment(&app).await;
    let tracking = created["tracking_number"].as_str().unwrap();

    let payload = json!({ "shipmentId": tracking, "event": "DELIVERED" });
    post_json(&app.router, "/delhivery/webhook", payload.clone()).await;
    post_json(&app.router, "/delhivery/webhook", payload).await;

    let (status, _) = get(&app.router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("courier_webhooks_received_total 2"));
    assert!(text.contains("courier_webhooks_applied_total 1"));
    assert!(text.contains("courier_webhooks_duplicate_total 1"));
    assert!(text.contains("courier_shipments_created_total 1"));
}
