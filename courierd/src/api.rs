//! HTTP API for the courier daemon.
//!
//! Provides REST endpoints for:
//! - Shipment creation and cancellation (admin)
//! - Live tracking
//! - Rate quotes
//! - Carrier webhooks
//! - Health and metrics
//!
//! Routes are mounted per carrier: the first path segment parses to a
//! `CarrierId` and anything outside the closed set is a 400 before any
//! work happens.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use courier_dispatch::{
    DispatchError, ProviderError, RateQuote, RateRequest, ShipmentOrchestrator, TrackingSnapshot,
    WebhookOutcome, WebhookProcessor,
};
use courier_domain::{
    Address, CarrierEvent, CarrierId, HistoryEntry, OrderId, Shipment, ShipmentStatus,
    TrackingNumber,
};
use courier_store::Store;

use crate::auth::{bearer_token, AdminGate};
use crate::metrics::Metrics;

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState<S: Store + 'static> {
    pub orchestrator: Arc<ShipmentOrchestrator<S>>,
    pub webhooks: Arc<WebhookProcessor<S>>,
    pub store: Arc<S>,
    pub gate: Arc<dyn AdminGate>,
    pub metrics: Arc<Metrics>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Request to create a shipment.
#[derive(Debug, Deserialize)]
pub struct CreateShipmentBody {
    pub order_id: String,
    pub pickup: Address,
    pub delivery: Address,
}

/// Shipment record as returned to callers.
#[derive(Debug, Serialize)]
pub struct ShipmentResponse {
    pub id: Uuid,
    pub order_id: String,
    pub carrier: String,
    pub tracking_number: String,
    pub status: ShipmentStatus,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Shipment> for ShipmentResponse {
    fn from(shipment: &Shipment) -> Self {
        Self {
            id: shipment.id,
            order_id: shipment.order_id.as_str().to_string(),
            carrier: shipment.carrier.to_string(),
            tracking_number: shipment.tracking_number.to_string(),
            status: shipment.status,
            history: shipment.history.clone(),
            created_at: shipment.created_at,
            updated_at: shipment.updated_at,
        }
    }
}

/// Webhook payload pushed by a carrier.
///
/// `shipmentId` carries the carrier-assigned tracking number; `event`
/// and `eventType` are accepted interchangeably.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    pub shipment_id: String,
    #[serde(alias = "event")]
    pub event_type: String,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
}

/// Rate quote query parameters.
#[derive(Debug, Deserialize)]
pub struct RatesQuery {
    pub pickup_postal_code: String,
    pub delivery_postal_code: String,
    pub weight_grams: u32,
}

/// Admin listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map dispatch errors onto the HTTP surface.
///
/// "Carrier said no" (permanent) maps to 502; "carrier unreachable, try
/// later" (transient, budget exhausted) maps to 503, so callers can
/// decide whether a higher-level retry makes sense.
fn to_error_response(err: DispatchError) -> ApiError {
    let status = match &err {
        DispatchError::ShipmentNotFound(_) => StatusCode::NOT_FOUND,
        DispatchError::InvalidTransition(_)
        | DispatchError::Domain(_)
        | DispatchError::CarrierNotConfigured(_) => StatusCode::BAD_REQUEST,
        DispatchError::CreationFailed(failure)
        | DispatchError::CancellationRejected(failure)
        | DispatchError::Provider(failure) => {
            if failure.is_transient() {
                StatusCode::SERVICE_UNAVAILABLE
            } else if matches!(failure.provider_error(), ProviderError::NotFound(_)) {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::BAD_GATEWAY
            }
        }
        DispatchError::StoreInconsistency { .. } | DispatchError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn parse_carrier(carrier: &str) -> Result<CarrierId, ApiError> {
    CarrierId::from_str(carrier).map_err(|e| bad_request(e.to_string()))
}

fn require_admin<S: Store>(state: &ApiState<S>, headers: &HeaderMap) -> Result<(), ApiError> {
    state
        .gate
        .authorize(bearer_token(headers))
        .map(|_| ())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Admin authorization required".to_string(),
                }),
            )
        })
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router<S>(state: Arc<ApiState<S>>) -> Router
where
    S: Store + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/shipments", get(list_shipments_handler))
        .route("/:carrier/create-shipment", post(create_shipment_handler))
        .route("/:carrier/track/:id", get(track_handler))
        .route("/:carrier/cancel/:id", post(cancel_handler))
        .route("/:carrier/rates", get(rates_handler))
        .route("/:carrier/webhook", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Prometheus metrics endpoint.
async fn metrics_handler<S>(State(state): State<Arc<ApiState<S>>>) -> String
where
    S: Store + 'static,
{
    state.metrics.gather()
}

/// Create a shipment with the mounted carrier.
async fn create_shipment_handler<S>(
    State(state): State<Arc<ApiState<S>>>,
    Path(carrier): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CreateShipmentBody>,
) -> Result<Json<ShipmentResponse>, ApiError>
where
    S: Store + 'static,
{
    require_admin(&state, &headers)?;
    let carrier = parse_carrier(&carrier)?;
    let order_id = OrderId::new(body.order_id).map_err(|e| bad_request(e.to_string()))?;

    let shipment = state
        .orchestrator
        .create_shipment(order_id, body.pickup, body.delivery, carrier)
        .await
        .map_err(to_error_response)?;

    state.metrics.shipments_created.inc();
    Ok(Json(ShipmentResponse::from(&shipment)))
}

/// Live tracking for a shipment.
async fn track_handler<S>(
    State(state): State<Arc<ApiState<S>>>,
    Path((carrier, id)): Path<(String, Uuid)>,
) -> Result<Json<TrackingSnapshot>, ApiError>
where
    S: Store + 'static,
{
    parse_carrier(&carrier)?;

    let snapshot = state
        .orchestrator
        .track_shipment(id)
        .await
        .map_err(to_error_response)?;

    Ok(Json(snapshot))
}

/// Cancel a shipment.
async fn cancel_handler<S>(
    State(state): State<Arc<ApiState<S>>>,
    Path((carrier, id)): Path<(String, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<ShipmentResponse>, ApiError>
where
    S: Store + 'static,
{
    require_admin(&state, &headers)?;
    parse_carrier(&carrier)?;

    let shipment = state
        .orchestrator
        .cancel_shipment(id)
        .await
        .map_err(to_error_response)?;

    state.metrics.shipments_cancelled.inc();
    Ok(Json(ShipmentResponse::from(&shipment)))
}

/// Quote rates from the mounted carrier.
async fn rates_handler<S>(
    State(state): State<Arc<ApiState<S>>>,
    Path(carrier): Path<String>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<Vec<RateQuote>>, ApiError>
where
    S: Store + 'static,
{
    let carrier = parse_carrier(&carrier)?;

    let quotes = state
        .orchestrator
        .get_rates(
            carrier,
            &RateRequest {
                pickup_postal_code: query.pickup_postal_code,
                delivery_postal_code: query.delivery_postal_code,
                weight_grams: query.weight_grams,
            },
        )
        .await
        .map_err(to_error_response)?;

    Ok(Json(quotes))
}

/// Ingest a carrier webhook.
///
/// Once the payload validates, the carrier always gets a 200: duplicates
/// are no-ops by design, and an unknown shipment is logged as an anomaly
/// rather than surfaced, since redelivery cannot fix it.
async fn webhook_handler<S>(
    State(state): State<Arc<ApiState<S>>>,
    Path(carrier): Path<String>,
    Json(body): Json<WebhookBody>,
) -> Result<Json<WebhookAck>, ApiError>
where
    S: Store + 'static,
{
    let carrier = parse_carrier(&carrier)?;
    let tracking_number =
        TrackingNumber::new(body.shipment_id).map_err(|e| bad_request(e.to_string()))?;

    let event = CarrierEvent {
        tracking_number,
        event_type: body.event_type,
        occurred_at: body.occurred_at,
        details: body.details,
        event_id: body.event_id,
    };

    state.metrics.webhooks_received.inc();

    match state.webhooks.process(carrier, &event).await {
        Ok(outcome) => {
            let outcome = match outcome {
                WebhookOutcome::Applied { .. } => {
                    state.metrics.webhooks_applied.inc();
                    "applied"
                }
                WebhookOutcome::Recorded { .. } => "recorded",
                WebhookOutcome::Duplicate => {
                    state.metrics.webhooks_duplicate.inc();
                    "duplicate"
                }
            };
            Ok(Json(WebhookAck {
                received: true,
                outcome: outcome.to_string(),
            }))
        }
        Err(DispatchError::ShipmentNotFound(tracking)) => {
            state.metrics.webhooks_unknown_shipment.inc();
            tracing::warn!(
                %carrier,
                tracking_number = %tracking,
                "Webhook for unknown shipment, acknowledging"
            );
            Ok(Json(WebhookAck {
                received: true,
                outcome: "unknown_shipment".to_string(),
            }))
        }
        Err(DispatchError::Domain(e)) => Err(bad_request(e.to_string())),
        Err(err) => Err(to_error_response(err)),
    }
}

/// Admin listing of shipments by status or order.
async fn list_shipments_handler<S>(
    State(state): State<Arc<ApiState<S>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ShipmentResponse>>, ApiError>
where
    S: Store + 'static,
{
    require_admin(&state, &headers)?;

    let shipments = if let Some(order_id) = query.order_id {
        let order_id = OrderId::new(order_id).map_err(|e| bad_request(e.to_string()))?;
        state
            .store
            .shipments()
            .find_by_order(&order_id)
            .await
            .map_err(|e| to_error_response(e.into()))?
    } else if let Some(status) = query.status {
        let status =
            ShipmentStatus::from_str(&status).map_err(|e| bad_request(e.to_string()))?;
        state
            .store
            .shipments()
            .find_by_status(status)
            .await
            .map_err(|e| to_error_response(e.into()))?
    } else {
        return Err(bad_request("Query requires status or order_id"));
    };

    Ok(Json(shipments.iter().map(ShipmentResponse::from).collect()))
}
