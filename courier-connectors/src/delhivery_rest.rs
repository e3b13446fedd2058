//! Delhivery REST API Client
//!
//! Provides REST API integration for:
//! - Manifesting (creating) packages
//! - Tracking by waybill
//! - Cancelling packages
//! - Rate quotes
//!
//! # Authentication
//!
//! Delhivery uses a static API token sent as an `Authorization: Token`
//! header on every request.
//!
//! # Quirks
//!
//! The manifest endpoint expects a form-encoded body of the shape
//! `format=json&data=<json>` rather than a plain JSON body.

use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use courier_dispatch::{
    CancellationAck, CarrierProvider, CreateShipmentRequest, CreatedShipment, ProviderError,
    RateQuote, RateRequest, TrackingSnapshot,
};
use courier_domain::{ShipmentStatus, TrackingNumber};

use crate::credentials::DelhiveryCredentials;

// =============================================================================
// Constants
// =============================================================================

/// Delhivery production API base URL
const DELHIVERY_API_URL: &str = "https://track.delhivery.com";

/// Delhivery staging API base URL
const DELHIVERY_STAGING_URL: &str = "https://staging-express.delhivery.com";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in the Delhivery REST client.
#[derive(Debug, Clone, Error)]
pub enum DelhiveryRestError {
    /// HTTP request failed (connect/transport)
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// API returned a non-success status
    #[error("Delhivery API error: {status} - {msg}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        msg: String,
    },

    /// Delhivery refused the request semantically
    #[error("Delhivery rejected request: {0}")]
    Remark(String),

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Waybill unknown to Delhivery
    #[error("Waybill not found: {0}")]
    WaybillNotFound(String),
}

impl From<DelhiveryRestError> for ProviderError {
    fn from(err: DelhiveryRestError) -> Self {
        match err {
            // Transport problems and server-side errors are transient
            DelhiveryRestError::Timeout | DelhiveryRestError::RequestFailed(_) => {
                ProviderError::Unavailable(err.to_string())
            }
            DelhiveryRestError::ApiError { status, .. } if status >= 500 => {
                ProviderError::Unavailable(err.to_string())
            }
            DelhiveryRestError::WaybillNotFound(waybill) => ProviderError::NotFound(waybill),
            // 4xx, semantic remarks, and unparseable payloads cannot be
            // fixed by retrying
            _ => ProviderError::Rejected(err.to_string()),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ManifestResponse {
    success: bool,
    #[serde(default)]
    packages: Vec<ManifestPackage>,
    #[serde(default)]
    rmk: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestPackage {
    #[serde(default)]
    waybill: String,
    #[serde(default)]
    remarks: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    #[serde(rename = "ShipmentData", default)]
    shipment_data: Vec<TrackedShipment>,
}

#[derive(Debug, Deserialize)]
struct TrackedShipment {
    #[serde(rename = "Shipment")]
    shipment: ShipmentDetail,
}

#[derive(Debug, Deserialize)]
struct ShipmentDetail {
    #[serde(rename = "Status")]
    status: PackageStatus,
}

#[derive(Debug, Deserialize)]
struct PackageStatus {
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Instructions", default)]
    instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CancelResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    remark: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateCharge {
    #[serde(default)]
    total_amount: f64,
    #[serde(default)]
    charge_type: Option<String>,
}

/// Map a Delhivery scan status onto the shipment state machine.
fn map_status(status: &str) -> Result<ShipmentStatus, DelhiveryRestError> {
    match status.trim().to_uppercase().as_str() {
        "MANIFESTED" | "NOT PICKED" => Ok(ShipmentStatus::Created),
        "IN TRANSIT" | "DISPATCHED" | "PENDING" | "OUT FOR DELIVERY" => {
            Ok(ShipmentStatus::InTransit)
        }
        "DELIVERED" => Ok(ShipmentStatus::Delivered),
        "CANCELLED" | "CANCELED" => Ok(ShipmentStatus::Cancelled),
        "RTO" | "LOST" | "RETURNED" => Ok(ShipmentStatus::Failed),
        other => Err(DelhiveryRestError::ParseError(format!(
            "Unrecognized scan status: {}",
            other
        ))),
    }
}

// =============================================================================
// Delhivery REST Client
// =============================================================================

/// Delhivery REST API client.
pub struct DelhiveryClient {
    /// HTTP client
    client: Client,
    /// API credentials
    credentials: DelhiveryCredentials,
    /// Use the staging environment
    staging: bool,
    /// Registered pickup location name (set up in the Delhivery panel)
    pickup_location: String,
}

impl DelhiveryClient {
    /// Create a new production client.
    pub fn new(credentials: DelhiveryCredentials, pickup_location: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            credentials,
            staging: false,
            pickup_location: pickup_location.into(),
        }
    }

    /// Create a client against the staging environment (for testing).
    pub fn staging(credentials: DelhiveryCredentials, pickup_location: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            credentials,
            staging: true,
            pickup_location: pickup_location.into(),
        }
    }

    /// Get the base URL for API requests.
    fn base_url(&self) -> &str {
        if self.staging {
            DELHIVERY_STAGING_URL
        } else {
            DELHIVERY_API_URL
        }
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.credentials.token())
    }

    /// Send a GET request and return the response body.
    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<String, DelhiveryRestError> {
        let url = format!("{}{}", self.base_url(), endpoint);

        let response = timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            self.client
                .get(&url)
                .query(params)
                .header("Authorization", self.auth_header())
                .header("Accept", "application/json")
                .send(),
        )
        .await
        .map_err(|_| DelhiveryRestError::Timeout)?
        .map_err(|e| DelhiveryRestError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DelhiveryRestError::ParseError(e.to_string()))?;

        if !status.is_success() {
            return Err(DelhiveryRestError::ApiError {
                status: status.as_u16(),
                msg: body,
            });
        }

        Ok(body)
    }

    /// Send a POST request with a form-encoded `format=json&data=` body.
    async fn post_form(
        &self,
        endpoint: &str,
        data: &serde_json::Value,
    ) -> Result<String, DelhiveryRestError> {
        let url = format!("{}{}", self.base_url(), endpoint);
        let body = format!("format=json&data={}", data);

        let response = timeout(
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            self.client
                .post(&url)
                .header("Authorization", self.auth_header())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .header("Accept", "application/json")
                .body(body)
                .send(),
        )
        .await
        .map_err(|_| DelhiveryRestError::Timeout)?
        .map_err(|e| DelhiveryRestError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DelhiveryRestError::ParseError(e.to_string()))?;

        if !status.is_success() {
            return Err(DelhiveryRestError::ApiError {
                status: status.as_u16(),
                msg: body,
            });
        }

        Ok(body)
    }

    /// Manifest a package with Delhivery.
    async fn manifest(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<String, DelhiveryRestError> {
        let data = json!({
            "pickup_location": { "name": self.pickup_location },
            "shipments": [{
                "order": request.order_id.as_str(),
                "name": request.delivery.name,
                "phone": request.delivery.phone,
                "add": request.delivery.line1,
                "city": request.delivery.city,
                "state": request.delivery.region,
                "pin": request.delivery.postal_code,
                "country": request.delivery.country,
                "return_add": request.pickup.line1,
                "return_city": request.pickup.city,
                "return_pin": request.pickup.postal_code,
                "payment_mode": "Prepaid",
            }]
        });

        let body = self.post_form("/api/cmu/create.json", &data).await?;
        let response: ManifestResponse = serde_json::from_str(&body)
            .map_err(|e| DelhiveryRestError::ParseError(e.to_string()))?;

        if !response.success {
            let remark = response
                .rmk
                .or_else(|| {
                    response
                        .packages
                        .first()
                        .and_then(|p| p.remarks.first().cloned())
                })
                .unwrap_or_else(|| "Manifest refused without remark".to_string());
            return Err(DelhiveryRestError::Remark(remark));
        }

        let package = response.packages.first().ok_or_else(|| {
            DelhiveryRestError::ParseError("Manifest response without packages".to_string())
        })?;

        if package.waybill.is_empty() {
            return Err(DelhiveryRestError::Remark(
                package
                    .remarks
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "No waybill assigned".to_string()),
            ));
        }

        Ok(package.waybill.clone())
    }
}

#[async_trait::async_trait]
impl CarrierProvider for DelhiveryClient {
    async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CreatedShipment, ProviderError> {
        let waybill = self.manifest(request).await?;

        tracing::debug!(order_id = %request.order_id, %waybill, "Delhivery manifest accepted");

        let tracking_number = TrackingNumber::new(waybill)
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;

        Ok(CreatedShipment { tracking_number })
    }

    async fn track(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<TrackingSnapshot, ProviderError> {
        let body = self
            .get(
                "/api/v1/packages/json/",
                &[("waybill", tracking_number.as_str().to_string())],
            )
            .await?;

        let response: TrackResponse = serde_json::from_str(&body)
            .map_err(|e| DelhiveryRestError::ParseError(e.to_string()))?;

        let tracked = response.shipment_data.first().ok_or_else(|| {
            DelhiveryRestError::WaybillNotFound(tracking_number.to_string())
        })?;

        let status = map_status(&tracked.shipment.status.status)?;

        Ok(TrackingSnapshot {
            status,
            details: tracked
                .shipment
                .status
                .instructions
                .as_ref()
                .map(|i| json!({ "instructions": i })),
            checked_at: Utc::now(),
        })
    }

    async fn cancel(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<CancellationAck, ProviderError> {
        let data = json!({
            "waybill": tracking_number.as_str(),
            "cancellation": "true",
        });

        let body = self.post_form("/api/p/edit", &data).await?;
        let response: CancelResponse = serde_json::from_str(&body)
            .map_err(|e| DelhiveryRestError::ParseError(e.to_string()))?;

        if !response.status {
            // Carrier policy refusal (e.g. package already in transit)
            return Err(ProviderError::Rejected(
                response
                    .remark
                    .unwrap_or_else(|| "Cancellation refused".to_string()),
            ));
        }

        Ok(CancellationAck { confirmed: true })
    }

    async fn quote(&self, request: &RateRequest) -> Result<Vec<RateQuote>, ProviderError> {
        let body = self
            .get(
                "/api/kinko/v1/invoice/charges/.json",
                &[
                    ("md", "S".to_string()),
                    ("ss", "Delivered".to_string()),
                    ("o_pin", request.pickup_postal_code.clone()),
                    ("d_pin", request.delivery_postal_code.clone()),
                    ("cgm", request.weight_grams.to_string()),
                ],
            )
            .await?;

        let charges: Vec<RateCharge> = serde_json::from_str(&body)
            .map_err(|e| DelhiveryRestError::ParseError(e.to_string()))?;

        charges
            .into_iter()
            .map(|charge| {
                let amount = Decimal::try_from(charge.total_amount).map_err(|e| {
                    ProviderError::Rejected(format!("Unparseable rate amount: {}", e))
                })?;
                Ok(RateQuote {
                    service: charge
                        .charge_type
                        .unwrap_or_else(|| "surface".to_string()),
                    amount,
                    currency: "INR".to_string(),
                    estimated_days: None,
                })
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
