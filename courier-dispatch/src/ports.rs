//! Dispatch layer port definitions.
//!
//! Ports define the interface to external carrier networks.
//! Adapters implement this port for specific carriers (Delhivery, stub).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use courier_domain::{Address, OrderId, ShipmentStatus, TrackingNumber};

use crate::error::ProviderError;

// =============================================================================
// Carrier Port
// =============================================================================

/// Port for carrier operations (booking, tracking, cancelling, quoting).
///
/// One implementation per carrier. The orchestrator never talks to a
/// carrier directly; it resolves an implementation through the registry
/// and wraps every call in the retry executor, so adding a carrier means
/// implementing this trait and registering it at startup.
///
/// Implementations:
/// - `StubCarrier` - For testing (deterministic, scriptable failures)
/// - `DelhiveryClient` - Delhivery REST integration
#[async_trait]
pub trait CarrierProvider: Send + Sync {
    /// Book a shipment with the carrier.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Unavailable` when the carrier cannot be reached
    ///   (retryable)
    /// - `ProviderError::Rejected` when the carrier refuses the booking,
    ///   e.g. an unserviceable address (never retried)
    async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CreatedShipment, ProviderError>;

    /// Fetch live tracking state for a shipment.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Unavailable` when the carrier cannot be reached
    /// - `ProviderError::NotFound` when the carrier does not recognize
    ///   the tracking number
    async fn track(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<TrackingSnapshot, ProviderError>;

    /// Request cancellation of a shipment.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Unavailable` when the carrier cannot be reached
    /// - `ProviderError::Rejected` when carrier policy forbids
    ///   cancellation (e.g. already in transit)
    async fn cancel(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<CancellationAck, ProviderError>;

    /// Quote shipping rates for a prospective shipment.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Unavailable` when the carrier cannot be reached
    async fn quote(&self, request: &RateRequest) -> Result<Vec<RateQuote>, ProviderError>;
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Booking request forwarded to a carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShipmentRequest {
    /// Originating order reference
    pub order_id: OrderId,
    /// Pickup address
    pub pickup: Address,
    /// Delivery address
    pub delivery: Address,
}

/// Successful booking confirmation from a carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedShipment {
    /// Carrier-assigned shipment identifier
    pub tracking_number: TrackingNumber,
}

/// Live tracking state as reported by the carrier.
///
/// A tracking read is a pass-through: it never mutates the local record.
/// Reconciliation to local status happens only via webhook or an
/// explicit cancel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    /// Status the carrier reports right now
    pub status: ShipmentStatus,
    /// Opaque carrier detail payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// When this snapshot was taken
    pub checked_at: DateTime<Utc>,
}

/// Carrier response to a cancellation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationAck {
    /// Whether the carrier confirmed the cancellation.
    /// An unconfirmed ack is treated the same as a rejection: the local
    /// record must never show Cancelled unless the carrier confirmed.
    pub confirmed: bool,
}

/// Rate quote request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRequest {
    /// Origin postal code
    pub pickup_postal_code: String,
    /// Destination postal code
    pub delivery_postal_code: String,
    /// Parcel weight in grams
    pub weight_grams: u32,
}

/// One quoted rate from a carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    /// Carrier service name (e.g. "surface", "express")
    pub service: String,
    /// Quoted amount
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Estimated transit time, when the carrier reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_days: Option<u32>,
}
