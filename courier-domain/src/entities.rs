//! Domain Entities for Courier
//!
//! The Shipment aggregate with lifecycle management.
//! Three independent writers mutate a shipment (orchestrator create/cancel,
//! webhook processor, admin edits); every one of them goes through the
//! transition rules defined here.

use crate::value_objects::{Address, CarrierId, DomainError, OrderId, TrackingNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a Shipment record
pub type ShipmentId = Uuid;

// =============================================================================
// Shipment Status
// =============================================================================

/// Lifecycle status of a shipment
///
/// Transitions are forward-only. `Delivered`, `Cancelled`, and `Failed`
/// are terminal: once reached, no event may move the shipment out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    /// Booked with the carrier, not yet picked up
    Created,
    /// In the carrier network
    InTransit,
    /// Delivered to the recipient (terminal)
    Delivered,
    /// Cancelled with carrier confirmation (terminal)
    Cancelled,
    /// Undeliverable or lost (terminal)
    Failed,
}

impl ShipmentStatus {
    /// Check whether this status accepts no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Cancelled | ShipmentStatus::Failed
        )
    }

    /// Check whether `next` is a valid forward transition from this status
    ///
    /// A repeat of the current status is not a transition (the event is
    /// still recorded in history by the caller).
    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        if self.is_terminal() || next == *self {
            return false;
        }
        match (self, next) {
            (ShipmentStatus::Created, _) => true,
            (ShipmentStatus::InTransit, ShipmentStatus::Created) => false,
            (ShipmentStatus::InTransit, _) => true,
            _ => false,
        }
    }

    /// Stable uppercase name used on the wire and in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Created => "CREATED",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::Delivered => "DELIVERED",
            ShipmentStatus::Cancelled => "CANCELLED",
            ShipmentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(ShipmentStatus::Created),
            "IN_TRANSIT" => Ok(ShipmentStatus::InTransit),
            "DELIVERED" => Ok(ShipmentStatus::Delivered),
            "CANCELLED" => Ok(ShipmentStatus::Cancelled),
            "FAILED" => Ok(ShipmentStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// History
// =============================================================================

/// One entry in a shipment's append-only status history
///
/// History is the audit trail: entries are appended in processing order
/// and never mutated or truncated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Status the carrier reported (or the system applied)
    pub status: ShipmentStatus,
    /// When the underlying physical event occurred
    pub occurred_at: DateTime<Utc>,
    /// Carrier-supplied detail payload, kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Outcome of applying a status event to a shipment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The event was a valid forward transition; `status` changed
    Applied {
        /// Status before the event
        from: ShipmentStatus,
        /// Status after the event
        to: ShipmentStatus,
    },
    /// The event was recorded in history but did not change `status`
    /// (terminal state, out-of-order delivery, or a repeat)
    RecordedOnly {
        /// Current authoritative status, unchanged
        current: ShipmentStatus,
        /// Status the event reported
        observed: ShipmentStatus,
    },
}

// =============================================================================
// Shipment
// =============================================================================

/// Shipment is the aggregate root for one physical parcel's lifecycle
///
/// Key invariants:
/// - A record exists only after the carrier confirmed creation; the
///   tracking number is assigned exactly once, by the carrier.
/// - `history` is append-only.
/// - `version` is the optimistic-concurrency token: every store write is
///   conditional on it, so concurrent writers cannot interleave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    /// Local record identifier
    pub id: ShipmentId,
    /// Originating order reference
    pub order_id: OrderId,
    /// Carrier that owns this shipment
    pub carrier: CarrierId,
    /// Carrier-assigned identifier
    pub tracking_number: TrackingNumber,
    /// Current authoritative status
    pub status: ShipmentStatus,
    /// Pickup address, immutable after creation
    pub pickup: Address,
    /// Delivery address, immutable after creation
    pub delivery: Address,
    /// Append-only status history
    pub history: Vec<HistoryEntry>,
    /// Optimistic-concurrency token, bumped by the store on every update
    pub version: i64,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Create a new shipment after carrier confirmation
    ///
    /// Status starts at `Created` with a matching first history entry.
    pub fn new(
        order_id: OrderId,
        carrier: CarrierId,
        tracking_number: TrackingNumber,
        pickup: Address,
        delivery: Address,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            order_id,
            carrier,
            tracking_number,
            status: ShipmentStatus::Created,
            pickup,
            delivery,
            history: vec![HistoryEntry {
                status: ShipmentStatus::Created,
                occurred_at: now,
                details: None,
            }],
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the shipment is in a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if the shipment can still be cancelled
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Apply a carrier-reported status event
    ///
    /// The event is always appended to history (audit completeness).
    /// `status` changes only when the event is a valid forward transition
    /// from the current status; otherwise the entry is recorded and the
    /// authoritative status stays put.
    pub fn apply_event(
        &mut self,
        status: ShipmentStatus,
        occurred_at: DateTime<Utc>,
        details: Option<serde_json::Value>,
    ) -> StatusChange {
        self.history.push(HistoryEntry {
            status,
            occurred_at,
            details,
        });
        self.updated_at = Utc::now();

        if self.status.can_transition_to(status) {
            let from = self.status;
            self.status = status;
            StatusChange::Applied { from, to: status }
        } else {
            StatusChange::RecordedOnly {
                current: self.status,
                observed: status,
            }
        }
    }

    /// Transition to `Cancelled` after carrier confirmation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidStateTransition` if the shipment is
    /// already in a terminal status.
    pub fn mark_cancelled(
        &mut self,
        details: Option<serde_json::Value>,
    ) -> Result<(), DomainError> {
        if !self.can_cancel() {
            return Err(DomainError::InvalidStateTransition(format!(
                "Cannot cancel shipment in terminal status {}",
                self.status
            )));
        }

        let now = Utc::now();
        self.history.push(HistoryEntry {
            status: ShipmentStatus::Cancelled,
            occurred_at: now,
            details,
        });
        self.status = ShipmentStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
