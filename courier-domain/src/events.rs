//! Carrier Events
//!
//! Domain form of the asynchronous notifications carriers push over the
//! webhook channel. Carriers are free to redeliver and to deliver out of
//! order; the processor relies on the event's identity fields to stay
//! idempotent.

use crate::entities::ShipmentStatus;
use crate::value_objects::{DomainError, TrackingNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A status notification pushed by a carrier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierEvent {
    /// Carrier-assigned shipment identifier the event refers to
    pub tracking_number: TrackingNumber,
    /// Raw carrier event type (mapped via [`CarrierEvent::status`])
    pub event_type: String,
    /// When the physical event occurred, if the carrier reported it
    pub occurred_at: Option<DateTime<Utc>>,
    /// Opaque carrier detail payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Carrier-supplied event id, when the carrier provides one.
    /// Used as the deduplication key in preference to the derived
    /// composite key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl CarrierEvent {
    /// Map the raw carrier event type to a shipment status
    ///
    /// Carriers use a handful of spellings for the same lifecycle step;
    /// the accepted aliases below cover the integrations we ship.
    ///
    /// # Errors
    /// Returns `DomainError::UnknownEventType` for anything unmapped.
    pub fn status(&self) -> Result<ShipmentStatus, DomainError> {
        match self.event_type.trim().to_uppercase().as_str() {
            "CREATED" | "MANIFESTED" => Ok(ShipmentStatus::Created),
            "IN_TRANSIT" | "IN-TRANSIT" | "DISPATCHED" | "PICKED_UP" => {
                Ok(ShipmentStatus::InTransit)
            }
            "DELIVERED" => Ok(ShipmentStatus::Delivered),
            "CANCELLED" | "CANCELED" => Ok(ShipmentStatus::Cancelled),
            "FAILED" | "UNDELIVERED" | "LOST" => Ok(ShipmentStatus::Failed),
            other => Err(DomainError::UnknownEventType(other.to_string())),
        }
    }

    /// When the event occurred, falling back to now for carriers that
    /// omit the timestamp
    pub fn occurred_at_or_now(&self) -> DateTime<Utc> {
        self.occurred_at.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str) -> CarrierEvent {
        CarrierEvent {
            tracking_number: TrackingNumber::new("D123").unwrap(),
            event_type: event_type.to_string(),
            occurred_at: None,
            details: None,
            event_id: None,
        }
    }

    #[test]
    fn test_event_type_mapping() {
        assert_eq!(event("DELIVERED").status().unwrap(), ShipmentStatus::Delivered);
        assert_eq!(event("in_transit").status().unwrap(), ShipmentStatus::InTransit);
        assert_eq!(event("PICKED_UP").status().unwrap(), ShipmentStatus::InTransit);
        assert_eq!(event("Canceled").status().unwrap(), ShipmentStatus::Cancelled);
        assert_eq!(event("UNDELIVERED").status().unwrap(), ShipmentStatus::Failed);
    }

    #[test]
    fn test_unknown_event_type() {
        assert!(matches!(
            event("TELEPORTED").status(),
            Err(DomainError::UnknownEventType(_))
        ));
    }
}
