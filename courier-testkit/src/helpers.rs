//! Fixture builders for domain values.

use chrono::{DateTime, Utc};
use courier_domain::{
    Address, CarrierEvent, CarrierId, OrderId, Shipment, ShipmentStatus, TrackingNumber,
};

/// A valid pickup/delivery address.
pub fn test_address() -> Address {
    Address {
        name: "Asha Rao".to_string(),
        phone: "+91-9999000011".to_string(),
        line1: "14 MG Road".to_string(),
        line2: None,
        city: "Bengaluru".to_string(),
        region: "KA".to_string(),
        postal_code: "560001".to_string(),
        country: "IN".to_string(),
    }
}

/// A freshly created Delhivery shipment with the given tracking number.
pub fn test_shipment(tracking_number: &str) -> Shipment {
    Shipment::new(
        OrderId::new("O1").unwrap(),
        CarrierId::Delhivery,
        TrackingNumber::new(tracking_number).unwrap(),
        test_address(),
        test_address(),
    )
}

/// A shipment advanced to the given status via the normal event path.
///
/// The history reflects the transitions taken to get there, so monotonicity
/// assertions behave the same as against a record built in production.
pub fn test_shipment_with_status(tracking_number: &str, status: ShipmentStatus) -> Shipment {
    let mut shipment = test_shipment(tracking_number);
    match status {
        ShipmentStatus::Created => {}
        ShipmentStatus::InTransit => {
            shipment.apply_event(ShipmentStatus::InTransit, Utc::now(), None);
        }
        ShipmentStatus::Delivered => {
            shipment.apply_event(ShipmentStatus::InTransit, Utc::now(), None);
            shipment.apply_event(ShipmentStatus::Delivered, Utc::now(), None);
        }
        ShipmentStatus::Cancelled => {
            shipment.mark_cancelled(None).unwrap();
        }
        ShipmentStatus::Failed => {
            shipment.apply_event(ShipmentStatus::Failed, Utc::now(), None);
        }
    }
    shipment
}

/// A carrier event with no carrier-supplied event id or timestamp.
pub fn carrier_event(tracking_number: &str, event_type: &str) -> CarrierEvent {
    CarrierEvent {
        tracking_number: TrackingNumber::new(tracking_number).unwrap(),
        event_type: event_type.to_string(),
        occurred_at: None,
        details: None,
        event_id: None,
    }
}

/// A carrier event pinned to a specific occurrence time.
///
/// Duplicate-delivery tests need a stable timestamp: the derived dedup key
/// includes `occurred_at`, so two deliveries of the same physical event
/// must carry the same one.
pub fn carrier_event_at(
    tracking_number: &str,
    event_type: &str,
    occurred_at: DateTime<Utc>,
) -> CarrierEvent {
    CarrierEvent {
        tracking_number: TrackingNumber::new(tracking_number).unwrap(),
        event_type: event_type.to_string(),
        occurred_at: Some(occurred_at),
        details: None,
        event_id: None,
    }
}
