//! Test helpers for the courier workspace.
//!
//! Provides domain fixtures (addresses, shipments, carrier events) shared
//! across crate test suites, so individual tests only spell out the
//! fields they actually assert on.

mod helpers;

pub use helpers::{
    carrier_event, carrier_event_at, test_address, test_shipment, test_shipment_with_status,
};
