//! Stub carrier for testing.
//!
//! Simulates carrier behavior without network calls. Failures are
//! scripted per test: a number of transient failures to serve first, a
//! one-shot semantic rejection, or a standing refusal to cancel.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

use courier_domain::{ShipmentStatus, TrackingNumber};

use crate::error::ProviderError;
use crate::ports::{
    CancellationAck, CarrierProvider, CreateShipmentRequest, CreatedShipment, RateQuote,
    RateRequest, TrackingSnapshot,
};

/// Stub carrier provider.
pub struct StubCarrier {
    /// Counter for generating tracking numbers
    tracking_counter: RwLock<u64>,
    /// Serve this many `Unavailable` failures before succeeding
    transient_failures: RwLock<u32>,
    /// One-shot semantic rejection for the next call
    reject_next: RwLock<Option<String>>,
    /// Standing refusal to cancel (carrier policy)
    refuse_cancel: RwLock<bool>,
    /// Tracking data served by `track`
    tracking_status: RwLock<HashMap<String, ShipmentStatus>>,
    /// Operations invoked, in order
    calls: RwLock<Vec<&'static str>>,
}

impl StubCarrier {
    /// Create a new stub with no scripted failures.
    pub fn new() -> Self {
        Self {
            tracking_counter: RwLock::new(0),
            transient_failures: RwLock::new(0),
            reject_next: RwLock::new(None),
            refuse_cancel: RwLock::new(false),
            tracking_status: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
        }
    }

    /// Serve `count` transient failures before the next success.
    pub fn fail_times(&self, count: u32) {
        *self.transient_failures.write().unwrap() = count;
    }

    /// Reject the next call with the given reason.
    pub fn reject_next(&self, reason: impl Into<String>) {
        *self.reject_next.write().unwrap() = Some(reason.into());
    }

    /// Configure whether cancellations are refused.
    pub fn refuse_cancel(&self, refuse: bool) {
        *self.refuse_cancel.write().unwrap() = refuse;
    }

    /// Set the status `track` reports for a tracking number.
    pub fn set_status(&self, tracking_number: &str, status: ShipmentStatus) {
        self.tracking_status
            .write()
            .unwrap()
            .insert(tracking_number.to_string(), status);
    }

    /// How many times `operation` was invoked.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|op| **op == operation)
            .count()
    }

    /// Generate a unique tracking number.
    fn next_tracking_number(&self) -> TrackingNumber {
        let mut counter = self.tracking_counter.write().unwrap();
        *counter += 1;
        TrackingNumber::new(format!("STUB-{}", *counter)).unwrap()
    }

    /// Consume the next scripted failure, if any.
    fn take_failure(&self) -> Option<ProviderError> {
        {
            let mut transient = self.transient_failures.write().unwrap();
            if *transient > 0 {
                *transient -= 1;
                return Some(ProviderError::Unavailable(
                    "Simulated carrier outage".to_string(),
                ));
            }
        }
        self.reject_next
            .write()
            .unwrap()
            .take()
            .map(ProviderError::Rejected)
    }

    fn record(&self, operation: &'static str) {
        self.calls.write().unwrap().push(operation);
    }
}

impl Default for StubCarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CarrierProvider for StubCarrier {
    async fn create_shipment(
        &self,
        _request: &CreateShipmentRequest,
    ) -> Result<CreatedShipment, ProviderError> {
        self.record("create_shipment");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        Ok(CreatedShipment {
            tracking_number: self.next_tracking_number(),
        })
    }

    async fn track(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<TrackingSnapshot, ProviderError> {
        self.record("track");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let status = self
            .tracking_status
            .read()
            .unwrap()
            .get(tracking_number.as_str())
            .copied()
            .ok_or_else(|| ProviderError::NotFound(tracking_number.to_string()))?;

        Ok(TrackingSnapshot {
            status,
            details: None,
            checked_at: Utc::now(),
        })
    }

    async fn cancel(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<CancellationAck, ProviderError> {
        self.record("cancel");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        if *self.refuse_cancel.read().unwrap() {
            return Err(ProviderError::Rejected(format!(
                "Cancellation not permitted for {}",
                tracking_number
            )));
        }

        Ok(CancellationAck { confirmed: true })
    }

    async fn quote(&self, request: &RateRequest) -> Result<Vec<RateQuote>, ProviderError> {
        self.record("quote");
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        // Flat stub pricing: weight in whole rupees plus a base fee
        let base = Decimal::new(4_900, 2);
        let per_kg = Decimal::from(request.weight_grams / 1000);

        Ok(vec![
            RateQuote {
                service: "surface".to_string(),
                amount: base + per_kg,
                currency: "INR".to_string(),
                estimated_days: Some(5),
            },
            RateQuote {
                service: "express".to_string(),
                amount: (base + per_kg) * Decimal::new(2, 0),
                currency: "INR".to_string(),
                estimated_days: Some(2),
            },
        ])
    }
}
