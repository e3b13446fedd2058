//! Webhook event processing.
//!
//! Carriers redeliver events and deliver them out of order; the
//! processor makes ingestion idempotent and keeps status transitions
//! monotonic.
//!
//! # Flow
//!
//! 1. Derive the dedup key and claim it (conditional insert); a
//!    redelivered event loses the claim and is acknowledged as a no-op.
//! 2. Load the shipment by tracking number and apply the event: history
//!    is always appended, status changes only on a valid forward
//!    transition.
//! 3. Persist as one conditional write keyed on the loaded version; a
//!    lost race reloads and re-applies (bounded).
//!
//! If the apply fails after the claim, the claim is released so carrier
//! redelivery can repair the miss.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

use courier_domain::{CarrierEvent, CarrierId, ShipmentStatus, StatusChange};
use courier_store::{Store, StoreError};

use crate::error::{DispatchError, DispatchResult};

/// Attempt bound for the reload-and-reapply loop on version conflicts.
const MAX_APPLY_ATTEMPTS: u32 = 3;

/// Outcome of processing one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Valid forward transition: status changed, history appended
    Applied {
        /// Status before the event
        from: ShipmentStatus,
        /// Status after the event
        to: ShipmentStatus,
    },
    /// Event recorded in history for audit; status unchanged
    /// (terminal state or out-of-order delivery)
    Recorded {
        /// Current authoritative status
        current: ShipmentStatus,
        /// Status the event reported
        observed: ShipmentStatus,
    },
    /// Redelivery of an already-processed event; acknowledged, no-op
    Duplicate,
}

/// Ingests carrier-pushed events into the store.
pub struct WebhookProcessor<S: Store> {
    store: Arc<S>,
}

impl<S: Store> WebhookProcessor<S> {
    /// Create a new processor.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Deduplication key for an event.
    ///
    /// Uses the carrier-supplied event id when present. Otherwise derives
    /// a composite of carrier, tracking number, event type, and the
    /// occurrence timestamp. The timestamp participates because the same
    /// status can legitimately recur as distinct physical events (e.g.
    /// repeated IN_TRANSIT scans).
    pub fn dedup_key(carrier: CarrierId, event: &CarrierEvent) -> String {
        if let Some(event_id) = &event.event_id {
            return format!("{}:{}", carrier, event_id);
        }

        let mut hasher = Sha256::new();
        hasher.update(carrier.as_str().as_bytes());
        hasher.update(event.tracking_number.as_str().as_bytes());
        hasher.update(event.event_type.trim().to_uppercase().as_bytes());
        if let Some(occurred_at) = event.occurred_at {
            hasher.update(occurred_at.timestamp_millis().to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Process one webhook delivery.
    ///
    /// # Errors
    ///
    /// - `Domain(UnknownEventType)` for an unmapped event type (the HTTP
    ///   layer turns this into a malformed-payload response)
    /// - `ShipmentNotFound` when no local record matches the tracking
    ///   number (the HTTP layer acknowledges with a logged anomaly)
    pub async fn process(
        &self,
        carrier: CarrierId,
        event: &CarrierEvent,
    ) -> DispatchResult<WebhookOutcome> {
        let status = event.status()?;
        let key = Self::dedup_key(carrier, event);

        // Claim before applying: the first delivery wins
        match self.store.processed_events().claim(&key).await {
            Ok(()) => {}
            Err(StoreError::Duplicate { .. }) => {
                debug!(
                    %carrier,
                    tracking_number = %event.tracking_number,
                    event_type = %event.event_type,
                    "Duplicate webhook delivery, acknowledging without changes"
                );
                return Ok(WebhookOutcome::Duplicate);
            }
            Err(err) => return Err(err.into()),
        }

        match self.apply(carrier, event, status).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // Give redelivery a chance to repair the failed apply
                if let Err(release_err) = self.store.processed_events().release(&key).await {
                    warn!(key = %key, error = %release_err, "Failed to release dedup claim");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        carrier: CarrierId,
        event: &CarrierEvent,
        status: ShipmentStatus,
    ) -> DispatchResult<WebhookOutcome> {
        let occurred_at = event.occurred_at_or_now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let mut shipment = self
                .store
                .shipments()
                .find_by_tracking_number(&event.tracking_number)
                .await?
                .ok_or_else(|| {
                    DispatchError::ShipmentNotFound(event.tracking_number.to_string())
                })?;

            if shipment.carrier != carrier {
                // A tracking number can only be known to the carrier that
                // issued it; anything else is a misrouted delivery.
                warn!(
                    expected = %shipment.carrier,
                    received = %carrier,
                    tracking_number = %event.tracking_number,
                    "Webhook carrier does not own this shipment"
                );
                return Err(DispatchError::ShipmentNotFound(
                    event.tracking_number.to_string(),
                ));
            }

            let expected_version = shipment.version;
            let change = shipment.apply_event(status, occurred_at, event.details.clone());

            match self
                .store
                .shipments()
                .update(&shipment, expected_version)
                .await
            {
                Ok(_) => {
                    return Ok(match change {
                        StatusChange::Applied { from, to } => {
                            info!(
                                %carrier,
                                tracking_number = %event.tracking_number,
                                %from,
                                %to,
                                "Webhook transition applied"
                            );
                            WebhookOutcome::Applied { from, to }
                        }
                        StatusChange::RecordedOnly { current, observed } => {
                            info!(
                                %carrier,
                                tracking_number = %event.tracking_number,
                                %current,
                                %observed,
                                "Webhook event recorded without status change"
                            );
                            WebhookOutcome::Recorded { current, observed }
                        }
                    });
                }
                Err(err) if err.is_version_conflict() && attempt < MAX_APPLY_ATTEMPTS => {
                    debug!(
                        tracking_number = %event.tracking_number,
                        attempt,
                        "Lost conditional write to a concurrent writer, reloading"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
