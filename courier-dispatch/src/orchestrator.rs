//! Shipment orchestrator.
//!
//! Owns the create/cancel/track workflows. Every workflow is the same
//! two-phase protocol: (1) the external carrier call runs to completion
//! (success or exhausted failure) through the retry executor, with no
//! store lock held while it is in flight; (2) only then is the local
//! conditional write attempted, keyed on the state the workflow loaded.
//!
//! # Flow
//!
//! ```text
//! Caller → Orchestrator → Registry.resolve(carrier) → CarrierProvider
//!                                                       (via RetryExecutor)
//!                       → on success, conditional Store write
//! ```

use std::sync::Arc;
use tracing::{error, info};

use courier_domain::{Address, CarrierId, OrderId, Shipment, ShipmentId};
use courier_store::Store;

use crate::error::{DispatchError, DispatchResult, ProviderError, ProviderFailure};
use crate::ports::{CreateShipmentRequest, RateQuote, RateRequest, TrackingSnapshot};
use crate::registry::ProviderRegistry;
use crate::retry::RetryExecutor;

/// Orchestrates shipment workflows against carrier providers and the
/// local store.
pub struct ShipmentOrchestrator<S: Store> {
    /// Configured carrier providers
    registry: Arc<ProviderRegistry>,
    /// Retry policy wrapper for every provider call
    retry: RetryExecutor,
    /// Persistence port
    store: Arc<S>,
}

impl<S: Store> ShipmentOrchestrator<S> {
    /// Create a new orchestrator.
    pub fn new(registry: Arc<ProviderRegistry>, retry: RetryExecutor, store: Arc<S>) -> Self {
        Self {
            registry,
            retry,
            store,
        }
    }

    /// Create a shipment with the given carrier.
    ///
    /// The local record is written only after the carrier confirmed the
    /// booking; on any provider failure no local record exists. If the
    /// local write fails after carrier confirmation, the external
    /// resource is orphaned: this is logged as a reconciliation
    /// candidate and surfaced as `StoreInconsistency`, never dropped.
    ///
    /// # Errors
    ///
    /// - `CreationFailed` carrying the provider's classification
    ///   (rejected vs. unreachable-after-retries)
    /// - `StoreInconsistency` when the carrier booked but persistence
    ///   failed
    pub async fn create_shipment(
        &self,
        order_id: OrderId,
        pickup: Address,
        delivery: Address,
        carrier: CarrierId,
    ) -> DispatchResult<Shipment> {
        pickup.validate()?;
        delivery.validate()?;
        let provider = self.registry.resolve(carrier)?;

        let request = CreateShipmentRequest {
            order_id: order_id.clone(),
            pickup: pickup.clone(),
            delivery: delivery.clone(),
        };

        // Phase 1: external call, runs to completion before any local write
        let created = self
            .retry
            .execute("create_shipment", || provider.create_shipment(&request))
            .await
            .map_err(DispatchError::CreationFailed)?;

        info!(
            %carrier,
            order_id = %order_id,
            tracking_number = %created.tracking_number,
            "Carrier confirmed shipment"
        );

        // Phase 2: one insert carries status and the first history entry
        let shipment = Shipment::new(
            order_id,
            carrier,
            created.tracking_number,
            pickup,
            delivery,
        );

        if let Err(source) = self.store.shipments().insert(&shipment).await {
            error!(
                %carrier,
                tracking_number = %shipment.tracking_number,
                error = %source,
                "Carrier shipment exists but local write failed; reconciliation candidate"
            );
            return Err(DispatchError::StoreInconsistency {
                tracking_number: shipment.tracking_number,
                source,
            });
        }

        Ok(shipment)
    }

    /// Cancel a shipment.
    ///
    /// The carrier is asked first; the local record transitions to
    /// `Cancelled` only on a confirmed ack, as one conditional write
    /// keyed on the version loaded before the carrier call. A rejected
    /// or unconfirmed cancellation leaves local state untouched.
    ///
    /// # Errors
    ///
    /// - `ShipmentNotFound` for an unknown id
    /// - `InvalidTransition` when the shipment is already terminal
    ///   (no provider call is made)
    /// - `CancellationRejected` when the carrier said no
    /// - `Provider` when the carrier was unreachable after retries
    pub async fn cancel_shipment(&self, id: ShipmentId) -> DispatchResult<Shipment> {
        let mut shipment = self
            .store
            .shipments()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DispatchError::ShipmentNotFound(id.to_string()))?;

        if !shipment.can_cancel() {
            return Err(DispatchError::InvalidTransition(format!(
                "Cannot cancel shipment in terminal status {}",
                shipment.status
            )));
        }

        let provider = self.registry.resolve(shipment.carrier)?;
        let expected_version = shipment.version;

        // Phase 1: carrier cancel, no store lock held while in flight
        let ack = self
            .retry
            .execute("cancel", || provider.cancel(&shipment.tracking_number))
            .await
            .map_err(|failure| match failure {
                ProviderFailure::Permanent(_) => DispatchError::CancellationRejected(failure),
                ProviderFailure::Exhausted { .. } => DispatchError::Provider(failure),
            })?;

        if !ack.confirmed {
            return Err(DispatchError::CancellationRejected(
                ProviderFailure::Permanent(ProviderError::Rejected(
                    "Carrier did not confirm cancellation".to_string(),
                )),
            ));
        }

        // Phase 2: conditional write keyed on the pre-call version
        shipment.mark_cancelled(None)?;
        let new_version = self
            .store
            .shipments()
            .update(&shipment, expected_version)
            .await?;
        shipment.version = new_version;

        info!(
            carrier = %shipment.carrier,
            tracking_number = %shipment.tracking_number,
            "Shipment cancelled"
        );

        Ok(shipment)
    }

    /// Fetch live tracking data for a shipment.
    ///
    /// The provider is resolved from the shipment's stored carrier
    /// field, never from caller input. Pass-through read: local state is
    /// not mutated.
    pub async fn track_shipment(&self, id: ShipmentId) -> DispatchResult<TrackingSnapshot> {
        let shipment = self
            .store
            .shipments()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DispatchError::ShipmentNotFound(id.to_string()))?;

        let provider = self.registry.resolve(shipment.carrier)?;

        self.retry
            .execute("track", || provider.track(&shipment.tracking_number))
            .await
            .map_err(DispatchError::Provider)
    }

    /// Quote rates from a carrier. Stateless pass-through.
    pub async fn get_rates(
        &self,
        carrier: CarrierId,
        request: &RateRequest,
    ) -> DispatchResult<Vec<RateQuote>> {
        let provider = self.registry.resolve(carrier)?;

        self.retry
            .execute("quote", || provider.quote(request))
            .await
            .map_err(DispatchError::Provider)
    }
}
