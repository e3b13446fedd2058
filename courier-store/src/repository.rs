//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the shipment domain.
//! Implementations can be PostgreSQL, in-memory, or mock for testing.
//!
//! The shipment record is the unit of concurrency control: `update` is a
//! conditional write keyed on the record's `version`, so two concurrent
//! transitions cannot interleave. Unconditional last-write-wins is not
//! part of this interface on purpose.

use crate::error::StoreError;
use async_trait::async_trait;
use courier_domain::{OrderId, Shipment, ShipmentId, ShipmentStatus, TrackingNumber};

/// Repository for Shipment records
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    /// Insert a newly created shipment
    ///
    /// Fails with `Duplicate` if the id or tracking number already exists.
    async fn insert(&self, shipment: &Shipment) -> Result<(), StoreError>;

    /// Find a shipment by local record id
    async fn find_by_id(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError>;

    /// Find a shipment by its carrier-assigned tracking number
    async fn find_by_tracking_number(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<Shipment>, StoreError>;

    /// Find all shipments created for an order
    async fn find_by_order(&self, order_id: &OrderId) -> Result<Vec<Shipment>, StoreError>;

    /// Find shipments by current status
    async fn find_by_status(&self, status: ShipmentStatus) -> Result<Vec<Shipment>, StoreError>;

    /// Conditionally update a shipment
    ///
    /// The write applies only if the stored record still has
    /// `expected_version`; status and history are written together, so a
    /// partial update (status without history, or vice versa) cannot be
    /// observed.
    ///
    /// Returns the new version on success.
    ///
    /// # Errors
    /// - `VersionConflict` if a concurrent writer got there first
    /// - `NotFound` if the record does not exist
    async fn update(&self, shipment: &Shipment, expected_version: i64)
        -> Result<i64, StoreError>;
}

/// Repository for processed webhook event keys (deduplication)
///
/// Claiming a key is a conditional insert: the first delivery of an event
/// wins the claim, every redelivery observes `Duplicate`. A claim taken
/// before a failed apply is released so carrier redelivery can repair it.
#[async_trait]
pub trait ProcessedEventRepository: Send + Sync {
    /// Claim a dedup key
    ///
    /// # Errors
    /// Returns `Duplicate` if the key was already claimed.
    async fn claim(&self, key: &str) -> Result<(), StoreError>;

    /// Release a previously claimed key
    async fn release(&self, key: &str) -> Result<(), StoreError>;

    /// Check whether a key has been claimed
    async fn seen(&self, key: &str) -> Result<bool, StoreError>;
}

/// Combined store interface
pub trait Store: Send + Sync {
    /// Get shipment repository
    fn shipments(&self) -> &dyn ShipmentRepository;

    /// Get processed-event repository
    fn processed_events(&self) -> &dyn ProcessedEventRepository;
}
