//! Dispatch layer error types.

use courier_domain::{CarrierId, DomainError, TrackingNumber};
use courier_store::StoreError;
use thiserror::Error;

/// Errors a carrier provider can report for a single call.
///
/// The classification is what drives retry eligibility: only
/// `Unavailable` is worth retrying, a `Rejected` request cannot succeed
/// no matter how often it is repeated.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Carrier unreachable or returned a transient failure (retryable)
    #[error("Carrier unavailable: {0}")]
    Unavailable(String),

    /// Carrier rejected the request semantically (not retryable)
    #[error("Carrier rejected request: {0}")]
    Rejected(String),

    /// Carrier does not know the referenced shipment
    #[error("Unknown at carrier: {0}")]
    NotFound(String),
}

impl ProviderError {
    /// Check whether retrying this failure can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}

/// Final outcome of a provider call after the retry policy ran its course.
#[derive(Debug, Clone, Error)]
pub enum ProviderFailure {
    /// Permanent failure the carrier reported; surfaced without retries
    #[error(transparent)]
    Permanent(ProviderError),

    /// Transient failures exhausted the retry budget
    #[error("Carrier unreachable after {attempts} attempts: {last}")]
    Exhausted {
        /// How many attempts were made (equals the configured budget)
        attempts: u32,
        /// The final underlying failure
        last: ProviderError,
    },
}

impl ProviderFailure {
    /// Check whether the caller may meaningfully retry at a higher level
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderFailure::Exhausted { .. })
    }

    /// The underlying carrier error
    pub fn provider_error(&self) -> &ProviderError {
        match self {
            ProviderFailure::Permanent(e) => e,
            ProviderFailure::Exhausted { last, .. } => last,
        }
    }
}

/// Errors that can occur in the shipment dispatch layer.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Shipment creation failed at the carrier; no local record was made
    #[error("Shipment creation failed: {0}")]
    CreationFailed(ProviderFailure),

    /// Carrier refused to cancel; local state left unchanged
    #[error("Cancellation rejected: {0}")]
    CancellationRejected(ProviderFailure),

    /// A pass-through carrier call (track, quote) failed
    #[error("Carrier call failed: {0}")]
    Provider(ProviderFailure),

    /// No provider registered for the carrier (configuration error)
    #[error("No provider configured for carrier: {0}")]
    CarrierNotConfigured(CarrierId),

    /// Shipment not found locally
    #[error("Shipment not found: {0}")]
    ShipmentNotFound(String),

    /// Local state machine violation
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Carrier confirmed the operation but the local write failed.
    /// The external resource exists without a matching local record;
    /// logged as a reconciliation candidate by the orchestrator.
    #[error("Shipment {tracking_number} confirmed at carrier but local write failed")]
    StoreInconsistency {
        /// Carrier-assigned identifier of the orphaned external resource
        tracking_number: TrackingNumber,
        /// The underlying store failure
        #[source]
        source: StoreError,
    },

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
