//! Courier Dispatch Layer
//!
//! Carrier integration core: the provider port, bounded retry, and the
//! workflows that keep the local shipment record consistent with the
//! carrier's view while both sides fail independently.
//!
//! # Architecture
//!
//! ```text
//! Caller → Orchestrator → Registry → CarrierProvider (via RetryExecutor)
//!                                  → conditional Store write
//!
//! Carrier → WebhookProcessor → dedup claim → conditional Store write
//! ```
//!
//! # Components
//!
//! - **Ports**: the `CarrierProvider` contract and its request/response
//!   types
//! - **RetryExecutor**: bounded retry with deterministic backoff and an
//!   injected sleeper
//! - **ProviderRegistry**: closed carrier → provider mapping, resolved
//!   at startup
//! - **ShipmentOrchestrator**: create/cancel/track/rates workflows
//!   (external call first, conditional local write second)
//! - **WebhookProcessor**: idempotent, monotonic ingestion of
//!   carrier-pushed events
//! - **StubCarrier**: scriptable test double

#![warn(clippy::all)]

pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod retry;
pub mod stub;
pub mod webhook;

// Re-exports for convenience
pub use error::{DispatchError, DispatchResult, ProviderError, ProviderFailure};
pub use orchestrator::ShipmentOrchestrator;
pub use ports::{
    CancellationAck, CarrierProvider, CreateShipmentRequest, CreatedShipment, RateQuote,
    RateRequest, TrackingSnapshot,
};
pub use registry::ProviderRegistry;
pub use retry::{Backoff, RecordingSleeper, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
pub use stub::StubCarrier;
pub use webhook::{WebhookOutcome, WebhookProcessor};
