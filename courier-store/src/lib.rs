//! Courier Storage Layer
//!
//! Provides persistence for shipment records and processed webhook keys.
//!
//! # Architecture
//!
//! - **Repository traits**: Define the storage interface (ports)
//! - **In-memory store**: Fast implementation for testing
//! - **PostgreSQL store**: Production implementation (feature `postgres`)
//!
//! Every shipment update is a conditional write keyed on the record's
//! `version`, so concurrent writers (orchestrator cancel, webhook
//! processor) converge on one authoritative record instead of
//! interleaving.

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use repository::{ProcessedEventRepository, ShipmentRepository, Store};
