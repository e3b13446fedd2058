//! Courier Daemon Library
//!
//! Runtime orchestrator for the shipment subsystem.
//!
//! # Architecture
//!
//! ```text
//! HTTP API → Orchestrator → Registry → CarrierProvider (via retry)
//!                         → Store (conditional writes)
//!          → WebhookProcessor → Store
//! ```
//!
//! # Components
//!
//! - **Daemon**: Composition root and server lifecycle
//! - **API**: HTTP endpoints per carrier mount
//! - **Auth**: Admin gate precondition for create/cancel
//! - **Metrics**: Prometheus counters
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use courierd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_stub(config).expect("Failed to assemble daemon");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod auth;
pub mod config;
pub mod daemon;
pub mod error;
pub mod metrics;

// Re-exports for convenience
pub use api::{create_router, ApiState};
pub use auth::{AdminGate, AllowAllGate, CallerIdentity, StaticTokenGate};
pub use config::{ApiConfig, AuthConfig, CarrierConfig, Config, Environment, RetryConfig};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use metrics::Metrics;
