//! Courier Daemon
//!
//! Runtime for the shipment orchestration subsystem.
//!
//! # Usage
//!
//! ```bash
//! # Start with stub carrier wiring
//! cargo run -p courierd
//!
//! # Start against Delhivery staging
//! DELHIVERY_API_TOKEN=... DELHIVERY_STAGING=1 cargo run -p courierd
//! ```
//!
//! # Environment Variables
//!
//! - `COURIER_ENV`: Environment (test, development, production)
//! - `COURIER_API_HOST`: API host (default: 0.0.0.0)
//! - `COURIER_API_PORT`: API port (default: 8080)
//! - `COURIER_RETRY_MAX_ATTEMPTS`: Carrier call attempt budget (default: 3)
//! - `COURIER_RETRY_BASE_DELAY_MS`: Base backoff delay (default: 500)
//! - `COURIER_RETRY_MAX_DELAY_MS`: Backoff cap (default: 30000)
//! - `COURIER_ADMIN_TOKEN`: Shared admin token for create/cancel routes
//! - `DELHIVERY_API_TOKEN`: Delhivery token; absent wires the stub carrier
//! - `DELHIVERY_PICKUP_LOCATION`: Registered pickup location name
//! - `DELHIVERY_STAGING`: Use the Delhivery staging environment

use courierd::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("courierd=info".parse()?))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "Courier Daemon"
    );

    // Wire Delhivery when a token is configured, the stub otherwise
    let daemon = if config.carriers.delhivery_api_token.is_some() {
        Daemon::new_delhivery(config)?
    } else {
        Daemon::new_stub(config)?
    };

    daemon.run().await?;

    Ok(())
}
