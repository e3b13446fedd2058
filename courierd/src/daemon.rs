//! Daemon: Main runtime orchestrator.
//!
//! Wires the provider registry, retry policy, store, webhook processor,
//! and HTTP server from configuration.
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Assemble components (stub or Delhivery wiring)
//! 3. Log a restore summary of open shipments
//! 4. Serve the API until SIGINT

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use courier_connectors::{DelhiveryClient, DelhiveryCredentials};
use courier_dispatch::{
    CarrierProvider, ProviderRegistry, RetryExecutor, ShipmentOrchestrator, StubCarrier,
    WebhookProcessor,
};
use courier_domain::{CarrierId, ShipmentStatus};
use courier_store::{MemoryStore, Store};

use crate::api::{create_router, ApiState};
use crate::auth::{AdminGate, AllowAllGate, StaticTokenGate};
use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};
use crate::metrics::Metrics;

// =============================================================================
// Daemon
// =============================================================================

/// The courier daemon.
pub struct Daemon<S: Store + 'static> {
    /// Configuration
    config: Config,
    /// Shared API state
    state: Arc<ApiState<S>>,
}

impl Daemon<MemoryStore> {
    /// Create a daemon with stub components (for testing/development).
    pub fn new_stub(config: Config) -> DaemonResult<Self> {
        Self::assemble(config, Arc::new(StubCarrier::new()), Arc::new(MemoryStore::new()))
    }

    /// Create a daemon with the Delhivery integration over the in-memory
    /// store.
    pub fn new_delhivery(config: Config) -> DaemonResult<Self> {
        let provider = delhivery_client(&config)?;
        Self::assemble(config, provider, Arc::new(MemoryStore::new()))
    }
}

#[cfg(feature = "postgres")]
impl Daemon<courier_store::PgStore> {
    /// Create a daemon with the Delhivery integration over PostgreSQL.
    pub async fn new_delhivery_postgres(
        config: Config,
        database_url: &str,
    ) -> DaemonResult<Self> {
        let provider = delhivery_client(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DaemonError::Config(format!("Database connection failed: {}", e)))?;

        Self::assemble(config, provider, Arc::new(courier_store::PgStore::new(pool)))
    }
}

fn delhivery_client(config: &Config) -> DaemonResult<Arc<dyn CarrierProvider>> {
    let token = config
        .carriers
        .delhivery_api_token
        .clone()
        .ok_or_else(|| DaemonError::Config("DELHIVERY_API_TOKEN is required".to_string()))?;

    let credentials = DelhiveryCredentials::new(token);
    let pickup = config.carriers.delhivery_pickup_location.clone();

    let client = if config.carriers.delhivery_staging {
        DelhiveryClient::staging(credentials, pickup)
    } else {
        DelhiveryClient::new(credentials, pickup)
    };

    Ok(Arc::new(client))
}

impl<S: Store + 'static> Daemon<S> {
    /// Assemble a daemon from explicit components.
    pub fn assemble(
        config: Config,
        provider: Arc<dyn CarrierProvider>,
        store: Arc<S>,
    ) -> DaemonResult<Self> {
        let registry =
            Arc::new(ProviderRegistry::new().register(CarrierId::Delhivery, provider));
        let retry = RetryExecutor::new(config.retry.to_policy());
        let orchestrator = Arc::new(ShipmentOrchestrator::new(registry, retry, store.clone()));
        let webhooks = Arc::new(WebhookProcessor::new(store.clone()));

        let gate: Arc<dyn AdminGate> = match &config.auth.admin_token {
            Some(token) => Arc::new(StaticTokenGate::new(token.clone())),
            None => Arc::new(AllowAllGate),
        };

        let metrics = Arc::new(Metrics::new()?);

        let state = Arc::new(ApiState {
            orchestrator,
            webhooks,
            store,
            gate,
            metrics,
        });

        Ok(Self { config, state })
    }

    /// Shared API state (used by the integration tests).
    pub fn state(&self) -> Arc<ApiState<S>> {
        self.state.clone()
    }

    /// Run the daemon.
    ///
    /// Blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting courier daemon"
        );

        self.restore_summary().await?;

        let router = create_router(self.state.clone());
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr: SocketAddr = listener
            .local_addr()
            .map_err(|e| DaemonError::Config(format!("Failed to get local address: {}", e)))?;
        info!(%local_addr, "API server started");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Config(format!("API server error: {}", e)))?;

        info!("Shutdown complete");
        Ok(())
    }

    /// Log how many shipments are still open after a restart.
    async fn restore_summary(&self) -> DaemonResult<()> {
        let shipments = self.state.store.shipments();
        let created = shipments.find_by_status(ShipmentStatus::Created).await?.len();
        let in_transit = shipments
            .find_by_status(ShipmentStatus::InTransit)
            .await?
            .len();

        let open = created + in_transit;
        if open > 0 {
            info!(open, created, in_transit, "Restored open shipments from store");
        } else {
            info!("No open shipments to restore");
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received shutdown signal");
}
