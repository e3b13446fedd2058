//! Prometheus metrics for the daemon.

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::error::{DaemonError, DaemonResult};

/// Daemon metrics, exposed at `GET /metrics`.
pub struct Metrics {
    registry: Registry,
    /// Webhook deliveries accepted for processing
    pub webhooks_received: IntCounter,
    /// Webhook deliveries discarded as duplicates
    pub webhooks_duplicate: IntCounter,
    /// Webhook deliveries that changed a shipment status
    pub webhooks_applied: IntCounter,
    /// Webhook deliveries for unknown tracking numbers
    pub webhooks_unknown_shipment: IntCounter,
    /// Shipments created through the orchestrator
    pub shipments_created: IntCounter,
    /// Shipments cancelled through the orchestrator
    pub shipments_cancelled: IntCounter,
}

impl Metrics {
    /// Create and register all counters.
    pub fn new() -> DaemonResult<Self> {
        let registry = Registry::new();

        let webhooks_received = Self::counter(
            &registry,
            "courier_webhooks_received_total",
            "Webhook deliveries accepted for processing",
        )?;
        let webhooks_duplicate = Self::counter(
            &registry,
            "courier_webhooks_duplicate_total",
            "Webhook deliveries discarded as duplicates",
        )?;
        let webhooks_applied = Self::counter(
            &registry,
            "courier_webhooks_applied_total",
            "Webhook deliveries that changed a shipment status",
        )?;
        let webhooks_unknown_shipment = Self::counter(
            &registry,
            "courier_webhooks_unknown_shipment_total",
            "Webhook deliveries for unknown tracking numbers",
        )?;
        let shipments_created = Self::counter(
            &registry,
            "courier_shipments_created_total",
            "Shipments created through the orchestrator",
        )?;
        let shipments_cancelled = Self::counter(
            &registry,
            "courier_shipments_cancelled_total",
            "Shipments cancelled through the orchestrator",
        )?;

        Ok(Self {
            registry,
            webhooks_received,
            webhooks_duplicate,
            webhooks_applied,
            webhooks_unknown_shipment,
            shipments_created,
            shipments_cancelled,
        })
    }

    fn counter(registry: &Registry, name: &str, help: &str) -> DaemonResult<IntCounter> {
        let counter = IntCounter::new(name, help)
            .map_err(|e| DaemonError::Config(format!("Metric {}: {}", name, e)))?;
        registry
            .register(Box::new(counter.clone()))
            .map_err(|e| DaemonError::Config(format!("Metric {}: {}", name, e)))?;
        Ok(counter)
    }

    /// Render all metrics in the prometheus text format.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder
            .encode(&self.registry.gather(), &mut buffer)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
