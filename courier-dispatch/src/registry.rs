//! Carrier provider registry.
//!
//! A closed, explicit mapping from carrier identifier to provider
//! implementation, assembled once at startup. Resolution of an
//! unregistered carrier is a configuration error surfaced immediately,
//! not a runtime throw deep in a request path.

use std::collections::HashMap;
use std::sync::Arc;

use courier_domain::CarrierId;

use crate::error::{DispatchError, DispatchResult};
use crate::ports::CarrierProvider;

/// Registry of configured carrier providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<CarrierId, Arc<dyn CarrierProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a carrier (builder-style).
    ///
    /// Registering the same carrier twice replaces the earlier provider;
    /// the registry holds exactly one implementation per carrier.
    pub fn register(mut self, carrier: CarrierId, provider: Arc<dyn CarrierProvider>) -> Self {
        self.providers.insert(carrier, provider);
        self
    }

    /// Resolve the provider for a carrier.
    ///
    /// # Errors
    /// Returns `DispatchError::CarrierNotConfigured` if no provider was
    /// registered for the carrier.
    pub fn resolve(&self, carrier: CarrierId) -> DispatchResult<Arc<dyn CarrierProvider>> {
        self.providers
            .get(&carrier)
            .cloned()
            .ok_or(DispatchError::CarrierNotConfigured(carrier))
    }

    /// Check whether a carrier has a registered provider.
    pub fn is_configured(&self, carrier: CarrierId) -> bool {
        self.providers.contains_key(&carrier)
    }

    /// Carriers with a registered provider.
    pub fn carriers(&self) -> Vec<CarrierId> {
        self.providers.keys().copied().collect()
    }
}
