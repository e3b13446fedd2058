//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! Thread-safe using RwLock for concurrent access.

use crate::error::StoreError;
use crate::repository::{ProcessedEventRepository, ShipmentRepository, Store};
use async_trait::async_trait;
use courier_domain::{OrderId, Shipment, ShipmentId, ShipmentStatus, TrackingNumber};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory store for testing
pub struct MemoryStore {
    shipments: RwLock<HashMap<ShipmentId, Shipment>>,
    /// tracking number -> shipment id index
    tracking_index: RwLock<HashMap<String, ShipmentId>>,
    processed_keys: RwLock<HashSet<String>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            shipments: RwLock::new(HashMap::new()),
            tracking_index: RwLock::new(HashMap::new()),
            processed_keys: RwLock::new(HashSet::new()),
        }
    }

    /// Get the number of shipments
    pub fn shipment_count(&self) -> usize {
        self.shipments.read().unwrap().len()
    }

    /// Get the number of claimed dedup keys
    pub fn processed_key_count(&self) -> usize {
        self.processed_keys.read().unwrap().len()
    }

    /// Clear all data (useful for test setup)
    pub fn clear(&self) {
        self.shipments.write().unwrap().clear();
        self.tracking_index.write().unwrap().clear();
        self.processed_keys.write().unwrap().clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShipmentRepository for MemoryStore {
    async fn insert(&self, shipment: &Shipment) -> Result<(), StoreError> {
        let mut shipments = self.shipments.write().unwrap();
        let mut index = self.tracking_index.write().unwrap();

        if shipments.contains_key(&shipment.id) {
            return Err(StoreError::duplicate("shipment", shipment.id.to_string()));
        }
        if index.contains_key(shipment.tracking_number.as_str()) {
            return Err(StoreError::duplicate(
                "shipment",
                shipment.tracking_number.as_str(),
            ));
        }

        index.insert(shipment.tracking_number.as_str().to_string(), shipment.id);
        shipments.insert(shipment.id, shipment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        Ok(self.shipments.read().unwrap().get(&id).cloned())
    }

    async fn find_by_tracking_number(
        &self,
        tracking_number: &TrackingNumber,
    ) -> Result<Option<Shipment>, StoreError> {
        let index = self.tracking_index.read().unwrap();
        let shipments = self.shipments.read().unwrap();
        Ok(index
            .get(tracking_number.as_str())
            .and_then(|id| shipments.get(id).cloned()))
    }

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Vec<Shipment>, StoreError> {
        Ok(self
            .shipments
            .read()
            .unwrap()
            .values()
            .filter(|s| s.order_id == *order_id)
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: ShipmentStatus) -> Result<Vec<Shipment>, StoreError> {
        Ok(self
            .shipments
            .read()
            .unwrap()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        shipment: &Shipment,
        expected_version: i64,
    ) -> Result<i64, StoreError> {
        let mut shipments = self.shipments.write().unwrap();

        let current = shipments
            .get(&shipment.id)
            .ok_or_else(|| StoreError::not_found("shipment", shipment.id.to_string()))?;

        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: shipment.id.to_string(),
                expected: expected_version,
            });
        }

        let mut updated = shipment.clone();
        updated.version = expected_version + 1;
        shipments.insert(updated.id, updated);
        Ok(expected_version + 1)
    }
}

#[async_trait]
impl ProcessedEventRepository for MemoryStore {
    async fn claim(&self, key: &str) -> Result<(), StoreError> {
        let mut keys = self.processed_keys.write().unwrap();
        if !keys.insert(key.to_string()) {
            return Err(StoreError::duplicate("processed event", key));
        }
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<(), StoreError> {
        self.processed_keys.write().unwrap().remove(key);
        Ok(())
    }

    async fn seen(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.processed_keys.read().unwrap().contains(key))
    }
}

impl Store for MemoryStore {
    fn shipments(&self) -> &dyn ShipmentRepository {
        self
    }

    fn processed_events(&self) -> &dyn ProcessedEventRepository {
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use courier_testkit::test_shipment;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::new();
        let shipment = test_shipment("D123");

        store.insert(&shipment).await.unwrap();
        assert_eq!(store.shipment_count(), 1);

        let by_id = store.find_by_id(shipment.id).await.unwrap().unwrap();
        assert_eq!(by_id.id, shipment.id);

        let by_tracking = store
            .find_by_tracking_number(&shipment.tracking_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_tracking.id, shipment.id);
    }

    #[tokio::test]
    async fn test_insert_duplicate_tracking_number_rejected() {
        let store = MemoryStore::new();
        store.insert(&test_shipment("D123")).await.unwrap();

        let result = store.insert(&test_shipment("D123")).await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));
        assert_eq!(store.shipment_count(), 1);
    }

    #[tokio::test]
    async fn test_conditional_update_bumps_version() {
        let store = MemoryStore::new();
        let mut shipment = test_shipment("D123");
        store.insert(&shipment).await.unwrap();

        shipment.apply_event(
            courier_domain::ShipmentStatus::InTransit,
            chrono::Utc::now(),
            None,
        );
        let new_version = store.update(&shipment, 1).await.unwrap();
        assert_eq!(new_version, 2);

        let stored = store.find_by_id(shipment.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.status, courier_domain::ShipmentStatus::InTransit);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = MemoryStore::new();
        let mut shipment = test_shipment("D123");
        store.insert(&shipment).await.unwrap();

        shipment.apply_event(
            courier_domain::ShipmentStatus::InTransit,
            chrono::Utc::now(),
            None,
        );
        store.update(&shipment, 1).await.unwrap();

        // A writer still holding version 1 must lose
        let result = store.update(&shipment, 1).await;
        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
    }

    #[tokio::test]
    async fn test_claim_is_first_writer_wins() {
        let store = MemoryStore::new();

        store.claim("delhivery:D123:DELIVERED").await.unwrap();
        assert!(store.seen("delhivery:D123:DELIVERED").await.unwrap());

        let result = store.claim("delhivery:D123:DELIVERED").await;
        assert!(matches!(result, Err(StoreError::Duplicate { .. })));

        store.release("delhivery:D123:DELIVERED").await.unwrap();
        assert!(!store.seen("delhivery:D123:DELIVERED").await.unwrap());
        store.claim("delhivery:D123:DELIVERED").await.unwrap();
    }

    #[tokio::test]
    async fn test_find_by_status() {
        let store = MemoryStore::new();
        let mut delivered = test_shipment("D1");
        delivered.apply_event(
            courier_domain::ShipmentStatus::Delivered,
            chrono::Utc::now(),
            None,
        );
        store.insert(&delivered).await.unwrap();
        store.insert(&test_shipment("D2")).await.unwrap();

        let created = store
            .find_by_status(courier_domain::ShipmentStatus::Created)
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].tracking_number.as_str(), "D2");
    }
}
