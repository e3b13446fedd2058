//! Value Objects for the Courier Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation and state rules
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Order reference must be non-empty
    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),

    /// Tracking number must be non-empty
    #[error("Invalid tracking number: {0}")]
    InvalidTrackingNumber(String),

    /// Address is missing required fields
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Carrier identifier is not part of the closed carrier set
    #[error("Unknown carrier: {0}")]
    UnknownCarrier(String),

    /// Carrier event type could not be mapped to a shipment status
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Stored status string is not a valid shipment status
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    /// Invalid state transition
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

// =============================================================================
// OrderId
// =============================================================================

/// OrderId references the order a shipment was created for
///
/// # Invariants
/// - Must be non-empty after trimming
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Create a new OrderId with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidOrderId` if the value is empty
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidOrderId(
                "Order id must be non-empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TrackingNumber
// =============================================================================

/// TrackingNumber is the carrier-assigned shipment identifier
///
/// Assigned exactly once, by the carrier, at creation time. All webhook
/// deliveries and tracking lookups reference it.
///
/// # Invariants
/// - Must be non-empty after trimming
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingNumber(String);

impl TrackingNumber {
    /// Create a new TrackingNumber with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTrackingNumber` if the value is empty
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::InvalidTrackingNumber(
                "Tracking number must be non-empty".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CarrierId
// =============================================================================

/// CarrierId identifies which carrier integration owns a shipment
///
/// Closed, explicit set. Adding a carrier means adding a variant here and
/// registering a provider for it at startup; callers resolve through the
/// registry and never branch on the variant themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierId {
    /// Delhivery (REST integration)
    Delhivery,
}

impl CarrierId {
    /// Stable lowercase identifier used in URLs and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            CarrierId::Delhivery => "delhivery",
        }
    }
}

impl FromStr for CarrierId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delhivery" => Ok(CarrierId::Delhivery),
            other => Err(DomainError::UnknownCarrier(other.to_string())),
        }
    }
}

impl fmt::Display for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Address
// =============================================================================

/// Postal address for pickup or delivery
///
/// Carried opaquely through the system: set at creation, immutable, and
/// forwarded to the carrier as-is. Validation is limited to the fields
/// carriers refuse to book without.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Contact name
    pub name: String,
    /// Contact phone number
    pub phone: String,
    /// Street address, first line
    pub line1: String,
    /// Street address, second line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    /// City
    pub city: String,
    /// State or region
    pub region: String,
    /// Postal code
    pub postal_code: String,
    /// ISO country code
    pub country: String,
}

impl Address {
    /// Validate required fields
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAddress` naming the first missing field
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("name", &self.name),
            ("phone", &self.phone),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidAddress(format!(
                    "Missing required field: {}",
                    field
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            name: "Asha Rao".to_string(),
            phone: "+91-9999000011".to_string(),
            line1: "14 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            region: "KA".to_string(),
            postal_code: "560001".to_string(),
            country: "IN".to_string(),
        }
    }

    #[test]
    fn test_order_id_rejects_empty() {
        assert!(OrderId::new("O1").is_ok());
        assert!(matches!(
            OrderId::new("   "),
            Err(DomainError::InvalidOrderId(_))
        ));
    }

    #[test]
    fn test_tracking_number_rejects_empty() {
        assert!(TrackingNumber::new("D123").is_ok());
        assert!(matches!(
            TrackingNumber::new(""),
            Err(DomainError::InvalidTrackingNumber(_))
        ));
    }

    #[test]
    fn test_carrier_id_round_trip() {
        let carrier: CarrierId = "delhivery".parse().unwrap();
        assert_eq!(carrier, CarrierId::Delhivery);
        assert_eq!(carrier.as_str(), "delhivery");

        // Case-insensitive parse
        assert_eq!("Delhivery".parse::<CarrierId>().unwrap(), carrier);
    }

    #[test]
    fn test_carrier_id_unknown() {
        assert!(matches!(
            "pigeon-post".parse::<CarrierId>(),
            Err(DomainError::UnknownCarrier(_))
        ));
    }

    #[test]
    fn test_address_validation() {
        assert!(address().validate().is_ok());

        let mut missing_city = address();
        missing_city.city = String::new();
        let err = missing_city.validate().unwrap_err();
        assert!(err.to_string().contains("city"));
    }
}
