//! Carrier API credentials.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Delhivery API credentials.
///
/// The token is wiped from memory on drop and never printed by Debug.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DelhiveryCredentials {
    api_token: String,
}

impl DelhiveryCredentials {
    /// Create credentials from an API token.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
        }
    }

    /// The raw token, for building the Authorization header.
    pub(crate) fn token(&self) -> &str {
        &self.api_token
    }
}

impl std::fmt::Debug for DelhiveryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelhiveryCredentials")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let creds = DelhiveryCredentials::new("super-secret");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
