//! Admin gate for authenticated routes.
//!
//! Identity verification and RBAC live in an external collaborator; the
//! daemon consumes the result as a precondition. Create/cancel handlers
//! check the gate before doing anything else. The shipped gates are a
//! shared-token check (production) and allow-all (tests/development).

use axum::http::HeaderMap;

/// Verified caller identity, as supplied by the auth collaborator.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    /// Opaque subject identifier
    pub subject: String,
}

/// Precondition check for admin-facing routes.
pub trait AdminGate: Send + Sync {
    /// Authorize a caller from their bearer token.
    ///
    /// Returns the verified identity, or `None` when the caller lacks
    /// the admin permission.
    fn authorize(&self, bearer: Option<&str>) -> Option<CallerIdentity>;
}

/// Gate that admits callers presenting the configured shared token.
pub struct StaticTokenGate {
    token: String,
}

impl StaticTokenGate {
    /// Create a gate around a shared admin token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AdminGate for StaticTokenGate {
    fn authorize(&self, bearer: Option<&str>) -> Option<CallerIdentity> {
        match bearer {
            Some(token) if token == self.token => Some(CallerIdentity {
                subject: "admin".to_string(),
            }),
            _ => None,
        }
    }
}

/// Gate that admits everyone (test/development wiring).
pub struct AllowAllGate;

impl AdminGate for AllowAllGate {
    fn authorize(&self, _bearer: Option<&str>) -> Option<CallerIdentity> {
        Some(CallerIdentity {
            subject: "anonymous".to_string(),
        })
    }
}

/// Extract the bearer token from an Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_static_token_gate() {
        let gate = StaticTokenGate::new("s3cret");
        assert!(gate.authorize(Some("s3cret")).is_some());
        assert!(gate.authorize(Some("wrong")).is_none());
        assert!(gate.authorize(None).is_none());
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        let mut basic = HeaderMap::new();
        basic.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&basic), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
