//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use courier_dispatch::{Backoff, RetryPolicy};
use std::env;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Retry policy for carrier calls
    pub retry: RetryConfig,

    /// Carrier integration configuration
    pub carriers: CarrierConfig,

    /// Admin authentication configuration
    pub auth: AuthConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Retry configuration for carrier calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempt budget per carrier call
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Build the dispatch-layer retry policy.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff: Backoff::Exponential,
        }
    }
}

/// Carrier integration configuration.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    /// Delhivery API token; absent means the stub carrier is wired
    pub delhivery_api_token: Option<String>,
    /// Registered Delhivery pickup location name
    pub delhivery_pickup_location: String,
    /// Use the Delhivery staging environment
    pub delhivery_staging: bool,
}

/// Admin authentication configuration.
///
/// Identity verification proper is the auth collaborator's job; the
/// daemon only consumes a shared admin token as a precondition on the
/// create/cancel routes. Absent token means every caller is admitted
/// (test/development wiring).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared admin bearer token
    pub admin_token: Option<String>,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Environment::Test => "test",
            Environment::Development => "development",
            Environment::Production => "production",
        };
        write!(f, "{}", name)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let retry = Self::load_retry_config()?;
        let carriers = Self::load_carrier_config();
        let auth = AuthConfig {
            admin_token: env::var("COURIER_ADMIN_TOKEN").ok(),
        };

        Ok(Self {
            api,
            retry,
            carriers,
            auth,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 10,
            },
            carriers: CarrierConfig {
                delhivery_api_token: None,
                delhivery_pickup_location: "test-warehouse".to_string(),
                delhivery_staging: true,
            },
            auth: AuthConfig { admin_token: None },
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("COURIER_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid COURIER_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("COURIER_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port_str = env::var("COURIER_API_PORT").unwrap_or_else(|_| "8080".to_string());

        let port = port_str
            .parse::<u16>()
            .map_err(|_| DaemonError::Config(format!("Invalid COURIER_API_PORT: {}", port_str)))?;

        Ok(ApiConfig { host, port })
    }

    fn load_retry_config() -> DaemonResult<RetryConfig> {
        Ok(RetryConfig {
            max_attempts: Self::load_u32_env("COURIER_RETRY_MAX_ATTEMPTS", 3)?,
            base_delay_ms: Self::load_u64_env("COURIER_RETRY_BASE_DELAY_MS", 500)?,
            max_delay_ms: Self::load_u64_env("COURIER_RETRY_MAX_DELAY_MS", 30_000)?,
        })
    }

    fn load_carrier_config() -> CarrierConfig {
        CarrierConfig {
            delhivery_api_token: env::var("DELHIVERY_API_TOKEN").ok(),
            delhivery_pickup_location: env::var("DELHIVERY_PICKUP_LOCATION")
                .unwrap_or_else(|_| "primary-warehouse".to_string()),
            delhivery_staging: env::var("DELHIVERY_STAGING")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    fn load_u32_env(name: &str, default: u32) -> DaemonResult<u32> {
        match env::var(name) {
            Ok(value) => value
                .parse::<u32>()
                .map_err(|_| DaemonError::Config(format!("Invalid {}: {}", name, value))),
            Err(_) => Ok(default),
        }
    }

    fn load_u64_env(name: &str, default: u64) -> DaemonResult<u64> {
        match env::var(name) {
            Ok(value) => value
                .parse::<u64>()
                .map_err(|_| DaemonError::Config(format!("Invalid {}: {}", name, value))),
            Err(_) => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_config_uses_stub_wiring() {
        let config = Config::test();
        assert_eq!(config.environment, Environment::Test);
        assert!(config.carriers.delhivery_api_token.is_none());
        assert!(config.auth.admin_token.is_none());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_retry_config_to_policy() {
        let config = Config::test();
        let policy = config.retry.to_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1));
    }
}
