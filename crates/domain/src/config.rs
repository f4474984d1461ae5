//! Client configuration
//!
//! Loads from explicit construction or environment variables.
//!
//! ## Environment Variables
//! - `ENVOYWEB_EMAIL`: Enlighten account email
//! - `ENVOYWEB_PASSWORD`: Enlighten account password
//! - `ENVOYWEB_BATTERY_ID`: numeric battery (site) identifier
//! - `ENVOYWEB_USER_ID`: numeric account identifier
//! - `ENVOYWEB_BASE_URL`: optional base URL override
//! - `ENVOYWEB_TIMEOUT_SECS`: optional per-request deadline in seconds

use std::time::Duration;

use url::Url;

use crate::constants::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::errors::{EnvoyWebError, Result};
use crate::types::Credentials;

/// Configuration for the Enlighten web client.
#[derive(Debug, Clone)]
pub struct EnvoyWebConfig {
    /// Account credentials and battery identifiers.
    pub credentials: Credentials,
    /// Provider origin; the production Enlighten URL unless overridden
    /// (tests point this at a local double).
    pub base_url: Url,
    /// Deadline applied to every network round trip.
    pub timeout: Duration,
}

impl EnvoyWebConfig {
    /// Create a configuration with the default base URL and timeout.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: default_base_url(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the provider origin.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Override the per-request deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns `EnvoyWebError::Validation` if required variables are
    /// missing or have invalid values.
    pub fn from_env() -> Result<Self> {
        let email = env_var("ENVOYWEB_EMAIL")?;
        let password = env_var("ENVOYWEB_PASSWORD")?;
        let battery_id = env_var("ENVOYWEB_BATTERY_ID").and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| EnvoyWebError::Validation(format!("Invalid battery id: {e}")))
        })?;
        let user_id = env_var("ENVOYWEB_USER_ID").and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| EnvoyWebError::Validation(format!("Invalid user id: {e}")))
        })?;

        let mut config = Self::new(Credentials::new(email, password, battery_id, user_id));

        if let Ok(raw) = std::env::var("ENVOYWEB_BASE_URL") {
            let base_url = raw
                .parse::<Url>()
                .map_err(|e| EnvoyWebError::Validation(format!("Invalid base URL: {e}")))?;
            config = config.with_base_url(base_url);
        }
        if let Ok(raw) = std::env::var("ENVOYWEB_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .map_err(|e| EnvoyWebError::Validation(format!("Invalid timeout: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn default_base_url() -> Url {
    // The constant is a compile-time-known valid URL; an unparsable
    // value here is a programming error, caught by the test below.
    #[allow(clippy::expect_used)]
    DEFAULT_BASE_URL.parse().expect("default base URL is valid")
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| EnvoyWebError::Validation(format!("Missing environment variable {name}")))
}
