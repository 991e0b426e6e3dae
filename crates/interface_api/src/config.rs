//! API configuration
//!
//! Loaded from `API_`-prefixed environment variables (`API_PORT`,
//! `API_STORE_BACKEND`, `API_HOSTED_URL`, ...). Unset fields keep their
//! defaults.

use serde::Deserialize;

use core_kernel::{CircuitBreakerConfig, CoreError, LocalCalendar};
use domain_registry::{HostedStoreConfig, IdConflictPolicy};

/// Which system of record the registry writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Direct PostgreSQL connection via `infra_db`
    Postgres,
    /// Hosted database behind a PostgREST-style HTTP interface
    Hosted,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    pub store_backend: StoreBackend,
    /// Database URL, used by the postgres backend
    pub database_url: String,
    /// Project URL of the hosted backend
    pub hosted_url: Option<String>,
    /// Service key of the hosted backend
    pub hosted_key: Option<String>,
    /// Request timeout for the hosted backend
    pub hosted_timeout_secs: u64,
    /// IANA timezone whose calendar dates go into site ids
    pub timezone: String,
    /// Insert attempts before giving up on a contested identifier
    pub max_id_attempts: u32,
    /// Log level
    pub log_level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            store_backend: StoreBackend::Postgres,
            database_url: "postgres://localhost/registry".to_string(),
            hosted_url: None,
            hosted_key: None,
            hosted_timeout_secs: 10,
            timezone: LocalCalendar::DEFAULT_TIMEZONE.to_string(),
            max_id_attempts: IdConflictPolicy::default().max_attempts,
            log_level: "info".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Calendar for the configured timezone
    pub fn calendar(&self) -> Result<LocalCalendar, CoreError> {
        LocalCalendar::parse(&self.timezone)
    }

    pub fn conflict_policy(&self) -> IdConflictPolicy {
        IdConflictPolicy::new(self.max_id_attempts)
    }

    /// Connection settings for the hosted backend
    ///
    /// # Errors
    ///
    /// `CoreError::Configuration` when the URL or key is missing
    pub fn hosted_store_config(&self) -> Result<HostedStoreConfig, CoreError> {
        let base_url = self
            .hosted_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| CoreError::configuration("API_HOSTED_URL is required for the hosted store"))?;
        let api_key = self
            .hosted_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CoreError::configuration("API_HOSTED_KEY is required for the hosted store"))?;

        Ok(HostedStoreConfig {
            base_url,
            api_key,
            timeout_secs: self.hosted_timeout_secs,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.conflict_policy().max_attempts, 3);
        assert!(config.calendar().is_ok());
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let config = ApiConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(config.calendar().is_err());
    }

    #[test]
    fn test_hosted_store_requires_url_and_key() {
        let mut config = ApiConfig {
            store_backend: StoreBackend::Hosted,
            hosted_url: Some("https://project.example.co".to_string()),
            ..Default::default()
        };
        assert!(config.hosted_store_config().is_err());

        config.hosted_key = Some("service-key".to_string());
        let hosted = config.hosted_store_config().unwrap();
        assert_eq!(hosted.base_url, "https://project.example.co");
        assert_eq!(hosted.timeout_secs, 10);
    }
}
