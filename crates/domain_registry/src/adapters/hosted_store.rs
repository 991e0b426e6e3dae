//! Hosted Store Adapter
//!
//! Implements [`RowStore`] against a hosted Postgres that is reached over a
//! PostgREST-style HTTP interface (`/rest/v1/<table>`).
//!
//! # Requests
//!
//! - Reads: `GET /rest/v1/{table}?select=*&{col}=eq.{value}`; exclusions
//!   use `neq.`, and scope reads add `{id_field}=not.is.null`
//! - Inserts: `POST` with `Prefer: return=representation`
//! - Updates: `PATCH ?id=eq.{id}` with the same preference
//! - Every request carries the `apikey` header and a bearer token
//!
//! Reads are retried with exponential backoff on transient failures.
//! Writes are never retried: a timed-out insert may have landed.
//!
//! # Error Handling
//!
//! Error responses are mapped to `PortError` variants:
//! - code `23505` -> `PortError::Conflict`, with the column when it can be
//!   read from the details or the constraint name
//! - 401/403 -> `PortError::Unauthorized`
//! - 404 -> `PortError::NotFound`
//! - 408/504 and client timeouts -> `PortError::Timeout`
//! - 429 -> `PortError::RateLimited`
//! - other 5xx -> `PortError::ServiceUnavailable`
//! - connection failures -> `PortError::Connection`

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use core_kernel::{
    AdapterHealth, CircuitBreakerConfig, DomainPort, HealthCheckResult, HealthCheckable,
    PortError,
};

use crate::ports::{Exclusion, RowStore, ScopeFilter, StoreRow, Table};

const ADAPTER_ID: &str = "hosted-row-store";
const REST_PREFIX: &str = "rest/v1";
const UNIQUE_VIOLATION: &str = "23505";
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Configuration for the hosted store adapter
#[derive(Debug, Clone)]
pub struct HostedStoreConfig {
    /// Project URL, without the `/rest/v1` suffix
    pub base_url: String,

    /// Service or anon key, sent as `apikey` and bearer token
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Extra attempts for reads that fail transiently
    pub retry_attempts: u32,

    /// Circuit breaker configuration
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for HostedStoreConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
            retry_attempts: 2,
            circuit_breaker: Some(CircuitBreakerConfig::default()),
        }
    }
}

/// Circuit breaker state for fault tolerance
#[derive(Debug)]
struct CircuitBreaker {
    config: CircuitBreakerConfig,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    is_open: AtomicBool,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            is_open: AtomicBool::new(false),
            opened_at: RwLock::new(None),
        }
    }

    async fn is_available(&self) -> bool {
        if !self.is_open.load(Ordering::Relaxed) {
            return true;
        }

        // Half-open once the reset timeout has passed
        match *self.opened_at.read().await {
            Some(time) => time.elapsed() > Duration::from_secs(self.config.reset_timeout_secs),
            None => false,
        }
    }

    fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if !self.is_open.load(Ordering::Relaxed) {
            return;
        }
        let success = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
        if success >= u64::from(self.config.success_threshold) {
            self.is_open.store(false, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }
    }

    async fn record_failure(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= u64::from(self.config.failure_threshold) {
            if !self.is_open.swap(true, Ordering::Relaxed) {
                warn!(failures, "Circuit breaker opened for hosted store");
            }
            *self.opened_at.write().await = Some(Instant::now());
        }
    }
}

/// Error body returned by the REST interface
#[derive(Debug, Default, Deserialize)]
struct RestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Row store backed by a hosted REST database
///
/// # Example
///
/// ```rust,ignore
/// use domain_registry::adapters::{HostedRowStore, HostedStoreConfig};
///
/// let store = HostedRowStore::new(HostedStoreConfig {
///     base_url: "https://project.example.co".to_string(),
///     api_key: "service-key".to_string(),
///     ..Default::default()
/// })?;
/// let rows = store.query_exists(Table::Customers, "phone", "9876543210", None).await?;
/// ```
#[derive(Debug)]
pub struct HostedRowStore {
    config: HostedStoreConfig,
    client: Client,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl HostedRowStore {
    /// Creates the adapter and its HTTP client
    ///
    /// # Errors
    ///
    /// Returns `PortError::Internal` if the HTTP client cannot be built
    pub fn new(config: HostedStoreConfig) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PortError::Internal {
                message: "Failed to build HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;

        let circuit_breaker = config
            .circuit_breaker
            .clone()
            .map(|cb| Arc::new(CircuitBreaker::new(cb)));

        Ok(Self {
            config,
            client,
            circuit_breaker,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Checks if the circuit breaker is open (blocking requests)
    pub async fn is_circuit_open(&self) -> bool {
        match &self.circuit_breaker {
            Some(cb) => !cb.is_available().await,
            None => false,
        }
    }

    fn table_url(&self, table: Table) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            REST_PREFIX,
            table.name()
        )
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    /// Sends a request through the circuit breaker and decodes the row list
    async fn send(
        &self,
        table: Table,
        operation: &str,
        builder: RequestBuilder,
    ) -> Result<Vec<StoreRow>, PortError> {
        if self.is_circuit_open().await {
            return Err(PortError::ServiceUnavailable {
                service: format!("{} (circuit open)", ADAPTER_ID),
            });
        }

        let result = match builder.send().await {
            Ok(response) => decode_response(table, operation, response).await,
            Err(e) => Err(map_transport_error(operation, self.config.timeout_secs, e)),
        };

        if let Some(cb) = &self.circuit_breaker {
            match &result {
                Err(e) if e.is_transient() => cb.record_failure().await,
                _ => cb.record_success(),
            }
        }
        result
    }

    /// Runs a read, retrying transient failures with exponential backoff
    async fn read(
        &self,
        table: Table,
        operation: &str,
        query: Vec<(String, String)>,
    ) -> Result<Vec<StoreRow>, PortError> {
        let mut attempt = 0;
        loop {
            let builder = self.request(Method::GET, table).query(&query);
            match self.send(table, operation, builder).await {
                Err(e) if e.is_transient() && attempt < self.config.retry_attempts => {
                    let delay = RETRY_BASE_DELAY_MS << attempt;
                    attempt += 1;
                    debug!(operation, attempt, delay_ms = delay, error = %e, "Retrying read");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                other => return other,
            }
        }
    }
}

fn check_record(table: Table, record: &StoreRow) -> Result<(), PortError> {
    for field in record.keys() {
        table.column(field)?;
    }
    Ok(())
}

fn map_transport_error(operation: &str, timeout_secs: u64, error: reqwest::Error) -> PortError {
    if error.is_timeout() {
        PortError::timeout(operation, timeout_secs * 1000)
    } else if error.is_connect() {
        PortError::Connection {
            message: format!("{} could not reach the hosted store", operation),
            source: Some(Box::new(error)),
        }
    } else {
        PortError::Internal {
            message: format!("{} request failed", operation),
            source: Some(Box::new(error)),
        }
    }
}

async fn decode_response(
    table: Table,
    operation: &str,
    response: Response,
) -> Result<Vec<StoreRow>, PortError> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .map_err(|e| map_transport_error(operation, 0, e))?;

    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        return match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(PortError::transformation(format!(
                        "expected a row object from {}, got {}",
                        table, other
                    ))),
                })
                .collect(),
            Ok(Value::Object(row)) => Ok(vec![row]),
            Ok(other) => Err(PortError::transformation(format!(
                "unexpected response from {}: {}",
                table, other
            ))),
            Err(e) => Err(PortError::transformation(format!(
                "invalid JSON from {}: {}",
                table, e
            ))),
        };
    }

    let error: RestError = serde_json::from_str(&body).unwrap_or_default();
    Err(map_status_error(table, operation, status, retry_after, error, &body))
}

fn map_status_error(
    table: Table,
    operation: &str,
    status: StatusCode,
    retry_after: Option<u64>,
    error: RestError,
    body: &str,
) -> PortError {
    let message = error
        .message
        .clone()
        .unwrap_or_else(|| format!("{} returned {}", operation, status));

    if error.code.as_deref() == Some(UNIQUE_VIOLATION) {
        let field = table.infer_conflict_field(error.details.as_deref(), &message);
        return PortError::conflict(message, field);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized { message },
        StatusCode::NOT_FOUND => PortError::not_found(table.name(), operation),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            PortError::timeout(operation, 0)
        }
        StatusCode::TOO_MANY_REQUESTS => PortError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(1),
        },
        StatusCode::CONFLICT => PortError::conflict(message, None),
        s if s.is_server_error() => PortError::ServiceUnavailable {
            service: format!("{} ({})", ADAPTER_ID, s.as_u16()),
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => PortError::Validation {
            message: match error.hint {
                Some(hint) => format!("{} ({})", message, hint),
                None => message,
            },
            field: None,
        },
        _ => PortError::internal(format!("{} returned {}: {}", operation, status, body)),
    }
}

impl DomainPort for HostedRowStore {}

#[async_trait]
impl HealthCheckable for HostedRowStore {
    /// Reads a single customer id to verify connectivity and credentials
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();

        if self.is_circuit_open().await {
            return HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Degraded,
                latency_ms: 0,
                message: Some("Circuit breaker is open".to_string()),
                checked_at: Utc::now(),
            };
        }

        let builder = self
            .request(Method::GET, Table::Customers)
            .query(&[("select", "id"), ("limit", "1")]);
        let result = self.send(Table::Customers, "health_check", builder).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(e.to_string())),
        };

        HealthCheckResult {
            adapter_id: ADAPTER_ID.to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl RowStore for HostedRowStore {
    #[instrument(skip(self, value, exclude), fields(table = %table))]
    async fn query_exists(
        &self,
        table: Table,
        field: &str,
        value: &str,
        exclude: Option<&Exclusion>,
    ) -> Result<Vec<StoreRow>, PortError> {
        let column = table.column(field)?;
        let mut query = vec![
            ("select".to_string(), "*".to_string()),
            (column.to_string(), format!("eq.{}", value)),
        ];
        if let Some(exclusion) = exclude {
            let excluded = table.column(&exclusion.field)?;
            query.push((excluded.to_string(), format!("neq.{}", exclusion.value)));
        }

        self.read(table, "query_exists", query).await
    }

    #[instrument(skip(self, filters), fields(table = %table, filters = filters.len()))]
    async fn query_scope(
        &self,
        table: Table,
        filters: &[ScopeFilter],
        id_field: &str,
    ) -> Result<Vec<StoreRow>, PortError> {
        let id_column = table.column(id_field)?;
        let mut query = vec![
            ("select".to_string(), "*".to_string()),
            (id_column.to_string(), "not.is.null".to_string()),
        ];
        for filter in filters {
            let column = table.column(&filter.field)?;
            query.push((column.to_string(), format!("eq.{}", filter.value)));
        }

        self.read(table, "query_scope", query).await
    }

    #[instrument(skip(self, record), fields(table = %table))]
    async fn insert(&self, table: Table, record: StoreRow) -> Result<StoreRow, PortError> {
        check_record(table, &record)?;

        let builder = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&record);
        self.send(table, "insert", builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortError::transformation(format!("insert into {} returned no row", table)))
    }

    #[instrument(skip(self, changes), fields(table = %table))]
    async fn update(
        &self,
        table: Table,
        id: &str,
        changes: StoreRow,
    ) -> Result<StoreRow, PortError> {
        check_record(table, &changes)?;

        let builder = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&changes);
        self.send(table, "update", builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortError::not_found(table.name(), id))
    }
}
