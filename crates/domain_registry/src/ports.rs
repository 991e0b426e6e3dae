//! Registry Domain Ports
//!
//! This module defines the row-store port the registry needs from its
//! system of record, enabling swappable implementations:
//!
//! - **Hosted Adapter**: the hosted database's REST interface
//!   ([`crate::adapters::HostedRowStore`])
//! - **Internal Adapter**: direct PostgreSQL access (`infra_db`)
//! - **Mock Adapter**: in-memory rows for tests ([`mock::MockRowStore`])
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_registry::ports::RowStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn RowStore> = match config.store_backend {
//!     StoreBackend::Postgres => Arc::new(PgRowStore::new(pool)),
//!     StoreBackend::Hosted => Arc::new(HostedRowStore::new(hosted_config)?),
//! };
//! ```
//!
//! Rows travel as JSON objects. Field names are checked against a fixed
//! per-table column list before any adapter builds a query from them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use core_kernel::{PortError, DomainPort, HealthCheckable};

/// A row as exchanged with the store
pub type StoreRow = serde_json::Map<String, Value>;

/// Tables the registry reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Customers,
    Sites,
    Orders,
}

const CUSTOMER_COLUMNS: &[&str] = &[
    "id",
    "customer_id",
    "phone",
    "name",
    "customer_type",
    "city",
    "city_code",
    "nickname",
    "mistry_name",
    "parent_id",
    "created_by",
    "created_at",
];

const SITE_COLUMNS: &[&str] = &[
    "id",
    "site_id",
    "city",
    "city_code",
    "contractor_id",
    "delivery_address",
    "created_by",
    "created_at",
];

const ORDER_COLUMNS: &[&str] = &[
    "id",
    "order_id",
    "site_id",
    "contractor_id",
    "city",
    "delivery_address",
    "order_date",
    "created_by",
    "created_at",
];

impl Table {
    /// Table name in the store
    pub fn name(&self) -> &'static str {
        match self {
            Table::Customers => "customers",
            Table::Sites => "sites",
            Table::Orders => "orders",
        }
    }

    /// Every column the registry may filter on or write
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Customers => CUSTOMER_COLUMNS,
            Table::Sites => SITE_COLUMNS,
            Table::Orders => ORDER_COLUMNS,
        }
    }

    /// Columns carrying a unique constraint besides the primary key
    pub fn unique_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Customers => &["customer_id", "phone"],
            Table::Sites => &["site_id"],
            Table::Orders => &["order_id"],
        }
    }

    /// Column holding the human-readable composite identifier
    pub fn identifier_column(&self) -> &'static str {
        match self {
            Table::Customers => "customer_id",
            Table::Sites => "site_id",
            Table::Orders => "order_id",
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Resolves a caller-supplied field name to a known column
    ///
    /// # Errors
    ///
    /// Returns `PortError::Validation` naming the field if it is not a column
    /// of this table
    pub fn column(&self, field: &str) -> Result<&'static str, PortError> {
        self.columns()
            .iter()
            .copied()
            .find(|c| *c == field)
            .ok_or_else(|| {
                PortError::validation_field(
                    format!("Unknown column '{}' for table {}", field, self.name()),
                    field,
                )
            })
    }

    /// Maps a unique-constraint name such as `customers_phone_key` to its column
    pub fn column_for_constraint(&self, constraint: &str) -> Option<&'static str> {
        let trimmed = constraint
            .strip_prefix(self.name())
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(constraint);
        let trimmed = trimmed
            .strip_suffix("_key")
            .or_else(|| trimmed.strip_suffix("_idx"))
            .or_else(|| trimmed.strip_suffix("_unique"))
            .unwrap_or(trimmed);

        self.columns().iter().copied().find(|c| *c == trimmed)
    }

    /// Works out which column a unique-constraint violation refers to
    ///
    /// Postgres reports the column in the detail text (`Key (phone)=(...)
    /// already exists.`) and the constraint name in the message; either is
    /// enough.
    pub fn infer_conflict_field(&self, details: Option<&str>, message: &str) -> Option<String> {
        if let Some(column) = details.and_then(key_column_from_details) {
            if self.has_column(column) {
                return Some(column.to_string());
            }
        }

        constraint_from_message(message)
            .and_then(|constraint| self.column_for_constraint(constraint))
            .map(str::to_string)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn key_column_from_details(details: &str) -> Option<&str> {
    let start = details.find("Key (")? + "Key (".len();
    let rest = &details[start..];
    let end = rest.find(")=")?;
    Some(&rest[..end])
}

fn constraint_from_message(message: &str) -> Option<&str> {
    let start = message.find("constraint \"")? + "constraint \"".len();
    let rest = &message[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

/// Equality filter on one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    pub field: String,
    pub value: String,
}

impl ScopeFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A row to leave out of an existence check, typically the record being edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub field: String,
    pub value: String,
}

impl Exclusion {
    /// Excludes the row with the given primary key
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            field: "id".to_string(),
            value: id.into(),
        }
    }
}

/// Reads a column as text, accepting strings and numbers
pub fn row_text<'a>(row: &'a StoreRow, field: &str) -> Option<std::borrow::Cow<'a, str>> {
    match row.get(field)? {
        Value::String(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(std::borrow::Cow::Owned(n.to_string())),
        _ => None,
    }
}

/// The port trait for the registry's system of record
///
/// All methods are async and return `Result<T, PortError>`. A write that
/// violates a unique constraint must fail with `PortError::Conflict`, naming
/// the column when the backend makes that possible.
#[async_trait]
pub trait RowStore: DomainPort + HealthCheckable {
    /// Returns rows whose `field` equals `value`, minus the excluded row
    async fn query_exists(
        &self,
        table: Table,
        field: &str,
        value: &str,
        exclude: Option<&Exclusion>,
    ) -> Result<Vec<StoreRow>, PortError>;

    /// Returns full rows matching every filter and having a non-null `id_field`
    ///
    /// Callers parse sequence suffixes out of the `id_field` values.
    async fn query_scope(
        &self,
        table: Table,
        filters: &[ScopeFilter],
        id_field: &str,
    ) -> Result<Vec<StoreRow>, PortError>;

    /// Inserts a row and returns it as stored (with `id` and defaults)
    async fn insert(&self, table: Table, record: StoreRow) -> Result<StoreRow, PortError>;

    /// Applies `changes` to the row with primary key `id`
    async fn update(&self, table: Table, id: &str, changes: StoreRow)
        -> Result<StoreRow, PortError>;
}

/// Mock implementation of RowStore for testing
///
/// Rows live in memory and unique columns are enforced the way the real
/// tables enforce them. Failures and concurrent writers can be simulated.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use chrono::Utc;
    use core_kernel::{HealthCheckResult, AdapterHealth};

    /// A failure the mock can be told to produce
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockFailure {
        Timeout,
        Unavailable,
        Connection,
    }

    impl MockFailure {
        fn to_error(self, operation: &str) -> PortError {
            match self {
                MockFailure::Timeout => PortError::timeout(operation, 5000),
                MockFailure::Unavailable => PortError::ServiceUnavailable {
                    service: "mock-row-store".to_string(),
                },
                MockFailure::Connection => PortError::connection(format!("{} refused", operation)),
            }
        }
    }

    /// In-memory mock implementation of RowStore
    #[derive(Debug, Default)]
    pub struct MockRowStore {
        rows: Arc<RwLock<HashMap<Table, Vec<StoreRow>>>>,
        query_failure: RwLock<Option<MockFailure>>,
        write_failure: RwLock<Option<MockFailure>>,
        concurrent_writes: RwLock<Vec<(Table, StoreRow)>>,
        queried_values: RwLock<Vec<String>>,
        query_calls: AtomicUsize,
        insert_calls: AtomicUsize,
    }

    impl MockRowStore {
        /// Creates a new empty mock store
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates a table, bypassing unique checks
        pub async fn with_rows(table: Table, rows: Vec<StoreRow>) -> Self {
            let store = Self::new();
            store.seed(table, rows).await;
            store
        }

        /// Adds rows to a table, bypassing unique checks
        pub async fn seed(&self, table: Table, rows: Vec<StoreRow>) {
            self.rows.write().await.entry(table).or_default().extend(rows);
        }

        /// Returns a snapshot of a table
        pub async fn rows(&self, table: Table) -> Vec<StoreRow> {
            self.rows.read().await.get(&table).cloned().unwrap_or_default()
        }

        /// Makes every query fail until cleared
        pub async fn fail_queries(&self, failure: Option<MockFailure>) {
            *self.query_failure.write().await = failure;
        }

        /// Makes every insert and update fail until cleared
        pub async fn fail_writes(&self, failure: Option<MockFailure>) {
            *self.write_failure.write().await = failure;
        }

        /// Simulates another client writing `row` just before our next write to `table`
        pub async fn race_next_write(&self, table: Table, row: StoreRow) {
            self.concurrent_writes.write().await.push((table, row));
        }

        /// Number of query calls made so far
        pub fn query_calls(&self) -> usize {
            self.query_calls.load(Ordering::SeqCst)
        }

        /// Number of insert calls made so far
        pub fn insert_calls(&self) -> usize {
            self.insert_calls.load(Ordering::SeqCst)
        }

        /// Values passed to `query_exists`, in call order
        pub async fn queried_values(&self) -> Vec<String> {
            self.queried_values.read().await.clone()
        }

        async fn before_query(&self, operation: &str) -> Result<(), PortError> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            match *self.query_failure.read().await {
                Some(failure) => Err(failure.to_error(operation)),
                None => Ok(()),
            }
        }

        async fn before_write(&self, table: Table, operation: &str) -> Result<(), PortError> {
            if let Some(failure) = *self.write_failure.read().await {
                return Err(failure.to_error(operation));
            }

            let mut pending = self.concurrent_writes.write().await;
            let (racing, rest): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|(t, _)| *t == table);
            *pending = rest;
            drop(pending);

            if !racing.is_empty() {
                let mut rows = self.rows.write().await;
                rows.entry(table)
                    .or_default()
                    .extend(racing.into_iter().map(|(_, row)| row));
            }
            Ok(())
        }
    }

    fn matches(row: &StoreRow, field: &str, value: &str) -> bool {
        row_text(row, field).map(|v| v == value).unwrap_or(false)
    }

    fn check_unique(
        table: Table,
        existing: &[StoreRow],
        candidate: &StoreRow,
        skip_id: Option<&str>,
    ) -> Result<(), PortError> {
        for column in table.unique_columns() {
            let Some(value) = row_text(candidate, column) else {
                continue;
            };
            let clash = existing.iter().any(|row| {
                let same_row = skip_id
                    .map(|id| matches(row, "id", id))
                    .unwrap_or(false);
                !same_row && matches(row, column, &value)
            });
            if clash {
                return Err(PortError::conflict(
                    format!(
                        "duplicate key value violates unique constraint \"{}_{}_key\"",
                        table.name(),
                        column
                    ),
                    Some((*column).to_string()),
                ));
            }
        }
        Ok(())
    }

    fn check_columns(table: Table, record: &StoreRow) -> Result<(), PortError> {
        for field in record.keys() {
            table.column(field)?;
        }
        Ok(())
    }

    impl DomainPort for MockRowStore {}

    #[async_trait]
    impl HealthCheckable for MockRowStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-row-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl RowStore for MockRowStore {
        async fn query_exists(
            &self,
            table: Table,
            field: &str,
            value: &str,
            exclude: Option<&Exclusion>,
        ) -> Result<Vec<StoreRow>, PortError> {
            self.queried_values.write().await.push(value.to_string());
            self.before_query("query_exists").await?;
            table.column(field)?;
            if let Some(exclusion) = exclude {
                table.column(&exclusion.field)?;
            }

            let rows = self.rows.read().await;
            Ok(rows
                .get(&table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| matches(row, field, value))
                        .filter(|row| {
                            exclude
                                .map(|ex| !matches(row, &ex.field, &ex.value))
                                .unwrap_or(true)
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn query_scope(
            &self,
            table: Table,
            filters: &[ScopeFilter],
            id_field: &str,
        ) -> Result<Vec<StoreRow>, PortError> {
            self.before_query("query_scope").await?;
            table.column(id_field)?;
            for filter in filters {
                table.column(&filter.field)?;
            }

            let rows = self.rows.read().await;
            Ok(rows
                .get(&table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| row.get(id_field).map(|v| !v.is_null()).unwrap_or(false))
                        .filter(|row| filters.iter().all(|f| matches(row, &f.field, &f.value)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn insert(&self, table: Table, mut record: StoreRow) -> Result<StoreRow, PortError> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            self.before_write(table, "insert").await?;
            check_columns(table, &record)?;

            let mut rows = self.rows.write().await;
            let existing = rows.entry(table).or_default();
            check_unique(table, existing, &record, None)?;

            record
                .entry("id")
                .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
            record
                .entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            existing.push(record.clone());
            Ok(record)
        }

        async fn update(
            &self,
            table: Table,
            id: &str,
            changes: StoreRow,
        ) -> Result<StoreRow, PortError> {
            self.before_write(table, "update").await?;
            check_columns(table, &changes)?;

            let mut rows = self.rows.write().await;
            let existing = rows.entry(table).or_default();
            check_unique(table, existing, &changes, Some(id))?;

            let row = existing
                .iter_mut()
                .find(|row| matches(row, "id", id))
                .ok_or_else(|| PortError::not_found(table.name(), id))?;
            for (key, value) in changes {
                row.insert(key, value);
            }
            Ok(row.clone())
        }
    }
}
