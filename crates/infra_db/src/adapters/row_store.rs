//! PostgreSQL Row Store Adapter
//!
//! The internal adapter for the registry's `RowStore` port. Rows move in and
//! out of PostgreSQL as `jsonb`: reads select `to_jsonb(t)` and writes go
//! through `jsonb_populate_record`, so one set of statements serves every
//! table. Table and column names come from the [`Table`] whitelist and are
//! never taken from request input; values are always bound parameters.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::PgRowStore;
//! use domain_registry::{RowStore, Table};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn RowStore> = Arc::new(PgRowStore::new(pool));
//! let taken = store.query_exists(Table::Customers, "phone", "9876543210", None).await?;
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_registry::{Exclusion, RowStore, ScopeFilter, StoreRow, Table};

use crate::error::DatabaseError;

/// Columns stored with a non-text type; compared through a text cast
const NON_TEXT_COLUMNS: &[&str] = &["created_at", "order_date"];

/// PostgreSQL-backed implementation of the RowStore trait
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - unique violations -> `PortError::Conflict`, naming the column
/// - connection loss -> `PortError::Connection`
/// - pool exhaustion -> `PortError::ServiceUnavailable`
/// - foreign key and check violations -> `PortError::Validation`
#[derive(Debug, Clone)]
pub struct PgRowStore {
    pool: PgPool,
}

impl PgRowStore {
    /// Creates a new adapter over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn comparable(column: &str) -> String {
    if NON_TEXT_COLUMNS.contains(&column) {
        format!("t.{}::text", column)
    } else {
        format!("t.{}", column)
    }
}

fn exists_sql(table: Table, column: &str, excluded: Option<&str>) -> String {
    let mut sql = format!(
        "SELECT to_jsonb(t) FROM {} t WHERE {} = $1",
        table.name(),
        comparable(column)
    );
    if let Some(excluded) = excluded {
        sql.push_str(&format!(" AND {} IS DISTINCT FROM $2", comparable(excluded)));
    }
    sql
}

fn scope_sql(table: Table, filter_columns: &[&str], id_column: &str) -> String {
    let mut sql = format!(
        "SELECT to_jsonb(t) FROM {} t WHERE t.{} IS NOT NULL",
        table.name(),
        id_column
    );
    for (index, column) in filter_columns.iter().enumerate() {
        sql.push_str(&format!(" AND {} = ${}", comparable(column), index + 1));
    }
    sql.push_str(&format!(" ORDER BY t.{}", id_column));
    sql
}

fn insert_sql(table: Table, columns: &[&str]) -> String {
    let list = columns.join(", ");
    format!(
        "INSERT INTO {table} AS t ({list}) SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1) RETURNING to_jsonb(t)",
        table = table.name(),
        list = list,
    )
}

fn update_sql(table: Table, columns: &[&str]) -> String {
    let assignments = columns
        .iter()
        .map(|c| format!("{c} = r.{c}", c = c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, $1) AS r WHERE t.id = $2 RETURNING to_jsonb(t)",
        table = table.name(),
        assignments = assignments,
    )
}

/// Resolves every key of `record` against the table's columns
fn record_columns(table: Table, record: &StoreRow) -> Result<Vec<&'static str>, PortError> {
    record.keys().map(|key| table.column(key)).collect()
}

/// Translates a database error raised while working on `table`
fn map_db_error(table: Table, error: DatabaseError) -> PortError {
    match error {
        DatabaseError::DuplicateEntry {
            message,
            constraint,
            detail,
        } => {
            let field = constraint
                .as_deref()
                .and_then(|c| table.column_for_constraint(c))
                .map(str::to_string)
                .or_else(|| table.infer_conflict_field(detail.as_deref(), &message));
            PortError::conflict(message, field)
        }
        DatabaseError::NotFound(message) => PortError::not_found(table.name(), message),
        DatabaseError::ForeignKeyViolation(message) | DatabaseError::ConstraintViolation(message) => {
            PortError::validation(message)
        }
        DatabaseError::ConnectionFailed(message) => PortError::connection(message),
        DatabaseError::PoolExhausted => PortError::ServiceUnavailable {
            service: "postgres connection pool".to_string(),
        },
        DatabaseError::SerializationError(message) => PortError::transformation(message),
        other => PortError::Internal {
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}

fn store_error(table: Table) -> impl Fn(sqlx::Error) -> PortError {
    move |error| map_db_error(table, DatabaseError::from(error))
}

impl DomainPort for PgRowStore {}

#[async_trait]
impl HealthCheckable for PgRowStore {
    /// Checks database connectivity with `SELECT 1`
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;
        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };

        HealthCheckResult {
            adapter_id: "postgres-row-store".to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    #[instrument(skip(self, value, exclude), fields(table = %table))]
    async fn query_exists(
        &self,
        table: Table,
        field: &str,
        value: &str,
        exclude: Option<&Exclusion>,
    ) -> Result<Vec<StoreRow>, PortError> {
        let column = table.column(field)?;
        let excluded = exclude
            .map(|e| table.column(&e.field).map(|c| (c, e.value.as_str())))
            .transpose()?;

        let sql = exists_sql(table, column, excluded.map(|(c, _)| c));
        let mut query = sqlx::query_scalar::<_, Json<StoreRow>>(&sql).bind(value);
        if let Some((_, excluded_value)) = excluded {
            query = query.bind(excluded_value);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(store_error(table))?;
        debug!(matches = rows.len(), column, "Existence query complete");
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    #[instrument(skip(self, filters), fields(table = %table, filters = filters.len()))]
    async fn query_scope(
        &self,
        table: Table,
        filters: &[ScopeFilter],
        id_field: &str,
    ) -> Result<Vec<StoreRow>, PortError> {
        let id_column = table.column(id_field)?;
        let columns = filters
            .iter()
            .map(|f| table.column(&f.field))
            .collect::<Result<Vec<_>, _>>()?;

        let sql = scope_sql(table, &columns, id_column);
        let mut query = sqlx::query_scalar::<_, Json<StoreRow>>(&sql);
        for filter in filters {
            query = query.bind(filter.value.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(store_error(table))?;
        debug!(rows = rows.len(), "Scope query complete");
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    #[instrument(skip(self, record), fields(table = %table))]
    async fn insert(&self, table: Table, record: StoreRow) -> Result<StoreRow, PortError> {
        let columns = record_columns(table, &record)?;
        if columns.is_empty() {
            return Err(PortError::validation(format!("empty insert into {}", table)));
        }

        let sql = insert_sql(table, &columns);
        let Json(stored) = sqlx::query_scalar::<_, Json<StoreRow>>(&sql)
            .bind(Json(record))
            .fetch_one(&self.pool)
            .await
            .map_err(store_error(table))?;

        debug!("Row inserted");
        Ok(stored)
    }

    #[instrument(skip(self, changes), fields(table = %table))]
    async fn update(
        &self,
        table: Table,
        id: &str,
        mut changes: StoreRow,
    ) -> Result<StoreRow, PortError> {
        changes.remove("id");
        let columns = record_columns(table, &changes)?;
        if columns.is_empty() {
            return Err(PortError::validation(format!("empty update of {} {}", table, id)));
        }

        let sql = update_sql(table, &columns);
        let updated = sqlx::query_scalar::<_, Json<StoreRow>>(&sql)
            .bind(Json(changes))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error(table))?;

        match updated {
            Some(Json(row)) => Ok(row),
            None => Err(PortError::not_found(table.name(), id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exists_sql_binds_value_and_exclusion() {
        let sql = exists_sql(Table::Customers, "phone", Some("id"));
        assert_eq!(
            sql,
            "SELECT to_jsonb(t) FROM customers t WHERE t.phone = $1 AND t.id IS DISTINCT FROM $2"
        );
    }

    #[test]
    fn test_non_text_columns_compare_as_text() {
        let sql = exists_sql(Table::Orders, "order_date", None);
        assert!(sql.ends_with("WHERE t.order_date::text = $1"));
    }

    #[test]
    fn test_scope_sql_numbers_parameters_in_filter_order() {
        let sql = scope_sql(Table::Sites, &["created_by", "city_code"], "site_id");
        assert_eq!(
            sql,
            "SELECT to_jsonb(t) FROM sites t WHERE t.site_id IS NOT NULL \
             AND t.created_by = $1 AND t.city_code = $2 ORDER BY t.site_id"
        );
    }

    #[test]
    fn test_insert_and_update_sql_use_populated_record() {
        let insert = insert_sql(Table::Customers, &["customer_id", "phone"]);
        assert!(insert.starts_with("INSERT INTO customers AS t (customer_id, phone) SELECT customer_id, phone"));
        assert!(insert.contains("jsonb_populate_record(NULL::customers, $1)"));

        let update = update_sql(Table::Customers, &["phone"]);
        assert!(update.contains("SET phone = r.phone"));
        assert!(update.contains("WHERE t.id = $2"));
    }

    #[test]
    fn test_unknown_record_key_is_rejected() {
        let record = json!({"phone": "9876543210", "phone; DROP TABLE customers": "x"});
        let err = record_columns(Table::Customers, record.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, PortError::Validation { .. }));
    }

    #[test]
    fn test_duplicate_maps_to_conflict_on_column() {
        let err = map_db_error(
            Table::Customers,
            DatabaseError::DuplicateEntry {
                message: "duplicate key value violates unique constraint \"customers_phone_key\"".to_string(),
                constraint: Some("customers_phone_key".to_string()),
                detail: Some("Key (phone)=(9876543210) already exists.".to_string()),
            },
        );
        assert!(err.is_conflict());
        assert_eq!(err.conflict_field(), Some("phone"));
    }

    #[test]
    fn test_duplicate_without_constraint_uses_detail() {
        let err = map_db_error(
            Table::Sites,
            DatabaseError::DuplicateEntry {
                message: "duplicate key".to_string(),
                constraint: None,
                detail: Some("Key (site_id)=(0324/DEL/AB-1) already exists.".to_string()),
            },
        );
        assert_eq!(err.conflict_field(), Some("site_id"));
    }

    #[test]
    fn test_connection_failures_are_transient() {
        assert!(map_db_error(Table::Orders, DatabaseError::PoolExhausted).is_transient());
        assert!(map_db_error(
            Table::Orders,
            DatabaseError::ConnectionFailed("reset by peer".to_string())
        )
        .is_transient());
        assert!(!map_db_error(Table::Orders, DatabaseError::QueryFailed("syntax".to_string()))
            .is_transient());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn table_strategy() -> impl Strategy<Value = Table> {
            prop::sample::select(vec![Table::Customers, Table::Sites, Table::Orders])
        }

        proptest! {
            #[test]
            fn named_unique_constraints_resolve_to_their_column(
                (table, column) in table_strategy().prop_flat_map(|t| {
                    (Just(t), prop::sample::select(t.unique_columns().to_vec()))
                })
            ) {
                let err = map_db_error(
                    table,
                    DatabaseError::DuplicateEntry {
                        message: "duplicate key".to_string(),
                        constraint: Some(format!("{}_{}_key", table.name(), column)),
                        detail: None,
                    },
                );
                prop_assert!(err.is_conflict());
                prop_assert_eq!(err.conflict_field(), Some(column));
            }

            #[test]
            fn scope_sql_binds_one_parameter_per_filter(
                table in table_strategy(),
                count in 0usize..4,
            ) {
                let columns: Vec<&str> = table.columns().iter().copied().take(count).collect();
                let sql = scope_sql(table, &columns, table.identifier_column());

                for n in 1..=count {
                    let placeholder = format!("${}", n);
                    prop_assert!(sql.contains(&placeholder));
                }
                let unused = format!("${}", count + 1);
                prop_assert!(!sql.contains(&unused));
                let order_by = format!("ORDER BY t.{}", table.identifier_column());
                prop_assert!(sql.ends_with(&order_by));
            }
        }
    }
}
