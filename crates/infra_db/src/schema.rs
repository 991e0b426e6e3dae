//! Registry schema setup
//!
//! The schema script is idempotent (`CREATE ... IF NOT EXISTS`), so it is
//! safe to apply on every start and against an already initialized database.

use sqlx::PgPool;
use tracing::info;

use crate::error::DatabaseError;

/// DDL for the customers, sites and orders tables
pub const REGISTRY_SCHEMA: &str =
    include_str!("../../../migrations/20240101_000001_registry_schema.sql");

/// Applies the registry schema to the database behind `pool`
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    info!("Applying registry schema");
    sqlx::raw_sql(REGISTRY_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_unique_constraints_by_column() {
        for constraint in [
            "customers_customer_id_key",
            "customers_phone_key",
            "sites_site_id_key",
            "orders_order_id_key",
        ] {
            assert!(REGISTRY_SCHEMA.contains(constraint), "missing {}", constraint);
        }
    }
}
