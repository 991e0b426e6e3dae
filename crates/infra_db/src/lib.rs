//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL side of the registry: pool
//! construction, the table schema, and [`PgRowStore`], the internal
//! adapter for the `RowStore` port defined in `domain_registry`.
//!
//! # Architecture
//!
//! The domain never sees SQL. It asks the port for rows by column and
//! value; this crate turns those requests into parameterized statements
//! over a fixed column whitelist and maps PostgreSQL errors back onto
//! `PortError`, so a unique violation on `customers_phone_key` reaches the
//! domain as a conflict on `phone`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PgRowStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/registry")).await?;
//! run_migrations(&pool).await?;
//! let store = PgRowStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod schema;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, DatabaseConfig};
pub use error::DatabaseError;
pub use schema::run_migrations;
pub use adapters::PgRowStore;
