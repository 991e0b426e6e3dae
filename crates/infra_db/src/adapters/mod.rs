//! Domain Adapters
//!
//! Adapter implementations of domain ports backed by PostgreSQL.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PgRowStore;
//! use domain_registry::RowStore;
//!
//! let adapter = PgRowStore::new(pool);
//! let rows = adapter.query_exists(Table::Sites, "site_id", "0324/DEL/AB-1", None).await?;
//! ```

pub mod row_store;

pub use row_store::PgRowStore;
