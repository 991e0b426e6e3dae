//! External Adapters for the Registry Domain
//!
//! Adapter implementations of [`RowStore`](crate::ports::RowStore) that talk
//! to a system of record outside this workspace. The PostgreSQL adapter
//! lives in `infra_db`; the in-memory mock in [`crate::ports::mock`].
//!
//! # Available Adapters
//!
//! - **HostedRowStore**: a hosted Postgres exposed over a PostgREST-style
//!   HTTP interface
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_registry::adapters::{HostedRowStore, HostedStoreConfig};
//! use domain_registry::RowStore;
//! use std::sync::Arc;
//!
//! let adapter = HostedRowStore::new(HostedStoreConfig {
//!     base_url: "https://project.example.co".to_string(),
//!     api_key: std::env::var("API_HOSTED_KEY")?,
//!     ..Default::default()
//! })?;
//! let store: Arc<dyn RowStore> = Arc::new(adapter);
//! ```

pub mod hosted_store;

pub use hosted_store::{HostedRowStore, HostedStoreConfig};
