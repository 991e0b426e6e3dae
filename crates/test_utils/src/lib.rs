//! Test Utilities Crate
//!
//! Shared test infrastructure for the ops registry test suite.
//!
//! # Modules
//!
//! - `fixtures`: Fixed sessions, clocks, drafts and stored rows
//! - `builders`: Builders for drafts and wired-up services
//! - `database`: PostgreSQL container management for adapter tests
//! - `assertions`: Identifier and error assertions
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
