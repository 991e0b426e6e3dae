//! Registry Domain
//!
//! This crate owns the identifier rules of the operations console: how
//! contractors, mistries, retailers and distributors get their customer IDs,
//! how sites and orders are numbered, and how phone-number uniqueness is
//! reconciled against the store.
//!
//! # Identifier formats
//!
//! | Kind | Format | Example |
//! |---|---|---|
//! | Customer | `<RolePrefix>/<Last4Phone>/<CityCode>/<Name>` | `CT/3210/RPR/Raju` |
//! | Site | `<MMYY>/<CityCode>/<UserCode>-<Seq>` | `0324/DEL/AB-1` |
//! | Order | `<SiteId>-ORD<Seq>` | `0324/DEL/AB-1-ORD2` |
//!
//! These strings are stored verbatim and parsed back by the sequence
//! counter, so their delimiters and segment order are fixed.
//!
//! # Layers
//!
//! - **Pure**: [`id_generator`], [`city`], [`customer_type`], [`validation`],
//!   [`preview`]. No I/O, never fail.
//! - **Store-backed**: [`uniqueness`], [`sequence`], [`registration`], talking
//!   to a [`RowStore`] port implemented by the hosted REST adapter, the
//!   PostgreSQL adapter in `infra_db`, or the in-memory mock.
//!
//! # Examples
//!
//! ```rust
//! use domain_registry::{generate_customer_id, CustomerAttributes, CustomerType};
//!
//! let attrs = CustomerAttributes {
//!     phone: "9876543210".to_string(),
//!     city_code: "RPR".to_string(),
//!     contractor_name: "Ramesh Kumar".to_string(),
//!     customer_type: CustomerType::Contractor,
//!     nickname: Some("Raju".to_string()),
//!     mistry_name: None,
//! };
//!
//! assert_eq!(generate_customer_id(&attrs), "CT/3210/RPR/Raju");
//! ```

pub mod error;
pub mod customer_type;
pub mod city;
pub mod id_generator;
pub mod ports;
pub mod sequence;
pub mod uniqueness;
pub mod validation;
pub mod preview;
pub mod registration;
pub mod adapters;

pub use error::RegistryError;
pub use customer_type::CustomerType;
pub use city::{CityCode, city_code};
pub use id_generator::{
    CustomerAttributes,
    generate_customer_id, generate_site_id, generate_order_id, is_placeholder_site_id,
};
pub use ports::{RowStore, Table, StoreRow, ScopeFilter, Exclusion};
pub use sequence::{SequenceCounter, SequenceScope, SequenceCounts, parse_site_suffix, parse_order_suffix};
pub use uniqueness::{UniquenessReconciler, UniquenessCheck, BatchCheck};
pub use validation::{ValidationResult, ValidationIssue, RegistryValidator};
pub use preview::{
    FormSession, PhoneCheckTracker, PhoneCheckState, CheckTicket, CheckOutcome,
    recompute_customer_id, recompute_site_id,
};
pub use registration::{
    RegistrationService, IdConflictPolicy,
    CustomerDraft, MistryDraft, OrderDraft,
    RegisteredCustomer, CreatedOrder, SitePreview, BatchReport, BatchOutcome,
};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::{MockRowStore, MockFailure};
pub use adapters::{HostedRowStore, HostedStoreConfig};
