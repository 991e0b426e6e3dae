//! Core Kernel - Foundational types for the ops registry
//!
//! This crate provides the building blocks shared by the registry domain,
//! its storage adapters and the HTTP layer:
//! - Port errors and adapter health types for the ports-and-adapters seams
//! - The explicit [`Session`] context that carries the acting user
//! - A [`Clock`] port so calendar-dependent identifiers stay testable
//! - Strongly-typed identifiers

pub mod identifiers;
pub mod error;
pub mod ports;
pub mod session;
pub mod clock;

pub use identifiers::UserId;
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    CircuitBreakerConfig,
};
pub use session::Session;
pub use clock::{Clock, SystemClock, FixedClock, LocalCalendar};
