//! Pre-built Test Fixtures
//!
//! Ready-to-use sessions, clocks, drafts and stored rows. Values are fixed so
//! the identifiers they produce can be asserted literally.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use core_kernel::{FixedClock, Session, UserId};
use domain_registry::{CustomerDraft, MistryDraft, OrderDraft, StoreRow};

/// Converts a JSON object literal into a store row
///
/// # Panics
///
/// Panics if `value` is not an object
pub fn row(value: Value) -> StoreRow {
    value
        .as_object()
        .cloned()
        .expect("fixture rows must be JSON objects")
}

/// Fixture for console users
pub struct SessionFixtures;

impl SessionFixtures {
    /// Deterministic user id for "Anil Bansal"
    pub fn user_id() -> UserId {
        UserId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    /// A user with the explicit code "AB"
    pub fn anil() -> Session {
        Session::new(Self::user_id(), "AB", "Anil Bansal")
    }

    /// A second user, so scope tests can tell callers apart
    pub fn priya() -> Session {
        Session::new(
            UserId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap()),
            "PS",
            "Priya Sharma",
        )
    }

    /// A user with neither a code nor a usable name
    pub fn anonymous() -> Session {
        Session::new(UserId::new(), "", "")
    }
}

/// Fixture for calendar-dependent tests
pub struct ClockFixtures;

impl ClockFixtures {
    /// 15 March 2024, 10:00 in Kolkata; site ids get the `0324` prefix
    pub fn march_2024() -> Arc<FixedClock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 15, 4, 30, 0).unwrap()))
    }

    /// 31 March 2024, 20:00 UTC, already 1 April in Kolkata
    pub fn month_boundary() -> Arc<FixedClock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 31, 20, 0, 0).unwrap()))
    }

    pub fn march_15() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }
}

/// Fixture for form drafts
pub struct DraftFixtures;

impl DraftFixtures {
    /// Contractor whose id is `CT/3210/RPR/Raju`
    pub fn contractor() -> CustomerDraft {
        CustomerDraft {
            phone: "9876543210".to_string(),
            name: "Ramesh Kumar".to_string(),
            city: "Raipur".to_string(),
            customer_type: "Contractor".to_string(),
            nickname: Some("Raju".to_string()),
            mistry_name: None,
        }
    }

    pub fn retailer() -> CustomerDraft {
        CustomerDraft {
            phone: "9123400007".to_string(),
            name: "Gupta Hardware".to_string(),
            city: "Bengaluru".to_string(),
            customer_type: "Retailer".to_string(),
            nickname: None,
            mistry_name: None,
        }
    }

    pub fn mistry(phone: &str, name: &str) -> MistryDraft {
        MistryDraft {
            phone: phone.to_string(),
            mistry_name: name.to_string(),
        }
    }

    pub fn order(contractor_id: &str, address: &str) -> OrderDraft {
        OrderDraft {
            city: "Delhi".to_string(),
            contractor_id: contractor_id.to_string(),
            delivery_address: address.to_string(),
        }
    }
}

/// Fixture for rows already in the store
pub struct RowFixtures;

impl RowFixtures {
    /// The stored counterpart of [`DraftFixtures::contractor`]
    pub fn contractor(id: &str) -> StoreRow {
        row(json!({
            "id": id,
            "customer_id": "CT/3210/RPR/Raju",
            "phone": "9876543210",
            "name": "Ramesh Kumar",
            "customer_type": "Contractor",
            "city": "Raipur",
            "city_code": "RPR",
            "nickname": "Raju",
        }))
    }

    pub fn site(id: &str, site_id: &str, created_by: &Session, contractor_id: &str, address: &str) -> StoreRow {
        row(json!({
            "id": id,
            "site_id": site_id,
            "city": "Delhi",
            "city_code": "DEL",
            "contractor_id": contractor_id,
            "delivery_address": address,
            "created_by": created_by.user_id.to_string(),
        }))
    }

    pub fn order(id: &str, order_id: &str, site_id: &str, created_by: &Session) -> StoreRow {
        row(json!({
            "id": id,
            "order_id": order_id,
            "site_id": site_id,
            "created_by": created_by.user_id.to_string(),
        }))
    }
}
