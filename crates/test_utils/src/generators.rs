//! Property-Based Test Generators
//!
//! Proptest strategies for registry inputs, both well-formed and the messy
//! values a form can send mid-typing.

use chrono::NaiveDate;
use proptest::prelude::*;

use core_kernel::{Session, UserId};
use domain_registry::{CustomerAttributes, CustomerType};

/// Ten ASCII digits
pub fn phone_strategy() -> impl Strategy<Value = String> {
    "[6-9][0-9]{9}"
}

/// Anything a half-filled phone input may contain
pub fn partial_phone_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{0,9}",
        "[0-9]{11,14}",
        "[0-9 +-]{0,14}",
        ".{0,12}",
    ]
}

/// City names, including short and non-ASCII ones
pub fn city_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(vec!["Raipur", "Delhi", "Bengaluru", "Mumbai", "Go", " ", ""])
            .prop_map(str::to_string),
        "[A-Za-z ]{0,12}",
        ".{0,8}",
    ]
}

/// Customer types as typed, recognized or not
pub fn customer_type_strategy() -> impl Strategy<Value = CustomerType> {
    prop::sample::select(vec![
        "Contractor",
        "Influencer",
        "Mistry",
        "Retailer",
        "Distributor",
        "Other",
        "",
    ])
    .prop_map(CustomerType::parse)
}

/// Person names, possibly blank or full of punctuation
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z][a-z]{2,10}( [A-Z][a-z]{2,10})?",
        ".{0,20}",
    ]
}

/// Arbitrary customer attributes
pub fn customer_attributes_strategy() -> impl Strategy<Value = CustomerAttributes> {
    (
        prop_oneof![phone_strategy(), partial_phone_strategy()],
        "([A-Z]{3})?",
        name_strategy(),
        customer_type_strategy(),
        prop::option::of(name_strategy()),
        prop::option::of(name_strategy()),
    )
        .prop_map(|(phone, city_code, contractor_name, customer_type, nickname, mistry_name)| {
            CustomerAttributes {
                phone,
                city_code,
                contractor_name,
                customer_type,
                nickname,
                mistry_name,
            }
        })
}

/// Sessions with and without a user code
pub fn session_strategy() -> impl Strategy<Value = Session> {
    ("[A-Za-z]{0,3}", name_strategy())
        .prop_map(|(code, name)| Session::new(UserId::new(), code, name))
}

/// Calendar dates between 2000 and 2099
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default())
}

/// Site ids as stored, plus malformed ones
pub fn stored_site_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => (1u32..500).prop_map(|n| format!("0324/DEL/AB-{}", n)),
        1 => ".{0,16}",
    ]
}
