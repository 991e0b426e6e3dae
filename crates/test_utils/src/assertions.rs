//! Custom Test Assertions
//!
//! Assertion helpers for identifiers and registry errors that print the
//! offending value instead of a bare `false`.

use domain_registry::{parse_order_suffix, parse_site_suffix, RegistryError};

/// Role prefixes a customer id may start with
const PREFIXES: &[&str] = &["CT", "MS", "RT", "DS", "XX"];

/// Asserts `<Prefix>/<Last4>/<CityCode>/<Name>` structure
///
/// # Panics
///
/// Panics with the id when any segment is malformed
pub fn assert_customer_id_shape(id: &str) {
    let segments: Vec<&str> = id.split('/').collect();
    assert_eq!(segments.len(), 4, "customer id {:?} should have 4 segments", id);
    assert!(PREFIXES.contains(&segments[0]), "unknown prefix in {:?}", id);

    let last4 = segments[1];
    assert!(
        last4 == "XXXX" || (last4.len() == 4 && last4.bytes().all(|b| b.is_ascii_digit())),
        "phone segment of {:?} should be 4 digits or XXXX",
        id
    );
    assert!(
        segments[2].len() == 3 && segments[2].bytes().all(|b| b.is_ascii_uppercase()),
        "city segment of {:?} should be 3 uppercase letters",
        id
    );
    assert!(!segments[3].is_empty(), "name segment of {:?} is empty", id);
}

/// Asserts `<MMYY>/<CityCode>/<UserCode>-<n>` and returns `n`
pub fn assert_site_id_shape(id: &str) -> u32 {
    let segments: Vec<&str> = id.split('/').collect();
    assert_eq!(segments.len(), 3, "site id {:?} should have 3 segments", id);
    assert!(
        segments[0].len() == 4 && segments[0].bytes().all(|b| b.is_ascii_digit()),
        "date segment of {:?} should be MMYY",
        id
    );
    parse_site_suffix(id).unwrap_or_else(|| panic!("site id {:?} has no sequence suffix", id))
}

/// Asserts the order id extends `site_id` and returns its sequence number
pub fn assert_order_of_site(order_id: &str, site_id: &str) -> u32 {
    assert!(
        order_id.starts_with(&format!("{}-ORD", site_id)),
        "order {:?} does not belong to site {:?}",
        order_id,
        site_id
    );
    parse_order_suffix(order_id)
        .unwrap_or_else(|| panic!("order id {:?} has no sequence suffix", order_id))
}

/// Asserts an error is attributed to `field` with a message naming it
pub fn assert_error_on_field<T: std::fmt::Debug>(result: &Result<T, RegistryError>, field: &str) {
    match result {
        Ok(value) => panic!("expected an error on {:?}, got Ok({:?})", field, value),
        Err(err) => assert_eq!(err.field(), Some(field), "error {:?} is not on {:?}", err, field),
    }
}
