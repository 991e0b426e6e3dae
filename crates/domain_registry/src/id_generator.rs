//! Composite identifier generation
//!
//! Every function here is a total, deterministic function of its inputs: the
//! console calls them on each keystroke to show a live preview, so missing
//! or half-typed data yields placeholder segments instead of errors.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::Session;

use crate::city::CityCode;
use crate::customer_type::CustomerType;

/// Filler for a phone or name segment that cannot be derived yet
pub const PLACEHOLDER_SEGMENT: &str = "XXXX";

/// User code emitted when no acting user is known
///
/// Real user codes are short initials, so a site id carrying this value is
/// recognisably "not ready" (see [`is_placeholder_site_id`]).
pub const PLACEHOLDER_USER_CODE: &str = "PENDING";

/// Separator between identifier segments
pub const SEGMENT_SEPARATOR: &str = "/";

/// Marker between a site id and the order sequence number
pub const ORDER_MARKER: &str = "-ORD";

/// Attributes a customer identifier is derived from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAttributes {
    /// Phone number as typed, ideally 10 digits
    pub phone: String,
    /// Three-letter city code, or empty while the city is unset
    pub city_code: String,
    /// Contractor (or customer) name
    pub contractor_name: String,
    pub customer_type: CustomerType,
    /// Preferred name for contractors
    pub nickname: Option<String>,
    /// Name of the mistry, for Mistry records
    pub mistry_name: Option<String>,
}

/// Builds a customer identifier: `<RolePrefix>/<Last4Phone>/<CityCode>/<Name>`
///
/// # Examples
///
/// ```rust
/// use domain_registry::{generate_customer_id, CustomerAttributes, CustomerType};
///
/// let attrs = CustomerAttributes {
///     phone: "98".to_string(),
///     customer_type: CustomerType::Retailer,
///     ..Default::default()
/// };
/// assert_eq!(generate_customer_id(&attrs), "RT/XXXX/XXX/XXXX");
/// ```
pub fn generate_customer_id(attrs: &CustomerAttributes) -> String {
    let segments = [
        attrs.customer_type.prefix().to_string(),
        last_four_digits(&attrs.phone),
        CityCode::normalize(&attrs.city_code).to_string(),
        name_segment(attrs),
    ];
    segments.join(SEGMENT_SEPARATOR)
}

/// Returns the last four digits of a phone number, ignoring non-digits
///
/// Fewer than four digits yields [`PLACEHOLDER_SEGMENT`].
pub fn last_four_digits(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return PLACEHOLDER_SEGMENT.to_string();
    }
    digits[digits.len() - 4..].iter().collect()
}

/// Picks and sanitizes the name shown in a customer identifier
///
/// Contractors use their nickname and mistries their own name when one is
/// given; everyone else, or anyone without that name, uses the contractor
/// name.
pub fn name_segment(attrs: &CustomerAttributes) -> String {
    let preferred = match attrs.customer_type {
        CustomerType::Contractor => non_blank(attrs.nickname.as_deref()),
        CustomerType::Mistry => non_blank(attrs.mistry_name.as_deref()),
        _ => None,
    };

    let sanitized = sanitize_name_segment(preferred.unwrap_or(&attrs.contractor_name));
    if sanitized.is_empty() {
        PLACEHOLDER_SEGMENT.to_string()
    } else {
        sanitized
    }
}

/// Strips characters that cannot appear in an identifier segment
///
/// Whitespace runs collapse to one space and the ends are trimmed. Letters
/// and digits of any script are kept with their case, as are `.`, `-` and
/// `'`; everything else (including the `/` separator) is removed.
pub fn sanitize_name_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '.' | '-' | '\''))
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Builds a site identifier: `<MMYY>/<CityCode>/<UserCode>-<Seq>`
///
/// `site_count` is the next sequence number from the sequence counter; zero
/// is treated as one. Without a user (or a user without any usable code) the
/// user segment is [`PLACEHOLDER_USER_CODE`].
///
/// # Examples
///
/// ```rust
/// use chrono::NaiveDate;
/// use core_kernel::{Session, UserId};
/// use domain_registry::generate_site_id;
///
/// let user = Session::new(UserId::new(), "AB", "Anil Bansal");
/// let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// assert_eq!(generate_site_id(Some(&user), "DEL", 1, date), "0324/DEL/AB-1");
/// ```
pub fn generate_site_id(
    user: Option<&Session>,
    city_code: &str,
    site_count: u32,
    date: NaiveDate,
) -> String {
    let user_code = user
        .and_then(Session::short_code)
        .unwrap_or_else(|| PLACEHOLDER_USER_CODE.to_string());

    format!(
        "{}{sep}{}{sep}{}-{}",
        date.format("%m%y"),
        CityCode::normalize(city_code),
        user_code,
        site_count.max(1),
        sep = SEGMENT_SEPARATOR,
    )
}

/// Returns true if the site id was generated without a known user
pub fn is_placeholder_site_id(site_id: &str) -> bool {
    site_id
        .rsplit(SEGMENT_SEPARATOR)
        .next()
        .map(|tail| tail.starts_with(&format!("{}-", PLACEHOLDER_USER_CODE)))
        .unwrap_or(false)
}

/// Builds an order identifier: `<SiteId>-ORD<Seq>`
pub fn generate_order_id(site_id: &str, order_count: u32) -> String {
    format!("{}{}{}", site_id, ORDER_MARKER, order_count.max(1))
}
