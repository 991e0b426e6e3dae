//! Counterparty roles
//!
//! The console's forms send role names as free text. Parsing never fails:
//! anything outside the known roles is kept as [`CustomerType::Other`] so the
//! identifier preview can still render, and validation rejects it at
//! submission time.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Role of a customer record, which selects its identifier prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CustomerType {
    /// A contractor, also called an influencer in the sales UI
    Contractor,
    /// A mistry working under a parent contractor
    Mistry,
    Retailer,
    Distributor,
    /// Any role string the registry does not recognize
    Other(String),
}

impl CustomerType {
    /// Prefix used for roles without a dedicated one
    pub const UNKNOWN_PREFIX: &'static str = "XX";

    /// Parses a role name, ignoring case and surrounding whitespace
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contractor" | "influencer" => CustomerType::Contractor,
            "mistry" => CustomerType::Mistry,
            "retailer" => CustomerType::Retailer,
            "distributor" => CustomerType::Distributor,
            _ => CustomerType::Other(raw.trim().to_string()),
        }
    }

    /// Two-letter identifier prefix for this role
    pub fn prefix(&self) -> &'static str {
        match self {
            CustomerType::Contractor => "CT",
            CustomerType::Mistry => "MS",
            CustomerType::Retailer => "RT",
            CustomerType::Distributor => "DS",
            CustomerType::Other(_) => Self::UNKNOWN_PREFIX,
        }
    }

    /// Canonical role name as stored in `customers.customer_type`
    pub fn as_str(&self) -> &str {
        match self {
            CustomerType::Contractor => "Contractor",
            CustomerType::Mistry => "Mistry",
            CustomerType::Retailer => "Retailer",
            CustomerType::Distributor => "Distributor",
            CustomerType::Other(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, CustomerType::Other(_))
    }
}

impl Default for CustomerType {
    fn default() -> Self {
        CustomerType::Other(String::new())
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for CustomerType {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<CustomerType> for String {
    fn from(customer_type: CustomerType) -> Self {
        customer_type.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(CustomerType::parse("MISTRY"), CustomerType::Mistry);
        assert_eq!(CustomerType::parse("  retailer "), CustomerType::Retailer);
    }

    #[test]
    fn test_influencer_is_contractor() {
        assert_eq!(CustomerType::parse("Influencer"), CustomerType::Contractor);
        assert_eq!(CustomerType::parse("Influencer").prefix(), "CT");
    }

    #[test]
    fn test_unknown_role_keeps_text() {
        let role = CustomerType::parse("Architect");
        assert_eq!(role, CustomerType::Other("Architect".to_string()));
        assert_eq!(role.prefix(), "XX");
        assert!(!role.is_recognized());
    }

    #[test]
    fn test_serde_uses_role_names() {
        let json = serde_json::to_string(&CustomerType::Distributor).unwrap();
        assert_eq!(json, "\"Distributor\"");

        let parsed: CustomerType = serde_json::from_str("\"contractor\"").unwrap();
        assert_eq!(parsed, CustomerType::Contractor);
    }
}
