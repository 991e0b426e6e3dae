//! Registry validation rules
//!
//! Local checks that run before any store call. Preview generation never
//! consults these; they gate submission only.
//!
//! # Validation Rules
//!
//! ## Customers
//! - Phone must be exactly 10 digits
//! - Name and city are required
//! - Customer type must be one the console knows
//! - Mistries need a mistry name
//! - A nickname on anything but a contractor is ignored (warning)
//!
//! ## Orders
//! - City, contractor and delivery address are required

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::customer_type::CustomerType;
use crate::registration::{CustomerDraft, MistryDraft, OrderDraft};

/// Length of a valid phone number
pub const PHONE_LENGTH: usize = 10;

/// A problem tied to one form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of validating a draft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Blocking problems
    pub issues: Vec<ValidationIssue>,
    /// Non-fatal remarks
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(field, message));
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(field, message));
    }

    /// Merges another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
        self.warnings.extend(other.warnings);
    }

    /// Issues for a single field
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.field == field)
    }

    /// All blocking issues on one line
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Converts to `Err` when there are blocking issues
    pub fn into_result(self) -> Result<Vec<ValidationIssue>, ValidationResult> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(self)
        }
    }

    fn absorb(&mut self, errors: ValidationErrors) {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for (field, field_errors) in fields {
            for error in field_errors {
                let message = error
                    .message
                    .clone()
                    .unwrap_or_else(|| Cow::Owned(format!("is invalid ({})", error.code)));
                self.add_error(field.to_string(), message);
            }
        }
    }
}

/// Phone rule used by the draft derives: exactly ten ASCII digits
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.len() == PHONE_LENGTH && phone.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut error = ValidationError::new("phone_format");
        error.message = Some(Cow::Borrowed("must be exactly 10 digits"));
        Err(error)
    }
}

/// Rejects values that are empty once trimmed
pub fn validate_required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some(Cow::Borrowed("is required"));
        Err(error)
    } else {
        Ok(())
    }
}

/// Validator for registry drafts
///
/// # Examples
///
/// ```rust
/// use domain_registry::RegistryValidator;
///
/// let result = RegistryValidator::validate_phone_number("98765");
/// assert!(!result.is_valid());
/// assert_eq!(result.issues[0].field, "phone");
/// ```
pub struct RegistryValidator;

impl RegistryValidator {
    /// Validates a standalone phone number, as in a phone edit
    pub fn validate_phone_number(phone: &str) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if let Err(error) = validate_phone(phone) {
            let mut errors = ValidationErrors::new();
            errors.add("phone", error);
            result.absorb(errors);
        }
        result
    }

    /// Validates a customer or contractor draft
    pub fn validate_customer(draft: &CustomerDraft) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if let Err(errors) = draft.validate() {
            result.absorb(errors);
        }

        let customer_type = CustomerType::parse(&draft.customer_type);
        if !customer_type.is_recognized() {
            result.add_error(
                "customer_type",
                format!("'{}' is not a known customer type", draft.customer_type),
            );
        }

        let has_nickname = draft
            .nickname
            .as_deref()
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false);
        if has_nickname && customer_type != CustomerType::Contractor {
            result.add_warning("nickname", "only used for contractors");
        }

        if customer_type == CustomerType::Mistry {
            let has_mistry_name = draft
                .mistry_name
                .as_deref()
                .map(|n| !n.trim().is_empty())
                .unwrap_or(false);
            if !has_mistry_name {
                result.add_error("mistry_name", "is required for a mistry");
            }
        }

        result
    }

    /// Validates one entry of a mistry batch
    pub fn validate_mistry(draft: &MistryDraft) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if let Err(errors) = draft.validate() {
            result.absorb(errors);
        }
        result
    }

    /// Validates a site/order draft
    pub fn validate_order(draft: &OrderDraft) -> ValidationResult {
        let mut result = ValidationResult::ok();
        if let Err(errors) = draft.validate() {
            result.absorb(errors);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contractor_draft() -> CustomerDraft {
        CustomerDraft {
            phone: "9876543210".to_string(),
            name: "Ramesh Kumar".to_string(),
            city: "Raipur".to_string(),
            customer_type: "Contractor".to_string(),
            nickname: Some("Raju".to_string()),
            mistry_name: None,
        }
    }

    #[test]
    fn test_valid_contractor() {
        let result = RegistryValidator::validate_customer(&contractor_draft());
        assert!(result.is_valid(), "Errors: {:?}", result.issues);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_phone_must_be_ten_digits() {
        for phone in ["987654321", "98765432100", "98765 43210", "+919876543"] {
            let draft = CustomerDraft {
                phone: phone.to_string(),
                ..contractor_draft()
            };
            let result = RegistryValidator::validate_customer(&draft);
            assert_eq!(result.for_field("phone").count(), 1, "phone {:?}", phone);
        }
    }

    #[test]
    fn test_missing_name_and_city() {
        let draft = CustomerDraft {
            name: "  ".to_string(),
            city: String::new(),
            ..contractor_draft()
        };
        let result = RegistryValidator::validate_customer(&draft);
        assert!(result.for_field("name").next().is_some());
        assert!(result.for_field("city").next().is_some());
    }

    #[test]
    fn test_unknown_type_rejected_at_submission() {
        let draft = CustomerDraft {
            customer_type: "Architect".to_string(),
            ..contractor_draft()
        };
        let result = RegistryValidator::validate_customer(&draft);
        assert!(!result.is_valid());
        assert!(result.summary().contains("Architect"));
    }

    #[test]
    fn test_mistry_needs_mistry_name() {
        let draft = CustomerDraft {
            customer_type: "Mistry".to_string(),
            nickname: None,
            ..contractor_draft()
        };
        let result = RegistryValidator::validate_customer(&draft);
        assert!(result.for_field("mistry_name").next().is_some());
    }

    #[test]
    fn test_nickname_on_retailer_is_warning() {
        let draft = CustomerDraft {
            customer_type: "Retailer".to_string(),
            ..contractor_draft()
        };
        let result = RegistryValidator::validate_customer(&draft);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_order_requires_fields() {
        let draft = OrderDraft {
            city: "Delhi".to_string(),
            contractor_id: String::new(),
            delivery_address: " ".to_string(),
        };
        let result = RegistryValidator::validate_order(&draft);
        assert!(result.for_field("contractor_id").next().is_some());
        assert!(result.for_field("delivery_address").next().is_some());
        assert!(result.for_field("city").next().is_none());
    }
}
