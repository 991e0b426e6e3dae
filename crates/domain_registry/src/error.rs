//! Registry domain errors
//!
//! Every failure a registration can end in. Store failures arrive as
//! [`PortError`] and are sorted into the variants below so callers can tell
//! a real duplicate apart from a store that was merely slow.

use thiserror::Error;

use core_kernel::PortError;

use crate::validation::ValidationResult;

/// Errors that can occur in the registry domain
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Local validation failed before any store call
    #[error("Validation failed: {}", .0.summary())]
    Validation(ValidationResult),

    /// Another customer already uses this phone number
    #[error("Phone number {phone} is already registered")]
    DuplicatePhone { phone: String },

    /// A generated identifier collided with an existing row
    #[error("Identifier {id} already exists ({field})")]
    DuplicateIdentifier { field: String, id: String },

    /// The phone number appears earlier in the same batch
    #[error("Phone number {phone} is repeated in this batch (first used by entry {first_index})")]
    InBatchDuplicate { phone: String, first_index: usize },

    /// The authoritative pre-insert check could not reach a verdict
    #[error("Could not confirm the phone number is unique: {0}")]
    UniquenessUnconfirmed(#[source] PortError),

    /// A unique constraint was violated but the column is unknown
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store timed out or could not be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] PortError),

    /// Any other store failure
    #[error("Store error: {0}")]
    Store(#[source] PortError),

    /// The next sequence number does not fit the counter
    #[error("Sequence exhausted for {0}")]
    SequenceExhausted(String),

    /// Generated identifiers kept colliding with concurrent writers
    #[error("Identifier still taken after {attempts} attempts")]
    IdentifierContention { attempts: u32 },

    /// The parent record a child refers to does not exist
    #[error("Parent record not found: {id}")]
    ParentNotFound { id: String },
}

impl RegistryError {
    /// Sorts a store failure by whether it is worth retrying
    pub fn from_store(error: PortError) -> Self {
        if error.is_transient() {
            RegistryError::StoreUnavailable(error)
        } else {
            RegistryError::Store(error)
        }
    }

    /// Message suitable for showing next to the form
    pub fn user_message(&self) -> String {
        match self {
            RegistryError::Validation(result) => result.summary(),
            RegistryError::DuplicatePhone { phone } => {
                format!("Phone: {} is already registered to another customer", phone)
            }
            // Customer ids have no sequence part; only different input changes them
            RegistryError::DuplicateIdentifier { field, id } if field == "customer_id" => format!(
                "ID: {} is already used by another customer, change the nickname or name",
                id
            ),
            RegistryError::DuplicateIdentifier { id, .. } => {
                format!("ID: {} is already taken, please submit again", id)
            }
            RegistryError::InBatchDuplicate { phone, first_index } => format!(
                "Phone: {} is entered more than once (see entry {})",
                phone,
                first_index + 1
            ),
            RegistryError::UniquenessUnconfirmed(_) => {
                "Phone: still verifying the number, please try again".to_string()
            }
            RegistryError::Conflict(_) => {
                "This record conflicts with an existing one".to_string()
            }
            RegistryError::StoreUnavailable(_) => {
                "The server is not responding, please try again".to_string()
            }
            RegistryError::Store(_) => "Could not save the record".to_string(),
            RegistryError::SequenceExhausted(_) => {
                "No more sequence numbers are available for this city".to_string()
            }
            RegistryError::IdentifierContention { .. } => {
                "Another user is creating the same record, please try again".to_string()
            }
            RegistryError::ParentNotFound { .. } => {
                "The parent contractor no longer exists".to_string()
            }
        }
    }

    /// Form field the error belongs to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            RegistryError::Validation(result) => result.issues.first().map(|i| i.field.as_str()),
            RegistryError::DuplicatePhone { .. }
            | RegistryError::InBatchDuplicate { .. }
            | RegistryError::UniquenessUnconfirmed(_) => Some("phone"),
            RegistryError::DuplicateIdentifier { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }

    /// Returns true for every flavour of "already exists"
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            RegistryError::DuplicatePhone { .. }
                | RegistryError::DuplicateIdentifier { .. }
                | RegistryError::InBatchDuplicate { .. }
                | RegistryError::Conflict(_)
        )
    }

    /// Returns true if resubmitting unchanged data may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::StoreUnavailable(_)
                | RegistryError::UniquenessUnconfirmed(_)
                | RegistryError::IdentifierContention { .. }
        )
    }
}

impl From<ValidationResult> for RegistryError {
    fn from(result: ValidationResult) -> Self {
        RegistryError::Validation(result)
    }
}
