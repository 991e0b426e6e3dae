//! Explicit session context
//!
//! Every operation that needs to know who is acting receives a [`Session`]
//! as a parameter. Nothing in the registry reads the current user from
//! ambient state.

use serde::{Deserialize, Serialize};

use crate::identifiers::UserId;

/// The authenticated console user on whose behalf an operation runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable user identifier, stored as `created_by`
    pub user_id: UserId,
    /// Short code embedded in site identifiers (e.g. "AB")
    pub user_code: String,
    /// Human-readable name, used to derive initials when no code is set
    pub display_name: String,
}

impl Session {
    /// Creates a session for the given user
    pub fn new(
        user_id: UserId,
        user_code: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            user_code: user_code.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the short code used inside site identifiers
    ///
    /// The explicit user code wins (uppercased, ASCII alphanumerics only).
    /// Without one, up to three initials of the display name are used.
    /// Returns `None` when neither yields anything usable.
    pub fn short_code(&self) -> Option<String> {
        let code: String = self
            .user_code
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if !code.is_empty() {
            return Some(code);
        }

        let initials: String = self
            .display_name
            .split_whitespace()
            .filter_map(|word| word.chars().find(|c| c.is_ascii_alphabetic()))
            .map(|c| c.to_ascii_uppercase())
            .take(3)
            .collect();

        if initials.is_empty() {
            None
        } else {
            Some(initials)
        }
    }
}
