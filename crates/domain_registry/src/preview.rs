//! Live identifier preview and phone-check bookkeeping
//!
//! A form recomputes its preview id synchronously on every change and fires
//! phone checks whenever it decides the user has paused typing. Checks can
//! finish out of order; each one carries a [`CheckTicket`] and only the
//! result for the latest ticket is applied.
//!
//! Nothing here sleeps or spawns. Debouncing belongs to the caller.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::Session;

use crate::city::city_code;
use crate::customer_type::CustomerType;
use crate::id_generator::{generate_customer_id, generate_site_id, CustomerAttributes};
use crate::uniqueness::UniquenessCheck;

/// Preview id for the attributes as currently typed
pub fn recompute_customer_id(attrs: &CustomerAttributes) -> String {
    generate_customer_id(attrs)
}

/// Preview site id; the city is a name and is turned into its code here
pub fn recompute_site_id(
    user: Option<&Session>,
    city: Option<&str>,
    site_count: u32,
    date: NaiveDate,
) -> String {
    generate_site_id(user, city_code(city).as_str(), site_count, date)
}

/// Identifies one phone check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTicket {
    pub generation: u64,
    pub phone: String,
}

/// What happened to a completed check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Applied,
    /// A newer check was started; the result was dropped
    Stale,
}

/// Status of the phone field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PhoneCheckState {
    #[default]
    Idle,
    Pending { phone: String },
    Unique { phone: String },
    Duplicate { phone: String },
    Inconclusive { phone: String, reason: String },
}

/// Orders phone checks and discards superseded results
#[derive(Debug, Default)]
pub struct PhoneCheckTracker {
    generation: u64,
    state: PhoneCheckState,
}

impl PhoneCheckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a check; any earlier ticket becomes stale
    pub fn begin(&mut self, phone: impl Into<String>) -> CheckTicket {
        self.generation += 1;
        let phone = phone.into();
        self.state = PhoneCheckState::Pending {
            phone: phone.clone(),
        };
        CheckTicket {
            generation: self.generation,
            phone,
        }
    }

    /// Records the result of a check if it is still the latest one
    pub fn complete(&mut self, ticket: &CheckTicket, check: UniquenessCheck) -> CheckOutcome {
        if ticket.generation != self.generation {
            return CheckOutcome::Stale;
        }

        let phone = ticket.phone.clone();
        self.state = match check.error {
            Some(error) => PhoneCheckState::Inconclusive {
                phone,
                reason: error.to_string(),
            },
            None if check.exists => PhoneCheckState::Duplicate { phone },
            None => PhoneCheckState::Unique { phone },
        };
        CheckOutcome::Applied
    }

    /// Forgets the current result, e.g. when the phone field is cleared
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = PhoneCheckState::Idle;
    }

    pub fn state(&self) -> &PhoneCheckState {
        &self.state
    }

    pub fn is_checking(&self) -> bool {
        matches!(self.state, PhoneCheckState::Pending { .. })
    }

    /// Submission is allowed only once the latest check came back unique
    pub fn can_submit(&self) -> bool {
        matches!(self.state, PhoneCheckState::Unique { .. })
    }
}

/// State of one customer form between keystrokes
#[derive(Debug, Default)]
pub struct FormSession {
    attributes: CustomerAttributes,
    tracker: PhoneCheckTracker,
}

impl FormSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the attributes and returns the new preview id
    ///
    /// A changed phone number invalidates any result for the old one. The
    /// returned ticket, if any, is for the caller to check once it stops
    /// debouncing.
    pub fn update(&mut self, attributes: CustomerAttributes) -> (String, Option<CheckTicket>) {
        let phone_changed = attributes.phone != self.attributes.phone;
        self.attributes = attributes;

        let ticket = if phone_changed {
            if self.attributes.phone.trim().is_empty() {
                self.tracker.reset();
                None
            } else {
                Some(self.tracker.begin(self.attributes.phone.clone()))
            }
        } else {
            None
        };

        (self.preview_id(), ticket)
    }

    /// Sets the city by name, deriving its code
    pub fn set_city(&mut self, city: Option<&str>) -> String {
        self.attributes.city_code = city_code(city).to_string();
        self.preview_id()
    }

    pub fn set_customer_type(&mut self, raw: &str) -> String {
        self.attributes.customer_type = CustomerType::parse(raw);
        self.preview_id()
    }

    pub fn preview_id(&self) -> String {
        recompute_customer_id(&self.attributes)
    }

    pub fn attributes(&self) -> &CustomerAttributes {
        &self.attributes
    }

    pub fn complete_check(&mut self, ticket: &CheckTicket, check: UniquenessCheck) -> CheckOutcome {
        self.tracker.complete(ticket, check)
    }

    pub fn phone_state(&self) -> &PhoneCheckState {
        self.tracker.state()
    }

    pub fn can_submit(&self) -> bool {
        self.tracker.can_submit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;

    #[test]
    fn test_stale_result_ignored() {
        let mut tracker = PhoneCheckTracker::new();
        let first = tracker.begin("9876543210");
        let second = tracker.begin("9876543211");

        assert_eq!(tracker.complete(&first, UniquenessCheck::duplicate()), CheckOutcome::Stale);
        assert!(tracker.is_checking());

        assert_eq!(tracker.complete(&second, UniquenessCheck::unique()), CheckOutcome::Applied);
        assert!(tracker.can_submit());
    }

    #[test]
    fn test_inconclusive_blocks_submit() {
        let mut tracker = PhoneCheckTracker::new();
        let ticket = tracker.begin("9876543210");
        tracker.complete(&ticket, UniquenessCheck::inconclusive(PortError::timeout("query", 5000)));

        assert!(matches!(tracker.state(), PhoneCheckState::Inconclusive { .. }));
        assert!(!tracker.can_submit());
    }

    #[test]
    fn test_form_session_preview_and_ticket() {
        let mut form = FormSession::new();
        form.set_customer_type("Contractor");
        form.set_city(Some("raipur"));

        let (preview, ticket) = form.update(CustomerAttributes {
            phone: "9876543210".to_string(),
            city_code: form.attributes().city_code.clone(),
            contractor_name: "Ramesh".to_string(),
            customer_type: CustomerType::Contractor,
            nickname: Some("Raju".to_string()),
            mistry_name: None,
        });
        assert_eq!(preview, "CT/3210/RPR/Raju");
        let ticket = ticket.unwrap();

        let (_, none) = form.update(CustomerAttributes {
            contractor_name: "Ramesh Kumar".to_string(),
            ..form.attributes().clone()
        });
        assert!(none.is_none());

        form.complete_check(&ticket, UniquenessCheck::unique());
        assert!(form.can_submit());
    }

    #[test]
    fn test_clearing_phone_resets_check() {
        let mut form = FormSession::new();
        let (_, ticket) = form.update(CustomerAttributes {
            phone: "9876543210".to_string(),
            ..Default::default()
        });
        let ticket = ticket.unwrap();
        form.update(CustomerAttributes::default());

        assert_eq!(form.complete_check(&ticket, UniquenessCheck::unique()), CheckOutcome::Stale);
        assert_eq!(form.phone_state(), &PhoneCheckState::Idle);
    }

    #[test]
    fn test_recompute_site_id_uses_city_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(recompute_site_id(None, Some("Raipur"), 2, date), "0324/RPR/PENDING-2");
    }
}
