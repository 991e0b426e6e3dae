//! Test Data Builders
//!
//! Builders for drafts and wired-up services. Tests set only the fields they
//! care about; the rest come from the fixtures or from `fake`.

use std::sync::Arc;

use fake::faker::name::en::{FirstName, Name};
use fake::Fake;

use core_kernel::LocalCalendar;
use domain_registry::{
    CustomerDraft, IdConflictPolicy, MistryDraft, MockRowStore, OrderDraft, RegistrationService,
};

use crate::fixtures::{ClockFixtures, DraftFixtures};

/// Builder for customer drafts
pub struct CustomerDraftBuilder {
    draft: CustomerDraft,
}

impl Default for CustomerDraftBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerDraftBuilder {
    /// Starts from the standard contractor fixture
    pub fn new() -> Self {
        Self {
            draft: DraftFixtures::contractor(),
        }
    }

    /// Starts from a contractor with a random name and the given phone
    pub fn random_contractor(phone: impl Into<String>) -> Self {
        let name: String = Name().fake();
        Self::new().with_phone(phone).with_name(name).without_nickname()
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.draft.phone = phone.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.draft.name = name.into();
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.draft.city = city.into();
        self
    }

    pub fn with_type(mut self, customer_type: impl Into<String>) -> Self {
        self.draft.customer_type = customer_type.into();
        self
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.draft.nickname = Some(nickname.into());
        self
    }

    pub fn without_nickname(mut self) -> Self {
        self.draft.nickname = None;
        self
    }

    /// Turns the draft into a Mistry record named `mistry_name`
    pub fn as_mistry(mut self, mistry_name: impl Into<String>) -> Self {
        self.draft.customer_type = "Mistry".to_string();
        self.draft.mistry_name = Some(mistry_name.into());
        self.draft.nickname = None;
        self
    }

    pub fn build(self) -> CustomerDraft {
        self.draft
    }
}

/// Builds a batch of mistry drafts with consecutive phone numbers
pub struct MistryBatchBuilder {
    first_phone: u64,
    drafts: Vec<MistryDraft>,
}

impl MistryBatchBuilder {
    /// Phones start at `first_phone` and count up
    pub fn starting_at(first_phone: u64) -> Self {
        Self {
            first_phone,
            drafts: Vec::new(),
        }
    }

    /// Adds `count` mistries with random first names
    pub fn with_random(mut self, count: usize) -> Self {
        for _ in 0..count {
            let name: String = FirstName().fake();
            let phone = (self.first_phone + self.drafts.len() as u64).to_string();
            self.drafts.push(DraftFixtures::mistry(&phone, &name));
        }
        self
    }

    /// Adds a specific entry, e.g. a repeated or malformed phone
    pub fn with_entry(mut self, phone: &str, name: &str) -> Self {
        self.drafts.push(DraftFixtures::mistry(phone, name));
        self
    }

    pub fn build(self) -> Vec<MistryDraft> {
        self.drafts
    }
}

/// Builder for order drafts
pub struct OrderDraftBuilder {
    draft: OrderDraft,
}

impl OrderDraftBuilder {
    pub fn new(contractor_id: &str) -> Self {
        Self {
            draft: DraftFixtures::order(contractor_id, "12 Ring Road"),
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.draft.city = city.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.draft.delivery_address = address.into();
        self
    }

    pub fn build(self) -> OrderDraft {
        self.draft
    }
}

/// Builder for a [`RegistrationService`] over an in-memory store
pub struct TestServiceBuilder {
    store: Arc<MockRowStore>,
    policy: IdConflictPolicy,
}

impl Default for TestServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MockRowStore::new()),
            policy: IdConflictPolicy::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<MockRowStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.policy = IdConflictPolicy::new(attempts);
        self
    }

    /// Returns the service, fixed at 15 March 2024 in Kolkata, and its store
    pub fn build(self) -> (RegistrationService, Arc<MockRowStore>) {
        let service = RegistrationService::new(self.store.clone())
            .with_clock(ClockFixtures::march_2024())
            .with_calendar(LocalCalendar::default())
            .with_conflict_policy(self.policy);
        (service, self.store)
    }
}
