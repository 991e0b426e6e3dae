//! Registration service
//!
//! This module contains the service that turns validated drafts into stored
//! customers, sites and orders. Every write follows the same order:
//!
//! 1. validate locally
//! 2. re-check uniqueness or re-read the sequence against the store
//! 3. generate the identifier from fresh data
//! 4. insert, and translate a constraint rejection into a domain error
//!
//! Sequence numbers are read-max-then-increment, so two users creating a
//! site in the same city at the same moment can compute the same id. The
//! store's unique constraint rejects the second insert and the service
//! re-reads the sequence and tries again, up to
//! [`IdConflictPolicy::max_attempts`] times.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use validator::Validate;

use core_kernel::{Clock, LocalCalendar, Session, SystemClock};

use crate::city::CityCode;
use crate::customer_type::CustomerType;
use crate::error::RegistryError;
use crate::id_generator::{
    generate_customer_id, generate_order_id, generate_site_id, is_placeholder_site_id,
    CustomerAttributes,
};
use crate::ports::{row_text, RowStore, StoreRow, Table};
use crate::sequence::{SequenceCounter, SequenceCounts, SequenceScope};
use crate::uniqueness::{interpret_insert_error, UniquenessCheck, UniquenessReconciler};
use crate::validation::{RegistryValidator, ValidationResult};

/// How often an identifier is regenerated after colliding with a concurrent write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdConflictPolicy {
    /// Total insert attempts, including the first
    pub max_attempts: u32,
}

impl IdConflictPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for IdConflictPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// A customer or contractor as submitted by the form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CustomerDraft {
    #[validate(custom(function = "crate::validation::validate_phone"))]
    pub phone: String,
    #[validate(
        custom(function = "crate::validation::validate_required"),
        length(max = 120, message = "must be at most 120 characters")
    )]
    pub name: String,
    #[validate(custom(function = "crate::validation::validate_required"))]
    pub city: String,
    pub customer_type: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub mistry_name: Option<String>,
}

/// One mistry in a batch added under a contractor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MistryDraft {
    #[validate(custom(function = "crate::validation::validate_phone"))]
    pub phone: String,
    #[validate(
        custom(function = "crate::validation::validate_required"),
        length(max = 120, message = "must be at most 120 characters")
    )]
    pub mistry_name: String,
}

/// A delivery to a contractor's site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OrderDraft {
    #[validate(custom(function = "crate::validation::validate_required"))]
    pub city: String,
    /// Row id of the contractor
    #[validate(custom(function = "crate::validation::validate_required"))]
    pub contractor_id: String,
    #[validate(custom(function = "crate::validation::validate_required"))]
    pub delivery_address: String,
}

/// A stored customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredCustomer {
    /// Row id in the store
    pub id: String,
    pub customer_id: String,
    pub phone: String,
    pub customer_type: CustomerType,
    pub city_code: String,
}

impl RegisteredCustomer {
    fn from_row(row: &StoreRow) -> Result<Self, RegistryError> {
        let text = |field: &str| {
            row_text(row, field).map(|v| v.into_owned()).ok_or_else(|| {
                RegistryError::Store(core_kernel::PortError::transformation(format!(
                    "customer row is missing '{}'",
                    field
                )))
            })
        };

        Ok(Self {
            id: text("id")?,
            customer_id: text("customer_id")?,
            phone: text("phone")?,
            customer_type: CustomerType::parse(&text("customer_type").unwrap_or_default()),
            city_code: text("city_code").unwrap_or_default(),
        })
    }
}

/// Result of [`RegistrationService::create_site_order`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub site_id: String,
    pub order_id: String,
    /// False when an existing site at the same address was reused
    pub site_created: bool,
    /// Attempts it took, 1 unless a concurrent writer got there first
    pub attempts: u32,
}

/// Preview of the next site and order identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePreview {
    pub site_id: String,
    pub order_id: String,
    pub counts: SequenceCounts,
}

/// Outcome for one entry of a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub phone: String,
    pub result: Result<RegisteredCustomer, RegistryError>,
}

/// Aggregated outcome of a batch registration
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &RegisteredCustomer> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&BatchOutcome, &RegistryError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }

    /// One-line summary, e.g. `2 succeeded, 1 failed: 9000000001 (...)`
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} succeeded, {} failed",
            self.success_count(),
            self.failure_count()
        );
        let details: Vec<String> = self
            .failed()
            .map(|(outcome, error)| format!("{} ({})", outcome.phone, error.user_message()))
            .collect();
        if !details.is_empty() {
            summary.push_str(": ");
            summary.push_str(&details.join(", "));
        }
        summary
    }
}

/// Orchestrates validation, uniqueness, sequencing and inserts
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn RowStore>,
    reconciler: UniquenessReconciler,
    sequence: SequenceCounter,
    clock: Arc<dyn Clock>,
    calendar: LocalCalendar,
    policy: IdConflictPolicy,
}

impl RegistrationService {
    /// Creates a service with the system clock and default calendar
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self {
            reconciler: UniquenessReconciler::new(store.clone()),
            sequence: SequenceCounter::new(store.clone()),
            store,
            clock: Arc::new(SystemClock),
            calendar: LocalCalendar::default(),
            policy: IdConflictPolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_calendar(mut self, calendar: LocalCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_conflict_policy(mut self, policy: IdConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn reconciler(&self) -> &UniquenessReconciler {
        &self.reconciler
    }

    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    /// Today in the configured timezone
    pub fn today(&self) -> NaiveDate {
        self.calendar.today(self.clock.as_ref())
    }

    /// Advisory phone check for a form in progress
    pub async fn check_phone(&self, phone: &str, exclude_id: Option<&str>) -> UniquenessCheck {
        self.reconciler.check_phone_unique(phone, exclude_id).await
    }

    /// Registers a customer or contractor
    ///
    /// # Errors
    ///
    /// - `Validation` if the draft is incomplete
    /// - `DuplicatePhone` if the number is taken, either at the re-check or
    ///   when the insert is rejected
    /// - `UniquenessUnconfirmed` if the re-check got no answer
    /// - `DuplicateIdentifier`, `StoreUnavailable` or `Store` from the insert
    #[instrument(skip(self, session, draft), fields(user_id = %session.user_id))]
    pub async fn register_customer(
        &self,
        session: &Session,
        draft: CustomerDraft,
    ) -> Result<RegisteredCustomer, RegistryError> {
        ensure_valid(RegistryValidator::validate_customer(&draft))?;
        self.reconciler.verify_before_insert(&draft.phone, None).await?;

        let code = CityCode::from_city_name(&draft.city);
        let attrs = CustomerAttributes {
            phone: draft.phone.clone(),
            city_code: code.to_string(),
            contractor_name: draft.name.clone(),
            customer_type: CustomerType::parse(&draft.customer_type),
            nickname: draft.nickname.clone(),
            mistry_name: draft.mistry_name.clone(),
        };
        let customer_id = generate_customer_id(&attrs);

        let mut record = StoreRow::new();
        record.insert("customer_id".into(), Value::from(customer_id.as_str()));
        record.insert("phone".into(), Value::from(draft.phone.as_str()));
        record.insert("name".into(), Value::from(draft.name.trim()));
        record.insert("customer_type".into(), Value::from(attrs.customer_type.as_str()));
        record.insert("city".into(), Value::from(draft.city.trim()));
        record.insert("city_code".into(), Value::from(code.as_str()));
        record.insert("nickname".into(), optional_text(draft.nickname.as_deref()));
        record.insert("mistry_name".into(), optional_text(draft.mistry_name.as_deref()));
        record.insert("created_by".into(), Value::from(session.user_id.to_string()));

        let stored = self
            .store
            .insert(Table::Customers, record)
            .await
            .map_err(|e| interpret_insert_error(e, &draft.phone, &customer_id))?;

        info!(customer_id = %customer_id, "Customer registered");
        RegisteredCustomer::from_row(&stored)
    }

    /// Changes a customer's phone number
    ///
    /// The customer's own row is excluded from the duplicate check. The
    /// stored customer id is left as it was.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn update_customer_phone(
        &self,
        session: &Session,
        record_id: &str,
        phone: &str,
    ) -> Result<RegisteredCustomer, RegistryError> {
        ensure_valid(RegistryValidator::validate_phone_number(phone))?;
        self.reconciler
            .verify_before_insert(phone, Some(record_id))
            .await?;

        let mut changes = StoreRow::new();
        changes.insert("phone".into(), Value::from(phone));

        let stored = self
            .store
            .update(Table::Customers, record_id, changes)
            .await
            .map_err(|e| interpret_insert_error(e, phone, record_id))?;

        info!(record_id, "Customer phone updated");
        RegisteredCustomer::from_row(&stored)
    }

    /// Adds several mistries under a contractor
    ///
    /// Entries are validated, then checked for repeats within the batch and
    /// against the store, then inserted one by one. A failing entry does not
    /// stop the others; the report lists every outcome.
    ///
    /// # Errors
    ///
    /// Only for problems with the batch as a whole: a missing parent or a
    /// store that cannot be read.
    #[instrument(skip(self, session, drafts), fields(user_id = %session.user_id, count = drafts.len()))]
    pub async fn register_mistries(
        &self,
        session: &Session,
        parent_id: &str,
        drafts: Vec<MistryDraft>,
    ) -> Result<BatchReport, RegistryError> {
        let parent = self.load_parent(parent_id).await?;
        let parent_name = row_text(&parent, "name").map(|v| v.into_owned()).unwrap_or_default();
        let parent_city = row_text(&parent, "city").map(|v| v.into_owned()).unwrap_or_default();
        let parent_code = row_text(&parent, "city_code")
            .map(|v| CityCode::normalize(&v))
            .unwrap_or_else(|| CityCode::from_city_name(&parent_city));

        let mut results: Vec<Option<Result<RegisteredCustomer, RegistryError>>> =
            drafts.iter().map(|_| None).collect();

        let mut skip = Vec::new();
        for (index, draft) in drafts.iter().enumerate() {
            let validation = RegistryValidator::validate_mistry(draft);
            if !validation.is_valid() {
                results[index] = Some(Err(RegistryError::Validation(validation)));
                skip.push(index);
            }
        }

        let phones: Vec<&str> = drafts.iter().map(|d| d.phone.as_str()).collect();
        let check = self.reconciler.check_batch(&phones, &skip).await;
        for (index, error) in check.rejected {
            results[index] = Some(Err(error));
        }

        for index in check.clear {
            let draft = &drafts[index];
            let attrs = CustomerAttributes {
                phone: draft.phone.clone(),
                city_code: parent_code.to_string(),
                contractor_name: parent_name.clone(),
                customer_type: CustomerType::Mistry,
                nickname: None,
                mistry_name: Some(draft.mistry_name.clone()),
            };
            let customer_id = generate_customer_id(&attrs);

            let mut record = StoreRow::new();
            record.insert("customer_id".into(), Value::from(customer_id.as_str()));
            record.insert("phone".into(), Value::from(draft.phone.as_str()));
            record.insert("name".into(), Value::from(draft.mistry_name.trim()));
            record.insert("customer_type".into(), Value::from(CustomerType::Mistry.as_str()));
            record.insert("city".into(), Value::from(parent_city.as_str()));
            record.insert("city_code".into(), Value::from(parent_code.as_str()));
            record.insert("mistry_name".into(), Value::from(draft.mistry_name.trim()));
            record.insert("parent_id".into(), Value::from(parent_id));
            record.insert("created_by".into(), Value::from(session.user_id.to_string()));

            let outcome = match self.store.insert(Table::Customers, record).await {
                Ok(stored) => RegisteredCustomer::from_row(&stored),
                Err(e) => Err(interpret_insert_error(e, &draft.phone, &customer_id)),
            };
            results[index] = Some(outcome);
        }

        let outcomes = drafts
            .into_iter()
            .zip(results)
            .enumerate()
            .map(|(index, (draft, result))| BatchOutcome {
                index,
                phone: draft.phone,
                result: result.unwrap_or_else(|| {
                    Err(RegistryError::Conflict("entry was not processed".to_string()))
                }),
            })
            .collect();

        let report = BatchReport { outcomes };
        if report.all_succeeded() {
            info!(parent_id, "{}", report.summary());
        } else {
            warn!(parent_id, "{}", report.summary());
        }
        Ok(report)
    }

    /// Creates an order, and its site unless the contractor already has one
    /// at this address
    ///
    /// # Errors
    ///
    /// - `Validation` for an incomplete draft or a session without a user code
    /// - `IdentifierContention` if every attempt collided with another writer
    /// - `StoreUnavailable` / `Store` for store failures
    ///
    /// A site created by an earlier attempt is kept, and later attempts only
    /// renumber the order. A colliding site id moves the next attempt past
    /// every site sharing its `<MMYY>/<CITY>/<CODE>-` series.
    #[instrument(skip(self, session, draft), fields(user_id = %session.user_id, city = %draft.city))]
    pub async fn create_site_order(
        &self,
        session: &Session,
        draft: OrderDraft,
    ) -> Result<CreatedOrder, RegistryError> {
        ensure_valid(RegistryValidator::validate_order(&draft))?;

        let code = CityCode::from_city_name(&draft.city);
        let scope = SequenceScope::new(session.user_id, draft.city.trim())
            .for_delivery(draft.contractor_id.trim(), draft.delivery_address.trim());
        let date = self.today();

        let mut created_site: Option<String> = None;
        let mut site_floor = 1;

        for attempt in 1..=self.policy.max_attempts {
            let (site_id, order_number) = match created_site.clone() {
                Some(site_id) => {
                    let order_number = self.sequence.next_order_number(&site_id).await?;
                    (site_id, order_number)
                }
                None => {
                    let counts = self.sequence.get_order_counts(&scope).await?;
                    match counts.existing_site_id {
                        Some(existing) => (existing, counts.order_number),
                        None => {
                            let site_number = counts.site_number.max(site_floor);
                            let site_id = generate_site_id(Some(session), code.as_str(), site_number, date);
                            if is_placeholder_site_id(&site_id) {
                                let mut result = ValidationResult::ok();
                                result.add_error("user_code", "the signed-in user has no user code");
                                return Err(RegistryError::Validation(result));
                            }

                            match self.insert_site(session, &draft, &code, &site_id).await {
                                Ok(()) => {
                                    created_site = Some(site_id.clone());
                                    (site_id, counts.order_number)
                                }
                                Err(RegistryError::DuplicateIdentifier { .. }) => {
                                    site_floor = self.sequence.next_site_number_after(&code, &site_id).await?;
                                    warn!(site_id = %site_id, next = site_floor, attempt, "Site id taken, regenerating");
                                    continue;
                                }
                                Err(other) => return Err(other),
                            }
                        }
                    }
                }
            };

            let order_id = generate_order_id(&site_id, order_number);
            match self.insert_order(session, &draft, &site_id, &order_id, date).await {
                Ok(()) => {
                    let site_created = created_site.is_some();
                    info!(site_id = %site_id, order_id = %order_id, site_created, attempt, "Order created");
                    return Ok(CreatedOrder {
                        site_id,
                        order_id,
                        site_created,
                        attempts: attempt,
                    });
                }
                Err(RegistryError::DuplicateIdentifier { id, .. }) => {
                    warn!(order_id = %id, attempt, "Order id taken, regenerating");
                }
                Err(other) => return Err(other),
            }
        }

        Err(RegistryError::IdentifierContention {
            attempts: self.policy.max_attempts,
        })
    }

    /// Sequence numbers for a live preview
    pub async fn preview_sequence(
        &self,
        session: &Session,
        city: &str,
        contractor_id: Option<&str>,
        delivery_address: Option<&str>,
    ) -> Result<SequenceCounts, RegistryError> {
        let mut scope = SequenceScope::new(session.user_id, city.trim());
        if let (Some(contractor), Some(address)) = (contractor_id, delivery_address) {
            scope = scope.for_delivery(contractor, address);
        }
        self.sequence.get_order_counts(&scope).await
    }

    /// Site and order ids the next order would get, as of now
    pub async fn preview_site_order(
        &self,
        session: &Session,
        city: &str,
        contractor_id: Option<&str>,
        delivery_address: Option<&str>,
    ) -> Result<SitePreview, RegistryError> {
        let counts = self
            .preview_sequence(session, city, contractor_id, delivery_address)
            .await?;
        let site_id = match &counts.existing_site_id {
            Some(existing) => existing.clone(),
            None => generate_site_id(
                Some(session),
                CityCode::from_city_name(city).as_str(),
                counts.site_number,
                self.today(),
            ),
        };
        let order_id = generate_order_id(&site_id, counts.order_number);
        Ok(SitePreview {
            site_id,
            order_id,
            counts,
        })
    }

    async fn load_parent(&self, parent_id: &str) -> Result<StoreRow, RegistryError> {
        self.store
            .query_exists(Table::Customers, "id", parent_id, None)
            .await
            .map_err(RegistryError::from_store)?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::ParentNotFound {
                id: parent_id.to_string(),
            })
    }

    async fn insert_site(
        &self,
        session: &Session,
        draft: &OrderDraft,
        code: &CityCode,
        site_id: &str,
    ) -> Result<(), RegistryError> {
        let mut record = StoreRow::new();
        record.insert("site_id".into(), Value::from(site_id));
        record.insert("city".into(), Value::from(draft.city.trim()));
        record.insert("city_code".into(), Value::from(code.as_str()));
        record.insert("contractor_id".into(), Value::from(draft.contractor_id.trim()));
        record.insert("delivery_address".into(), Value::from(draft.delivery_address.trim()));
        record.insert("created_by".into(), Value::from(session.user_id.to_string()));

        self.store
            .insert(Table::Sites, record)
            .await
            .map(|_| ())
            .map_err(|e| interpret_insert_error(e, "", site_id))
    }

    async fn insert_order(
        &self,
        session: &Session,
        draft: &OrderDraft,
        site_id: &str,
        order_id: &str,
        date: NaiveDate,
    ) -> Result<(), RegistryError> {
        let mut record = StoreRow::new();
        record.insert("order_id".into(), Value::from(order_id));
        record.insert("site_id".into(), Value::from(site_id));
        record.insert("contractor_id".into(), Value::from(draft.contractor_id.trim()));
        record.insert("city".into(), Value::from(draft.city.trim()));
        record.insert("delivery_address".into(), Value::from(draft.delivery_address.trim()));
        record.insert("order_date".into(), Value::from(date.format("%Y-%m-%d").to_string()));
        record.insert("created_by".into(), Value::from(session.user_id.to_string()));

        self.store
            .insert(Table::Orders, record)
            .await
            .map(|_| ())
            .map_err(|e| interpret_insert_error(e, "", order_id))
    }
}

fn ensure_valid(result: ValidationResult) -> Result<(), RegistryError> {
    result.into_result().map(|_| ()).map_err(RegistryError::Validation)
}

fn optional_text(value: Option<&str>) -> Value {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Value::from(v),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_policy_floor() {
        assert_eq!(IdConflictPolicy::new(0).max_attempts, 1);
        assert_eq!(IdConflictPolicy::default().max_attempts, 3);
    }

    #[test]
    fn test_batch_summary() {
        let report = BatchReport {
            outcomes: vec![
                BatchOutcome {
                    index: 0,
                    phone: "9000000001".to_string(),
                    result: Ok(RegisteredCustomer {
                        id: "1".to_string(),
                        customer_id: "MS/0001/RPR/Suresh".to_string(),
                        phone: "9000000001".to_string(),
                        customer_type: CustomerType::Mistry,
                        city_code: "RPR".to_string(),
                    }),
                },
                BatchOutcome {
                    index: 1,
                    phone: "9000000001".to_string(),
                    result: Err(RegistryError::InBatchDuplicate {
                        phone: "9000000001".to_string(),
                        first_index: 0,
                    }),
                },
            ],
        };

        assert!(report.summary().starts_with("1 succeeded, 1 failed: 9000000001"));
        assert!(!report.all_succeeded());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(Some("  ")), Value::Null);
        assert_eq!(optional_text(Some(" Raju ")), Value::from("Raju"));
        assert_eq!(optional_text(None), Value::Null);
    }
}
