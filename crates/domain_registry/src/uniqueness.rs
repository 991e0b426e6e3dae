//! Phone-number uniqueness
//!
//! Two layers guard the `customers.phone` column:
//!
//! 1. an advisory check while the form is being filled in
//!    ([`UniquenessReconciler::check_phone_unique`]), which never fails and
//!    only informs the UI;
//! 2. the authoritative answer at insert time, where the store's unique
//!    constraint rejects the row and [`interpret_insert_error`] turns the
//!    rejection into a domain error.
//!
//! [`UniquenessReconciler::verify_before_insert`] sits between the two and
//! blocks a submission when the store cannot give a clear answer.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use core_kernel::PortError;

use crate::error::RegistryError;
use crate::ports::{Exclusion, RowStore, Table};

/// Outcome of an advisory phone check
#[derive(Debug, Default, Serialize)]
pub struct UniquenessCheck {
    pub exists: bool,
    /// Set when the store could not answer; `exists` is then meaningless
    #[serde(serialize_with = "serialize_port_error")]
    pub error: Option<PortError>,
}

fn serialize_port_error<S>(error: &Option<PortError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl UniquenessCheck {
    pub fn unique() -> Self {
        Self::default()
    }

    pub fn duplicate() -> Self {
        Self {
            exists: true,
            error: None,
        }
    }

    pub fn inconclusive(error: PortError) -> Self {
        Self {
            exists: false,
            error: Some(error),
        }
    }

    pub fn is_conclusive(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of checking a batch of phone numbers
#[derive(Debug, Default)]
pub struct BatchCheck {
    /// Indexes whose phone is free as far as the store knows
    pub clear: Vec<usize>,
    /// Indexes rejected, with the reason
    pub rejected: Vec<(usize, RegistryError)>,
}

impl BatchCheck {
    pub fn is_clear(&self, index: usize) -> bool {
        self.clear.contains(&index)
    }

    pub fn rejection(&self, index: usize) -> Option<&RegistryError> {
        self.rejected
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, err)| err)
    }
}

/// Maps a failed insert or update onto a domain error
///
/// `phone` and `identifier` are what the write tried to store, so the
/// resulting error can name the offending value.
pub fn interpret_insert_error(error: PortError, phone: &str, identifier: &str) -> RegistryError {
    match error {
        PortError::Conflict { field, message } => match field.as_deref() {
            Some("phone") => RegistryError::DuplicatePhone {
                phone: phone.to_string(),
            },
            Some(column @ ("customer_id" | "site_id" | "order_id")) => {
                RegistryError::DuplicateIdentifier {
                    field: column.to_string(),
                    id: identifier.to_string(),
                }
            }
            _ => RegistryError::Conflict(message),
        },
        other => RegistryError::from_store(other),
    }
}

/// Runs phone-uniqueness checks against the store
#[derive(Clone)]
pub struct UniquenessReconciler {
    store: Arc<dyn RowStore>,
}

impl UniquenessReconciler {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Advisory check; never fails
    ///
    /// `exclude_id` leaves out the record being edited so it does not
    /// collide with its own phone number.
    pub async fn check_phone_unique(&self, phone: &str, exclude_id: Option<&str>) -> UniquenessCheck {
        let exclusion = exclude_id.map(Exclusion::by_id);
        match self
            .store
            .query_exists(Table::Customers, "phone", phone, exclusion.as_ref())
            .await
        {
            Ok(rows) => {
                debug!(phone, matches = rows.len(), "Phone uniqueness checked");
                if rows.is_empty() {
                    UniquenessCheck::unique()
                } else {
                    UniquenessCheck::duplicate()
                }
            }
            Err(error) => {
                warn!(phone, error = %error, "Phone uniqueness check failed");
                UniquenessCheck::inconclusive(error)
            }
        }
    }

    /// Authoritative re-check right before a write
    ///
    /// # Errors
    ///
    /// `DuplicatePhone` if the number is taken, `UniquenessUnconfirmed` if
    /// the store could not answer.
    pub async fn verify_before_insert(
        &self,
        phone: &str,
        exclude_id: Option<&str>,
    ) -> Result<(), RegistryError> {
        let check = self.check_phone_unique(phone, exclude_id).await;
        match check.error {
            Some(error) => Err(RegistryError::UniquenessUnconfirmed(error)),
            None if check.exists => Err(RegistryError::DuplicatePhone {
                phone: phone.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Checks several phone numbers at once
    ///
    /// Repeats inside the batch are found first, in memory; a later repeat
    /// is rejected as `InBatchDuplicate` and never sent to the store. The
    /// remaining numbers are verified one by one. Indexes listed in `skip`
    /// (already rejected by the caller) are left out entirely.
    pub async fn check_batch(&self, phones: &[&str], skip: &[usize]) -> BatchCheck {
        let mut result = BatchCheck::default();
        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        let mut candidates = Vec::new();

        for (index, phone) in phones.iter().enumerate() {
            if skip.contains(&index) {
                continue;
            }
            match first_seen.get(phone) {
                Some(&first_index) => result.rejected.push((
                    index,
                    RegistryError::InBatchDuplicate {
                        phone: phone.to_string(),
                        first_index,
                    },
                )),
                None => {
                    first_seen.insert(*phone, index);
                    candidates.push(index);
                }
            }
        }

        for index in candidates {
            match self.verify_before_insert(phones[index], None).await {
                Ok(()) => result.clear.push(index),
                Err(error) => result.rejected.push((index, error)),
            }
        }

        result.rejected.sort_by_key(|(index, _)| *index);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::{MockFailure, MockRowStore};
    use crate::ports::StoreRow;
    use serde_json::json;

    fn customer(id: &str, phone: &str) -> StoreRow {
        json!({"id": id, "phone": phone}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_self_exclusion() {
        let store = MockRowStore::with_rows(Table::Customers, vec![customer("C123", "9876543210")]).await;
        let reconciler = UniquenessReconciler::new(Arc::new(store));

        let check = reconciler.check_phone_unique("9876543210", Some("C123")).await;
        assert!(!check.exists);
        assert!(check.is_conclusive());

        let check = reconciler.check_phone_unique("9876543210", None).await;
        assert!(check.exists);
    }

    #[tokio::test]
    async fn test_check_never_fails() {
        let store = MockRowStore::new();
        store.fail_queries(Some(MockFailure::Unavailable)).await;
        let reconciler = UniquenessReconciler::new(Arc::new(store));

        let check = reconciler.check_phone_unique("9876543210", None).await;
        assert!(!check.exists);
        assert!(!check.is_conclusive());
    }

    #[tokio::test]
    async fn test_verify_blocks_on_inconclusive() {
        let store = MockRowStore::new();
        store.fail_queries(Some(MockFailure::Timeout)).await;
        let reconciler = UniquenessReconciler::new(Arc::new(store));

        let err = reconciler.verify_before_insert("9876543210", None).await.unwrap_err();
        assert!(matches!(err, RegistryError::UniquenessUnconfirmed(_)));
    }

    #[tokio::test]
    async fn test_batch_duplicate_flagged_before_store() {
        let store = Arc::new(MockRowStore::new());
        let reconciler = UniquenessReconciler::new(store.clone());

        let check = reconciler
            .check_batch(&["9000000001", "9000000002", "9000000001"], &[])
            .await;

        assert_eq!(check.clear, vec![0, 1]);
        assert!(matches!(
            check.rejection(2),
            Some(RegistryError::InBatchDuplicate { first_index: 0, .. })
        ));
        assert_eq!(store.queried_values().await, vec!["9000000001", "9000000002"]);
    }

    #[tokio::test]
    async fn test_batch_reports_store_duplicates_separately() {
        let store = MockRowStore::with_rows(Table::Customers, vec![customer("C1", "9000000002")]).await;
        let reconciler = UniquenessReconciler::new(Arc::new(store));

        let check = reconciler.check_batch(&["9000000001", "9000000002"], &[]).await;
        assert!(check.is_clear(0));
        assert!(matches!(check.rejection(1), Some(RegistryError::DuplicatePhone { .. })));
    }

    #[test]
    fn test_interpret_insert_error() {
        let phone = interpret_insert_error(
            PortError::conflict("dup", Some("phone".to_string())),
            "9876543210",
            "CT/3210/RPR/Raju",
        );
        assert!(matches!(phone, RegistryError::DuplicatePhone { .. }));
        assert_eq!(phone.field(), Some("phone"));

        let id = interpret_insert_error(
            PortError::conflict("dup", Some("customer_id".to_string())),
            "9876543210",
            "CT/3210/RPR/Raju",
        );
        assert!(matches!(id, RegistryError::DuplicateIdentifier { ref id, .. } if id == "CT/3210/RPR/Raju"));

        let unknown = interpret_insert_error(PortError::conflict("dup", None), "", "");
        assert!(matches!(unknown, RegistryError::Conflict(_)));

        let timeout = interpret_insert_error(PortError::timeout("insert", 5000), "", "");
        assert!(matches!(timeout, RegistryError::StoreUnavailable(_)));

        let other = interpret_insert_error(PortError::transformation("bad json"), "", "");
        assert!(matches!(other, RegistryError::Store(_)));
    }
}
