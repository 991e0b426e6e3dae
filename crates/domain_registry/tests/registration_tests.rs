//! Service-level tests for domain_registry against the in-memory store

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use core_kernel::{FixedClock, LocalCalendar, Session, UserId};

use domain_registry::{
    CustomerDraft, IdConflictPolicy, MistryDraft, MockFailure, MockRowStore, OrderDraft,
    RegistrationService, RegistryError, StoreRow, Table,
};

fn row(value: Value) -> StoreRow {
    value.as_object().cloned().unwrap()
}

fn session() -> Session {
    Session::new(UserId::new(), "AB", "Anil Bansal")
}

/// 15 March 2024, 10:00 in Kolkata
fn march_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 15, 4, 30, 0).unwrap()))
}

fn service(store: Arc<MockRowStore>) -> RegistrationService {
    RegistrationService::new(store)
        .with_clock(march_clock())
        .with_calendar(LocalCalendar::default())
}

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

fn order_draft(contractor_id: &str, address: &str) -> OrderDraft {
    OrderDraft {
        city: "Delhi".to_string(),
        contractor_id: contractor_id.to_string(),
        delivery_address: address.to_string(),
    }
}

// ============================================================================
// Customer Registration
// ============================================================================

mod customer_tests {
    use super::*;

    #[tokio::test]
    async fn test_register_contractor() {
        let store = Arc::new(MockRowStore::new());
        let registered = service(store.clone())
            .register_customer(&session(), contractor_draft())
            .await
            .unwrap();

        assert_eq!(registered.customer_id, "CT/3210/RPR/Raju");
        let rows = store.rows(Table::Customers).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("city_code"), Some(&json!("RPR")));
    }

    #[tokio::test]
    async fn test_invalid_draft_makes_no_store_calls() {
        let store = Arc::new(MockRowStore::new());
        let draft = CustomerDraft {
            phone: "12345".to_string(),
            ..contractor_draft()
        };

        let err = service(store.clone())
            .register_customer(&session(), draft)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Validation(_)));
        assert_eq!(err.field(), Some("phone"));
        assert_eq!(store.query_calls(), 0);
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_found_by_precheck() {
        let store = Arc::new(
            MockRowStore::with_rows(
                Table::Customers,
                vec![row(json!({"id": "C1", "customer_id": "RT/3210/RPR/Shop", "phone": "9876543210"}))],
            )
            .await,
        );

        let err = service(store.clone())
            .register_customer(&session(), contractor_draft())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::DuplicatePhone { .. }));
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_phone_conflict_at_insert_is_duplicate_phone() {
        let store = Arc::new(MockRowStore::new());
        store
            .race_next_write(
                Table::Customers,
                row(json!({"id": "C9", "customer_id": "MS/3210/RPR/Other", "phone": "9876543210"})),
            )
            .await;

        let err = service(store)
            .register_customer(&session(), contractor_draft())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::DuplicatePhone { ref phone } if phone == "9876543210"));
        assert!(err.user_message().starts_with("Phone:"));
    }

    #[tokio::test]
    async fn test_customer_id_clash_names_what_to_change() {
        let store = Arc::new(MockRowStore::new());
        let service = service(store);
        service
            .register_customer(&session(), contractor_draft())
            .await
            .unwrap();

        // different number, same last four digits, city and nickname
        let twin = CustomerDraft {
            phone: "9111113210".to_string(),
            name: "Rajesh Verma".to_string(),
            ..contractor_draft()
        };
        let err = service.register_customer(&session(), twin).await.unwrap_err();

        assert!(matches!(
            err,
            RegistryError::DuplicateIdentifier { ref field, ref id }
                if field == "customer_id" && id == "CT/3210/RPR/Raju"
        ));
        assert!(!err.is_retryable());
        assert!(err.user_message().contains("change the nickname or name"));
    }

    #[tokio::test]
    async fn test_timeout_at_insert_is_unavailable_not_duplicate() {
        let store = Arc::new(MockRowStore::new());
        store.fail_writes(Some(MockFailure::Timeout)).await;

        let err = service(store)
            .register_customer(&session(), contractor_draft())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::StoreUnavailable(_)));
        assert!(!err.is_duplicate());
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_store_blocks_submission() {
        let store = Arc::new(MockRowStore::new());
        store.fail_queries(Some(MockFailure::Connection)).await;

        let err = service(store.clone())
            .register_customer(&session(), contractor_draft())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::UniquenessUnconfirmed(_)));
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_phone_excludes_self() {
        let store = Arc::new(
            MockRowStore::with_rows(
                Table::Customers,
                vec![row(json!({
                    "id": "C123",
                    "customer_id": "CT/3210/RPR/Raju",
                    "phone": "9876543210",
                    "customer_type": "Contractor",
                }))],
            )
            .await,
        );
        let service = service(store);

        let same = service
            .update_customer_phone(&session(), "C123", "9876543210")
            .await
            .unwrap();
        assert_eq!(same.customer_id, "CT/3210/RPR/Raju");

        let changed = service
            .update_customer_phone(&session(), "C123", "9123456789")
            .await
            .unwrap();
        assert_eq!(changed.phone, "9123456789");
        assert_eq!(changed.customer_id, "CT/3210/RPR/Raju");
    }

    #[tokio::test]
    async fn test_update_phone_rejects_other_customers_number() {
        let store = Arc::new(
            MockRowStore::with_rows(
                Table::Customers,
                vec![
                    row(json!({"id": "C1", "customer_id": "CT/3210/RPR/Raju", "phone": "9876543210"})),
                    row(json!({"id": "C2", "customer_id": "RT/1111/RPR/Shop", "phone": "9000001111"})),
                ],
            )
            .await,
        );

        let err = service(store)
            .update_customer_phone(&session(), "C1", "9000001111")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicatePhone { .. }));
    }
}

// ============================================================================
// Mistry Batches
// ============================================================================

mod batch_tests {
    use super::*;

    async fn store_with_parent() -> Arc<MockRowStore> {
        Arc::new(
            MockRowStore::with_rows(
                Table::Customers,
                vec![row(json!({
                    "id": "P1",
                    "customer_id": "CT/3210/RPR/Raju",
                    "phone": "9876543210",
                    "name": "Ramesh Kumar",
                    "city": "Raipur",
                    "city_code": "RPR",
                }))],
            )
            .await,
        )
    }

    fn mistry(phone: &str, name: &str) -> MistryDraft {
        MistryDraft {
            phone: phone.to_string(),
            mistry_name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_batch_with_in_batch_and_store_duplicates() {
        let store = store_with_parent().await;
        let drafts = vec![
            mistry("9000000001", "Suresh"),
            mistry("9876543210", "Mahesh"),
            mistry("9000000001", "Dinesh"),
            mistry("123", "Naresh"),
        ];

        let report = service(store.clone())
            .register_mistries(&session(), "P1", drafts)
            .await
            .unwrap();

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 3);
        assert!(matches!(report.outcomes[1].result, Err(RegistryError::DuplicatePhone { .. })));
        assert!(matches!(
            report.outcomes[2].result,
            Err(RegistryError::InBatchDuplicate { first_index: 0, .. })
        ));
        assert!(matches!(report.outcomes[3].result, Err(RegistryError::Validation(_))));

        let ok = report.succeeded().next().unwrap();
        assert_eq!(ok.customer_id, "MS/0001/RPR/Suresh");
        assert!(report.summary().starts_with("1 succeeded, 3 failed: "));

        // parent lookup plus one check per distinct valid phone
        let queried = store.queried_values().await;
        assert_eq!(queried, vec!["P1", "9000000001", "9876543210"]);
    }

    #[tokio::test]
    async fn test_batch_insert_failure_does_not_stop_others() {
        let store = store_with_parent().await;
        store
            .race_next_write(
                Table::Customers,
                row(json!({"id": "X", "customer_id": "MS/0001/RPR/Other", "phone": "9000000001"})),
            )
            .await;

        let report = service(store)
            .register_mistries(
                &session(),
                "P1",
                vec![mistry("9000000001", "Suresh"), mistry("9000000002", "Mahesh")],
            )
            .await
            .unwrap();

        assert!(matches!(report.outcomes[0].result, Err(RegistryError::DuplicatePhone { .. })));
        assert!(report.outcomes[1].result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_parent() {
        let store = Arc::new(MockRowStore::new());
        let err = service(store)
            .register_mistries(&session(), "nope", vec![mistry("9000000001", "Suresh")])
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ParentNotFound { .. }));
    }
}

// ============================================================================
// Sites and Orders
// ============================================================================

mod order_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_order_creates_site() {
        let store = Arc::new(MockRowStore::new());
        let created = service(store.clone())
            .create_site_order(&session(), order_draft("C1", "12 MG Road"))
            .await
            .unwrap();

        assert_eq!(created.site_id, "0324/DEL/AB-1");
        assert_eq!(created.order_id, "0324/DEL/AB-1-ORD1");
        assert!(created.site_created);
        assert_eq!(store.rows(Table::Sites).await.len(), 1);
    }

    #[tokio::test]
    async fn test_same_address_reuses_site() {
        let store = Arc::new(MockRowStore::new());
        let service = service(store.clone());
        let user = session();

        service
            .create_site_order(&user, order_draft("C1", "12 MG Road"))
            .await
            .unwrap();
        let second = service
            .create_site_order(&user, order_draft("C1", "  12 mg ROAD "))
            .await
            .unwrap();
        let other_site = service
            .create_site_order(&user, order_draft("C1", "7 Civil Lines"))
            .await
            .unwrap();

        assert_eq!(second.site_id, "0324/DEL/AB-1");
        assert_eq!(second.order_id, "0324/DEL/AB-1-ORD2");
        assert!(!second.site_created);
        assert_eq!(other_site.site_id, "0324/DEL/AB-2");
    }

    #[tokio::test]
    async fn test_site_collision_is_regenerated() {
        let store = Arc::new(MockRowStore::new());
        let user = session();
        // another writer takes AB-1 between our read and our insert
        store
            .race_next_write(
                Table::Sites,
                row(json!({
                    "id": "S-race",
                    "site_id": "0324/DEL/AB-1",
                    "city_code": "DEL",
                    "created_by": user.user_id.to_string(),
                    "contractor_id": "C2",
                    "delivery_address": "elsewhere",
                })),
            )
            .await;

        let created = service(store)
            .create_site_order(&user, order_draft("C1", "12 MG Road"))
            .await
            .unwrap();

        assert_eq!(created.site_id, "0324/DEL/AB-2");
        assert_eq!(created.attempts, 2);
    }

    #[tokio::test]
    async fn test_users_sharing_initials_get_distinct_sites() {
        let store = Arc::new(MockRowStore::new());
        let service = service(store.clone());
        let anil = Session::new(UserId::new(), "", "Anil Bansal");
        let arun = Session::new(UserId::new(), "", "Arun Bhatia");

        let first = service
            .create_site_order(&anil, order_draft("C1", "12 MG Road"))
            .await
            .unwrap();
        assert_eq!(first.site_id, "0324/DEL/AB-1");

        let second = service
            .create_site_order(&arun, order_draft("C2", "7 Civil Lines"))
            .await
            .unwrap();
        assert_eq!(second.site_id, "0324/DEL/AB-2");
        assert_eq!(second.order_id, "0324/DEL/AB-2-ORD1");
        assert!(second.site_created);
        assert_eq!(second.attempts, 2);

        let third = service
            .create_site_order(&arun, order_draft("C2", "9 Ring Road"))
            .await
            .unwrap();
        assert_eq!(third.site_id, "0324/DEL/AB-3");
        assert_eq!(third.attempts, 1);
        assert_eq!(store.rows(Table::Sites).await.len(), 3);
    }

    #[tokio::test]
    async fn test_shared_series_is_skipped_in_one_retry() {
        let store = Arc::new(MockRowStore::new());
        let service = service(store.clone());
        let anil = Session::new(UserId::new(), "", "Anil Bansal");
        for address in ["a", "b", "c", "d", "e"] {
            service
                .create_site_order(&anil, order_draft("C1", address))
                .await
                .unwrap();
        }

        let arun = Session::new(UserId::new(), "", "Arun Bhatia");
        let created = service
            .create_site_order(&arun, order_draft("C2", "7 Civil Lines"))
            .await
            .unwrap();

        assert_eq!(created.site_id, "0324/DEL/AB-6");
        assert_eq!(created.attempts, 2);
    }

    #[tokio::test]
    async fn test_order_collision_keeps_the_new_site() {
        let store = Arc::new(MockRowStore::new());
        let user = session();
        // another writer numbers an order on our fresh site first
        store
            .race_next_write(
                Table::Orders,
                row(json!({
                    "id": "O-race",
                    "order_id": "0324/DEL/AB-1-ORD1",
                    "site_id": "0324/DEL/AB-1",
                })),
            )
            .await;

        let created = service(store.clone())
            .create_site_order(&user, order_draft("C1", "12 MG Road"))
            .await
            .unwrap();

        assert_eq!(created.site_id, "0324/DEL/AB-1");
        assert_eq!(created.order_id, "0324/DEL/AB-1-ORD2");
        assert!(created.site_created);
        assert_eq!(created.attempts, 2);
        assert_eq!(store.rows(Table::Sites).await.len(), 1);
    }

    #[tokio::test]
    async fn test_contention_gives_up_after_policy_attempts() {
        let store = Arc::new(MockRowStore::new());
        let user = session();
        // a racing row that never shows up in the scope read
        store
            .race_next_write(Table::Sites, row(json!({"id": "S-x", "site_id": "0324/DEL/AB-1"})))
            .await;

        let err = service(store)
            .with_conflict_policy(IdConflictPolicy::new(1))
            .create_site_order(&user, order_draft("C1", "12 MG Road"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::IdentifierContention { attempts: 1 }));
    }

    #[tokio::test]
    async fn test_session_without_code_is_rejected() {
        let store = Arc::new(MockRowStore::new());
        let nobody = Session::new(UserId::new(), "", "");

        let err = service(store.clone())
            .create_site_order(&nobody, order_draft("C1", "12 MG Road"))
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("user_code"));
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_preview_matches_created_ids() {
        let store = Arc::new(MockRowStore::new());
        let service = service(store);
        let user = session();

        let preview = service
            .preview_site_order(&user, "Delhi", Some("C1"), Some("12 MG Road"))
            .await
            .unwrap();
        let created = service
            .create_site_order(&user, order_draft("C1", "12 MG Road"))
            .await
            .unwrap();

        assert_eq!(preview.site_id, created.site_id);
        assert_eq!(preview.order_id, created.order_id);
    }
}
