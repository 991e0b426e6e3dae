//! End-to-end tests of the HTTP routes against the in-memory store

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use core_kernel::{FixedClock, Session, UserId};
use domain_registry::{MockFailure, MockRowStore, RegistrationService, StoreRow, Table};
use interface_api::{auth::create_token, config::ApiConfig, create_router};

const SECRET: &str = "api-test-secret";

fn row(value: Value) -> StoreRow {
    value.as_object().cloned().unwrap()
}

struct Harness {
    app: Router,
    store: Arc<MockRowStore>,
    token: String,
}

fn harness_with(store: Arc<MockRowStore>) -> Harness {
    let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 15, 4, 30, 0).unwrap()));
    let service = RegistrationService::new(store.clone()).with_clock(clock);
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        ..Default::default()
    };

    let session = Session::new(UserId::new(), "AB", "Anil Bansal");
    let token = create_token(&session, SECRET, 300).unwrap();

    Harness {
        app: create_router(service, config),
        store,
        token,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(MockRowStore::new()))
}

impl Harness {
    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_store_health() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_requires_token() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/customers/phone-check?phone=9876543210")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_id_preview() {
    let h = harness();
    let (status, body) = h
        .send(
            Method::POST,
            "/api/v1/customers/preview-id",
            Some(json!({
                "phone": "9876543210",
                "city": "Raipur",
                "name": "Ramesh Kumar",
                "customer_type": "Contractor",
                "nickname": "Raju",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer_id"], "CT/3210/RPR/Raju");
    assert_eq!(body["city_code"], "RPR");
    assert_eq!(h.store.query_calls(), 0);
}

#[tokio::test]
async fn test_phone_check_states() {
    let store = Arc::new(
        MockRowStore::with_rows(
            Table::Customers,
            vec![row(json!({"id": "C123", "phone": "9876543210", "customer_id": "CT/3210/RPR/Raju"}))],
        )
        .await,
    );
    let h = harness_with(store.clone());

    let (status, body) = h
        .send(Method::GET, "/api/v1/customers/phone-check?phone=9876543210", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "duplicate");
    assert_eq!(body["can_submit"], false);

    let (_, body) = h
        .send(
            Method::GET,
            "/api/v1/customers/phone-check?phone=9876543210&exclude_id=C123",
            None,
        )
        .await;
    assert_eq!(body["state"], "unique");
    assert_eq!(body["can_submit"], true);

    store.fail_queries(Some(MockFailure::Timeout)).await;
    let (status, body) = h
        .send(Method::GET, "/api/v1/customers/phone-check?phone=9000000001", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "inconclusive");
    assert_eq!(body["can_submit"], false);
}

#[tokio::test]
async fn test_partial_phone_is_not_looked_up() {
    let store = Arc::new(MockRowStore::new());
    let h = harness_with(store.clone());

    for phone in ["98765", "98765432101", "98765abcde"] {
        let (status, body) = h
            .send(
                Method::GET,
                &format!("/api/v1/customers/phone-check?phone={}", phone),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "idle");
        assert_eq!(body["exists"], false);
        assert_eq!(body["can_submit"], false);
        assert!(body["invalid"].as_str().is_some_and(|m| m.contains("phone")));
    }

    assert_eq!(store.query_calls(), 0);
}

#[tokio::test]
async fn test_register_customer_and_duplicate() {
    let h = harness();
    let draft = json!({
        "phone": "9876543210",
        "name": "Ramesh Kumar",
        "city": "Raipur",
        "customer_type": "Contractor",
        "nickname": "Raju",
    });

    let (status, body) = h.send(Method::POST, "/api/v1/customers", Some(draft.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["customer_id"], "CT/3210/RPR/Raju");

    let (status, body) = h.send(Method::POST, "/api/v1/customers", Some(draft)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["field"], "phone");
    assert!(body["message"].as_str().unwrap().starts_with("Phone:"));
}

#[tokio::test]
async fn test_invalid_customer_is_unprocessable() {
    let h = harness();
    let (status, body) = h
        .send(
            Method::POST,
            "/api/v1/customers",
            Some(json!({
                "phone": "98765",
                "name": "Ramesh Kumar",
                "city": "Raipur",
                "customer_type": "Contractor",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "phone");
    assert_eq!(h.store.insert_calls(), 0);
}

#[tokio::test]
async fn test_store_timeout_is_service_unavailable() {
    let h = harness();
    h.store.fail_queries(Some(MockFailure::Timeout)).await;

    let (status, body) = h
        .send(
            Method::POST,
            "/api/v1/customers",
            Some(json!({
                "phone": "9876543210",
                "name": "Ramesh Kumar",
                "city": "Raipur",
                "customer_type": "Contractor",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_update_phone_keeps_customer_id() {
    let store = Arc::new(
        MockRowStore::with_rows(
            Table::Customers,
            vec![row(json!({
                "id": "C123",
                "phone": "9876543210",
                "customer_id": "CT/3210/RPR/Raju",
                "customer_type": "Contractor",
                "city_code": "RPR",
            }))],
        )
        .await,
    );
    let h = harness_with(store);

    let (status, body) = h
        .send(
            Method::PUT,
            "/api/v1/customers/C123/phone",
            Some(json!({"phone": "9123456789"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "9123456789");
    assert_eq!(body["customer_id"], "CT/3210/RPR/Raju");
}

#[tokio::test]
async fn test_mistry_batch_reports_partial_success() {
    let store = Arc::new(
        MockRowStore::with_rows(
            Table::Customers,
            vec![row(json!({
                "id": "P1",
                "phone": "9876543210",
                "name": "Ramesh Kumar",
                "city": "Raipur",
                "city_code": "RPR",
                "customer_id": "CT/3210/RPR/Raju",
                "customer_type": "Contractor",
            }))],
        )
        .await,
    );
    let h = harness_with(store);

    let (status, body) = h
        .send(
            Method::POST,
            "/api/v1/customers/P1/mistries",
            Some(json!({"mistries": [
                {"phone": "9000000001", "mistry_name": "Suresh"},
                {"phone": "9000000001", "mistry_name": "Mahesh"},
            ]})),
        )
        .await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["succeeded"].as_array().unwrap().len(), 1);
    assert_eq!(body["failed"][0]["index"], 1);
    assert_eq!(body["failed"][0]["field"], "phone");
    assert!(body["summary"].as_str().unwrap().starts_with("1 succeeded, 1 failed"));
}

#[tokio::test]
async fn test_mistries_for_unknown_parent_is_not_found() {
    let h = harness();
    let (status, _) = h
        .send(
            Method::POST,
            "/api/v1/customers/missing/mistries",
            Some(json!({"mistries": [{"phone": "9000000001", "mistry_name": "Suresh"}]})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_flow_matches_preview() {
    let h = harness();
    let order = json!({
        "city": "Delhi",
        "contractor_id": "P1",
        "delivery_address": "12 Ring Road",
    });

    let (status, preview) = h
        .send(Method::POST, "/api/v1/sites/preview-id", Some(json!({
            "city": "Delhi",
            "contractor_id": "P1",
            "delivery_address": "12 Ring Road",
        })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["site_id"], "0324/DEL/AB-1");

    let (status, created) = h.send(Method::POST, "/api/v1/orders", Some(order.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["site_id"], preview["site_id"]);
    assert_eq!(created["order_id"], preview["order_id"]);

    let (status, counts) = h
        .send(
            Method::GET,
            "/api/v1/sequence?city=Delhi&contractor_id=P1&address=12%20Ring%20Road",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["site_number"], 2);
    assert_eq!(counts["order_number"], 2);
    assert_eq!(counts["existing_site_id"], "0324/DEL/AB-1");
}
