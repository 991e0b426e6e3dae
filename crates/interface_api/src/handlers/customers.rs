//! Customer handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use core_kernel::Session;
use domain_registry::{
    recompute_customer_id, CustomerDraft, PhoneCheckState, PhoneCheckTracker, RegisteredCustomer,
    RegistryValidator,
};

use crate::dto::customers::*;
use crate::{error::ApiError, AppState};

/// Live customer id for the form as typed; never touches the store
pub async fn preview_id(
    Json(request): Json<CustomerIdPreviewRequest>,
) -> Json<CustomerIdPreviewResponse> {
    let attrs = request.attributes();
    Json(CustomerIdPreviewResponse {
        customer_id: recompute_customer_id(&attrs),
        city_code: attrs.city_code,
    })
}

/// Advisory phone uniqueness check
///
/// Always answers 200; a store failure shows up as the `inconclusive` state.
/// A number that is not yet 10 digits stays `idle` and is never looked up.
#[instrument(skip(state, query))]
pub async fn check_phone(
    State(state): State<AppState>,
    Query(query): Query<PhoneCheckQuery>,
) -> Json<PhoneCheckResponse> {
    let validation = RegistryValidator::validate_phone_number(&query.phone);
    if !validation.is_valid() {
        return Json(PhoneCheckResponse {
            check: PhoneCheckState::Idle,
            exists: false,
            can_submit: false,
            invalid: Some(validation.summary()),
        });
    }

    let check = state
        .service
        .check_phone(&query.phone, query.exclude_id.as_deref())
        .await;
    let exists = check.exists && check.error.is_none();

    let mut tracker = PhoneCheckTracker::new();
    let ticket = tracker.begin(query.phone.clone());
    tracker.complete(&ticket, check);

    Json(PhoneCheckResponse {
        can_submit: tracker.can_submit(),
        check: tracker.state().clone(),
        exists,
        invalid: None,
    })
}

/// Registers a customer
pub async fn register_customer(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(draft): Json<CustomerDraft>,
) -> Result<(StatusCode, Json<RegisteredCustomer>), ApiError> {
    let customer = state.service.register_customer(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Changes a customer's phone number
pub async fn update_phone(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePhoneRequest>,
) -> Result<Json<RegisteredCustomer>, ApiError> {
    let customer = state
        .service
        .update_customer_phone(&session, &id, &request.phone)
        .await?;
    Ok(Json(customer))
}

/// Adds mistries under a contractor
///
/// 201 when every entry was stored, 207 when some failed.
pub async fn register_mistries(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(parent_id): Path<String>,
    Json(request): Json<RegisterMistriesRequest>,
) -> Result<(StatusCode, Json<BatchReportResponse>), ApiError> {
    if request.mistries.is_empty() {
        return Err(ApiError::BadRequest("at least one mistry is required".to_string()));
    }

    let report = state
        .service
        .register_mistries(&session, &parent_id, request.mistries)
        .await?;
    let status = if report.all_succeeded() {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(BatchReportResponse::from(&report))))
}
