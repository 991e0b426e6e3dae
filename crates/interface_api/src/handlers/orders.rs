//! Sequence, site and order handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::Session;
use domain_registry::{CreatedOrder, OrderDraft, SequenceCounts, SitePreview};

use crate::dto::orders::*;
use crate::{error::ApiError, AppState};

/// Next site and order numbers for the caller in a city
pub async fn get_sequence(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<SequenceQuery>,
) -> Result<Json<SequenceCounts>, ApiError> {
    let counts = state
        .service
        .preview_sequence(
            &session,
            &query.city,
            query.contractor_id.as_deref(),
            query.address.as_deref(),
        )
        .await?;
    Ok(Json(counts))
}

/// Site and order ids the next order would receive
pub async fn preview_site_id(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<SitePreviewRequest>,
) -> Result<Json<SitePreview>, ApiError> {
    let preview = state
        .service
        .preview_site_order(
            &session,
            &request.city,
            request.contractor_id.as_deref(),
            request.delivery_address.as_deref(),
        )
        .await?;
    Ok(Json(preview))
}

/// Creates an order, and its site when the address is new
pub async fn create_order(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<CreatedOrder>), ApiError> {
    let created = state.service.create_site_order(&session, draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
