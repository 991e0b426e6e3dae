//! HTTP API Layer
//!
//! This crate exposes the registry over REST using Axum: live identifier
//! previews, advisory phone checks, sequence lookups and the registration
//! operations themselves.
//!
//! # Architecture
//!
//! - **Handlers**: thin wrappers around [`RegistrationService`]
//! - **Middleware**: JWT authentication (yielding a `Session`), audit logging
//! - **DTOs**: request/response bodies that are not domain types already
//! - **Error Handling**: registry errors mapped to status codes, keeping the
//!   field and user message
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let service = RegistrationService::new(store);
//! let app = create_router(service, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use domain_registry::RegistrationService;

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{customers, health, orders};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: RegistrationService,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// Health endpoints are public; everything under `/api/v1` needs a bearer
/// token.
pub fn create_router(service: RegistrationService, config: ApiConfig) -> Router {
    let state = AppState { service, config };

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let customer_routes = Router::new()
        .route("/", post(customers::register_customer))
        .route("/preview-id", post(customers::preview_id))
        .route("/phone-check", get(customers::check_phone))
        .route("/:id/phone", put(customers::update_phone))
        .route("/:id/mistries", post(customers::register_mistries));

    let api_routes = Router::new()
        .nest("/customers", customer_routes)
        .route("/sequence", get(orders::get_sequence))
        .route("/sites/preview-id", post(orders::preview_site_id))
        .route("/orders", post(orders::create_order))
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
