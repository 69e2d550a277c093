//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Every endpoint is scoped to one organization and delegates to the
//! [`Orchestrator`].

pub mod error;
pub mod health;
pub mod instance;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::Orchestrator;

/// Shared handler state
pub type AppState = Arc<Orchestrator>;

/// Create the main API router with all endpoints
pub fn create_router(orchestrator: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Instance endpoints
        .route(
            "/instance/{org_id}",
            get(instance::get_instance).post(instance::create_instance),
        )
        .route(
            "/instance/{org_id}/default",
            post(instance::ensure_default_instance),
        )
        .route("/instance/{org_id}/config", put(instance::update_config))
        .route("/instance/{org_id}/versions", get(instance::list_versions))
        .route("/instance/{org_id}/ports", get(instance::configured_ports))
        // Lifecycle endpoints
        .route("/instance/{org_id}/start", post(instance::start_instance))
        .route("/instance/{org_id}/stop", post(instance::stop_instance))
        .route("/instance/{org_id}/status", get(instance::instance_status))
        // Add state and middleware
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
}
