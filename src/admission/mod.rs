//! The admission and mutation pipelines
//!
//! The gateway consults this service synchronously on every network and
//! tenant-config create/update. Each request is parsed, validated by an
//! ordered predicate chain, optionally enriched with computed defaults and
//! tenant bindings, and answered with either a rejection reason or a
//! JSON-Patch mutation.

pub mod binder;
pub mod dispatch;
pub mod endpoints;
pub mod network;
pub mod patch;
pub mod tenant_config;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;

use crate::client::DanmClient;

/// Shared state for the admission handlers
pub struct WebhookState {
    /// CRD client for endpoint listing and tenant-config persistence
    pub client: Arc<dyn DanmClient>,
}

impl WebhookState {
    /// Create the shared handler state around a CRD client
    pub fn new(client: Arc<dyn DanmClient>) -> Self {
        Self { client }
    }
}

/// Create the admission router with both validation endpoints
///
/// - `POST /netvalidation` — ClusterNetwork / TenantNetwork / DanmNet
/// - `POST /confvalidation` — TenantConfig
pub fn admission_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/netvalidation", post(dispatch::validate_network_handler))
        .route("/confvalidation", post(dispatch::validate_tenant_config_handler))
        .with_state(state)
}
