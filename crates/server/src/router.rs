//! HTTP router construction.
//!
//! Assembles all Axum routes and middleware into a single `Router`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tickets", post(api::submit_ticket))
        .route("/tickets/batch", post(api::submit_tickets_batch))
        .route("/tickets/next", get(api::next_ticket))
        .route("/tickets/peek", get(api::peek_ticket))
        .route("/queue/size", get(api::queue_size))
        .route("/queue", get(api::queue_snapshot).delete(api::clear_queue))
        .route("/activity", get(api::activity))
        .route("/urgency-score", post(api::urgency_score))
        .route("/incidents", get(api::list_incidents))
        .route("/incidents/{id}", get(api::get_incident))
        .route("/incidents/{id}/close", post(api::close_incident))
        .route("/agents", get(api::list_agents).post(api::upsert_agent))
        // Fixed segments MUST precede /agents/{id} to avoid capture.
        .route("/agents/loads/reconcile", post(api::reconcile_loads))
        .route("/agents/loads/zero", post(api::zero_loads))
        .route("/agents/{id}", get(api::get_agent))
        .route("/agents/{id}/tickets", get(api::agent_tickets))
        .route("/assignments", get(api::list_assignments))
        .route("/health", get(api::health))
        .route("/metrics", get(api::metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
