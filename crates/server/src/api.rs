//! HTTP handlers for the ticket routing engine.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use triage_core::{
    ActivityEvent, Agent, CircuitSnapshot, IncidentStatus, IncomingTicket, MasterIncident,
    RoutedTicket, TicketAccepted,
};
use triage_ml::{baseline_urgency, UrgencyModel};
use triage_store::SharedStore;

use crate::error::ApiError;
use crate::state::AppState;

// ── Tickets ───────────────────────────────────────────────────

/// Accept a ticket and return 202 immediately; a background worker
/// classifies it and enqueues it to the processed queue.
pub async fn submit_ticket(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IncomingTicket>,
) -> Result<(StatusCode, Json<TicketAccepted>), ApiError> {
    let accepted = state.processor.submit_ticket(payload).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

#[derive(Serialize)]
pub struct BatchAccepted {
    pub accepted: Vec<TicketAccepted>,
}

/// Accept a batch of tickets; the response preserves request order.
pub async fn submit_tickets_batch(
    State(state): State<Arc<AppState>>,
    Json(payloads): Json<Vec<IncomingTicket>>,
) -> Result<(StatusCode, Json<BatchAccepted>), ApiError> {
    let accepted = state.processor.submit_tickets_batch(payloads).await?;
    Ok((StatusCode::ACCEPTED, Json(BatchAccepted { accepted })))
}

/// Pop the highest-urgency ticket; releases the assignee's capacity and
/// unlinks the ticket from its incident. 404 when the queue is empty.
pub async fn next_ticket(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RoutedTicket>, ApiError> {
    match state.processor.pop_next_ticket().await? {
        Some(ticket) => Ok(Json(ticket)),
        None => Err(ApiError::NotFound("no tickets in queue".to_string())),
    }
}

/// Peek the next ticket without removing it. 404 when empty.
pub async fn peek_ticket(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RoutedTicket>, ApiError> {
    match state.processor.queue().peek_next().await? {
        Some(ticket) => Ok(Json(ticket)),
        None => Err(ApiError::NotFound("no tickets in queue".to_string())),
    }
}

// ── Queue ─────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct QueueSize {
    pub size: usize,
}

pub async fn queue_size(State(state): State<Arc<AppState>>) -> Result<Json<QueueSize>, ApiError> {
    Ok(Json(QueueSize {
        size: state.processor.queue().len().await?,
    }))
}

pub async fn queue_snapshot(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoutedTicket>>, ApiError> {
    Ok(Json(state.processor.queue().snapshot().await?))
}

#[derive(Serialize)]
pub struct QueueCleared {
    pub status: &'static str,
    pub cleared: usize,
}

pub async fn clear_queue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueCleared>, ApiError> {
    let cleared = state.processor.clear_queue().await?;
    Ok(Json(QueueCleared {
        status: "queue cleared",
        cleared,
    }))
}

// ── Activity ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ActivityParams {
    pub limit: Option<usize>,
}

pub async fn activity(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivityParams>,
) -> Json<Vec<ActivityEvent>> {
    let limit = params.limit.unwrap_or(100).clamp(1, 200);
    Json(state.processor.activity().get_recent(limit))
}

// ── Urgency scoring (no enqueue) ──────────────────────────────

#[derive(Deserialize)]
pub struct UrgencyRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct UrgencyResponse {
    pub urgency_score: f64,
    pub is_urgent: bool,
}

/// Score text with the urgency model directly, bypassing the job queue
/// and the circuit breaker. Model failures degrade to the baseline.
pub async fn urgency_score(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UrgencyRequest>,
) -> Json<UrgencyResponse> {
    let score = match state.model.score(&payload.text).await {
        Ok(s) => s,
        Err(_) => baseline_urgency(&payload.text),
    };
    Json(UrgencyResponse {
        urgency_score: score,
        is_urgent: score >= 0.5,
    })
}

// ── Incidents ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct IncidentListParams {
    pub limit: Option<usize>,
    pub status: Option<String>,
}

pub async fn list_incidents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IncidentListParams>,
) -> Result<Json<Vec<MasterIncident>>, ApiError> {
    let status = match params.status.as_deref() {
        Some("open") => Some(IncidentStatus::Open),
        Some("resolved") => Some(IncidentStatus::Resolved),
        _ => None,
    };
    let incidents = state
        .processor
        .dedup()
        .incidents()
        .list(params.limit.unwrap_or(50), status)
        .await?;
    Ok(Json(incidents))
}

pub async fn get_incident(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MasterIncident>, ApiError> {
    match state.processor.dedup().incidents().get(&id).await? {
        Some(incident) => Ok(Json(incident)),
        None => Err(ApiError::NotFound(format!("incident {id}"))),
    }
}

pub async fn close_incident(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MasterIncident>, ApiError> {
    let incidents = state.processor.dedup().incidents();
    incidents.close(&id).await?;
    match incidents.get(&id).await? {
        Some(incident) => Ok(Json(incident)),
        None => Err(ApiError::NotFound(format!("incident {id}"))),
    }
}

// ── Agents ────────────────────────────────────────────────────

pub async fn upsert_agent(
    State(state): State<Arc<AppState>>,
    Json(agent): Json<Agent>,
) -> Result<Json<Agent>, ApiError> {
    state.processor.registry().register_agent(&agent).await?;
    Ok(Json(agent))
}

#[derive(Deserialize)]
pub struct AgentListParams {
    pub online_only: Option<bool>,
}

pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AgentListParams>,
) -> Result<Json<Vec<Agent>>, ApiError> {
    let registry = state.processor.registry();
    let agents = if params.online_only.unwrap_or(false) {
        registry.list_online_agents().await?
    } else {
        registry.list_agents().await?
    };
    Ok(Json(agents))
}

pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, ApiError> {
    match state.processor.registry().get_agent(&id).await? {
        Some(agent) => Ok(Json(agent)),
        None => Err(ApiError::NotFound(format!("agent {id}"))),
    }
}

#[derive(Serialize)]
pub struct AgentTickets {
    pub agent_id: String,
    pub ticket_ids: Vec<String>,
}

pub async fn agent_tickets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AgentTickets>, ApiError> {
    let registry = state.processor.registry();
    if registry.get_agent(&id).await?.is_none() {
        return Err(ApiError::NotFound(format!("agent {id}")));
    }
    Ok(Json(AgentTickets {
        ticket_ids: registry.tickets_for_agent(&id).await?,
        agent_id: id,
    }))
}

#[derive(Serialize)]
pub struct AssignmentPair {
    pub ticket_id: String,
    pub agent_id: String,
}

pub async fn list_assignments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AssignmentPair>>, ApiError> {
    let pairs = state.processor.registry().list_assignments(100).await?;
    Ok(Json(
        pairs
            .into_iter()
            .map(|(ticket_id, agent_id)| AssignmentPair { ticket_id, agent_id })
            .collect(),
    ))
}

#[derive(Serialize)]
pub struct ReconcileResponse {
    pub updated: usize,
}

pub async fn reconcile_loads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    Ok(Json(ReconcileResponse {
        updated: state.processor.registry().reconcile_agent_loads().await?,
    }))
}

#[derive(Serialize)]
pub struct ZeroLoadsResponse {
    pub zeroed: usize,
}

pub async fn zero_loads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ZeroLoadsResponse>, ApiError> {
    Ok(Json(ZeroLoadsResponse {
        zeroed: state.processor.registry().force_zero_all_loads().await?,
    }))
}

// ── Health & metrics ──────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub circuit_breaker: CircuitSnapshot,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = if state.store.ping().await.is_ok() {
        "connected"
    } else {
        "unreachable"
    };
    let circuit_breaker = state
        .processor
        .router()
        .circuit_snapshot()
        .await
        .unwrap_or(CircuitSnapshot {
            state: "unknown".to_string(),
            opened_at: 0.0,
            half_open_probes: 0,
        });
    Json(HealthResponse {
        status: "ok",
        version: state.version(),
        store,
        circuit_breaker,
    })
}

#[derive(Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub counters: triage_broker::metrics::MetricsSnapshot,
    pub queue_size: usize,
    pub jobs_pending: usize,
    pub jobs_dead: usize,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let processor = &state.processor;
    Json(MetricsResponse {
        counters: processor.metrics().snapshot(),
        queue_size: processor.queue().len().await.unwrap_or(0),
        jobs_pending: processor.jobs().pending_len().await.unwrap_or(0),
        jobs_dead: processor.jobs().dead_len().await.unwrap_or(0),
    })
}
