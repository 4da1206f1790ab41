//! The coordination heart: accept-side submission and per-job worker
//! execution.
//!
//! `process_ticket` runs classify → score → embed → dedup → enqueue →
//! route → events → webhooks for one job. Acceptance order does not
//! determine processing order; dequeue order is strict urgency-descending.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use triage_agent::{AgentError, AgentRegistry};
use triage_core::{IncomingTicket, RoutedTicket, TicketAccepted};
use triage_dedup::{DedupEngine, DedupError};
use triage_ml::{embed_ticket, match_category, Embedder, EmbeddingError, ModelRouter};
use triage_notify::WebhookNotifier;
use triage_store::StoreError;

use crate::activity::ActivityBus;
use crate::jobs::JobQueue;
use crate::metrics::BrokerMetrics;
use crate::queue::ProcessedQueue;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The payload is not a valid ticket; the job fails without retry.
    #[error("invalid ticket payload: {0}")]
    InvalidPayload(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("dedup error: {0}")]
    Dedup(#[from] DedupError),

    #[error("agent registry error: {0}")]
    Agent(#[from] AgentError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl PipelineError {
    /// Permanent failures skip the retry discipline.
    pub fn is_permanent(&self) -> bool {
        matches!(self, PipelineError::InvalidPayload(_))
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Owns every collaborator a worker needs to process one ticket job, plus
/// the pop-side and queue-clear orchestration the API surface calls into.
pub struct TicketProcessor {
    queue: ProcessedQueue,
    jobs: JobQueue,
    dedup: DedupEngine,
    registry: AgentRegistry,
    router: Arc<ModelRouter>,
    embedder: Arc<dyn Embedder>,
    notifier: WebhookNotifier,
    activity: Arc<ActivityBus>,
    metrics: Arc<BrokerMetrics>,
}

impl TicketProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: ProcessedQueue,
        jobs: JobQueue,
        dedup: DedupEngine,
        registry: AgentRegistry,
        router: Arc<ModelRouter>,
        embedder: Arc<dyn Embedder>,
        notifier: WebhookNotifier,
        activity: Arc<ActivityBus>,
        metrics: Arc<BrokerMetrics>,
    ) -> Self {
        Self {
            queue,
            jobs,
            dedup,
            registry,
            router,
            embedder,
            notifier,
            activity,
            metrics,
        }
    }

    pub fn queue(&self) -> &ProcessedQueue {
        &self.queue
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    pub fn dedup(&self) -> &DedupEngine {
        &self.dedup
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn activity(&self) -> &Arc<ActivityBus> {
        &self.activity
    }

    pub fn metrics(&self) -> &Arc<BrokerMetrics> {
        &self.metrics
    }

    // ── Accept side ──────────────────────────────────────────

    /// Accept a ticket: enqueue exactly one background job and return
    /// before any ML work happens (write-then-ack).
    pub async fn submit_ticket(
        &self,
        payload: IncomingTicket,
    ) -> Result<TicketAccepted, StoreError> {
        let ticket_id = payload.ticket_id.clone();
        let value = serde_json::to_value(&payload)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        let job_id = self.jobs.enqueue(value).await?;
        self.activity
            .emit("ticket_accepted", serde_json::json!({ "ticket_id": ticket_id }));
        BrokerMetrics::incr(&self.metrics.accepted);
        Ok(TicketAccepted {
            ticket_id,
            job_id,
            message: "Accepted for processing".to_string(),
        })
    }

    /// Accept a batch; results are in request order.
    pub async fn submit_tickets_batch(
        &self,
        payloads: Vec<IncomingTicket>,
    ) -> Result<Vec<TicketAccepted>, StoreError> {
        let mut accepted = Vec::with_capacity(payloads.len());
        for payload in payloads {
            accepted.push(self.submit_ticket(payload).await?);
        }
        Ok(accepted)
    }

    // ── Worker side ──────────────────────────────────────────

    /// Process one job payload end-to-end.
    pub async fn process_ticket(&self, payload: &serde_json::Value) -> Result<(), PipelineError> {
        let ticket: IncomingTicket = serde_json::from_value(payload.clone())
            .map_err(|e| PipelineError::InvalidPayload(e.to_string()))?;
        info!(ticket_id = %ticket.ticket_id, "processing ticket");

        let text = ticket.full_text();
        let category = match_category(&text);
        let urgency = self.router.score_urgency(&text).await;
        let routed = RoutedTicket::from_scored(ticket, category, urgency);

        let embedding =
            embed_ticket(self.embedder.as_ref(), &routed.subject, &routed.body).await?;
        let outcome = self.dedup.check_and_record(&routed, &embedding).await?;

        // Always queued, flood or not.
        self.queue.add_processed(&routed).await?;

        if let Some(agent_id) = self.registry.route_ticket(&routed).await? {
            self.registry
                .assign_ticket_to_agent(&routed.ticket_id, &agent_id)
                .await?;
            self.activity
                .publish_event(
                    "ticket_assigned_to_agent",
                    serde_json::json!({
                        "ticket_id": routed.ticket_id,
                        "agent_id": agent_id,
                    }),
                )
                .await;
        }

        info!(
            ticket_id = %routed.ticket_id,
            urgency = routed.urgency_score,
            category = %routed.category,
            "ticket added to queue"
        );

        match &outcome.incident_id {
            Some(incident_id) if outcome.is_master => {
                self.activity
                    .publish_event(
                        "ticket_linked_to_master_incident",
                        serde_json::json!({
                            "ticket_id": routed.ticket_id,
                            "incident_id": incident_id,
                            "urgency_score": round3(routed.urgency_score),
                            "category": routed.category,
                        }),
                    )
                    .await;
                if outcome.created_new {
                    BrokerMetrics::incr(&self.metrics.incidents_created);
                    if let Some(incident) = self.dedup.incidents().get(incident_id).await? {
                        self.activity
                            .publish_event(
                                "master_incident_created",
                                serde_json::json!({
                                    "incident_id": incident.incident_id,
                                    "summary": incident.summary,
                                    "root_ticket_id": incident.root_ticket_id,
                                    "ticket_count": incident.ticket_ids.len(),
                                }),
                            )
                            .await;
                        if self.notifier.trigger_master_incident(&incident) {
                            BrokerMetrics::incr(&self.metrics.webhooks_fired);
                        }
                    }
                }
            }
            _ => {
                self.activity
                    .publish_event(
                        "ticket_processed",
                        serde_json::json!({
                            "ticket_id": routed.ticket_id,
                            "urgency_score": round3(routed.urgency_score),
                            "category": routed.category,
                            "is_urgent": routed.is_urgent,
                        }),
                    )
                    .await;
            }
        }

        if !outcome.suppress_individual_alert && self.notifier.trigger_high_urgency(&routed) {
            BrokerMetrics::incr(&self.metrics.webhooks_fired);
        }

        BrokerMetrics::incr(&self.metrics.processed);
        Ok(())
    }

    // ── Pop side ─────────────────────────────────────────────

    /// Pop the highest-urgency ticket, releasing the assignee's capacity
    /// and unlinking the ticket from its incident (resolving an emptied
    /// incident).
    pub async fn pop_next_ticket(&self) -> Result<Option<RoutedTicket>, PipelineError> {
        let Some(routed) = self.queue.pop_next().await? else {
            return Ok(None);
        };
        self.registry
            .release_ticket_from_agent(&routed.ticket_id)
            .await?;
        self.dedup
            .incidents()
            .remove_ticket(&routed.ticket_id)
            .await?;
        self.activity.emit(
            "ticket_popped",
            serde_json::json!({
                "ticket_id": routed.ticket_id,
                "urgency_score": round3(routed.urgency_score),
            }),
        );
        BrokerMetrics::incr(&self.metrics.popped);
        Ok(Some(routed))
    }

    /// Clear the queue: unlink every queued ticket from its incident,
    /// delete the queue, then force all agent loads to zero. Returns the
    /// number of tickets cleared.
    pub async fn clear_queue(&self) -> Result<usize, PipelineError> {
        let snapshot = self.queue.snapshot().await?;
        for routed in &snapshot {
            self.dedup.incidents().remove_ticket(&routed.ticket_id).await?;
        }
        self.queue.clear().await?;
        self.registry.force_zero_all_loads().await?;
        self.activity.emit(
            "queue_cleared",
            serde_json::json!({ "cleared": snapshot.len() }),
        );
        Ok(snapshot.len())
    }
}
