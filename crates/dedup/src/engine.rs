//! Sliding-window flash-flood detection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use triage_core::config::DedupConfig;
use triage_core::{unix_now, RoutedTicket, TicketCategory};
use triage_ml::cosine_similarity;
use triage_store::SharedStore;

use crate::incidents::IncidentRepo;
use crate::{DedupError, DEDUP_META_PREFIX, DEDUP_WINDOW_ZSET};

/// Meta TTL slack past the window horizon, so entries outlive the window
/// slightly rather than expiring under a pending similarity scan.
const META_TTL_SLACK_SECONDS: u64 = 10;

/// Result of recording a ticket against the dedup window.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub is_master: bool,
    pub incident_id: Option<String>,
    pub suppress_individual_alert: bool,
    pub created_new: bool,
}

impl DedupOutcome {
    fn none() -> Self {
        Self {
            is_master: false,
            incident_id: None,
            suppress_individual_alert: false,
            created_new: false,
        }
    }
}

/// Side metadata stored per window entry.
#[derive(Debug, Serialize, Deserialize)]
struct WindowMeta {
    embedding: Vec<f32>,
    category: TicketCategory,
    urgency_score: f64,
    subject: String,
}

#[derive(Clone)]
pub struct DedupEngine {
    store: Arc<dyn SharedStore>,
    incidents: IncidentRepo,
    config: DedupConfig,
}

impl DedupEngine {
    pub fn new(store: Arc<dyn SharedStore>, config: DedupConfig) -> Self {
        let incidents = IncidentRepo::new(store.clone());
        Self { store, incidents, config }
    }

    pub fn incidents(&self) -> &IncidentRepo {
        &self.incidents
    }

    /// Record the ticket in the sliding window and check for a
    /// flash-flood.
    ///
    /// A flood fires only when strictly more than `min_count` in-window
    /// tickets (including this one) are similar above the threshold.
    /// Every trigger creates a fresh incident; overlapping concurrent
    /// triggers may double-create, with the reverse map last-write-wins.
    pub async fn check_and_record(
        &self,
        routed: &RoutedTicket,
        embedding: &[f32],
    ) -> Result<DedupOutcome, DedupError> {
        let now = unix_now();
        let window = self.config.window_seconds as f64;
        let ticket_id = &routed.ticket_id;

        let meta = WindowMeta {
            embedding: embedding.to_vec(),
            category: routed.category,
            urgency_score: routed.urgency_score,
            subject: routed.subject.clone(),
        };
        self.store.zadd(DEDUP_WINDOW_ZSET, ticket_id, now).await?;
        self.store
            .set_ex(
                &format!("{DEDUP_META_PREFIX}{ticket_id}"),
                &serde_json::to_string(&meta)?,
                self.config.window_seconds + META_TTL_SLACK_SECONDS,
            )
            .await?;
        self.store
            .zremrangebyscore(DEDUP_WINDOW_ZSET, f64::NEG_INFINITY, now - window)
            .await?;

        let similar = self.similar_ticket_ids(embedding, now).await?;
        if similar.len() <= self.config.min_count {
            debug!(
                ticket_id = %ticket_id,
                similar = similar.len(),
                "below flash-flood threshold"
            );
            return Ok(DedupOutcome::none());
        }

        // Flash-flood detected: always allocate a fresh incident and link
        // every similar ticket plus this one.
        let summary = if routed.subject.trim().is_empty() {
            format!("Incident (root: {ticket_id})")
        } else {
            routed.subject.clone()
        };
        let incident_id = self
            .incidents
            .create(ticket_id, &summary, &similar, now)
            .await?;
        self.incidents.link(&incident_id, ticket_id).await?;

        Ok(DedupOutcome {
            is_master: true,
            incident_id: Some(incident_id),
            suppress_individual_alert: true,
            created_new: true,
        })
    }

    /// Ticket ids in the current window whose embedding similarity to
    /// `embedding` exceeds the threshold. Metas are fetched with one
    /// batched read; expired or unparseable metas are skipped.
    async fn similar_ticket_ids(
        &self,
        embedding: &[f32],
        now: f64,
    ) -> Result<Vec<String>, DedupError> {
        let start = now - self.config.window_seconds as f64;
        let ticket_ids = self
            .store
            .zrangebyscore(DEDUP_WINDOW_ZSET, start, now)
            .await?;
        let meta_keys: Vec<String> = ticket_ids
            .iter()
            .map(|tid| format!("{DEDUP_META_PREFIX}{tid}"))
            .collect();
        let metas = self.store.mget(&meta_keys).await?;

        let mut similar = Vec::new();
        for (tid, raw) in ticket_ids.into_iter().zip(metas) {
            let Some(raw) = raw else { continue };
            let Ok(meta) = serde_json::from_str::<WindowMeta>(&raw) else {
                continue;
            };
            if cosine_similarity(embedding, &meta.embedding) > self.config.similarity_threshold {
                similar.push(tid);
            }
        }
        Ok(similar)
    }
}
