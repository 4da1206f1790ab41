//! Semantic deduplication: sliding-window cosine similarity and Master
//! Incident creation.
//!
//! When strictly more than `min_count` tickets inside the rolling window
//! score pairwise similarity above the threshold, a flash-flood is
//! detected: a fresh Master Incident is created and individual alerts for
//! the flood are suppressed.

pub mod engine;
pub mod incidents;

pub use engine::{DedupEngine, DedupOutcome};
pub use incidents::IncidentRepo;

use thiserror::Error;
use triage_store::StoreError;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("incident not found: {0}")]
    IncidentNotFound(String),
}

pub(crate) const DEDUP_WINDOW_ZSET: &str = "dedup:window";
pub(crate) const DEDUP_META_PREFIX: &str = "dedup:meta:";
pub(crate) const INCIDENT_NEXT_ID: &str = "incident:next_id";
pub(crate) const INCIDENT_PREFIX: &str = "incident:";
pub(crate) const INCIDENT_TICKETS_PREFIX: &str = "incident_tickets:";
pub(crate) const TICKET_INCIDENT_PREFIX: &str = "ticket_incident:";
