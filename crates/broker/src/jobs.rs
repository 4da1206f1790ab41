//! Durable background job queue backed by the shared store.
//!
//! Accepted tickets become one job each on the pending list; workers poll
//! it. Processing failures are retried a bounded number of times, then
//! parked on the dead-letter list with the failure reason. Delivery is
//! at-least-once across retries; a worker dying mid-job loses that
//! delivery (exactly-once is an explicit non-goal).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use triage_store::{SharedStore, StoreError};

pub const PENDING_LIST: &str = "ticket_jobs:pending";
pub const DEAD_LIST: &str = "ticket_jobs:dead";

/// One queued processing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job_id: String,
    /// Delivery attempt, starting at 1.
    pub attempt: u32,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct DeadJob {
    envelope: JobEnvelope,
    error: String,
}

#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn SharedStore>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Enqueue a payload as a fresh job. Returns the job id; the write
    /// completes before any processing starts.
    pub async fn enqueue(&self, payload: serde_json::Value) -> Result<String, StoreError> {
        let envelope = JobEnvelope {
            job_id: Uuid::new_v4().to_string(),
            attempt: 1,
            payload,
        };
        let encoded = serde_json::to_string(&envelope)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        self.store.lpush(PENDING_LIST, &encoded).await?;
        Ok(envelope.job_id)
    }

    /// Pop the next job, oldest first. Envelopes that fail to decode are
    /// dead-lettered rather than looping forever.
    pub async fn dequeue(&self) -> Result<Option<JobEnvelope>, StoreError> {
        let Some(raw) = self.store.rpop(PENDING_LIST).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<JobEnvelope>(&raw) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                warn!("undecodable job envelope: {e} — dead-lettering");
                self.store.lpush(DEAD_LIST, &raw).await?;
                Ok(None)
            }
        }
    }

    /// Put a failed job back on the pending list with a bumped attempt
    /// counter.
    pub async fn requeue(&self, mut envelope: JobEnvelope) -> Result<(), StoreError> {
        envelope.attempt += 1;
        let encoded = serde_json::to_string(&envelope)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        self.store.lpush(PENDING_LIST, &encoded).await
    }

    /// Park a job on the dead-letter list with its failure reason.
    pub async fn dead_letter(&self, envelope: JobEnvelope, error: &str) -> Result<(), StoreError> {
        let dead = DeadJob {
            envelope,
            error: error.to_string(),
        };
        let encoded = serde_json::to_string(&dead)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        self.store.lpush(DEAD_LIST, &encoded).await
    }

    pub async fn pending_len(&self) -> Result<usize, StoreError> {
        self.store.llen(PENDING_LIST).await
    }

    pub async fn dead_len(&self) -> Result<usize, StoreError> {
        self.store.llen(DEAD_LIST).await
    }
}

#[cfg(test)]
mod tests {
    use triage_store::MemoryStore;

    use super::*;

    fn jobs() -> JobQueue {
        JobQueue::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn enqueue_dequeue_round_trip() {
        let q = jobs();
        let payload = serde_json::json!({"ticket_id": "T-1"});
        let job_id = q.enqueue(payload.clone()).await.unwrap();
        assert!(!job_id.is_empty());

        let envelope = q.dequeue().await.unwrap().unwrap();
        assert_eq!(envelope.job_id, job_id);
        assert_eq!(envelope.attempt, 1);
        assert_eq!(envelope.payload, payload);
        assert!(q.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn jobs_dequeue_oldest_first() {
        let q = jobs();
        q.enqueue(serde_json::json!({"n": 1})).await.unwrap();
        q.enqueue(serde_json::json!({"n": 2})).await.unwrap();
        assert_eq!(q.dequeue().await.unwrap().unwrap().payload["n"], 1);
        assert_eq!(q.dequeue().await.unwrap().unwrap().payload["n"], 2);
    }

    #[tokio::test]
    async fn requeue_bumps_attempt() {
        let q = jobs();
        q.enqueue(serde_json::json!({})).await.unwrap();
        let envelope = q.dequeue().await.unwrap().unwrap();
        q.requeue(envelope).await.unwrap();
        let envelope = q.dequeue().await.unwrap().unwrap();
        assert_eq!(envelope.attempt, 2);
    }

    #[tokio::test]
    async fn dead_letter_moves_job_off_pending() {
        let q = jobs();
        q.enqueue(serde_json::json!({})).await.unwrap();
        let envelope = q.dequeue().await.unwrap().unwrap();
        q.dead_letter(envelope, "boom").await.unwrap();
        assert_eq!(q.pending_len().await.unwrap(), 0);
        assert_eq!(q.dead_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn undecodable_envelope_is_dead_lettered() {
        let store = Arc::new(MemoryStore::new());
        let q = JobQueue::new(store.clone());
        store.lpush(PENDING_LIST, "not json").await.unwrap();
        assert!(q.dequeue().await.unwrap().is_none());
        assert_eq!(q.dead_len().await.unwrap(), 1);
    }
}
