//! Urgency-ordered queue of processed tickets.
//!
//! Sorted set keyed by the JSON-encoded routed ticket with score =
//! `urgency_score`, so pop-max hands out the most urgent ticket first.
//! Resubmitting the same ticket with identical fields produces the same
//! member and only replaces its score. Tie order among equal scores is
//! store-determined; nothing may rely on it.

use std::sync::Arc;

use triage_core::RoutedTicket;
use triage_store::{SharedStore, StoreError};

pub const PROCESSED_ZSET: &str = "ticket_queue:processed";

#[derive(Clone)]
pub struct ProcessedQueue {
    store: Arc<dyn SharedStore>,
}

impl ProcessedQueue {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Add a processed ticket. Score = urgency_score (higher pops first).
    pub async fn add_processed(&self, routed: &RoutedTicket) -> Result<(), StoreError> {
        let member = serde_json::to_string(routed)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        self.store
            .zadd(PROCESSED_ZSET, &member, routed.urgency_score)
            .await
    }

    /// Atomically pop the highest-urgency ticket. None when empty.
    pub async fn pop_next(&self) -> Result<Option<RoutedTicket>, StoreError> {
        match self.store.zpop_max(PROCESSED_ZSET).await? {
            Some((member, _)) => Ok(Some(
                serde_json::from_str(&member).map_err(|e| StoreError::Parse(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Read the highest-urgency ticket without removing it.
    pub async fn peek_next(&self) -> Result<Option<RoutedTicket>, StoreError> {
        let top = self.store.zrevrange_all(PROCESSED_ZSET).await?;
        match top.first() {
            Some(member) => Ok(Some(
                serde_json::from_str(member).map_err(|e| StoreError::Parse(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Number of tickets ready to dequeue.
    pub async fn len(&self) -> Result<usize, StoreError> {
        self.store.zcard(PROCESSED_ZSET).await
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// All processed tickets in priority order (highest urgency first).
    pub async fn snapshot(&self) -> Result<Vec<RoutedTicket>, StoreError> {
        let members = self.store.zrevrange_all(PROCESSED_ZSET).await?;
        members
            .iter()
            .map(|m| serde_json::from_str(m).map_err(|e| StoreError::Parse(e.to_string())))
            .collect()
    }

    /// Delete the queue.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.del(PROCESSED_ZSET).await
    }
}

#[cfg(test)]
mod tests {
    use triage_core::{IncomingTicket, TicketCategory};
    use triage_store::MemoryStore;

    use super::*;

    fn queue() -> ProcessedQueue {
        ProcessedQueue::new(Arc::new(MemoryStore::new()))
    }

    fn routed(id: &str, score: f64) -> RoutedTicket {
        RoutedTicket::from_scored(
            IncomingTicket {
                ticket_id: id.to_string(),
                subject: "s".into(),
                body: "b".into(),
                customer_id: None,
            },
            TicketCategory::Technical,
            score,
        )
    }

    #[tokio::test]
    async fn pop_order_is_urgency_descending() {
        let q = queue();
        q.add_processed(&routed("low", 0.2)).await.unwrap();
        q.add_processed(&routed("high", 0.9)).await.unwrap();
        q.add_processed(&routed("mid", 0.5)).await.unwrap();

        let mut last = f64::INFINITY;
        let mut popped = Vec::new();
        while let Some(rt) = q.pop_next().await.unwrap() {
            assert!(rt.urgency_score <= last, "pop sequence must be non-increasing");
            last = rt.urgency_score;
            popped.push(rt.ticket_id);
        }
        assert_eq!(popped, vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn peek_does_not_remove() {
        let q = queue();
        q.add_processed(&routed("only", 0.7)).await.unwrap();
        assert_eq!(q.peek_next().await.unwrap().unwrap().ticket_id, "only");
        assert_eq!(q.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_queue_pops_none() {
        let q = queue();
        assert!(q.pop_next().await.unwrap().is_none());
        assert!(q.peek_next().await.unwrap().is_none());
        assert!(q.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn identical_resubmission_replaces_entry() {
        let q = queue();
        let rt = routed("dup", 0.4);
        q.add_processed(&rt).await.unwrap();
        q.add_processed(&rt).await.unwrap();
        assert_eq!(q.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_priority_ordered() {
        let q = queue();
        q.add_processed(&routed("a", 0.1)).await.unwrap();
        q.add_processed(&routed("b", 0.8)).await.unwrap();
        let snapshot = q.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].ticket_id, "b");
        assert_eq!(q.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn clear_empties_queue() {
        let q = queue();
        q.add_processed(&routed("a", 0.1)).await.unwrap();
        q.clear().await.unwrap();
        assert!(q.is_empty().await.unwrap());
    }
}
