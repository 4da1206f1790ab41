//! The shared store contract.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// Key-value + sorted-set + pub/sub primitives used by every component.
///
/// All operations are atomic per key. Backends are expected to be cheap to
/// call concurrently from many worker tasks; implementations hold no locks
/// across awaits.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Connectivity probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;

    // ── Strings ──────────────────────────────────────────────

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Set with a time-to-live in seconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// Pipelined batched read; result positions match `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Atomic increment; missing keys start at 0.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    // ── Hashes ───────────────────────────────────────────────

    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    // ── Sets ─────────────────────────────────────────────────

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn scard(&self, key: &str) -> Result<usize, StoreError>;

    // ── Sorted sets ──────────────────────────────────────────

    /// Add or update a member; re-adding an existing member replaces its
    /// score.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;

    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Atomically remove and return the member with the maximum score.
    /// Tie order among equal scores is backend-determined.
    async fn zpop_max(&self, key: &str) -> Result<Option<(String, f64)>, StoreError>;

    /// All members in descending score order.
    async fn zrevrange_all(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Members with `min ≤ score ≤ max`, ascending.
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>, StoreError>;

    /// Remove members with `min ≤ score ≤ max`; returns removed count.
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError>;

    async fn zcard(&self, key: &str) -> Result<usize, StoreError>;

    // ── Lists (durable job queue) ────────────────────────────

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Non-blocking pop from the tail. Job consumers poll this in a loop.
    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn llen(&self, key: &str) -> Result<usize, StoreError>;

    // ── Key scan ─────────────────────────────────────────────

    /// Keys matching a `prefix*` pattern (or an exact key).
    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    // ── Pub/sub ──────────────────────────────────────────────

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError>;

    /// Subscribe to a channel. The backend forwards raw payloads into the
    /// returned receiver from a background task and is responsible for
    /// reconnecting on transient failures.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, StoreError>;
}
