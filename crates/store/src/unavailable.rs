//! Placeholder backend used when the store cannot be reached at startup.
//!
//! Every operation fails with a connection error, so submission endpoints
//! answer 503 and health reports the store unreachable instead of the
//! process crashing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::traits::SharedStore;

#[derive(Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    pub fn new() -> Self {
        Self
    }

    fn err() -> StoreError {
        StoreError::Connection("shared store unavailable".to_string())
    }
}

#[async_trait]
impl SharedStore for UnavailableStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(Self::err())
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn del(&self, _key: &str) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn mget(&self, _keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        Err(Self::err())
    }

    async fn incr(&self, _key: &str) -> Result<i64, StoreError> {
        Err(Self::err())
    }

    async fn hset_all(&self, _key: &str, _fields: &[(String, String)]) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn hgetall(&self, _key: &str) -> Result<HashMap<String, String>, StoreError> {
        Err(Self::err())
    }

    async fn sadd(&self, _key: &str, _member: &str) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn srem(&self, _key: &str, _member: &str) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn smembers(&self, _key: &str) -> Result<Vec<String>, StoreError> {
        Err(Self::err())
    }

    async fn scard(&self, _key: &str) -> Result<usize, StoreError> {
        Err(Self::err())
    }

    async fn zadd(&self, _key: &str, _member: &str, _score: f64) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn zrem(&self, _key: &str, _member: &str) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn zpop_max(&self, _key: &str) -> Result<Option<(String, f64)>, StoreError> {
        Err(Self::err())
    }

    async fn zrevrange_all(&self, _key: &str) -> Result<Vec<String>, StoreError> {
        Err(Self::err())
    }

    async fn zrangebyscore(
        &self,
        _key: &str,
        _min: f64,
        _max: f64,
    ) -> Result<Vec<String>, StoreError> {
        Err(Self::err())
    }

    async fn zremrangebyscore(&self, _key: &str, _min: f64, _max: f64) -> Result<u64, StoreError> {
        Err(Self::err())
    }

    async fn zcard(&self, _key: &str) -> Result<usize, StoreError> {
        Err(Self::err())
    }

    async fn lpush(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn rpop(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(Self::err())
    }

    async fn llen(&self, _key: &str) -> Result<usize, StoreError> {
        Err(Self::err())
    }

    async fn scan_match(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
        Err(Self::err())
    }

    async fn publish(&self, _channel: &str, _payload: &str) -> Result<(), StoreError> {
        Err(Self::err())
    }

    async fn subscribe(&self, _channel: &str) -> Result<mpsc::Receiver<String>, StoreError> {
        Err(Self::err())
    }
}
