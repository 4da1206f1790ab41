//! In-process backend for the shared store.
//!
//! Implements the full [`SharedStore`] contract over mutex-guarded maps.
//! Used by unit tests and by local runs without a Redis server
//! (`STORE_BACKEND=memory`). Not durable; single-process only.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::StoreError;
use crate::traits::SharedStore;

#[derive(Default)]
struct Inner {
    strings: HashMap<String, (String, Option<Instant>)>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, std::collections::BTreeSet<String>>,
    zsets: HashMap<String, HashMap<String, f64>>,
    lists: HashMap<String, VecDeque<String>>,
}

impl Inner {
    /// Lazy TTL expiry for string keys.
    fn live_string(&mut self, key: &str) -> Option<String> {
        match self.strings.get(key) {
            Some((_, Some(deadline))) if *deadline <= Instant::now() => {
                self.strings.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .clone()
    }
}

fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().unwrap().live_string(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .strings
            .insert(key.to_string(), (value.to_string(), None));
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        let deadline = Instant::now() + std::time::Duration::from_secs(ttl_seconds);
        self.inner
            .lock()
            .unwrap()
            .strings
            .insert(key.to_string(), (value.to_string(), Some(deadline)));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.strings.remove(key);
        inner.hashes.remove(key);
        inner.sets.remove(key);
        inner.zsets.remove(key);
        inner.lists.remove(key);
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(keys.iter().map(|k| inner.live_string(k)).collect())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let current = match inner.live_string(key) {
            Some(v) => v
                .parse::<i64>()
                .map_err(|_| StoreError::Parse(format!("{key} is not an integer")))?,
            None => 0,
        };
        let next = current + 1;
        inner
            .strings
            .insert(key.to_string(), (next.to_string(), None));
        Ok(next)
    }

    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let hash = inner.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(set) = self.inner.lock().unwrap().sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scard(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sets
            .get(key)
            .map(|s| s.len())
            .unwrap_or(0))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(zset) = self.inner.lock().unwrap().zsets.get_mut(key) {
            zset.remove(member);
        }
        Ok(())
    }

    async fn zpop_max(&self, key: &str) -> Result<Option<(String, f64)>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(zset) = inner.zsets.get_mut(key) else {
            return Ok(None);
        };
        let best = zset
            .iter()
            .max_by(|(ma, sa), (mb, sb)| {
                sa.partial_cmp(sb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| ma.cmp(mb))
            })
            .map(|(m, s)| (m.clone(), *s));
        if let Some((member, _)) = &best {
            zset.remove(member);
        }
        Ok(best)
    }

    async fn zrevrange_all(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(zset) = inner.zsets.get(key) else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<(&String, &f64)> = zset.iter().collect();
        entries.sort_by(|(ma, sa), (mb, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| mb.cmp(ma))
        });
        Ok(entries.into_iter().map(|(m, _)| m.clone()).collect())
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(zset) = inner.zsets.get(key) else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<(&String, &f64)> = zset
            .iter()
            .filter(|(_, s)| **s >= min && **s <= max)
            .collect();
        entries.sort_by(|(ma, sa), (mb, sb)| {
            sa.partial_cmp(sb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ma.cmp(mb))
        });
        Ok(entries.into_iter().map(|(m, _)| m.clone()).collect())
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(zset) = inner.zsets.get_mut(key) else {
            return Ok(0);
        };
        let doomed: Vec<String> = zset
            .iter()
            .filter(|(_, s)| **s >= min && **s <= max)
            .map(|(m, _)| m.clone())
            .collect();
        for member in &doomed {
            zset.remove(member);
        }
        Ok(doomed.len() as u64)
    }

    async fn zcard(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .zsets
            .get(key)
            .map(|z| z.len())
            .unwrap_or(0))
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lists
            .get_mut(key)
            .and_then(|l| l.pop_back()))
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lists
            .get(key)
            .map(|l| l.len())
            .unwrap_or(0))
    }

    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner
            .strings
            .retain(|_, (_, ttl)| ttl.map(|d| d > now).unwrap_or(true));
        let mut keys: Vec<String> = Vec::new();
        keys.extend(inner.strings.keys().cloned());
        keys.extend(inner.hashes.keys().cloned());
        keys.extend(inner.sets.keys().cloned());
        keys.extend(inner.zsets.keys().cloned());
        keys.extend(inner.lists.keys().cloned());
        keys.retain(|k| pattern_matches(pattern, k));
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        // No subscribers is not an error, matching Redis semantics.
        let _ = self.sender_for(channel).send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, StoreError> {
        let mut broadcast_rx = self.sender_for(channel).subscribe();
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn string_set_get_del() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.del("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_ex_expires() {
        let store = MemoryStore::new();
        store.set_ex("k", "v", 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_is_sequential() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("n").await.unwrap(), 1);
        assert_eq!(store.incr("n").await.unwrap(), 2);
        assert_eq!(store.incr("n").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn mget_preserves_positions() {
        let store = MemoryStore::new();
        store.set("a", "1").await.unwrap();
        store.set("c", "3").await.unwrap();
        let got = store
            .mget(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(got, vec![Some("1".into()), None, Some("3".into())]);
    }

    #[tokio::test]
    async fn zpop_max_returns_highest_score() {
        let store = MemoryStore::new();
        store.zadd("z", "low", 0.1).await.unwrap();
        store.zadd("z", "high", 0.9).await.unwrap();
        store.zadd("z", "mid", 0.5).await.unwrap();
        assert_eq!(
            store.zpop_max("z").await.unwrap(),
            Some(("high".into(), 0.9))
        );
        assert_eq!(store.zpop_max("z").await.unwrap(), Some(("mid".into(), 0.5)));
        assert_eq!(store.zpop_max("z").await.unwrap(), Some(("low".into(), 0.1)));
        assert_eq!(store.zpop_max("z").await.unwrap(), None);
    }

    #[tokio::test]
    async fn zadd_same_member_replaces_score() {
        let store = MemoryStore::new();
        store.zadd("z", "m", 0.2).await.unwrap();
        store.zadd("z", "m", 0.8).await.unwrap();
        assert_eq!(store.zcard("z").await.unwrap(), 1);
        assert_eq!(store.zpop_max("z").await.unwrap(), Some(("m".into(), 0.8)));
    }

    #[tokio::test]
    async fn zremrangebyscore_prunes_old_entries() {
        let store = MemoryStore::new();
        store.zadd("w", "old", 10.0).await.unwrap();
        store.zadd("w", "new", 100.0).await.unwrap();
        let removed = store
            .zremrangebyscore("w", f64::NEG_INFINITY, 50.0)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.zrangebyscore("w", 0.0, 1000.0).await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn list_push_pop_fifo() {
        let store = MemoryStore::new();
        store.lpush("q", "first").await.unwrap();
        store.lpush("q", "second").await.unwrap();
        assert_eq!(store.llen("q").await.unwrap(), 2);
        assert_eq!(store.rpop("q").await.unwrap().as_deref(), Some("first"));
        assert_eq!(store.rpop("q").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.rpop("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_match_prefix() {
        let store = MemoryStore::new();
        store.set("agent:a", "{}").await.unwrap();
        store.set("agent:b", "{}").await.unwrap();
        store.set("ticket:1", "{}").await.unwrap();
        let keys = store.scan_match("agent:*").await.unwrap();
        assert_eq!(keys, vec!["agent:a", "agent:b"]);
    }

    #[tokio::test]
    async fn pubsub_delivers_to_subscriber() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe("events").await.unwrap();
        store.publish("events", "hello").await.unwrap();
        let got = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("hello"));
    }
}
