//! Model router with a shared-store circuit breaker.
//!
//! Routes urgency scoring to the configured model while the circuit is
//! closed and fails over to the keyword baseline on latency or error.
//! Breaker state lives in the shared store so a slow model opens the
//! circuit for every worker at once. Races between workers are benign:
//! two workers both opening the circuit costs one extra baseline call.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use triage_core::config::CircuitConfig;
use triage_core::{unix_now, CircuitSnapshot};
use triage_store::{SharedStore, StoreError};

use crate::urgency::{baseline_urgency, UrgencyModel};

pub const CIRCUIT_STATE_KEY: &str = "circuit_breaker:state";
pub const CIRCUIT_OPENED_AT_KEY: &str = "circuit_breaker:opened_at";
pub const CIRCUIT_PROBES_KEY: &str = "circuit_breaker:probes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("open") => Self::Open,
            Some("half_open") => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

pub struct ModelRouter {
    store: Arc<dyn SharedStore>,
    model: Arc<dyn UrgencyModel>,
    config: CircuitConfig,
}

impl ModelRouter {
    pub fn new(store: Arc<dyn SharedStore>, model: Arc<dyn UrgencyModel>, config: CircuitConfig) -> Self {
        Self { store, model, config }
    }

    /// Compute urgency score S in [0, 1]. Never returns an error: any
    /// model or store failure degrades to the baseline score.
    pub async fn score_urgency(&self, text: &str) -> f64 {
        match self.score_urgency_inner(text).await {
            Ok(s) => s,
            Err(e) => {
                warn!("circuit breaker store access failed: {e} — using baseline");
                baseline_urgency(text)
            }
        }
    }

    async fn score_urgency_inner(&self, text: &str) -> Result<f64, StoreError> {
        let (mut state, opened_at, probes) = self.read_state().await?;
        let now = unix_now();

        // Open: serve baseline until the cooldown elapses, then probe.
        if state == CircuitState::Open {
            if now - opened_at < self.config.cooldown_seconds as f64 {
                debug!("circuit open; using baseline");
                return Ok(baseline_urgency(text));
            }
            self.store
                .set(CIRCUIT_STATE_KEY, CircuitState::HalfOpen.as_str())
                .await?;
            self.store.set(CIRCUIT_PROBES_KEY, "0").await?;
            state = CircuitState::HalfOpen;
        }

        // Half-open: allow a bounded number of probes; enough successes
        // close the circuit, any failure reopens it.
        if state == CircuitState::HalfOpen {
            if probes >= self.config.half_open_probes {
                self.store
                    .set(CIRCUIT_STATE_KEY, CircuitState::Closed.as_str())
                    .await?;
                self.store.del(CIRCUIT_PROBES_KEY).await?;
            } else {
                return match self.timed_model_call(text).await {
                    Ok(s) => {
                        self.store.incr(CIRCUIT_PROBES_KEY).await?;
                        Ok(s)
                    }
                    Err(reason) => {
                        warn!("circuit half-open probe failed: {reason}; reopening");
                        self.open_circuit(now).await?;
                        Ok(baseline_urgency(text))
                    }
                };
            }
        }

        // Closed: call the model under a wall-clock timer.
        match self.timed_model_call(text).await {
            Ok(s) => Ok(s),
            Err(reason) => {
                warn!("circuit open: {reason}; failing over to baseline");
                self.open_circuit(now).await?;
                Ok(baseline_urgency(text))
            }
        }
    }

    /// Invoke the model and enforce the latency budget. Returns a
    /// human-readable failure reason on error or overrun.
    async fn timed_model_call(&self, text: &str) -> Result<f64, String> {
        let start = Instant::now();
        match self.model.score(text).await {
            Ok(s) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                if latency_ms > self.config.latency_cap_ms {
                    Err(format!(
                        "{} latency {latency_ms}ms > {}ms",
                        self.model.name(),
                        self.config.latency_cap_ms
                    ))
                } else {
                    Ok(s)
                }
            }
            Err(e) => Err(format!("{} error: {e}", self.model.name())),
        }
    }

    async fn open_circuit(&self, now: f64) -> Result<(), StoreError> {
        self.store
            .set(CIRCUIT_STATE_KEY, CircuitState::Open.as_str())
            .await?;
        self.store
            .set(CIRCUIT_OPENED_AT_KEY, &format!("{now}"))
            .await?;
        self.store.del(CIRCUIT_PROBES_KEY).await?;
        Ok(())
    }

    async fn read_state(&self) -> Result<(CircuitState, f64, u32), StoreError> {
        let raw = self
            .store
            .mget(&[
                CIRCUIT_STATE_KEY.to_string(),
                CIRCUIT_OPENED_AT_KEY.to_string(),
                CIRCUIT_PROBES_KEY.to_string(),
            ])
            .await?;
        let state = CircuitState::parse(raw[0].as_deref());
        let opened_at = raw[1]
            .as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        let probes = raw[2]
            .as_deref()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);
        Ok((state, opened_at, probes))
    }

    /// Current breaker state for /health.
    pub async fn circuit_snapshot(&self) -> Result<CircuitSnapshot, StoreError> {
        let (state, opened_at, probes) = self.read_state().await?;
        Ok(CircuitSnapshot {
            state: state.as_str().to_string(),
            opened_at,
            half_open_probes: probes,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use async_trait::async_trait;
    use triage_store::MemoryStore;

    use super::*;
    use crate::urgency::ModelError;

    /// Test model with adjustable latency and failure injection.
    struct MockModel {
        delay_ms: AtomicU64,
        fail: AtomicBool,
    }

    impl MockModel {
        fn new() -> Self {
            Self {
                delay_ms: AtomicU64::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl UrgencyModel for MockModel {
        async fn score(&self, _text: &str) -> Result<f64, ModelError> {
            let delay = self.delay_ms.load(Ordering::Relaxed);
            if delay > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
            if self.fail.load(Ordering::Relaxed) {
                return Err(ModelError::Api("injected failure".to_string()));
            }
            Ok(0.7)
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    fn router_with(
        model: Arc<MockModel>,
        cooldown_seconds: u64,
    ) -> (ModelRouter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = CircuitConfig {
            latency_cap_ms: 40,
            cooldown_seconds,
            half_open_probes: 3,
        };
        (
            ModelRouter::new(store.clone(), model, config),
            store,
        )
    }

    #[tokio::test]
    async fn closed_circuit_returns_model_score() {
        let model = Arc::new(MockModel::new());
        let (router, _) = router_with(model, 60);
        assert_eq!(router.score_urgency("hello").await, 0.7);
        let snap = router.circuit_snapshot().await.unwrap();
        assert_eq!(snap.state, "closed");
    }

    #[tokio::test]
    async fn slow_model_opens_circuit_and_serves_baseline() {
        let model = Arc::new(MockModel::new());
        model.delay_ms.store(80, Ordering::Relaxed);
        let (router, _) = router_with(model.clone(), 60);

        // The slow call itself falls back to baseline.
        assert_eq!(router.score_urgency("hello").await, 0.25);
        let snap = router.circuit_snapshot().await.unwrap();
        assert_eq!(snap.state, "open");
        assert!(snap.opened_at > 0.0);

        // Subsequent calls serve baseline without touching the model.
        model.delay_ms.store(0, Ordering::Relaxed);
        assert_eq!(router.score_urgency("everything broken").await, 0.85);
        assert_eq!(router.circuit_snapshot().await.unwrap().state, "open");
    }

    #[tokio::test]
    async fn model_error_opens_circuit() {
        let model = Arc::new(MockModel::new());
        model.fail.store(true, Ordering::Relaxed);
        let (router, _) = router_with(model, 60);
        assert_eq!(router.score_urgency("hello").await, 0.25);
        assert_eq!(router.circuit_state_for_test().await, "open");
    }

    #[tokio::test]
    async fn cooldown_transitions_to_half_open_then_closed() {
        let model = Arc::new(MockModel::new());
        model.fail.store(true, Ordering::Relaxed);
        // Zero cooldown: the breaker may re-probe immediately.
        let (router, _) = router_with(model.clone(), 0);

        assert_eq!(router.score_urgency("hello").await, 0.25);
        assert_eq!(router.circuit_state_for_test().await, "open");

        model.fail.store(false, Ordering::Relaxed);

        // Three successful probes in half-open.
        for expected_probes in 1..=3u32 {
            assert_eq!(router.score_urgency("hello").await, 0.7);
            let snap = router.circuit_snapshot().await.unwrap();
            assert_eq!(snap.state, "half_open");
            assert_eq!(snap.half_open_probes, expected_probes);
        }

        // Next call closes the circuit and serves the model.
        assert_eq!(router.score_urgency("hello").await, 0.7);
        assert_eq!(router.circuit_state_for_test().await, "closed");
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens() {
        let model = Arc::new(MockModel::new());
        model.fail.store(true, Ordering::Relaxed);
        let (router, _) = router_with(model.clone(), 0);

        assert_eq!(router.score_urgency("hello").await, 0.25);

        // First probe after cooldown fails again.
        assert_eq!(router.score_urgency("hello").await, 0.25);
        let snap = router.circuit_snapshot().await.unwrap();
        assert_eq!(snap.state, "open");
        assert_eq!(snap.half_open_probes, 0);
    }

    impl ModelRouter {
        async fn circuit_state_for_test(&self) -> String {
            self.circuit_snapshot().await.unwrap().state
        }
    }
}
