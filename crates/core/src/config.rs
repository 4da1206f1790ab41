use std::env;

use serde::{Deserialize, Serialize};

/// Load a .env file when present; missing files are ignored.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub worker: WorkerConfig,
    pub dedup: DedupConfig,
    pub circuit: CircuitConfig,
    pub routing: RoutingConfig,
    pub ml: MlConfig,
    pub webhook: WebhookConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            store: StoreConfig::from_env(),
            worker: WorkerConfig::from_env(),
            dedup: DedupConfig::from_env(),
            circuit: CircuitConfig::from_env(),
            routing: RoutingConfig::from_env(),
            ml: MlConfig::from_env(),
            webhook: WebhookConfig::from_env(),
        }
    }

    /// Log the effective configuration at startup (no secrets).
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!("  store:    backend={}", self.store.backend);
        tracing::info!(
            "  worker:   concurrency={}, max_attempts={}",
            self.worker.concurrency,
            self.worker.job_max_attempts
        );
        tracing::info!(
            "  dedup:    threshold={}, min_count={}, window={}s",
            self.dedup.similarity_threshold,
            self.dedup.min_count,
            self.dedup.window_seconds
        );
        tracing::info!(
            "  circuit:  latency_cap={}ms, cooldown={}s, probes={}",
            self.circuit.latency_cap_ms,
            self.circuit.cooldown_seconds,
            self.circuit.half_open_probes
        );
        tracing::info!(
            "  ml:       urgency={}, embedding={} (d={})",
            self.ml.urgency_provider,
            self.ml.embedding_provider,
            self.ml.embedding_dimensions
        );
        tracing::info!(
            "  webhook:  {}",
            if self.webhook.url.is_some() { "configured" } else { "(none)" }
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_u16("PORT", 8000),
            cors_origin: env_or("CORS_ORIGIN", "*"),
        }
    }
}

// ── Shared store ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub redis_url: String,
    /// "redis" or "memory" (tests and store-less local runs).
    pub backend: String,
}

impl StoreConfig {
    fn from_env() -> Self {
        Self {
            redis_url: env_or("REDIS_URL", "redis://localhost:6379/0"),
            backend: env_or("STORE_BACKEND", "redis"),
        }
    }
}

// ── Worker pool ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub concurrency: u32,
    pub job_max_attempts: u32,
}

impl WorkerConfig {
    fn from_env() -> Self {
        Self {
            concurrency: env_u32("WORKER_CONCURRENCY", 4).max(1),
            job_max_attempts: env_u32("JOB_MAX_ATTEMPTS", 3).max(1),
        }
    }
}

// ── Dedup ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
    /// Flash-flood fires when strictly more than this many similar tickets
    /// are in the window.
    pub min_count: usize,
    pub window_seconds: u64,
}

impl DedupConfig {
    fn from_env() -> Self {
        Self {
            similarity_threshold: env_f64("DEDUP_SIM_THRESHOLD", 0.9),
            min_count: env_u64("DEDUP_MIN_COUNT", 10) as usize,
            window_seconds: env_u64("DEDUP_WINDOW_SECONDS", 300),
        }
    }
}

// ── Circuit breaker ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub latency_cap_ms: u64,
    pub cooldown_seconds: u64,
    pub half_open_probes: u32,
}

impl CircuitConfig {
    fn from_env() -> Self {
        Self {
            latency_cap_ms: env_u64("TRANSFORMER_LATENCY_MS", 500),
            cooldown_seconds: env_u64("CIRCUIT_COOLDOWN_SECONDS", 60),
            half_open_probes: env_u32("CIRCUIT_HALF_OPEN_PROBES", 3),
        }
    }
}

// ── Routing ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub load_penalty_factor: f64,
}

impl RoutingConfig {
    fn from_env() -> Self {
        Self {
            load_penalty_factor: env_f64("ROUTING_LOAD_PENALTY_FACTOR", 0.1),
        }
    }
}

// ── ML backends ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlConfig {
    /// "lexicon" or "http"
    pub urgency_provider: String,
    pub urgency_http_url: Option<String>,
    /// "hash" or "http"
    pub embedding_provider: String,
    pub embedding_http_url: Option<String>,
    pub embedding_dimensions: usize,
}

impl MlConfig {
    fn from_env() -> Self {
        Self {
            urgency_provider: env_or("URGENCY_PROVIDER", "lexicon"),
            urgency_http_url: env_opt("URGENCY_HTTP_URL"),
            embedding_provider: env_or("EMBEDDING_PROVIDER", "hash"),
            embedding_http_url: env_opt("EMBEDDING_HTTP_URL"),
            embedding_dimensions: env_u64("EMBEDDING_DIMENSIONS", 384) as usize,
        }
    }
}

// ── Webhook ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Optional Slack/Discord-compatible webhook URL; unset disables alerts.
    pub url: Option<String>,
    pub timeout_seconds: u64,
}

impl WebhookConfig {
    fn from_env() -> Self {
        Self {
            url: env_opt("WEBHOOK_URL"),
            timeout_seconds: env_u64("WEBHOOK_TIMEOUT_SECONDS", 5),
        }
    }
}
