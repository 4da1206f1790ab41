//! Server startup: shared state construction and background task
//! spawning.

use std::sync::Arc;

use tracing::{error, info, warn};

use triage_agent::AgentRegistry;
use triage_broker::{
    ActivityBus, BrokerMetrics, JobQueue, ProcessedQueue, TicketProcessor, WorkerPool,
};
use triage_core::Config;
use triage_dedup::DedupEngine;
use triage_ml::{
    Embedder, HashEmbedder, HttpEmbedder, HttpModel, LexiconModel, ModelRouter, UrgencyModel,
};
use triage_notify::WebhookNotifier;
use triage_store::{MemoryStore, RedisStore, SharedStore, UnavailableStore};

use crate::state::AppState;

/// Connect the shared store per config. A Redis connection failure is
/// logged but not fatal: the server starts degraded and submission
/// endpoints answer 503 until a restart finds the store back.
pub async fn connect_store(config: &Config) -> Arc<dyn SharedStore> {
    match config.store.backend.as_str() {
        "memory" => {
            warn!("STORE_BACKEND=memory — state is process-local and non-durable");
            Arc::new(MemoryStore::new())
        }
        _ => match RedisStore::connect(&config.store.redis_url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("shared store unavailable at startup: {e} — serving 503s");
                Arc::new(UnavailableStore::new())
            }
        },
    }
}

fn build_model(config: &Config) -> Arc<dyn UrgencyModel> {
    match (config.ml.urgency_provider.as_str(), &config.ml.urgency_http_url) {
        ("http", Some(url)) => {
            info!(url = %url, "urgency model: http");
            Arc::new(HttpModel::new(url.clone()))
        }
        ("http", None) => {
            warn!("URGENCY_PROVIDER=http without URGENCY_HTTP_URL — using lexicon model");
            Arc::new(LexiconModel::new())
        }
        _ => Arc::new(LexiconModel::new()),
    }
}

fn build_embedder(config: &Config) -> Arc<dyn Embedder> {
    match (
        config.ml.embedding_provider.as_str(),
        &config.ml.embedding_http_url,
    ) {
        ("http", Some(url)) => {
            info!(url = %url, "embedder: http");
            Arc::new(HttpEmbedder::new(url.clone(), config.ml.embedding_dimensions))
        }
        ("http", None) => {
            warn!("EMBEDDING_PROVIDER=http without EMBEDDING_HTTP_URL — using hash embedder");
            Arc::new(HashEmbedder::new(config.ml.embedding_dimensions))
        }
        _ => Arc::new(HashEmbedder::new(config.ml.embedding_dimensions)),
    }
}

/// Build `AppState` over a connected store.
pub fn build_app_state(config: Config, store: Arc<dyn SharedStore>) -> Arc<AppState> {
    let model = build_model(&config);
    let embedder = build_embedder(&config);
    let router = Arc::new(ModelRouter::new(
        store.clone(),
        model.clone(),
        config.circuit.clone(),
    ));
    let activity = Arc::new(ActivityBus::new(store.clone()));
    let processor = Arc::new(TicketProcessor::new(
        ProcessedQueue::new(store.clone()),
        JobQueue::new(store.clone()),
        DedupEngine::new(store.clone(), config.dedup.clone()),
        AgentRegistry::new(store.clone(), config.routing.clone()),
        router,
        embedder,
        WebhookNotifier::new(&config.webhook),
        activity,
        Arc::new(BrokerMetrics::new()),
    ));

    Arc::new(AppState {
        config,
        store,
        processor,
        model,
    })
}

/// Seed mock agents, start the activity subscriber, and spawn the worker
/// pool. Subsystem failures are logged, not fatal.
pub async fn spawn_background(state: &Arc<AppState>) -> WorkerPool {
    match state.processor.registry().seed_mock_agents().await {
        Ok(0) => {}
        Ok(n) => info!(seeded = n, "mock agents seeded"),
        Err(e) => warn!("agent seeding failed: {e} — registry starts empty"),
    }

    state.processor.activity().spawn_subscriber().await;

    WorkerPool::spawn(
        state.processor.clone(),
        state.config.worker.concurrency,
        state.config.worker.job_max_attempts,
    )
}
