//! Router-level tests over the in-memory store backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use triage_core::config::{
    CircuitConfig, Config, DedupConfig, MlConfig, RoutingConfig, ServerConfig, StoreConfig,
    WebhookConfig, WorkerConfig,
};
use triage_store::{MemoryStore, SharedStore};

use crate::state::AppState;
use crate::{router, startup};

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origin: "*".into(),
        },
        store: StoreConfig {
            redis_url: String::new(),
            backend: "memory".into(),
        },
        worker: WorkerConfig {
            concurrency: 1,
            job_max_attempts: 3,
        },
        dedup: DedupConfig {
            similarity_threshold: 0.9,
            min_count: 10,
            window_seconds: 300,
        },
        circuit: CircuitConfig {
            latency_cap_ms: 500,
            cooldown_seconds: 60,
            half_open_probes: 3,
        },
        routing: RoutingConfig {
            load_penalty_factor: 0.1,
        },
        ml: MlConfig {
            urgency_provider: "lexicon".into(),
            urgency_http_url: None,
            embedding_provider: "hash".into(),
            embedding_http_url: None,
            embedding_dimensions: 64,
        },
        webhook: WebhookConfig {
            url: None,
            timeout_seconds: 5,
        },
    }
}

fn test_app() -> (Router, Arc<AppState>) {
    let store: Arc<dyn SharedStore> = Arc::new(MemoryStore::new());
    let state = startup::build_app_state(test_config(), store);
    (router::build_router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

fn ticket(id: &str, subject: &str, body: &str) -> serde_json::Value {
    serde_json::json!({ "ticket_id": id, "subject": subject, "body": body })
}

#[tokio::test]
async fn submit_ticket_returns_202_before_processing() {
    let (app, state) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/tickets",
        Some(ticket("T-001", "Invoice wrong", "Charged twice.")),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["ticket_id"], "T-001");
    assert!(!body["job_id"].as_str().unwrap().is_empty());
    assert_eq!(body["message"], "Accepted for processing");

    // Write-then-ack: the job is durably queued, nothing processed yet.
    assert_eq!(state.processor.jobs().pending_len().await.unwrap(), 1);
    assert!(state.processor.queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn invalid_ticket_body_is_422() {
    let (app, _) = test_app();
    let (status, _) = send(
        &app,
        "POST",
        "/tickets",
        Some(serde_json::json!({ "ticket_id": "T-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn batch_submission_preserves_order() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/tickets/batch",
        Some(serde_json::json!([
            ticket("A", "s", "b"),
            ticket("B", "s", "b"),
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let accepted = body["accepted"].as_array().unwrap();
    assert_eq!(accepted[0]["ticket_id"], "A");
    assert_eq!(accepted[1]["ticket_id"], "B");
}

#[tokio::test]
async fn empty_queue_is_404_on_next_and_peek() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "GET", "/tickets/next", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/tickets/peek", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn processed_ticket_is_peekable_with_category() {
    let (app, state) = test_app();
    state.processor.registry().seed_mock_agents().await.unwrap();
    state
        .processor
        .process_ticket(&ticket("T-001", "Invoice wrong", "Charged twice."))
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/tickets/peek", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket_id"], "T-001");
    assert_eq!(body["category"], "Billing");

    let (status, body) = send(&app, "GET", "/queue/size", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size"], 1);
}

#[tokio::test]
async fn urgent_tickets_pop_first_via_api() {
    let (app, state) = test_app();
    state.processor.registry().seed_mock_agents().await.unwrap();
    state
        .processor
        .process_ticket(&ticket("T-normal", "Question", "General"))
        .await
        .unwrap();
    state
        .processor
        .process_ticket(&ticket("T-urgent", "Login broken ASAP", "Cannot login. Fix ASAP."))
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/tickets/next", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket_id"], "T-urgent");
    assert_eq!(body["is_urgent"], true);

    let (_, body) = send(&app, "GET", "/tickets/next", None).await;
    assert_eq!(body["ticket_id"], "T-normal");
}

#[tokio::test]
async fn queue_delete_clears_and_zeroes_loads() {
    let (app, state) = test_app();
    state.processor.registry().seed_mock_agents().await.unwrap();
    state
        .processor
        .process_ticket(&ticket("T-1", "Invoice wrong", "Charged twice."))
        .await
        .unwrap();

    let (status, body) = send(&app, "DELETE", "/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queue cleared");
    assert_eq!(body["cleared"], 1);

    let (_, body) = send(&app, "GET", "/queue/size", None).await;
    assert_eq!(body["size"], 0);
    let (_, body) = send(&app, "GET", "/assignments", None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn activity_endpoint_clamps_limit() {
    let (app, state) = test_app();
    for i in 0..5 {
        state
            .processor
            .activity()
            .emit("tick", serde_json::json!({ "n": i }));
    }
    let (status, body) = send(&app, "GET", "/activity?limit=1000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);

    let (_, body) = send(&app, "GET", "/activity?limit=2", None).await;
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["data"]["n"], 3);
    assert_eq!(events[1]["data"]["n"], 4);
}

#[tokio::test]
async fn urgency_score_endpoint_does_not_enqueue() {
    let (app, state) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/urgency-score",
        Some(serde_json::json!({ "text": "site is down, urgent!" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["urgency_score"].as_f64().unwrap() >= 0.5);
    assert_eq!(body["is_urgent"], true);
    assert_eq!(state.processor.jobs().pending_len().await.unwrap(), 0);
}

#[tokio::test]
async fn agent_crud_and_404s() {
    let (app, state) = test_app();
    state.processor.registry().seed_mock_agents().await.unwrap();

    let (status, body) = send(&app, "GET", "/agents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);

    let (status, body) = send(&app, "GET", "/agents/tech-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Tech Support");

    let (status, _) = send(&app, "GET", "/agents/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/agents/nobody/tickets", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        "/agents",
        Some(serde_json::json!({
            "agent_id": "night-shift",
            "display_name": "Night Shift",
            "skill_vector": { "tech": 0.5, "billing": 0.3, "legal": 0.2 },
            "max_concurrent_tickets": 6,
            "current_load": 0,
            "status": "offline",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent_id"], "night-shift");

    // Offline agents are excluded from the online filter.
    let (_, body) = send(&app, "GET", "/agents?online_only=true", None).await;
    let online: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["agent_id"].as_str().unwrap())
        .collect();
    assert!(!online.contains(&"night-shift"));
}

#[tokio::test]
async fn load_repair_endpoints_are_idempotent() {
    let (app, state) = test_app();
    state.processor.registry().seed_mock_agents().await.unwrap();
    state
        .processor
        .registry()
        .assign_ticket_to_agent("T-1", "tech-1")
        .await
        .unwrap();

    let (status, body) = send(&app, "POST", "/agents/loads/zero", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zeroed"], 1);
    let (_, body) = send(&app, "POST", "/agents/loads/zero", None).await;
    assert_eq!(body["zeroed"], 0);

    let (status, body) = send(&app, "POST", "/agents/loads/reconcile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 0);
}

#[tokio::test]
async fn incident_endpoints_404_on_unknown() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "GET", "/incidents/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", "/incidents/999/close", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/incidents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn health_reports_store_and_circuit() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "connected");
    assert_eq!(body["circuit_breaker"]["state"], "closed");
}

#[tokio::test]
async fn metrics_exposes_counters_and_gauges() {
    let (app, state) = test_app();
    state.processor.registry().seed_mock_agents().await.unwrap();
    state
        .processor
        .process_ticket(&ticket("T-1", "Invoice wrong", "Charged twice."))
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["queue_size"], 1);
    assert_eq!(body["jobs_pending"], 0);
}
