//! In-memory activity log fed by shared-store pub/sub.
//!
//! Workers publish events on the `ticket_activity` channel; a subscriber
//! task forwards delivered messages into the process-local ring. Accept
//! and pop paths emit into the ring directly. The ring keeps the most
//! recent 200 events; ordering reflects arrival at the subscriber.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use triage_core::{unix_now, ActivityEvent};
use triage_store::SharedStore;

pub const ACTIVITY_CHANNEL: &str = "ticket_activity";
pub const MAX_EVENTS: usize = 200;

pub struct ActivityBus {
    store: Arc<dyn SharedStore>,
    events: Mutex<VecDeque<ActivityEvent>>,
}

impl ActivityBus {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            store,
            events: Mutex::new(VecDeque::with_capacity(MAX_EVENTS)),
        }
    }

    /// Append an event to the local ring, trimming the oldest on
    /// overflow.
    pub fn emit(&self, event_type: &str, data: serde_json::Value) {
        let mut events = self.events.lock().unwrap();
        events.push_back(ActivityEvent {
            ts: unix_now(),
            event_type: event_type.to_string(),
            data,
        });
        while events.len() > MAX_EVENTS {
            events.pop_front();
        }
    }

    /// The newest `limit` events in chronological order (oldest first).
    pub fn get_recent(&self, limit: usize) -> Vec<ActivityEvent> {
        let events = self.events.lock().unwrap();
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    /// Publish an event to the activity channel (worker side). Publish
    /// failures are logged, never propagated: activity is best-effort.
    pub async fn publish_event(&self, event_type: &str, data: serde_json::Value) {
        let payload = serde_json::json!({ "type": event_type, "data": data });
        if let Err(e) = self
            .store
            .publish(ACTIVITY_CHANNEL, &payload.to_string())
            .await
        {
            warn!("activity publish failed: {e}");
        }
    }

    /// Start the background subscriber that forwards channel messages
    /// into the ring. The store backend reconnects on transient failures.
    pub async fn spawn_subscriber(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let bus = Arc::clone(self);
        let mut rx = match self.store.subscribe(ACTIVITY_CHANNEL).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!("activity subscriber failed to start: {e}");
                return tokio::spawn(async {});
            }
        };
        info!(channel = ACTIVITY_CHANNEL, "activity subscriber started");
        tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                match serde_json::from_str::<serde_json::Value>(&raw) {
                    Ok(msg) => {
                        let event_type = msg
                            .get("type")
                            .and_then(|t| t.as_str())
                            .unwrap_or("ticket_processed")
                            .to_string();
                        let data = msg.get("data").cloned().unwrap_or(msg);
                        bus.emit(&event_type, data);
                    }
                    Err(e) => warn!("activity message parse error: {e}"),
                }
            }
        })
    }
}
