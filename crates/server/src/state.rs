use std::sync::Arc;

use triage_broker::TicketProcessor;
use triage_core::Config;
use triage_ml::UrgencyModel;
use triage_store::SharedStore;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SharedStore>,
    pub processor: Arc<TicketProcessor>,
    /// Direct model handle for the /urgency-score test endpoint, which
    /// bypasses the queue (and the breaker) entirely.
    pub model: Arc<dyn UrgencyModel>,
}

impl AppState {
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
