//! Agent registry and skill-based routing.
//!
//! Agents live in the shared store (`agent:{id}` records, `agents:online`
//! set, `ticket_assignee:{tid}` reverse map). `current_load` is derived
//! state that may drift from the assignment map; `reconcile_agent_loads`
//! and `force_zero_all_loads` are the repair primitives.

pub mod optimizer;
pub mod registry;

pub use registry::AgentRegistry;

use thiserror::Error;
use triage_store::StoreError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("agent record parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub(crate) const AGENT_PREFIX: &str = "agent:";
pub(crate) const AGENTS_ONLINE_SET: &str = "agents:online";
pub(crate) const TICKET_ASSIGNEE_PREFIX: &str = "ticket_assignee:";
