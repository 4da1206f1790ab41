use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ── Tickets ───────────────────────────────────────────────────

/// Supported ticket categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketCategory {
    Billing,
    Technical,
    Legal,
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Billing => "Billing",
            Self::Technical => "Technical",
            Self::Legal => "Legal",
        }
    }
}

impl std::fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload for an incoming support ticket. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingTicket {
    pub ticket_id: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
}

impl IncomingTicket {
    /// Classifier/scorer input: subject and body joined with a space.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}

/// Ticket after category classification and urgency scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedTicket {
    pub ticket_id: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub category: TicketCategory,
    pub is_urgent: bool,
    pub priority_score: u8,
    pub urgency_score: f64,
}

impl RoutedTicket {
    /// Build a routed ticket from an urgency score S, deriving the
    /// dependent fields: `is_urgent ⇔ S ≥ 0.5`,
    /// `priority_score = clamp(round(S·10), 0, 10)`.
    pub fn from_scored(ticket: IncomingTicket, category: TicketCategory, urgency_score: f64) -> Self {
        let s = urgency_score.clamp(0.0, 1.0);
        Self {
            ticket_id: ticket.ticket_id,
            subject: ticket.subject,
            body: ticket.body,
            customer_id: ticket.customer_id,
            category,
            is_urgent: s >= 0.5,
            priority_score: ((s * 10.0).round() as i64).clamp(0, 10) as u8,
            urgency_score: s,
        }
    }
}

/// Response for 202 Accepted: ticket accepted for async processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketAccepted {
    pub ticket_id: String,
    pub job_id: String,
    pub message: String,
}

// ── Master incidents ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
        }
    }
}

/// A grouping of semantically similar tickets created when a flash-flood
/// is detected, used to suppress redundant alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterIncident {
    pub incident_id: String,
    pub summary: String,
    pub root_ticket_id: String,
    /// Sorted for stable API output.
    pub ticket_ids: BTreeSet<String>,
    /// Unix seconds.
    pub created_at: f64,
    pub status: IncidentStatus,
}

// ── Agents ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
}

/// Non-negative skill weights over the three ticket categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SkillVector {
    pub tech: f64,
    pub billing: f64,
    pub legal: f64,
}

impl SkillVector {
    pub fn as_array(&self) -> [f64; 3] {
        [self.tech, self.billing, self.legal]
    }
}

/// A human support agent with skills, capacity, and derived load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub display_name: String,
    pub skill_vector: SkillVector,
    pub max_concurrent_tickets: u32,
    /// Derived state; may drift from the assignment map and is repaired by
    /// `reconcile_agent_loads`.
    pub current_load: u32,
    pub status: AgentStatus,
}

impl Agent {
    pub fn has_capacity(&self) -> bool {
        self.status == AgentStatus::Online && self.current_load < self.max_concurrent_tickets
    }
}

// ── Activity & observability ──────────────────────────────────

/// A single backend activity event, retained in a bounded in-memory ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub ts: f64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Observable circuit breaker state for /health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitSnapshot {
    pub state: String,
    pub opened_at: f64,
    pub half_open_probes: u32,
}
