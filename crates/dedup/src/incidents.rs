//! Master incident records in the shared store.
//!
//! Layout: `incident:next_id` (counter), `incident:{id}` (hash),
//! `incident_tickets:{id}` (set), `ticket_incident:{tid}` (reverse map,
//! last-write-wins).

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use triage_core::{IncidentStatus, MasterIncident};
use triage_store::SharedStore;

use crate::{
    DedupError, INCIDENT_NEXT_ID, INCIDENT_PREFIX, INCIDENT_TICKETS_PREFIX,
    TICKET_INCIDENT_PREFIX,
};

#[derive(Clone)]
pub struct IncidentRepo {
    store: Arc<dyn SharedStore>,
}

impl IncidentRepo {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Create a new master incident from the atomic id counter and link
    /// every ticket in `ticket_ids` (set membership + reverse map).
    pub async fn create(
        &self,
        root_ticket_id: &str,
        summary: &str,
        ticket_ids: &[String],
        created_at: f64,
    ) -> Result<String, DedupError> {
        let incident_id = self.store.incr(INCIDENT_NEXT_ID).await?.to_string();
        let key = format!("{INCIDENT_PREFIX}{incident_id}");
        self.store
            .hset_all(
                &key,
                &[
                    ("incident_id".to_string(), incident_id.clone()),
                    ("summary".to_string(), summary.to_string()),
                    ("root_ticket_id".to_string(), root_ticket_id.to_string()),
                    ("created_at".to_string(), format!("{created_at}")),
                    ("status".to_string(), IncidentStatus::Open.as_str().to_string()),
                ],
            )
            .await?;
        for tid in ticket_ids {
            self.link(&incident_id, tid).await?;
        }
        info!(
            incident_id = %incident_id,
            tickets = ticket_ids.len(),
            root = %root_ticket_id,
            "created master incident"
        );
        Ok(incident_id)
    }

    /// Link a ticket to an existing incident.
    pub async fn link(&self, incident_id: &str, ticket_id: &str) -> Result<(), DedupError> {
        self.store
            .sadd(&format!("{INCIDENT_TICKETS_PREFIX}{incident_id}"), ticket_id)
            .await?;
        self.store
            .set(&format!("{TICKET_INCIDENT_PREFIX}{ticket_id}"), incident_id)
            .await?;
        Ok(())
    }

    /// Incident id this ticket belongs to, if any.
    pub async fn incident_for_ticket(&self, ticket_id: &str) -> Result<Option<String>, DedupError> {
        Ok(self
            .store
            .get(&format!("{TICKET_INCIDENT_PREFIX}{ticket_id}"))
            .await?)
    }

    /// Unlink a ticket from its incident. An incident left with no
    /// tickets is marked resolved. Returns the incident id the ticket was
    /// removed from, or None when the ticket was not linked.
    pub async fn remove_ticket(&self, ticket_id: &str) -> Result<Option<String>, DedupError> {
        let Some(incident_id) = self.incident_for_ticket(ticket_id).await? else {
            return Ok(None);
        };
        let tickets_key = format!("{INCIDENT_TICKETS_PREFIX}{incident_id}");
        self.store.srem(&tickets_key, ticket_id).await?;
        self.store
            .del(&format!("{TICKET_INCIDENT_PREFIX}{ticket_id}"))
            .await?;
        if self.store.scard(&tickets_key).await? == 0 {
            self.set_status(&incident_id, IncidentStatus::Resolved).await?;
            info!(incident_id = %incident_id, "incident emptied — resolved");
        }
        Ok(Some(incident_id))
    }

    /// Mark an incident resolved. Fails when the id is unknown.
    pub async fn close(&self, incident_id: &str) -> Result<(), DedupError> {
        let raw = self
            .store
            .hgetall(&format!("{INCIDENT_PREFIX}{incident_id}"))
            .await?;
        if raw.is_empty() {
            return Err(DedupError::IncidentNotFound(incident_id.to_string()));
        }
        self.set_status(incident_id, IncidentStatus::Resolved).await
    }

    async fn set_status(&self, incident_id: &str, status: IncidentStatus) -> Result<(), DedupError> {
        self.store
            .hset_all(
                &format!("{INCIDENT_PREFIX}{incident_id}"),
                &[("status".to_string(), status.as_str().to_string())],
            )
            .await?;
        Ok(())
    }

    /// Load a master incident by id.
    pub async fn get(&self, incident_id: &str) -> Result<Option<MasterIncident>, DedupError> {
        let raw = self
            .store
            .hgetall(&format!("{INCIDENT_PREFIX}{incident_id}"))
            .await?;
        if raw.is_empty() {
            return Ok(None);
        }
        let ticket_ids: BTreeSet<String> = self
            .store
            .smembers(&format!("{INCIDENT_TICKETS_PREFIX}{incident_id}"))
            .await?
            .into_iter()
            .collect();
        let status = match raw.get("status").map(String::as_str) {
            Some("resolved") => IncidentStatus::Resolved,
            _ => IncidentStatus::Open,
        };
        Ok(Some(MasterIncident {
            incident_id: incident_id.to_string(),
            summary: raw.get("summary").cloned().unwrap_or_default(),
            root_ticket_id: raw.get("root_ticket_id").cloned().unwrap_or_default(),
            ticket_ids,
            created_at: raw
                .get("created_at")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            status,
        }))
    }

    /// List incidents by descending numeric id, optionally filtered by
    /// status.
    pub async fn list(
        &self,
        limit: usize,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<MasterIncident>, DedupError> {
        let keys = self.store.scan_match(&format!("{INCIDENT_PREFIX}*")).await?;
        let mut ids: Vec<u64> = keys
            .iter()
            .filter_map(|k| k.strip_prefix(INCIDENT_PREFIX))
            .filter_map(|id| id.parse::<u64>().ok())
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut incidents = Vec::new();
        for id in ids {
            if incidents.len() >= limit {
                break;
            }
            if let Some(incident) = self.get(&id.to_string()).await? {
                if status.map(|s| incident.status == s).unwrap_or(true) {
                    incidents.push(incident);
                }
            }
        }
        Ok(incidents)
    }
}
