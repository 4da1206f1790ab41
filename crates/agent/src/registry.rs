//! Stateful agent records and assignment bookkeeping.

use std::sync::Arc;

use tracing::{info, warn};

use triage_core::config::RoutingConfig;
use triage_core::{Agent, AgentStatus, RoutedTicket, SkillVector};
use triage_store::SharedStore;

use crate::optimizer::solve_assignment;
use crate::{AgentError, AGENTS_ONLINE_SET, AGENT_PREFIX, TICKET_ASSIGNEE_PREFIX};

#[derive(Clone)]
pub struct AgentRegistry {
    store: Arc<dyn SharedStore>,
    routing: RoutingConfig,
}

fn agent_key(agent_id: &str) -> String {
    format!("{AGENT_PREFIX}{agent_id}")
}

fn assignee_key(ticket_id: &str) -> String {
    format!("{TICKET_ASSIGNEE_PREFIX}{ticket_id}")
}

/// Mock agents inserted at startup when absent.
fn mock_agents() -> Vec<Agent> {
    let mk = |id: &str, name: &str, skills: (f64, f64, f64), cap: u32| Agent {
        agent_id: id.to_string(),
        display_name: name.to_string(),
        skill_vector: SkillVector {
            tech: skills.0,
            billing: skills.1,
            legal: skills.2,
        },
        max_concurrent_tickets: cap,
        current_load: 0,
        status: AgentStatus::Online,
    };
    vec![
        mk("tech-1", "Tech Support", (0.9, 0.05, 0.05), 10),
        mk("billing-1", "Billing Support", (0.05, 0.9, 0.05), 10),
        mk("legal-1", "Legal & Compliance", (0.05, 0.05, 0.9), 8),
        mk("generalist-1", "General Support", (0.34, 0.33, 0.33), 10),
    ]
}

impl AgentRegistry {
    pub fn new(store: Arc<dyn SharedStore>, routing: RoutingConfig) -> Self {
        Self { store, routing }
    }

    /// Upsert an agent. The online set is kept in sync with the record's
    /// status.
    pub async fn register_agent(&self, agent: &Agent) -> Result<(), AgentError> {
        self.store
            .set(&agent_key(&agent.agent_id), &serde_json::to_string(agent)?)
            .await?;
        if agent.status == AgentStatus::Online {
            self.store.sadd(AGENTS_ONLINE_SET, &agent.agent_id).await?;
        } else {
            self.store.srem(AGENTS_ONLINE_SET, &agent.agent_id).await?;
        }
        info!(
            agent_id = %agent.agent_id,
            tech = agent.skill_vector.tech,
            billing = agent.skill_vector.billing,
            legal = agent.skill_vector.legal,
            "agent registered"
        );
        Ok(())
    }

    /// Register the mock agents only where absent, preserving load and
    /// status across restarts. Returns the number inserted.
    pub async fn seed_mock_agents(&self) -> Result<usize, AgentError> {
        let mut seeded = 0;
        for agent in mock_agents() {
            if self.get_agent(&agent.agent_id).await?.is_none() {
                self.register_agent(&agent).await?;
                seeded += 1;
            }
        }
        if seeded > 0 {
            info!(seeded, "seeded mock agents (existing agents left unchanged)");
        }
        Ok(seeded)
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>, AgentError> {
        match self.store.get(&agent_key(agent_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Every registered agent, sorted by id for stable API output.
    pub async fn list_agents(&self) -> Result<Vec<Agent>, AgentError> {
        let keys = self.store.scan_match(&format!("{AGENT_PREFIX}*")).await?;
        let mut agents = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(agent_id) = key.strip_prefix(AGENT_PREFIX) else {
                continue;
            };
            if let Some(agent) = self.get_agent(agent_id).await? {
                agents.push(agent);
            }
        }
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(agents)
    }

    /// Agents in the online set that are online and have spare capacity.
    pub async fn list_online_agents(&self) -> Result<Vec<Agent>, AgentError> {
        let mut ids = self.store.smembers(AGENTS_ONLINE_SET).await?;
        ids.sort();
        let mut agents = Vec::new();
        for id in ids {
            if let Some(agent) = self.get_agent(&id).await? {
                if agent.has_capacity() {
                    agents.push(agent);
                }
            }
        }
        Ok(agents)
    }

    /// Record an assignment and increment the agent's load.
    pub async fn assign_ticket_to_agent(
        &self,
        ticket_id: &str,
        agent_id: &str,
    ) -> Result<(), AgentError> {
        self.store.set(&assignee_key(ticket_id), agent_id).await?;
        if let Some(mut agent) = self.get_agent(agent_id).await? {
            agent.current_load += 1;
            self.store
                .set(&agent_key(agent_id), &serde_json::to_string(&agent)?)
                .await?;
        }
        info!(ticket_id = %ticket_id, agent_id = %agent_id, "ticket assigned");
        Ok(())
    }

    /// Release a popped ticket: decrement the assignee's load (floor 0)
    /// and delete the mapping. No-op when unassigned. Returns the agent
    /// the ticket was released from.
    pub async fn release_ticket_from_agent(
        &self,
        ticket_id: &str,
    ) -> Result<Option<String>, AgentError> {
        let key = assignee_key(ticket_id);
        let Some(agent_id) = self.store.get(&key).await? else {
            return Ok(None);
        };
        if let Some(mut agent) = self.get_agent(&agent_id).await? {
            agent.current_load = agent.current_load.saturating_sub(1);
            self.store
                .set(&agent_key(&agent_id), &serde_json::to_string(&agent)?)
                .await?;
        }
        self.store.del(&key).await?;
        Ok(Some(agent_id))
    }

    pub async fn get_assignee(&self, ticket_id: &str) -> Result<Option<String>, AgentError> {
        Ok(self.store.get(&assignee_key(ticket_id)).await?)
    }

    /// Current ticket → agent pairs.
    pub async fn list_assignments(
        &self,
        limit: usize,
    ) -> Result<Vec<(String, String)>, AgentError> {
        let keys = self
            .store
            .scan_match(&format!("{TICKET_ASSIGNEE_PREFIX}*"))
            .await?;
        let mut out = Vec::new();
        for key in keys {
            if out.len() >= limit {
                break;
            }
            let Some(ticket_id) = key.strip_prefix(TICKET_ASSIGNEE_PREFIX) else {
                continue;
            };
            if let Some(agent_id) = self.store.get(&key).await? {
                out.push((ticket_id.to_string(), agent_id));
            }
        }
        Ok(out)
    }

    /// Ticket ids currently assigned to this agent.
    pub async fn tickets_for_agent(&self, agent_id: &str) -> Result<Vec<String>, AgentError> {
        let keys = self
            .store
            .scan_match(&format!("{TICKET_ASSIGNEE_PREFIX}*"))
            .await?;
        let mut out = Vec::new();
        for key in keys {
            if self.store.get(&key).await?.as_deref() == Some(agent_id) {
                if let Some(ticket_id) = key.strip_prefix(TICKET_ASSIGNEE_PREFIX) {
                    out.push(ticket_id.to_string());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Set each agent's `current_load` to the exact count of assignments
    /// pointing at it. Returns the number of agents changed; a second
    /// invocation changes none.
    pub async fn reconcile_agent_loads(&self) -> Result<usize, AgentError> {
        let mut updated = 0;
        for mut agent in self.list_agents().await? {
            let actual = self.tickets_for_agent(&agent.agent_id).await?.len() as u32;
            if agent.current_load != actual {
                let old = agent.current_load;
                agent.current_load = actual;
                self.store
                    .set(&agent_key(&agent.agent_id), &serde_json::to_string(&agent)?)
                    .await?;
                updated += 1;
                info!(
                    agent_id = %agent.agent_id,
                    old_load = old,
                    new_load = actual,
                    "reconciled agent load"
                );
            }
        }
        Ok(updated)
    }

    /// Delete every assignment key, then zero every agent's load.
    /// Returns the number of agents whose load changed.
    pub async fn force_zero_all_loads(&self) -> Result<usize, AgentError> {
        let keys = self
            .store
            .scan_match(&format!("{TICKET_ASSIGNEE_PREFIX}*"))
            .await?;
        for key in keys {
            self.store.del(&key).await?;
        }
        let mut zeroed = 0;
        for mut agent in self.list_agents().await? {
            if agent.current_load != 0 {
                agent.current_load = 0;
                self.store
                    .set(&agent_key(&agent.agent_id), &serde_json::to_string(&agent)?)
                    .await?;
                zeroed += 1;
            }
        }
        Ok(zeroed)
    }

    /// Route a ticket to the best available agent, or None when no agent
    /// has capacity.
    pub async fn route_ticket(&self, routed: &RoutedTicket) -> Result<Option<String>, AgentError> {
        let agents = self.list_online_agents().await?;
        if agents.is_empty() {
            warn!(ticket_id = %routed.ticket_id, "no online agents with capacity");
            return Ok(None);
        }
        Ok(solve_assignment(
            routed.category,
            &agents,
            self.routing.load_penalty_factor,
        ))
    }
}
