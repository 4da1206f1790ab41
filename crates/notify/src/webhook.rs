//! Slack/Discord-compatible webhook delivery.
//!
//! Alerts never block the worker's critical path: the gating decision is
//! made inline, the POST runs on a spawned task, and every delivery error
//! is swallowed after a warn log.

use std::time::Duration;

use tracing::{debug, warn};

use triage_core::config::WebhookConfig;
use triage_core::{MasterIncident, RoutedTicket};

/// Urgency score above which an individual ticket alert fires.
const HIGH_URGENCY_THRESHOLD: f64 = 0.8;

#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: config.url.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Alert on a high-urgency ticket. Fires only when a URL is
    /// configured and `urgency_score > 0.8`. Returns whether a delivery
    /// was dispatched.
    pub fn trigger_high_urgency(&self, routed: &RoutedTicket) -> bool {
        let Some(url) = self.url.clone() else {
            return false;
        };
        if routed.urgency_score <= HIGH_URGENCY_THRESHOLD {
            return false;
        }
        let payload = high_urgency_payload(routed);
        self.dispatch(url, payload);
        true
    }

    /// Alert on a newly created master incident. Fires whenever a URL is
    /// configured. Returns whether a delivery was dispatched.
    pub fn trigger_master_incident(&self, incident: &MasterIncident) -> bool {
        let Some(url) = self.url.clone() else {
            return false;
        };
        let payload = master_incident_payload(incident);
        self.dispatch(url, payload);
        true
    }

    fn dispatch(&self, url: String, payload: serde_json::Value) {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %url, "webhook delivered");
                }
                Ok(response) => {
                    warn!(url = %url, status = %response.status(), "webhook returned non-2xx");
                }
                Err(e) => {
                    warn!(url = %url, "webhook delivery failed: {e}");
                }
            }
        });
    }
}

fn high_urgency_payload(routed: &RoutedTicket) -> serde_json::Value {
    serde_json::json!({
        "text": format!(
            "High-urgency ticket (S={:.2}): {}",
            routed.urgency_score, routed.ticket_id
        ),
        "blocks": [{
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(
                    "*Ticket:* `{}`\n*Subject:* {}\n*Category:* {}\n*Urgency score:* {:.2}",
                    routed.ticket_id, routed.subject, routed.category, routed.urgency_score
                ),
            },
        }],
    })
}

fn master_incident_payload(incident: &MasterIncident) -> serde_json::Value {
    serde_json::json!({
        "text": format!(
            "Master incident {} created ({} tickets): {}",
            incident.incident_id,
            incident.ticket_ids.len(),
            incident.summary
        ),
        "blocks": [{
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(
                    "*Incident:* `{}`\n*Summary:* {}\n*Root ticket:* `{}`\n*Tickets:* {}",
                    incident.incident_id,
                    incident.summary,
                    incident.root_ticket_id,
                    incident.ticket_ids.len()
                ),
            },
        }],
    })
}

#[cfg(test)]
mod tests {
    use triage_core::{IncomingTicket, TicketCategory};

    use super::*;

    fn routed(score: f64) -> RoutedTicket {
        RoutedTicket::from_scored(
            IncomingTicket {
                ticket_id: "T-1".into(),
                subject: "subject".into(),
                body: "body".into(),
                customer_id: None,
            },
            TicketCategory::Technical,
            score,
        )
    }

    fn notifier(url: Option<&str>) -> WebhookNotifier {
        WebhookNotifier::new(&WebhookConfig {
            url: url.map(String::from),
            timeout_seconds: 5,
        })
    }

    #[tokio::test]
    async fn unconfigured_notifier_never_fires() {
        let n = notifier(None);
        assert!(!n.is_configured());
        assert!(!n.trigger_high_urgency(&routed(0.95)));
    }

    #[tokio::test]
    async fn high_urgency_gates_on_threshold() {
        let n = notifier(Some("http://127.0.0.1:9/hook"));
        assert!(!n.trigger_high_urgency(&routed(0.8)));
        assert!(n.trigger_high_urgency(&routed(0.81)));
    }

    #[tokio::test]
    async fn master_incident_fires_whenever_configured() {
        let n = notifier(Some("http://127.0.0.1:9/hook"));
        let incident = MasterIncident {
            incident_id: "1".into(),
            summary: "flood".into(),
            root_ticket_id: "T-1".into(),
            ticket_ids: ["T-1".to_string()].into_iter().collect(),
            created_at: 0.0,
            status: triage_core::IncidentStatus::Open,
        };
        assert!(n.trigger_master_incident(&incident));
        assert!(!notifier(None).trigger_master_incident(&incident));
    }

    #[test]
    fn high_urgency_payload_includes_ticket_fields() {
        let payload = high_urgency_payload(&routed(0.92));
        let text = payload["text"].as_str().unwrap();
        assert!(text.contains("T-1"));
        assert!(text.contains("0.92"));
    }
}
