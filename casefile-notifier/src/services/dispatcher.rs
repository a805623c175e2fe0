use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde_json::json;

use casefile_shared::clients::push::{PushClient, PushError, PushMessage, PushResponse};

use crate::models::ContentItem;
use crate::services::throttle::DispatchThrottle;

/// Outbound push delivery.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<PushResponse, PushError>;
}

#[async_trait]
impl PushGateway for PushClient {
    async fn send(&self, message: &PushMessage) -> Result<PushResponse, PushError> {
        PushClient::send(self, message).await
    }
}

/// Result of one dispatch attempt. Only `Delivered` may be recorded in the
/// delivery ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Delivered { ticket_id: Option<String> },
    /// The gateway answered but did not accept the message.
    Rejected { reason: String },
    /// Transport, status or decode failure.
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }

    fn from_response(response: PushResponse) -> Self {
        match response.ticket() {
            Some(ticket) if ticket.is_ok() => Self::Delivered {
                ticket_id: ticket.id.clone(),
            },
            Some(ticket) => {
                let detail = ticket
                    .details
                    .as_ref()
                    .and_then(|d| d.get("error"))
                    .and_then(|e| e.as_str());
                let reason = match (ticket.message.as_deref(), detail) {
                    (Some(msg), Some(detail)) => format!("{detail}: {msg}"),
                    (Some(msg), None) => msg.to_string(),
                    (None, Some(detail)) => detail.to_string(),
                    (None, None) => format!(
                        "status {}",
                        ticket.status.as_deref().unwrap_or("missing")
                    ),
                };
                Self::Rejected { reason }
            }
            None => Self::Rejected {
                reason: match &response.errors {
                    Some(errors) => format!("request errors: {}", json!(errors)),
                    None => "response carried no ticket".to_string(),
                },
            },
        }
    }
}

/// Fixed parts of every push message.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub sound: String,
    pub navigation_screen: String,
}

impl MessageTemplate {
    pub const TITLE: &'static str = "New Case File";

    pub fn render(&self, token: &str, item: &ContentItem) -> PushMessage {
        let body = match &item.architect {
            Some(architect) => format!("{} by {}", item.title, architect),
            None => item.title.clone(),
        };

        let mut data = json!({
            "caseFileId": item.id,
            "screen": self.navigation_screen,
        });
        if let Some(case_id) = item.case_id {
            data["caseId"] = json!(case_id);
        }
        if let Some(slug) = &item.slug {
            data["slug"] = json!(slug);
        }

        PushMessage {
            to: token.to_string(),
            sound: self.sound.clone(),
            title: Self::TITLE.to_string(),
            body,
            data,
        }
    }
}

/// Formats and sends one push per call, one at a time.
///
/// Never touches the recipient store or the ledger; callers decide what to
/// record from the returned outcome.
pub struct Dispatcher {
    gateway: Arc<dyn PushGateway>,
    throttle: DispatchThrottle,
    template: MessageTemplate,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn PushGateway>, throttle: DispatchThrottle, template: MessageTemplate) -> Self {
        Self { gateway, throttle, template }
    }

    pub async fn dispatch(&self, token: &str, item: &ContentItem) -> DispatchOutcome {
        let message = self.template.render(token, item);

        let outcome = {
            let _permit = self.throttle.acquire().await;
            match self.gateway.send(&message).await {
                Ok(response) => DispatchOutcome::from_response(response),
                Err(e) => DispatchOutcome::Failed { reason: e.to_string() },
            }
        };

        counter!("push_dispatch_total", "outcome" => outcome.label()).increment(1);

        match &outcome {
            DispatchOutcome::Delivered { ticket_id } => tracing::debug!(
                case_file_id = %item.id,
                ticket_id = ticket_id.as_deref().unwrap_or("-"),
                "push accepted"
            ),
            DispatchOutcome::Rejected { reason } => tracing::warn!(
                case_file_id = %item.id,
                reason = %reason,
                "push rejected by gateway"
            ),
            DispatchOutcome::Failed { reason } => tracing::error!(
                case_file_id = %item.id,
                reason = %reason,
                "push dispatch failed"
            ),
        }

        outcome
    }
}
