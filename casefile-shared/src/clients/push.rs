use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

/// One message as accepted by the push gateway.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub to: String,
    pub sound: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Per-message receipt returned by the gateway.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PushTicket {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl PushTicket {
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
enum TicketData {
    Single(PushTicket),
    Batch(Vec<PushTicket>),
}

/// Parsed gateway response. Single sends come back as `{"data": {...}}`,
/// batch sends as `{"data": [...]}`; both are accepted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PushResponse {
    #[serde(default)]
    data: Option<TicketData>,
    #[serde(default)]
    pub errors: Option<Vec<serde_json::Value>>,
}

impl PushResponse {
    pub fn ticket(&self) -> Option<&PushTicket> {
        match self.data.as_ref()? {
            TicketData::Single(ticket) => Some(ticket),
            TicketData::Batch(tickets) => tickets.first(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("push gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("push response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct PushClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl PushClient {
    pub fn new(
        endpoint: &str,
        access_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            access_token: access_token
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit a single message as one JSON POST.
    pub async fn send(&self, message: &PushMessage) -> Result<PushResponse, PushError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(message);

        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PushError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = serde_json::from_str::<PushResponse>(&body)?;
        tracing::debug!(to = %message.to, ok = parsed.ticket().is_some_and(PushTicket::is_ok), "push submitted");
        Ok(parsed)
    }
}
