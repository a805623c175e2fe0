use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_CONTENT_BASE_URL: &str = "https://cdn.contentful.com";

/// Reference to another record, e.g. `{"sys": {"type": "Link", "id": "caseFile"}}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Link {
    pub sys: LinkSys,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LinkSys {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntrySys {
    pub id: String,
    #[serde(default)]
    pub content_type: Option<Link>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl EntrySys {
    pub fn content_type_id(&self) -> Option<&str> {
        self.content_type.as_ref().map(|link| link.sys.id.as_str())
    }

    /// Best available publish time: explicit publish, then last update, then creation.
    pub fn published_time(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.updated_at).or(self.created_at)
    }
}

/// A content entry. With `locale=*` (and in webhook bodies) every field value
/// is a map from locale code to value.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Entry {
    pub sys: EntrySys,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryCollection {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub items: Vec<Entry>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("content API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("content response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Filter for [`ContentClient::entries`].
///
/// The delivery API stamps `sys.createdAt` with the first publish and bumps
/// `sys.updatedAt` on every republish, so filtering on `createdAt` keeps an
/// edited old entry out of the "recently published" window.
#[derive(Debug, Clone)]
pub struct EntryQuery<'a> {
    pub content_type: &'a str,
    pub first_published_since: DateTime<Utc>,
    pub limit: u32,
}

impl EntryQuery<'_> {
    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("content_type", self.content_type.to_string()),
            (
                "sys.createdAt[gte]",
                self.first_published_since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("order", "-sys.createdAt".to_string()),
            ("locale", "*".to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// Read-only client for the content delivery API.
#[derive(Clone)]
pub struct ContentClient {
    client: Client,
    base_url: String,
    space_id: String,
    environment: String,
    access_token: String,
}

impl ContentClient {
    pub fn new(
        base_url: &str,
        space_id: &str,
        environment: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self, ContentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            space_id: space_id.to_string(),
            environment: environment.to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn entries_url(&self) -> String {
        format!(
            "{}/spaces/{}/environments/{}/entries",
            self.base_url, self.space_id, self.environment
        )
    }

    /// Entries matching `query`, most recently first-published first.
    pub async fn entries(&self, query: &EntryQuery<'_>) -> Result<EntryCollection, ContentError> {
        let response = self
            .client
            .get(self.entries_url())
            .bearer_auth(&self.access_token)
            .query(&query.params())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ContentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let collection = serde_json::from_str::<EntryCollection>(&body)?;
        tracing::debug!(
            content_type = %query.content_type,
            returned = collection.items.len(),
            total = collection.total,
            "content entries fetched"
        );
        Ok(collection)
    }
}
