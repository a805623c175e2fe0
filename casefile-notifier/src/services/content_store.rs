use async_trait::async_trait;
use chrono::{DateTime, Utc};

use casefile_shared::clients::content::{ContentClient, Entry, EntryQuery};
use casefile_shared::{AppError, AppResult, ErrorCode};

use crate::events::entry_fields;
use crate::models::ContentItem;

/// Source of recently published case files for the scheduled job.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Case files published at or after `since`, newest first.
    async fn recently_published(&self, since: DateTime<Utc>) -> AppResult<Vec<ContentItem>>;
}

pub struct ContentfulStore {
    client: ContentClient,
    content_type: String,
    locale: String,
    page_size: u32,
}

impl ContentfulStore {
    pub fn new(client: ContentClient, content_type: &str, locale: &str) -> Self {
        Self {
            client,
            content_type: content_type.to_string(),
            locale: locale.to_string(),
            page_size: 100,
        }
    }
}

#[async_trait]
impl ContentStore for ContentfulStore {
    async fn recently_published(&self, since: DateTime<Utc>) -> AppResult<Vec<ContentItem>> {
        let query = EntryQuery {
            content_type: &self.content_type,
            first_published_since: since,
            limit: self.page_size,
        };

        let collection = self.client.entries(&query).await.map_err(|e| {
            tracing::error!(error = %e, "failed to fetch recent case files");
            AppError::new(ErrorCode::ContentQueryFailed, "failed to fetch recent case files")
        })?;

        let mut items: Vec<ContentItem> = collection
            .items
            .iter()
            .map(|entry| delivered_item(entry, &self.locale))
            .collect();
        sort_newest_first(&mut items);

        Ok(items)
    }
}

/// Delivery API entries date from their first publish (`sys.createdAt`),
/// not from the latest republish.
fn delivered_item(entry: &Entry, locale: &str) -> ContentItem {
    let mut item = entry_fields::content_item(entry, locale);
    if let Some(first_published) = entry.sys.created_at {
        item.published_at = first_published;
    }
    item
}

/// Stable sort by publish time, newest first.
pub fn sort_newest_first(items: &mut [ContentItem]) {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}
