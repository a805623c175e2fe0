use casefile_shared::clients::content::Entry;
use casefile_shared::{AppError, AppResult, ErrorCode};

use crate::events::entry_fields;
use crate::models::ContentItem;

/// Header carrying the webhook topic, e.g. `ContentManagement.Entry.publish`.
pub const TOPIC_HEADER: &str = "x-contentful-topic";

/// What makes a publish event notifiable.
#[derive(Debug, Clone, Copy)]
pub struct PublishRules<'a> {
    pub publish_topic: &'a str,
    pub content_type: &'a str,
    pub locale: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IgnoreReason {
    NotPublishTopic(Option<String>),
    OtherContentType(Option<String>),
    NotificationNotRequested,
}

impl IgnoreReason {
    pub fn message(&self) -> String {
        match self {
            Self::NotPublishTopic(Some(topic)) => format!("ignored topic {topic}"),
            Self::NotPublishTopic(None) => "ignored event without topic".to_string(),
            Self::OtherContentType(Some(ct)) => format!("ignored content type {ct}"),
            Self::OtherContentType(None) => "ignored entry without content type".to_string(),
            Self::NotificationNotRequested => "notification not requested for this entry".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishDecision {
    Ignore(IgnoreReason),
    Notify(ContentItem),
}

pub fn is_publish_topic(topic: Option<&str>, rules: &PublishRules<'_>) -> bool {
    topic.is_some_and(|t| t.trim() == rules.publish_topic)
}

/// Decode the raw webhook body. The sender's content type is not JSON's, so
/// this works on bytes rather than through a JSON extractor.
pub fn parse_entry(body: &[u8]) -> AppResult<Entry> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::new(ErrorCode::PayloadMissing, "request body is empty"));
    }

    serde_json::from_slice::<Entry>(body).map_err(|e| {
        tracing::warn!(error = %e, "failed to parse publish payload");
        AppError::new(ErrorCode::PayloadMalformed, format!("invalid publish payload: {e}"))
    })
}

/// Content-type and send-flag checks for an already parsed entry.
pub fn evaluate(entry: &Entry, rules: &PublishRules<'_>) -> PublishDecision {
    let content_type = entry.sys.content_type_id();
    if content_type != Some(rules.content_type) {
        return PublishDecision::Ignore(IgnoreReason::OtherContentType(
            content_type.map(str::to_string),
        ));
    }

    if !entry_fields::notification_requested(entry, rules.locale) {
        return PublishDecision::Ignore(IgnoreReason::NotificationNotRequested);
    }

    PublishDecision::Notify(entry_fields::content_item(entry, rules.locale))
}
