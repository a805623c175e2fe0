use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{notification_history, notification_recipients};

/// A published case file, read from the content store or a publish webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub architect: Option<String>,
    pub categories: Vec<String>,
    pub case_id: Option<i64>,
    pub slug: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notification_recipients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Recipient {
    pub user_id: String,
    pub push_token: Option<String>,
    pub notifications_enabled: bool,
    pub notification_categories: Option<serde_json::Value>,
    pub notification_hour: Option<i32>,
    pub notification_minute: Option<i32>,
}

impl Recipient {
    /// Preferred categories. The column holds a JSON array of strings or a
    /// single string; any other shape counts as no preference.
    pub fn categories(&self) -> Vec<String> {
        match &self.notification_categories {
            Some(serde_json::Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => {
                vec![s.trim().to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Whether `item` passes this recipient's category filter. An empty
    /// preference accepts everything.
    pub fn accepts(&self, item: &ContentItem) -> bool {
        let preferred = self.categories();
        preferred.is_empty() || preferred.iter().any(|c| item.has_category(c))
    }

    pub fn token(&self) -> Option<&str> {
        self.push_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = notification_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub user_id: String,
    pub case_file_id: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notification_history)]
pub struct NewDeliveryRecord<'a> {
    pub user_id: &'a str,
    pub case_file_id: &'a str,
    pub sent_at: DateTime<Utc>,
}
