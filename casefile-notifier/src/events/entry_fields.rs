//! Reading case file fields out of a content entry.
//!
//! Webhook bodies and `locale=*` delivery responses nest every field value
//! under a locale code: `{"title": {"en-US": "North Tower"}}`. All lookups go
//! through [`LocalizedFields`] so the locale is applied in one place; a field
//! missing for the locale reads as absent.

use chrono::Utc;
use serde_json::{Map, Value};

use casefile_shared::clients::content::Entry;

use crate::models::ContentItem;

pub const TITLE: &str = "title";
pub const SEND_NOTIFICATION: &str = "sendNotification";
pub const CATEGORIES: &str = "categories";
pub const ARCHITECT: &str = "architect";
pub const CASE_ID: &str = "caseId";
pub const SLUG: &str = "slug";

pub const UNTITLED: &str = "Untitled Case File";

pub struct LocalizedFields<'a> {
    fields: &'a Map<String, Value>,
    locale: &'a str,
}

impl<'a> LocalizedFields<'a> {
    pub fn new(fields: &'a Map<String, Value>, locale: &'a str) -> Self {
        Self { fields, locale }
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields
            .get(name)?
            .get(self.locale)
            .filter(|v| !v.is_null())
    }

    pub fn text(&self, name: &str) -> Option<&'a str> {
        self.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Absent or non-boolean values read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        normalize_list(self.get(name))
    }
}

/// Scalar-or-array field value as an ordered list of non-empty strings.
pub fn normalize_list(value: Option<&Value>) -> Vec<String> {
    let as_text = |v: &Value| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    match value {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(as_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(v) => as_text(v).filter(|s| !s.is_empty()).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Whether the entry explicitly asks for a notification on publish.
pub fn notification_requested(entry: &Entry, locale: &str) -> bool {
    LocalizedFields::new(&entry.fields, locale).flag(SEND_NOTIFICATION)
}

pub fn content_item(entry: &Entry, locale: &str) -> ContentItem {
    let fields = LocalizedFields::new(&entry.fields, locale);

    ContentItem {
        id: entry.sys.id.clone(),
        title: fields.text(TITLE).unwrap_or(UNTITLED).to_string(),
        architect: fields.text(ARCHITECT).map(str::to_string),
        categories: fields.list(CATEGORIES),
        case_id: fields.integer(CASE_ID),
        slug: fields.text(SLUG).map(str::to_string),
        published_at: entry.sys.published_time().unwrap_or_else(Utc::now),
    }
}
