//! In-memory stand-ins for the store and gateway traits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use casefile_shared::clients::push::{PushError, PushMessage, PushResponse};
use casefile_shared::{AppError, AppResult, ErrorCode};

use crate::models::{ContentItem, DeliveryRecord, Recipient};
use crate::services::content_store::{sort_newest_first, ContentStore};
use crate::services::delivery_ledger::DeliveryLedger;
use crate::services::dispatcher::PushGateway;
use crate::services::recipient_store::RecipientStore;
use crate::services::slot::MinuteRange;

#[derive(Default)]
pub struct MemoryRecipientStore {
    pub recipients: Mutex<Vec<Recipient>>,
    pub fail: Mutex<bool>,
    pub range_queries: Mutex<Vec<MinuteRange>>,
}

impl MemoryRecipientStore {
    pub fn with(recipients: Vec<Recipient>) -> Self {
        Self {
            recipients: Mutex::new(recipients),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: Mutex::new(true),
            ..Self::default()
        }
    }

    fn check(&self) -> AppResult<()> {
        if *self.fail.lock().unwrap() {
            return Err(AppError::new(ErrorCode::RecipientQueryFailed, "failed to load recipients"));
        }
        Ok(())
    }

    fn eligible(&self) -> Vec<Recipient> {
        self.recipients
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.notifications_enabled && r.push_token.is_some())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecipientStore for MemoryRecipientStore {
    async fn enabled_recipients(&self) -> AppResult<Vec<Recipient>> {
        self.check()?;
        Ok(self.eligible())
    }

    async fn recipients_in_range(&self, range: MinuteRange) -> AppResult<Vec<Recipient>> {
        self.check()?;
        self.range_queries.lock().unwrap().push(range);
        Ok(self
            .eligible()
            .into_iter()
            .filter(|r| match (r.notification_hour, r.notification_minute) {
                (Some(h), Some(m)) if h >= 0 && m >= 0 => range.contains(h as u32, m as u32),
                _ => false,
            })
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        self.check()
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    pub records: Mutex<Vec<DeliveryRecord>>,
    pub fail_reads_for: Mutex<HashSet<String>>,
    pub fail_writes: Mutex<bool>,
}

impl MemoryLedger {
    pub fn seed(&self, user_id: &str, item_id: &str) {
        self.records.lock().unwrap().push(DeliveryRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            case_file_id: item_id.to_string(),
            sent_at: Utc::now(),
        });
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.user_id.clone(), r.case_file_id.clone()))
            .collect()
    }
}

#[async_trait]
impl DeliveryLedger for MemoryLedger {
    async fn delivered_item_ids(&self, user_id: &str, item_ids: &[String]) -> AppResult<HashSet<String>> {
        if self.fail_reads_for.lock().unwrap().contains(user_id) {
            return Err(AppError::Internal(anyhow::anyhow!("history lookup failed")));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id && item_ids.contains(&r.case_file_id))
            .map(|r| r.case_file_id.clone())
            .collect())
    }

    async fn record_delivery(&self, user_id: &str, item_id: &str) -> AppResult<DeliveryRecord> {
        if *self.fail_writes.lock().unwrap() {
            return Err(AppError::Internal(anyhow::anyhow!("history write failed")));
        }
        let record = DeliveryRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            case_file_id: item_id.to_string(),
            sent_at: Utc::now(),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }
}

#[derive(Default)]
pub struct StaticContentStore {
    pub items: Vec<ContentItem>,
    pub fail: bool,
    pub queried_since: Mutex<Option<DateTime<Utc>>>,
}

impl StaticContentStore {
    pub fn with(items: Vec<ContentItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ContentStore for StaticContentStore {
    async fn recently_published(&self, since: DateTime<Utc>) -> AppResult<Vec<ContentItem>> {
        *self.queried_since.lock().unwrap() = Some(since);
        if self.fail {
            return Err(AppError::new(ErrorCode::ContentQueryFailed, "failed to fetch recent case files"));
        }
        let mut items: Vec<ContentItem> = self
            .items
            .iter()
            .filter(|i| i.published_at >= since)
            .cloned()
            .collect();
        sort_newest_first(&mut items);
        Ok(items)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayBehavior {
    Accept,
    Reject,
    Fail,
    NoTicket,
}

/// Records every message; responds per token according to its behavior.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<PushMessage>>,
    behaviors: Mutex<HashMap<String, GatewayBehavior>>,
}

impl RecordingGateway {
    pub fn set_behavior(&self, token: &str, behavior: GatewayBehavior) {
        self.behaviors.lock().unwrap().insert(token.to_string(), behavior);
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.to).collect()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, message: &PushMessage) -> Result<PushResponse, PushError> {
        self.sent.lock().unwrap().push(message.clone());
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&message.to)
            .copied()
            .unwrap_or(GatewayBehavior::Accept);

        let body = match behavior {
            GatewayBehavior::Accept => json!({ "data": { "status": "ok", "id": Uuid::new_v4().to_string() } }),
            GatewayBehavior::Reject => json!({
                "data": {
                    "status": "error",
                    "message": format!("{} is not a registered push notification recipient", message.to),
                    "details": { "error": "DeviceNotRegistered" }
                }
            }),
            GatewayBehavior::NoTicket => json!({ "unexpected": true }),
            GatewayBehavior::Fail => {
                return Err(PushError::Status {
                    status: 503,
                    body: "upstream unavailable".into(),
                })
            }
        };

        Ok(serde_json::from_value(body).expect("canned gateway response"))
    }
}

/// 10:16 UTC on a fixed day; serviced as slot 10:15 with a UTC schedule.
pub fn fixed_clock() -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(2026, 10, 19, 10, 16, 0).unwrap()
}

pub const CRON_SECRET: &str = "cron-test-secret";

/// Router wired to in-memory stores.
pub struct TestApp {
    pub ledger: std::sync::Arc<MemoryLedger>,
    pub gateway: std::sync::Arc<RecordingGateway>,
    pub router: axum::Router,
}

impl TestApp {
    pub fn new(recipients: MemoryRecipientStore, content: StaticContentStore) -> Self {
        use std::sync::Arc;

        use crate::config::AppConfig;
        use crate::services::scheduled_job::ScheduleSettings;
        use crate::services::{DispatchThrottle, Dispatcher, MessageTemplate};

        let config = AppConfig {
            cron_secret: CRON_SECRET.into(),
            timezone: "UTC".into(),
            dispatch_interval_ms: 0,
            ..AppConfig::default()
        };

        let ledger = Arc::new(MemoryLedger::default());
        let gateway = Arc::new(RecordingGateway::default());

        let state = Arc::new(crate::AppState {
            recipients: Arc::new(recipients),
            ledger: ledger.clone(),
            content: Arc::new(content),
            dispatcher: Dispatcher::new(
                gateway.clone(),
                DispatchThrottle::new(config.dispatch_interval()),
                MessageTemplate {
                    sound: config.push_sound.clone(),
                    navigation_screen: config.navigation_screen.clone(),
                },
            ),
            schedule: ScheduleSettings {
                timezone: chrono_tz::UTC,
                slot_minutes: config.slot_minutes,
                tolerance_minutes: config.match_tolerance_minutes,
                lookback: chrono::Duration::hours(config.lookback_hours),
            },
            clock: fixed_clock,
            metrics_handle: casefile_shared::middleware::detached_metrics_handle(),
            config,
        });

        Self {
            ledger,
            gateway,
            router: crate::router(state),
        }
    }
}
