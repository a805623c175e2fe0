use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use casefile_shared::AppResult;

use crate::models::{ContentItem, Recipient};
use crate::services::content_store::{sort_newest_first, ContentStore};
use crate::services::delivery_ledger::DeliveryLedger;
use crate::services::dispatcher::{DispatchOutcome, Dispatcher};
use crate::services::recipient_store::RecipientStore;
use crate::services::slot::{self, EffectiveSlot};

/// Timing parameters for the scheduled run.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleSettings {
    pub timezone: Tz,
    pub slot_minutes: u32,
    pub tolerance_minutes: u32,
    pub lookback: Duration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduledSummary {
    pub slot: EffectiveSlot,
    pub timezone: String,
    pub items_available: usize,
    pub recipients_matched: usize,
    pub sent: usize,
    pub skipped: usize,
    pub errors: usize,
    pub ledger_errors: usize,
}

impl ScheduledSummary {
    fn new(slot: EffectiveSlot, timezone: Tz) -> Self {
        Self {
            slot,
            timezone: timezone.name().to_string(),
            items_available: 0,
            recipients_matched: 0,
            sent: 0,
            skipped: 0,
            errors: 0,
            ledger_errors: 0,
        }
    }

    pub fn message(&self) -> String {
        if self.items_available == 0 {
            "no recently published case files".to_string()
        } else if self.recipients_matched == 0 {
            format!(
                "{} case files available, no recipients scheduled for {}",
                self.items_available, self.slot
            )
        } else {
            format!("scheduled notifications processed for {}", self.slot)
        }
    }
}

/// The stores and dispatcher a run works against.
pub struct JobContext<'a> {
    pub content: &'a dyn ContentStore,
    pub recipients: &'a dyn RecipientStore,
    pub ledger: &'a dyn DeliveryLedger,
    pub dispatcher: &'a Dispatcher,
}

/// One scheduled pass: for each recipient whose preferred time matches the
/// current slot, send the newest case file they have not been sent yet.
///
/// At most one notification per recipient per run. Content or recipient
/// query failures abort the run; everything per-recipient is counted and
/// the loop continues.
pub async fn run(
    now: DateTime<Utc>,
    settings: &ScheduleSettings,
    ctx: &JobContext<'_>,
) -> AppResult<ScheduledSummary> {
    let slot = slot::effective_slot(now, settings.timezone, settings.slot_minutes);
    let mut summary = ScheduledSummary::new(slot, settings.timezone);

    let mut items = ctx.content.recently_published(now - settings.lookback).await?;
    sort_newest_first(&mut items);
    summary.items_available = items.len();

    if items.is_empty() {
        tracing::info!(slot = %slot, "no recently published case files");
        return Ok(summary);
    }

    let matched = matching_recipients(ctx.recipients, slot, settings.tolerance_minutes).await?;
    summary.recipients_matched = matched.len();

    if matched.is_empty() {
        tracing::info!(slot = %slot, items = items.len(), "no recipients scheduled for slot");
        return Ok(summary);
    }

    tracing::info!(
        slot = %slot,
        items = items.len(),
        recipients = matched.len(),
        "starting scheduled dispatch"
    );

    let item_ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();

    for recipient in &matched {
        let Some(token) = recipient.token() else {
            summary.skipped += 1;
            continue;
        };

        let delivered = match ctx.ledger.delivered_item_ids(&recipient.user_id, &item_ids).await {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::error!(error = %e, user_id = %recipient.user_id, "failed to read delivery history");
                summary.errors += 1;
                continue;
            }
        };

        let Some(item) = newest_undelivered(&items, &delivered) else {
            tracing::debug!(user_id = %recipient.user_id, "recipient already caught up");
            summary.skipped += 1;
            continue;
        };

        match ctx.dispatcher.dispatch(token, item).await {
            DispatchOutcome::Delivered { .. } => {
                summary.sent += 1;
                if let Err(e) = ctx.ledger.record_delivery(&recipient.user_id, &item.id).await {
                    tracing::error!(
                        error = %e,
                        user_id = %recipient.user_id,
                        case_file_id = %item.id,
                        "notification sent but history not recorded"
                    );
                    summary.ledger_errors += 1;
                }
            }
            _ => summary.errors += 1,
        }
    }

    tracing::info!(
        slot = %slot,
        sent = summary.sent,
        skipped = summary.skipped,
        errors = summary.errors,
        "scheduled dispatch finished"
    );

    Ok(summary)
}

/// Recipients across every range of the slot's window, first occurrence kept.
async fn matching_recipients(
    store: &dyn RecipientStore,
    slot: EffectiveSlot,
    tolerance: u32,
) -> AppResult<Vec<Recipient>> {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();

    for range in slot::match_ranges(slot, tolerance) {
        for recipient in store.recipients_in_range(range).await? {
            if seen.insert(recipient.user_id.clone()) {
                matched.push(recipient);
            }
        }
    }

    Ok(matched)
}

/// `items` must be sorted newest first.
fn newest_undelivered<'a>(items: &'a [ContentItem], delivered: &HashSet<String>) -> Option<&'a ContentItem> {
    items.iter().find(|item| !delivered.contains(&item.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{item, recipient};
    use crate::services::throttle::DispatchThrottle;
    use crate::services::MessageTemplate;
    use crate::testing::{GatewayBehavior, MemoryLedger, MemoryRecipientStore, RecordingGateway, StaticContentStore};
    use chrono::TimeZone;
    use std::sync::Arc;

    struct Harness {
        content: StaticContentStore,
        recipients: MemoryRecipientStore,
        ledger: MemoryLedger,
        gateway: Arc<RecordingGateway>,
        dispatcher: Dispatcher,
    }

    impl Harness {
        fn new(items: Vec<ContentItem>, recipients: Vec<Recipient>) -> Self {
            let gateway = Arc::new(RecordingGateway::default());
            let dispatcher = Dispatcher::new(
                gateway.clone(),
                DispatchThrottle::new(std::time::Duration::ZERO),
                MessageTemplate {
                    sound: "default".into(),
                    navigation_screen: "CaseFileDetail".into(),
                },
            );
            Self {
                content: StaticContentStore::with(items),
                recipients: MemoryRecipientStore::with(recipients),
                ledger: MemoryLedger::default(),
                gateway,
                dispatcher,
            }
        }

        async fn run(&self, now: DateTime<Utc>) -> AppResult<ScheduledSummary> {
            let ctx = JobContext {
                content: &self.content,
                recipients: &self.recipients,
                ledger: &self.ledger,
                dispatcher: &self.dispatcher,
            };
            run(now, &settings(), &ctx).await
        }
    }

    fn settings() -> ScheduleSettings {
        ScheduleSettings {
            timezone: chrono_tz::UTC,
            slot_minutes: 15,
            tolerance_minutes: 7,
            lookback: Duration::hours(24),
        }
    }

    /// 10:16 UTC, serviced as slot 10:15.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 10, 16, 0).unwrap()
    }

    fn published(id: &str, hours_ago: i64) -> ContentItem {
        let mut i = item(id, &[]);
        i.published_at = now() - Duration::hours(hours_ago);
        i
    }

    fn scheduled(user_id: &str, hour: i32, minute: i32) -> Recipient {
        let mut r = recipient(user_id, None);
        r.notification_hour = Some(hour);
        r.notification_minute = Some(minute);
        r
    }

    #[tokio::test]
    async fn no_recent_items_short_circuits() {
        let h = Harness::new(vec![published("old", 30)], vec![scheduled("r1", 10, 15)]);

        let summary = h.run(now()).await.unwrap();

        assert_eq!(summary.items_available, 0);
        assert_eq!(summary.recipients_matched, 0);
        assert!(h.recipients.range_queries.lock().unwrap().is_empty());
        assert!(h.gateway.sent().is_empty());
        assert_eq!(summary.message(), "no recently published case files");
    }

    #[tokio::test]
    async fn lookback_window_is_passed_to_content_store() {
        let h = Harness::new(vec![], vec![]);
        h.run(now()).await.unwrap();
        assert_eq!(*h.content.queried_since.lock().unwrap(), Some(now() - Duration::hours(24)));
    }

    #[tokio::test]
    async fn matches_preferred_minutes_within_tolerance() {
        let h = Harness::new(
            vec![published("a", 1)],
            vec![
                scheduled("early", 10, 5),
                scheduled("edge-low", 10, 8),
                scheduled("near", 10, 10),
                scheduled("exact", 10, 15),
                scheduled("edge-high", 10, 22),
                scheduled("late", 10, 25),
                scheduled("other-hour", 11, 15),
            ],
        );

        let summary = h.run(now()).await.unwrap();

        assert_eq!(summary.slot, EffectiveSlot { hour: 10, minute: 15 });
        assert_eq!(summary.recipients_matched, 4);
        let mut sent = h.gateway.sent_to();
        sent.sort();
        assert_eq!(
            sent,
            vec![
                "ExponentPushToken[edge-high]",
                "ExponentPushToken[edge-low]",
                "ExponentPushToken[exact]",
                "ExponentPushToken[near]",
            ]
        );
    }

    #[tokio::test]
    async fn no_matching_recipients_reports_available_items() {
        let h = Harness::new(vec![published("a", 1), published("b", 2)], vec![scheduled("r1", 18, 0)]);

        let summary = h.run(now()).await.unwrap();

        assert_eq!(summary.items_available, 2);
        assert_eq!(summary.recipients_matched, 0);
        assert_eq!(summary.sent, 0);
        assert!(summary.message().contains("2 case files available"));
    }

    #[tokio::test]
    async fn sends_only_the_newest_pending_item() {
        let h = Harness::new(
            vec![published("older", 5), published("newest", 1), published("middle", 3)],
            vec![scheduled("r1", 10, 15)],
        );

        let summary = h.run(now()).await.unwrap();

        assert_eq!(summary.sent, 1);
        let sent = h.gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data["caseFileId"], "newest");
        assert_eq!(h.ledger.pairs(), vec![("r1".to_string(), "newest".to_string())]);
    }

    #[tokio::test]
    async fn skips_items_already_delivered() {
        let h = Harness::new(
            vec![published("newest", 1), published("older", 5)],
            vec![scheduled("r1", 10, 15)],
        );
        h.ledger.seed("r1", "newest");

        h.run(now()).await.unwrap();

        assert_eq!(h.gateway.sent()[0].data["caseFileId"], "older");
    }

    #[tokio::test]
    async fn second_run_in_same_slot_sends_nothing() {
        let h = Harness::new(vec![published("only", 1)], vec![scheduled("r1", 10, 15)]);

        let first = h.run(now()).await.unwrap();
        let second = h.run(now() + Duration::minutes(1)).await.unwrap();

        assert_eq!(first.sent, 1);
        assert_eq!(second.sent, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(h.gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_dispatch_writes_no_record() {
        let h = Harness::new(vec![published("only", 1)], vec![scheduled("r1", 10, 15)]);
        h.gateway.set_behavior("ExponentPushToken[r1]", GatewayBehavior::Reject);

        let summary = h.run(now()).await.unwrap();

        assert_eq!(summary.errors, 1);
        assert!(h.ledger.pairs().is_empty());

        // Not recorded, so the next run retries.
        h.gateway.set_behavior("ExponentPushToken[r1]", GatewayBehavior::Accept);
        let retry = h.run(now()).await.unwrap();
        assert_eq!(retry.sent, 1);
    }

    #[tokio::test]
    async fn history_read_failure_skips_only_that_recipient() {
        let h = Harness::new(
            vec![published("only", 1)],
            vec![scheduled("r1", 10, 15), scheduled("r2", 10, 15)],
        );
        h.ledger.fail_reads_for.lock().unwrap().insert("r1".to_string());

        let summary = h.run(now()).await.unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(h.gateway.sent_to(), vec!["ExponentPushToken[r2]"]);
    }

    #[tokio::test]
    async fn recipient_query_failure_is_fatal() {
        let mut h = Harness::new(vec![published("only", 1)], vec![]);
        h.recipients = MemoryRecipientStore::failing();

        assert!(h.run(now()).await.is_err());
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn content_query_failure_is_fatal() {
        let mut h = Harness::new(vec![], vec![scheduled("r1", 10, 15)]);
        h.content.fail = true;

        assert!(h.run(now()).await.is_err());
    }

    #[tokio::test]
    async fn top_of_hour_run_includes_late_previous_hour_preferences() {
        let h = Harness::new(vec![published("only", 1)], vec![scheduled("r1", 9, 55), scheduled("r2", 10, 3)]);

        let at_ten = Utc.with_ymd_and_hms(2026, 10, 19, 9, 58, 0).unwrap();
        let summary = h.run(at_ten).await.unwrap();

        assert_eq!(summary.slot, EffectiveSlot { hour: 10, minute: 0 });
        assert_eq!(summary.recipients_matched, 2);
    }
}
