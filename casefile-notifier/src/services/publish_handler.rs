use serde::Serialize;

use casefile_shared::AppResult;

use crate::models::ContentItem;
use crate::services::delivery_ledger::DeliveryLedger;
use crate::services::dispatcher::{DispatchOutcome, Dispatcher};
use crate::services::recipient_store::RecipientStore;

/// Identifying fields of the item a run was about.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContentItemSummary {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl From<&ContentItem> for ContentItemSummary {
    fn from(item: &ContentItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            case_id: item.case_id,
            slug: item.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PublishSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_item: Option<ContentItemSummary>,
    pub recipients: usize,
    pub sent: usize,
    pub skipped: usize,
    pub errors: usize,
    pub ledger_errors: usize,
}

/// Notify every enabled recipient whose category filter accepts `item`.
///
/// Failing to load recipients aborts the run; a failed dispatch only counts
/// as an error. Successful dispatches are appended to the ledger, and a
/// failed append is logged without undoing the send.
pub async fn notify_recipients(
    recipients: &dyn RecipientStore,
    ledger: &dyn DeliveryLedger,
    dispatcher: &Dispatcher,
    item: &ContentItem,
) -> AppResult<PublishSummary> {
    let candidates = recipients.enabled_recipients().await?;

    let mut summary = PublishSummary {
        content_item: Some(ContentItemSummary::from(item)),
        recipients: candidates.len(),
        ..PublishSummary::default()
    };

    tracing::info!(
        case_file_id = %item.id,
        recipients = candidates.len(),
        "dispatching publish notification"
    );

    for recipient in &candidates {
        if !recipient.accepts(item) {
            tracing::debug!(user_id = %recipient.user_id, "category preference excludes item");
            summary.skipped += 1;
            continue;
        }

        let Some(token) = recipient.token() else {
            tracing::debug!(user_id = %recipient.user_id, "recipient has no push token");
            summary.skipped += 1;
            continue;
        };

        match dispatcher.dispatch(token, item).await {
            DispatchOutcome::Delivered { .. } => {
                summary.sent += 1;
                if let Err(e) = ledger.record_delivery(&recipient.user_id, &item.id).await {
                    tracing::error!(
                        error = %e,
                        user_id = %recipient.user_id,
                        case_file_id = %item.id,
                        "notification sent but history not recorded"
                    );
                    summary.ledger_errors += 1;
                }
            }
            _ => {
                tracing::warn!(user_id = %recipient.user_id, case_file_id = %item.id, "notification not delivered");
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        case_file_id = %item.id,
        sent = summary.sent,
        skipped = summary.skipped,
        errors = summary.errors,
        "publish notification finished"
    );

    Ok(summary)
}
