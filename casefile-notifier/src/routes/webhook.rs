use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use metrics::counter;

use casefile_shared::types::api::ApiResponse;
use casefile_shared::{AppError, AppResult};

use crate::events::publish_event::{self, IgnoreReason, PublishDecision, TOPIC_HEADER};
use crate::services::publish_handler::{self, PublishSummary};
use crate::AppState;

fn ignored(reason: IgnoreReason) -> Json<ApiResponse<PublishSummary>> {
    tracing::info!(reason = %reason.message(), "publish event ignored");
    Json(ApiResponse::ok_with_message(PublishSummary::default(), reason.message()))
}

/// POST /webhooks/content
/// Publish-event webhook. Anything other than a flagged case file publish is
/// acknowledged with 200 and no dispatch.
pub async fn receive_publish(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<PublishSummary>>> {
    counter!("notifier_runs_total", "trigger" => "publish").increment(1);

    let rules = state.publish_rules();
    let topic = headers.get(TOPIC_HEADER).and_then(|v| v.to_str().ok());

    if !publish_event::is_publish_topic(topic, &rules) {
        return Ok(ignored(IgnoreReason::NotPublishTopic(topic.map(str::to_string))));
    }

    let entry = publish_event::parse_entry(&body)?;
    let item = match publish_event::evaluate(&entry, &rules) {
        PublishDecision::Ignore(reason) => return Ok(ignored(reason)),
        PublishDecision::Notify(item) => item,
    };

    tracing::info!(case_file_id = %item.id, title = %item.title, "case file published with notification");

    let summary = publish_handler::notify_recipients(
        state.recipients.as_ref(),
        state.ledger.as_ref(),
        &state.dispatcher,
        &item,
    )
    .await?;

    let message = format!("notifications processed for {}", item.id);
    Ok(Json(ApiResponse::ok_with_message(summary, message)))
}

/// Any non-POST method on the webhook route.
pub async fn method_not_allowed() -> AppError {
    AppError::method_not_allowed("method not allowed, use POST")
}
