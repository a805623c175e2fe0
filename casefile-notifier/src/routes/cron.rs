use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use metrics::counter;

use casefile_shared::middleware::{secret_matches, BearerToken};
use casefile_shared::types::api::ApiResponse;
use casefile_shared::{AppError, AppResult, ErrorCode};

use crate::services::scheduled_job::{self, JobContext, ScheduledSummary};
use crate::AppState;

/// GET|POST /cron/notifications
/// Scheduled dispatch trigger, authorized by the shared cron secret.
pub async fn run_scheduled(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<ApiResponse<ScheduledSummary>>> {
    if !secret_matches(&token, &state.config.cron_secret) {
        tracing::warn!("scheduled trigger rejected: bad credential");
        return Err(AppError::new(ErrorCode::CronSecretInvalid, "invalid cron credential"));
    }

    counter!("notifier_runs_total", "trigger" => "schedule").increment(1);

    let ctx = JobContext {
        content: state.content.as_ref(),
        recipients: state.recipients.as_ref(),
        ledger: state.ledger.as_ref(),
        dispatcher: &state.dispatcher,
    };

    let summary = scheduled_job::run((state.clock)(), &state.schedule, &ctx).await?;
    let message = summary.message();

    Ok(Json(ApiResponse::ok_with_message(summary, message)))
}
