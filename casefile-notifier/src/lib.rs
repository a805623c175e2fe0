pub mod config;
pub mod events;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use casefile_shared::middleware::metrics_middleware;

use crate::events::publish_event::PublishRules;
use crate::services::scheduled_job::ScheduleSettings;
use crate::services::{ContentStore, DeliveryLedger, Dispatcher, RecipientStore};

/// Source of "now" for the scheduled job.
pub type Clock = fn() -> DateTime<Utc>;

pub struct AppState {
    pub config: config::AppConfig,
    pub recipients: Arc<dyn RecipientStore>,
    pub ledger: Arc<dyn DeliveryLedger>,
    pub content: Arc<dyn ContentStore>,
    pub dispatcher: Dispatcher,
    pub schedule: ScheduleSettings,
    pub clock: Clock,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl AppState {
    pub fn publish_rules(&self) -> PublishRules<'_> {
        PublishRules {
            publish_topic: &self.config.publish_topic,
            content_type: &self.config.notifiable_content_type,
            locale: &self.config.locale,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route(
            "/webhooks/content",
            post(routes::webhook::receive_publish).fallback(routes::webhook::method_not_allowed),
        )
        .route(
            "/cron/notifications",
            get(routes::cron::run_scheduled).post(routes::cron::run_scheduled),
        )
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
