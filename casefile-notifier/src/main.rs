use std::sync::Arc;

use chrono::{Duration, Utc};

use casefile_notifier::config::AppConfig;
use casefile_notifier::services::scheduled_job::ScheduleSettings;
use casefile_notifier::services::{
    ContentfulStore, DispatchThrottle, Dispatcher, MessageTemplate, PgDeliveryLedger, PgRecipientStore,
};
use casefile_notifier::AppState;
use casefile_shared::clients::content::ContentClient;
use casefile_shared::clients::db::create_pool;
use casefile_shared::clients::push::PushClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    casefile_shared::middleware::init_tracing("casefile-notifier");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.database_pool_size)?;

    let push = PushClient::new(
        &config.push_endpoint,
        config.push_access_token.as_deref(),
        config.push_timeout(),
    )?;
    tracing::info!(endpoint = %push.endpoint(), "push gateway configured");

    let content = ContentClient::new(
        &config.content_base_url,
        &config.content_space_id,
        &config.content_environment,
        &config.content_access_token,
        std::time::Duration::from_secs(15),
    )?;

    let metrics_handle = casefile_shared::middleware::init_metrics()?;

    let dispatcher = Dispatcher::new(
        Arc::new(push),
        DispatchThrottle::new(config.dispatch_interval()),
        MessageTemplate {
            sound: config.push_sound.clone(),
            navigation_screen: config.navigation_screen.clone(),
        },
    );

    let schedule = ScheduleSettings {
        timezone: config.tz()?,
        slot_minutes: config.slot_minutes,
        tolerance_minutes: config.match_tolerance_minutes,
        lookback: Duration::hours(config.lookback_hours),
    };

    let state = Arc::new(AppState {
        recipients: Arc::new(PgRecipientStore::new(db.clone())),
        ledger: Arc::new(PgDeliveryLedger::new(db)),
        content: Arc::new(ContentfulStore::new(
            content,
            &config.notifiable_content_type,
            &config.locale,
        )),
        dispatcher,
        schedule,
        clock: Utc::now,
        metrics_handle,
        config,
    });

    let app = casefile_notifier::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "casefile-notifier starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
