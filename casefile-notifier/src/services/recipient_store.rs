use async_trait::async_trait;
use diesel::prelude::*;

use casefile_shared::clients::db::DbPool;
use casefile_shared::{AppError, AppResult, ErrorCode};

use crate::models::Recipient;
use crate::schema::notification_recipients;
use crate::services::slot::MinuteRange;

/// Read-only view of the users who can receive case file notifications.
///
/// Only enabled users that hold a push token are ever returned.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    async fn enabled_recipients(&self) -> AppResult<Vec<Recipient>>;

    /// Enabled users whose preferred time falls in `range`.
    async fn recipients_in_range(&self, range: MinuteRange) -> AppResult<Vec<Recipient>>;

    async fn ping(&self) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgRecipientStore {
    pool: DbPool,
}

impl PgRecipientStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> AppResult<T> {
            let mut conn = pool.get()?;
            op(&mut conn).map_err(|e| {
                tracing::error!(error = %e, "recipient query failed");
                AppError::new(ErrorCode::RecipientQueryFailed, "failed to load recipients")
            })
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
    }
}

#[async_trait]
impl RecipientStore for PgRecipientStore {
    async fn enabled_recipients(&self) -> AppResult<Vec<Recipient>> {
        self.with_conn(|conn| {
            notification_recipients::table
                .filter(notification_recipients::notifications_enabled.eq(true))
                .filter(notification_recipients::push_token.is_not_null())
                .select(Recipient::as_select())
                .load(conn)
        })
        .await
    }

    async fn recipients_in_range(&self, range: MinuteRange) -> AppResult<Vec<Recipient>> {
        let hour = range.hour as i32;
        let from = range.minute_from as i32;
        let to = range.minute_to as i32;

        self.with_conn(move |conn| {
            notification_recipients::table
                .filter(notification_recipients::notifications_enabled.eq(true))
                .filter(notification_recipients::push_token.is_not_null())
                .filter(notification_recipients::notification_hour.eq(hour))
                .filter(notification_recipients::notification_minute.between(from, to))
                .select(Recipient::as_select())
                .load(conn)
        })
        .await
    }

    async fn ping(&self) -> AppResult<()> {
        self.with_conn(|conn| diesel::sql_query("SELECT 1").execute(conn).map(|_| ()))
            .await
    }
}
