use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use casefile_shared::clients::db::DbPool;
use casefile_shared::{AppError, AppResult};

use crate::models::{DeliveryRecord, NewDeliveryRecord};
use crate::schema::notification_history;

/// Append-only record of which case files each user has been notified about.
///
/// Lookups and appends are separate calls. Two concurrent runs can both see
/// "not delivered" and both append; duplicate rows are tolerated.
#[async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// The subset of `item_ids` already delivered to `user_id`.
    async fn delivered_item_ids(&self, user_id: &str, item_ids: &[String]) -> AppResult<HashSet<String>>;

    async fn record_delivery(&self, user_id: &str, item_id: &str) -> AppResult<DeliveryRecord>;
}

#[derive(Clone)]
pub struct PgDeliveryLedger {
    pool: DbPool,
}

impl PgDeliveryLedger {
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
            Ok(op(&mut conn)?)
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
    }
}

#[async_trait]
impl DeliveryLedger for PgDeliveryLedger {
    async fn delivered_item_ids(&self, user_id: &str, item_ids: &[String]) -> AppResult<HashSet<String>> {
        if item_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let user_id = user_id.to_string();
        let item_ids = item_ids.to_vec();
        let delivered: Vec<String> = self
            .with_conn(move |conn| {
                notification_history::table
                    .filter(notification_history::user_id.eq(user_id))
                    .filter(notification_history::case_file_id.eq_any(item_ids))
                    .select(notification_history::case_file_id)
                    .load(conn)
            })
            .await?;

        Ok(delivered.into_iter().collect())
    }

    async fn record_delivery(&self, user_id: &str, item_id: &str) -> AppResult<DeliveryRecord> {
        let user_id = user_id.to_string();
        let item_id = item_id.to_string();

        let record = self.with_conn(move |conn| {
            let record = NewDeliveryRecord {
                user_id: &user_id,
                case_file_id: &item_id,
                sent_at: Utc::now(),
            };
            diesel::insert_into(notification_history::table)
                .values(&record)
                .returning(DeliveryRecord::as_returning())
                .get_result(conn)
        })
        .await?;

        tracing::debug!(
            record_id = %record.id,
            user_id = %record.user_id,
            case_file_id = %record.case_file_id,
            "delivery recorded"
        );
        Ok(record)
    }
}
