use std::future::Future;

use super::schema::Database;
use super::types::{DatabaseError, StoredFeed, SubscriptionRow};

/// Durable map from feed id to subscription attributes.
///
/// Only single-key atomicity is assumed. The registry treats whatever this
/// returns from [`get_all`](SubscriptionStore::get_all) at startup as the truth.
pub trait SubscriptionStore: Send + Sync + 'static {
    /// Every decodable entry, ordered by id.
    fn get_all(&self) -> impl Future<Output = Result<Vec<StoredFeed>, DatabaseError>> + Send;

    /// Insert or replace the entry for `feed.id`.
    fn put(&self, feed: &StoredFeed) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    /// Remove the entry for `id`. Removing an absent id succeeds.
    fn delete(&self, id: i64) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    /// Record the watermark of an existing entry. No-op for absent ids.
    fn set_watermark(
        &self,
        id: i64,
        last_seen_id: Option<&str>,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;
}

impl SubscriptionStore for Database {
    async fn get_all(&self) -> Result<Vec<StoredFeed>, DatabaseError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT id, url, origin, last_seen_id, subscribed_at
            FROM subscriptions
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let feeds = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                match row.into_stored() {
                    Ok(feed) => Some(feed),
                    Err(e) => {
                        tracing::warn!(feed_id = id, error = %e, "Skipping undecodable subscription");
                        None
                    }
                }
            })
            .collect();
        Ok(feeds)
    }

    async fn put(&self, feed: &StoredFeed) -> Result<(), DatabaseError> {
        let origin = serde_json::to_string(&feed.origin).map_err(|e| DatabaseError::Corrupt {
            id: feed.id,
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, url, origin, last_seen_id, subscribed_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                origin = excluded.origin,
                last_seen_id = excluded.last_seen_id,
                subscribed_at = excluded.subscribed_at
        "#,
        )
        .bind(feed.id)
        .bind(&feed.url)
        .bind(&origin)
        .bind(&feed.last_seen_id)
        .bind(feed.subscribed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM subscriptions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_watermark(&self, id: i64, last_seen_id: Option<&str>) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE subscriptions SET last_seen_id = ? WHERE id = ?")
            .bind(last_seen_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
