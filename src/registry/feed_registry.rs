use rand::Rng;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;

use super::feed::{Feed, Origin};
use crate::feed::Item;
use crate::storage::{DatabaseError, StoredFeed, SubscriptionStore};

/// Feed ids are drawn from `1..ID_SPACE`.
pub const ID_SPACE: i64 = 1000;

/// Random draws before falling back to a linear scan for a free id.
const MAX_ID_ATTEMPTS: usize = 64;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid feed URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("No free feed id left ({0} feeds subscribed)")]
    IdSpaceExhausted(usize),

    #[error("Failed to persist subscription: {0}")]
    Store(#[from] DatabaseError),
}

/// In-memory set of live feeds, mirrored to a [`SubscriptionStore`].
///
/// One mutex guards the whole map. Key-set changes hold it across the store
/// write, so an id is never handed out twice and a failed write leaves memory
/// untouched.
pub struct FeedRegistry<S> {
    feeds: Mutex<BTreeMap<i64, Feed>>,
    store: S,
    persist_watermarks: bool,
}

impl<S: SubscriptionStore> FeedRegistry<S> {
    pub fn new(store: S) -> Self {
        Self {
            feeds: Mutex::new(BTreeMap::new()),
            store,
            persist_watermarks: true,
        }
    }

    /// Whether watermarks are written back to the store and restored by
    /// [`load`](Self::load). When off, every restart re-announces current items.
    pub fn with_watermark_persistence(mut self, enabled: bool) -> Self {
        self.persist_watermarks = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace the in-memory map with the store's contents.
    pub async fn load(&self) -> Result<usize, RegistryError> {
        let stored = self.store.get_all().await?;

        let mut feeds = self.feeds.lock().await;
        feeds.clear();
        for entry in stored {
            let mut feed = entry.into_feed();
            if !self.persist_watermarks {
                feed.last_seen_id = None;
            }
            feeds.insert(feed.id, feed);
        }

        tracing::info!(count = feeds.len(), "Loaded subscriptions");
        Ok(feeds.len())
    }

    /// Subscribe one URL under a fresh id.
    pub async fn subscribe(&self, url: &str, origin: Origin) -> Result<Feed, RegistryError> {
        let url = validate_feed_url(url)?;

        let mut feeds = self.feeds.lock().await;
        let id = allocate_id(&feeds)?;
        let feed = Feed::new(id, url, origin);

        self.store.put(&StoredFeed::from(&feed)).await?;
        feeds.insert(id, feed.clone());

        tracing::info!(feed_id = id, url = %feed.url, "Subscribed");
        Ok(feed)
    }

    /// Subscribe each URL independently; earlier successes are kept when a
    /// later one fails.
    pub async fn subscribe_many<'a, I>(
        &self,
        urls: I,
        origin: &Origin,
    ) -> Vec<(String, Result<Feed, RegistryError>)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut results = Vec::new();
        for url in urls {
            let result = self.subscribe(url, origin.clone()).await;
            if let Err(e) = &result {
                tracing::warn!(url = %url, error = %e, "Subscription failed");
            }
            results.push((url.to_string(), result));
        }
        results
    }

    /// Remove a feed. Returns whether it was subscribed; absent ids are not an error.
    pub async fn unsubscribe(&self, id: i64) -> Result<bool, RegistryError> {
        let mut feeds = self.feeds.lock().await;
        self.store.delete(id).await?;

        let removed = feeds.remove(&id).is_some();
        if removed {
            tracing::info!(feed_id = id, "Unsubscribed");
        }
        Ok(removed)
    }

    /// Feeds visible to `requester`, ordered by id. Feeds without a recorded
    /// requester are visible to everyone.
    pub async fn list(&self, requester: Option<&str>) -> Vec<Feed> {
        let feeds = self.feeds.lock().await;
        feeds
            .values()
            .filter(|feed| !feed.origin.hidden_from(requester))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: i64) -> Option<Feed> {
        self.feeds.lock().await.get(&id).cloned()
    }

    /// `(id, url)` of every feed, in poll order.
    pub async fn snapshot(&self) -> Vec<(i64, String)> {
        let feeds = self.feeds.lock().await;
        feeds.iter().map(|(id, feed)| (*id, feed.url.clone())).collect()
    }

    pub async fn len(&self) -> usize {
        self.feeds.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.feeds.lock().await.is_empty()
    }

    /// Run [`Feed::new_items`] for `id` against a fetch result.
    ///
    /// Returns `None` if the feed was unsubscribed meanwhile. A moved watermark
    /// is written to the store; a failed write is logged and the in-memory
    /// watermark is kept.
    pub async fn diff(&self, id: i64, fetched: &[Item]) -> Option<(Origin, Vec<Item>)> {
        let mut feeds = self.feeds.lock().await;
        let feed = feeds.get_mut(&id)?;

        let before = feed.last_seen_id.clone();
        let fresh = feed.new_items(fetched);

        if self.persist_watermarks && feed.last_seen_id != before {
            if let Err(e) = self
                .store
                .set_watermark(id, feed.last_seen_id.as_deref())
                .await
            {
                tracing::warn!(feed_id = id, error = %e, "Failed to persist watermark");
            }
        }

        Some((feed.origin.clone(), fresh))
    }
}

fn validate_feed_url(raw: &str) -> Result<String, RegistryError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| RegistryError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(RegistryError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

fn allocate_id(feeds: &BTreeMap<i64, Feed>) -> Result<i64, RegistryError> {
    let mut rng = rand::rng();
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = rng.random_range(1..ID_SPACE);
        if !feeds.contains_key(&candidate) {
            return Ok(candidate);
        }
    }

    (1..ID_SPACE)
        .find(|candidate| !feeds.contains_key(candidate))
        .ok_or(RegistryError::IdSpaceExhausted(feeds.len()))
}
