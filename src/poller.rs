//! Background polling of subscribed feeds.
//!
//! One [`Poller`] walks the registry sequentially, fetches each feed, diffs it
//! against the feed's watermark and delivers every new item to the feed's
//! origin. The same poll step backs [`Poller::immediate_fetch`]; a gate mutex
//! keeps the two from interleaving on any feed.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::feed::{FeedFetcher, FetchError, Item};
use crate::notify::{format_entry, NotificationSink};
use crate::registry::FeedRegistry;
use crate::storage::SubscriptionStore;

/// Default time between poll cycles (15 minutes).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(900);

/// Pause before restarting a crashed poll loop.
const RESTART_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Feed {0} not found")]
    NotFound(i64),

    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),
}

/// Outcome counts of one pass over the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub polled: usize,
    pub failed: usize,
    pub new_items: usize,
}

pub struct Poller<S, F, N> {
    registry: Arc<FeedRegistry<S>>,
    fetcher: F,
    sink: N,
    interval: Duration,
    gate: Mutex<()>,
}

impl<S, F, N> Poller<S, F, N>
where
    S: SubscriptionStore,
    F: FeedFetcher,
    N: NotificationSink,
{
    pub fn new(registry: Arc<FeedRegistry<S>>, fetcher: F, sink: N) -> Self {
        Self {
            registry,
            fetcher,
            sink,
            interval: DEFAULT_POLL_INTERVAL,
            gate: Mutex::new(()),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn registry(&self) -> &Arc<FeedRegistry<S>> {
        &self.registry
    }

    /// Poll one feed now and deliver its new items.
    ///
    /// Shares the watermark with the periodic loop: whatever this reports will
    /// not be reported again by the next cycle.
    pub async fn immediate_fetch(&self, id: i64) -> Result<Vec<Item>, PollError> {
        self.poll_feed(id).await
    }

    /// One sequential pass over every subscribed feed.
    ///
    /// Fetch failures are logged and skipped. Stops between feeds once
    /// `shutdown` reads `true`.
    pub async fn poll_cycle(&self, shutdown: Option<&watch::Receiver<bool>>) -> CycleSummary {
        let snapshot = self.registry.snapshot().await;
        let mut summary = CycleSummary::default();

        tracing::debug!(feeds = snapshot.len(), "Starting poll cycle");

        for (id, url) in snapshot {
            if shutdown.is_some_and(is_shutdown) {
                tracing::debug!("Shutdown requested, ending poll cycle early");
                break;
            }

            match self.poll_feed(id).await {
                Ok(items) => {
                    summary.polled += 1;
                    summary.new_items += items.len();
                }
                Err(PollError::NotFound(_)) => {
                    tracing::debug!(feed_id = id, "Feed unsubscribed during cycle, skipping");
                }
                Err(PollError::Fetch(e)) => {
                    summary.failed += 1;
                    tracing::warn!(feed_id = id, url = %url, error = %e, "Failed to fetch feed");
                }
            }
        }

        tracing::debug!(
            polled = summary.polled,
            failed = summary.failed,
            new_items = summary.new_items,
            "Poll cycle finished"
        );
        summary
    }

    async fn poll_feed(&self, id: i64) -> Result<Vec<Item>, PollError> {
        let _gate = self.gate.lock().await;

        let feed = self.registry.get(id).await.ok_or(PollError::NotFound(id))?;
        tracing::debug!(feed_id = id, url = %feed.url, "Fetching feed");

        let fetched = self.fetcher.fetch(&feed.url).await?;
        let (origin, fresh) = self
            .registry
            .diff(id, &fetched)
            .await
            .ok_or(PollError::NotFound(id))?;

        for item in &fresh {
            tracing::info!(feed_id = id, title = %item.title, link = %item.link, "New item found");
            if let Err(e) = self.sink.deliver(&origin, &format_entry(item)).await {
                tracing::warn!(feed_id = id, error = %e, "Failed to deliver notification");
            }
        }

        Ok(fresh)
    }

    /// Poll forever: a cycle, then wait out the interval.
    ///
    /// Returns once `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Feed poller started"
        );

        loop {
            if is_shutdown(&shutdown) {
                break;
            }

            self.poll_cycle(Some(&shutdown)).await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Feed poller stopped");
    }

    /// Spawn [`run`](Self::run) and restart it whenever it panics.
    ///
    /// The returned handle completes after a clean shutdown.
    pub fn spawn_supervised(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let task = tokio::spawn(Arc::clone(&self).run(shutdown.clone()));
                match task.await {
                    Ok(()) => break,
                    Err(e) if e.is_panic() => {
                        tracing::error!(error = %e, "Feed poller crashed, restarting");
                        if is_shutdown(&shutdown) {
                            break;
                        }
                        tokio::time::sleep(RESTART_DELAY).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Feed poller cancelled");
                        break;
                    }
                }
            }
        })
    }
}

fn is_shutdown(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}
