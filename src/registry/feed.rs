use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::feed::Item;

/// Where a feed's notifications go.
///
/// Captured from the subscribing request and handed back to the notification
/// sink unchanged. Only `from` is ever read here, to scope `list` to a requester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Origin {
    pub fn new(from: Option<String>, to: Option<String>) -> Self {
        Self {
            from,
            to,
            extra: Map::new(),
        }
    }

    /// True when this origin is hidden from `requester`: both sides name a
    /// requester and the names differ.
    pub fn hidden_from(&self, requester: Option<&str>) -> bool {
        matches!((self.from.as_deref(), requester), (Some(owner), Some(r)) if owner != r)
    }
}

/// A subscribed feed plus its polling state.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub origin: Origin,
    /// Identity of the first item seen on the last successful poll.
    pub last_seen_id: Option<String>,
    pub subscribed_at: i64,
}

impl Feed {
    pub fn new(id: i64, url: impl Into<String>, origin: Origin) -> Self {
        Self {
            id,
            url: url.into(),
            origin,
            last_seen_id: None,
            subscribed_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Items in `fetched` that are newer than the watermark, in fetch order.
    ///
    /// - No watermark yet: everything is new.
    /// - Watermark found at position `k`: the first `k` items.
    /// - Watermark not found (feed rotated past it): everything is new.
    ///
    /// Any non-empty fetch moves the watermark to the first fetched item, so this
    /// is not idempotent: call it once per successful fetch. An empty fetch
    /// returns nothing and leaves the watermark alone.
    pub fn new_items(&mut self, fetched: &[Item]) -> Vec<Item> {
        let Some(first) = fetched.first() else {
            return Vec::new();
        };

        let fresh = match self.last_seen_id.as_deref() {
            None => fetched.to_vec(),
            Some(seen) => match fetched.iter().position(|item| item.identity() == seen) {
                Some(k) => fetched[..k].to_vec(),
                None => fetched.to_vec(),
            },
        };

        self.last_seen_id = Some(first.identity().to_string());
        fresh
    }
}
