//! Subscribed feeds and their watermarks.
//!
//! [`Feed`] carries one subscription's polling state and the new-item diff;
//! [`FeedRegistry`] is the shared, mutex-guarded map of live feeds backed by a
//! [`SubscriptionStore`](crate::storage::SubscriptionStore).

mod feed;
mod feed_registry;

pub use feed::{Feed, Origin};
pub use feed_registry::{FeedRegistry, RegistryError, ID_SPACE};
