//! Feed retrieval: item type, parsing, and HTTP fetching.
//!
//! - [`Item`] - one entry of a fetched feed, identified by its `id`
//! - [`parse_feed`] - RSS/Atom/JSON Feed parsing via `feed-rs`
//! - [`FeedFetcher`] - the fetch seam used by the poller; [`HttpFetcher`] is the
//!   reqwest-backed implementation with retry and size limits
//!
//! # Example
//!
//! ```ignore
//! use feedwatch::feed::{FeedFetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT};
//!
//! let fetcher = HttpFetcher::new(DEFAULT_FETCH_TIMEOUT)?;
//! let items = fetcher.fetch("https://example.com/feed.xml").await?;
//! ```

mod fetcher;
mod item;
mod parser;

pub use fetcher::{FeedFetcher, FetchError, HttpFetcher, DEFAULT_FETCH_TIMEOUT};
pub use item::Item;
pub use parser::parse_feed;
