//! Feed subscriptions with a background poller that announces each new entry
//! exactly once to whoever subscribed.
//!
//! - [`feed`] - items, parsing and HTTP fetching
//! - [`registry`] - subscribed feeds and the new-item watermark
//! - [`storage`] - durable subscription store on SQLite
//! - [`poller`] - the periodic poll loop and on-demand fetch
//! - [`notify`] - notification delivery seam
//! - [`commands`] - text command surface
//! - [`config`] - TOML configuration and environment overrides

pub mod commands;
pub mod config;
pub mod feed;
pub mod notify;
pub mod poller;
pub mod registry;
pub mod storage;
