//! Text command surface over the registry and poller.
//!
//! Recognised commands:
//!
//! - `subscribe rss <url> [<url>...]`
//! - `unsubscribe rss <id>`
//! - `list rss feeds`
//! - `fetch rss <id>`
//!
//! Ids must be numeric; anything else is treated as an unknown feed.

use std::sync::Arc;

use crate::feed::FeedFetcher;
use crate::notify::NotificationSink;
use crate::poller::{PollError, Poller};
use crate::registry::Origin;
use crate::storage::SubscriptionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Subscribe(Vec<String>),
    Unsubscribe(Option<i64>),
    List,
    Fetch(Option<i64>),
}

impl Command {
    /// Parse one input line. Returns `None` for anything that isn't a feed command.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();

        // "unsubscribe rss" must be matched before "subscribe rss".
        if let Some(rest) = line.strip_prefix("unsubscribe rss ") {
            return Some(Command::Unsubscribe(parse_id(rest)));
        }
        if let Some(rest) = line.strip_prefix("subscribe rss ") {
            let urls: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
            return (!urls.is_empty()).then_some(Command::Subscribe(urls));
        }
        if let Some(rest) = line.strip_prefix("fetch rss ") {
            return Some(Command::Fetch(parse_id(rest)));
        }
        if line == "list rss feeds" {
            return Some(Command::List);
        }
        None
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

pub struct CommandHandler<S, F, N> {
    poller: Arc<Poller<S, F, N>>,
}

impl<S, F, N> CommandHandler<S, F, N>
where
    S: SubscriptionStore,
    F: FeedFetcher,
    N: NotificationSink,
{
    pub fn new(poller: Arc<Poller<S, F, N>>) -> Self {
        Self { poller }
    }

    /// Handle one line from `origin`, returning the reply to send back.
    ///
    /// New items found by `fetch rss` go out through the notification sink,
    /// not the reply.
    pub async fn handle(&self, line: &str, origin: &Origin) -> Option<String> {
        let command = Command::parse(line)?;
        Some(self.execute(command, origin).await)
    }

    pub async fn execute(&self, command: Command, origin: &Origin) -> String {
        let registry = self.poller.registry();

        match command {
            Command::Subscribe(urls) => {
                let results = registry
                    .subscribe_many(urls.iter().map(String::as_str), origin)
                    .await;

                let subscribed = results.iter().filter(|(_, r)| r.is_ok()).count();
                let mut lines = vec![format!("{} feed(s) subscribed.", subscribed)];
                for (url, result) in &results {
                    if let Err(e) = result {
                        lines.push(format!("Failed to subscribe {}: {}", url, e));
                    }
                }
                lines.join("\n")
            }
            Command::Unsubscribe(id) => {
                let Some(id) = id else {
                    return "Unsubscribed.".to_string();
                };
                match registry.unsubscribe(id).await {
                    Ok(_) => "Unsubscribed.".to_string(),
                    Err(e) => format!("Failed to unsubscribe: {}", e),
                }
            }
            Command::List => {
                let feeds = registry.list(origin.from.as_deref()).await;
                if feeds.is_empty() {
                    "No RSS feed".to_string()
                } else {
                    feeds
                        .iter()
                        .map(|feed| format!("{}: {}", feed.id, feed.url))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::Fetch(id) => {
                let Some(id) = id else {
                    return "Feed not found".to_string();
                };
                match self.poller.immediate_fetch(id).await {
                    Ok(items) if items.is_empty() => "No new item".to_string(),
                    Ok(items) => format!("{} new item(s)", items.len()),
                    Err(PollError::NotFound(_)) => "Feed not found".to_string(),
                    Err(e) => {
                        tracing::warn!(feed_id = id, error = %e, "Immediate fetch failed");
                        format!("Failed to fetch feed: {}", e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("subscribe rss https://a.example.com https://b.example.com"),
            Some(Command::Subscribe(vec![
                "https://a.example.com".into(),
                "https://b.example.com".into()
            ]))
        );
        assert_eq!(
            Command::parse("unsubscribe rss 42"),
            Some(Command::Unsubscribe(Some(42)))
        );
        assert_eq!(Command::parse("  list rss feeds "), Some(Command::List));
        assert_eq!(Command::parse("fetch rss 7"), Some(Command::Fetch(Some(7))));
    }

    #[test]
    fn test_parse_non_numeric_id() {
        assert_eq!(Command::parse("fetch rss abc"), Some(Command::Fetch(None)));
        assert_eq!(
            Command::parse("unsubscribe rss 1x"),
            Some(Command::Unsubscribe(None))
        );
    }

    #[test]
    fn test_parse_unrelated_input() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse("subscribe rss    "), None);
        assert_eq!(Command::parse("list feeds"), None);
    }
}
