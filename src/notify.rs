//! Delivery of new-entry messages back to whoever subscribed.

use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::feed::Item;
use crate::registry::Origin;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Notification receiver closed")]
    Closed,
}

/// Fire-and-forget message delivery.
///
/// Failures are logged by the caller and never retried.
pub trait NotificationSink: Send + Sync + 'static {
    fn deliver(
        &self,
        origin: &Origin,
        text: &str,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Message body announcing one new entry.
pub fn format_entry(item: &Item) -> String {
    format!("New Entry: {}\n{}", item.title, item.link)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub origin: Origin,
    pub text: String,
}

/// Sink that forwards notifications over an mpsc channel to whatever owns the
/// transport.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Notification>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Notification>) -> Self {
        Self { tx }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

impl NotificationSink for ChannelSink {
    async fn deliver(&self, origin: &Origin, text: &str) -> Result<(), SinkError> {
        self.tx
            .send(Notification {
                origin: origin.clone(),
                text: text.to_string(),
            })
            .await
            .map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_entry() {
        let item = Item::new("1", "Release 1.0", "https://example.com/r1");
        assert_eq!(format_entry(&item), "New Entry: Release 1.0\nhttps://example.com/r1");
    }

    #[tokio::test]
    async fn test_channel_sink_passes_origin_through() {
        let (sink, mut rx) = ChannelSink::channel(4);
        let origin = Origin::new(Some("alice".into()), Some("#news".into()));

        sink.deliver(&origin, "hello").await.unwrap();

        let got = rx.recv().await.unwrap();
        assert_eq!(got.origin, origin);
        assert_eq!(got.text, "hello");
    }

    #[tokio::test]
    async fn test_channel_sink_closed_receiver() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);

        let result = sink.deliver(&Origin::default(), "lost").await;
        assert!(matches!(result, Err(SinkError::Closed)));
    }
}
