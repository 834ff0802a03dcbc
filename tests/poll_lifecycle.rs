//! End-to-end tests for subscribe → poll → notify.
//!
//! Feeds are served by a wiremock server and fetched over real HTTP; the
//! subscription store is SQLite (in-memory unless a test needs a restart).

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feedwatch::feed::HttpFetcher;
use feedwatch::notify::{ChannelSink, Notification};
use feedwatch::poller::Poller;
use feedwatch::registry::{FeedRegistry, Origin};
use feedwatch::storage::{Database, SubscriptionStore};

type TestPoller = Poller<Database, HttpFetcher, ChannelSink>;

fn rss(entries: &[(&str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(guid, title)| {
            format!(
                "<item><guid>{guid}</guid><title>{title}</title><link>https://example.com/{guid}</link></item>"
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test</title>{items}</channel></rss>"#)
}

async fn serve(server: &MockServer, route: &str, body: String) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn build(db: Database) -> (Arc<TestPoller>, mpsc::Receiver<Notification>) {
    let registry = Arc::new(FeedRegistry::new(db));
    registry.load().await.unwrap();
    let fetcher = HttpFetcher::new(Duration::from_secs(5))
        .unwrap()
        .with_retry_base(Duration::from_millis(10));
    let (sink, rx) = ChannelSink::channel(64);
    (Arc::new(Poller::new(registry, fetcher, sink)), rx)
}

fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n.text);
    }
    out
}

fn alice() -> Origin {
    Origin::new(Some("alice".into()), Some("#news".into()))
}

#[tokio::test]
async fn test_new_entries_are_announced_once() {
    let server = MockServer::start().await;
    serve(&server, "/a.xml", rss(&[("2", "Two"), ("1", "One")])).await;

    let (poller, mut rx) = build(Database::open(":memory:").await.unwrap()).await;
    poller
        .registry()
        .subscribe(&format!("{}/a.xml", server.uri()), alice())
        .await
        .unwrap();

    // First cycle: everything currently on the feed
    let summary = poller.poll_cycle(None).await;
    assert_eq!(summary.new_items, 2);
    assert_eq!(
        drain(&mut rx),
        vec![
            "New Entry: Two\nhttps://example.com/2".to_string(),
            "New Entry: One\nhttps://example.com/1".to_string(),
        ]
    );

    // Unchanged feed: nothing
    assert_eq!(poller.poll_cycle(None).await.new_items, 0);
    assert!(drain(&mut rx).is_empty());

    // One new entry published
    serve(&server, "/a.xml", rss(&[("3", "Three"), ("2", "Two"), ("1", "One")])).await;
    assert_eq!(poller.poll_cycle(None).await.new_items, 1);
    assert_eq!(drain(&mut rx), vec!["New Entry: Three\nhttps://example.com/3".to_string()]);
}

#[tokio::test]
async fn test_failed_fetch_does_not_move_watermark() {
    let server = MockServer::start().await;
    serve(&server, "/a.xml", rss(&[("1", "One")])).await;

    let (poller, mut rx) = build(Database::open(":memory:").await.unwrap()).await;
    let feed = poller
        .registry()
        .subscribe(&format!("{}/a.xml", server.uri()), alice())
        .await
        .unwrap();
    poller.poll_cycle(None).await;
    drain(&mut rx);

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let summary = poller.poll_cycle(None).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(
        poller.registry().get(feed.id).await.unwrap().last_seen_id.as_deref(),
        Some("1")
    );

    // Recovery with one extra entry reports only that entry
    serve(&server, "/a.xml", rss(&[("2", "Two"), ("1", "One")])).await;
    assert_eq!(poller.poll_cycle(None).await.new_items, 1);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn test_watermark_survives_restart() {
    let server = MockServer::start().await;
    serve(&server, "/a.xml", rss(&[("2", "Two"), ("1", "One")])).await;

    let dir = std::env::temp_dir().join(format!("feedwatch_restart_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let db_path = dir.join("feeds.db");
    let db_path = db_path.to_str().unwrap();

    {
        let (poller, mut rx) = build(Database::open(db_path).await.unwrap()).await;
        poller
            .registry()
            .subscribe(&format!("{}/a.xml", server.uri()), alice())
            .await
            .unwrap();
        assert_eq!(poller.poll_cycle(None).await.new_items, 2);
        drain(&mut rx);
    }

    let (poller, mut rx) = build(Database::open(db_path).await.unwrap()).await;
    assert_eq!(poller.registry().len().await, 1);
    assert_eq!(poller.poll_cycle(None).await.new_items, 0);
    assert!(drain(&mut rx).is_empty());

    let stored = poller.registry().store().get_all().await.unwrap();
    assert_eq!(stored[0].origin, alice());

    std::fs::remove_dir_all(&dir).ok();
}
