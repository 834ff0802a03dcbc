use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use feedwatch::commands::CommandHandler;
use feedwatch::config::Config;
use feedwatch::feed::HttpFetcher;
use feedwatch::notify::ChannelSink;
use feedwatch::poller::Poller;
use feedwatch::registry::{FeedRegistry, Origin};
use feedwatch::storage::{Database, DatabaseError};

const HELP: &str = "Commands:
  subscribe rss <url> [<url>...]
  unsubscribe rss <id>
  list rss feeds
  fetch rss <id>";

/// Get the config directory path (~/.config/feedwatch/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedwatch"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedwatch",
    about = "Watch RSS/Atom feeds and announce new entries"
)]
struct Args {
    /// Config file (default: ~/.config/feedwatch/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subscription database (overrides `database_path`)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Seconds between poll cycles (overrides config and RSS_INTERVAL)
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env();
    if let Some(secs) = args.interval {
        config.poll_interval_secs = secs;
    }

    let db_path = args
        .db
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| config_dir.join("feeds.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of feedwatch appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to open database {}: {}",
                db_path.display(),
                e
            ))
        }
    };

    let registry = Arc::new(
        FeedRegistry::new(db).with_watermark_persistence(config.persist_watermarks),
    );
    let loaded = registry.load().await.context("Failed to load subscriptions")?;
    println!("Loaded {} feed(s) from {}", loaded, db_path.display());

    let fetcher =
        HttpFetcher::new(config.fetch_timeout()).context("Failed to create HTTP client")?;
    let (sink, mut notifications) = ChannelSink::channel(64);
    let poller = Arc::new(
        Poller::new(Arc::clone(&registry), fetcher, sink).with_interval(config.poll_interval()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_handle = Arc::clone(&poller).spawn_supervised(shutdown_rx);

    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            let target = notification
                .origin
                .to
                .as_deref()
                .or(notification.origin.from.as_deref())
                .unwrap_or("*");
            println!("[{}] {}", target, notification.text);
        }
    });

    let handler = CommandHandler::new(Arc::clone(&poller));
    let user = std::env::var("USER").unwrap_or_else(|_| "console".to_string());
    let origin = Origin::new(Some(user), Some("console".to_string()));

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match handler.handle(&line, &origin).await {
                        Some(reply) => println!("{}", reply),
                        None => println!("{}", HELP),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read command input");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    shutdown_tx.send(true).ok();
    if tokio::time::timeout(Duration::from_secs(10), poller_handle)
        .await
        .is_err()
    {
        tracing::warn!("Poller did not stop within 10 seconds");
    }
    printer.abort();

    println!("Goodbye!");
    Ok(())
}
