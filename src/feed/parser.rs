use anyhow::Result;
use feed_rs::parser;
use sha2::{Digest, Sha256};

use super::item::Item;

/// Parse RSS/Atom/JSON Feed bytes into items, keeping document order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Item>> {
    // feed-rs fills missing entry ids with a link/title hash or a random UUID.
    // Leave them empty so `resolve_identity` applies its own stable fallback.
    let feed = parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build()
        .parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();
            let published = entry.published.or(entry.updated).map(|dt| dt.timestamp());
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            let id = resolve_identity(&entry.id, &link, &title, published);

            Item { id, title, link }
        })
        .collect();

    Ok(items)
}

/// Native id first, then the link, then a content hash.
fn resolve_identity(native: &str, link: &str, title: &str, published: Option<i64>) -> String {
    let trimmed = native.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    if !link.is_empty() {
        return link.to_string();
    }

    let input = format!(
        "{}|{}|{}",
        link,
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
