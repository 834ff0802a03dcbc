use thiserror::Error;

use crate::registry::{Feed, Origin};

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has locked the database
    #[error("Another instance of feedwatch appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// The database file could not be opened or created
    #[error("Cannot open database file: {0}")]
    CannotOpen(sqlx::Error),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored row could not be decoded
    #[error("Corrupt subscription {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error: locking, an unopenable file, or anything else
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return DatabaseError::InstanceLocked;
        }

        // SQLITE_CANTOPEN (14): bad path or missing directory, not a second instance
        if error_string.contains("unable to open database file") {
            return DatabaseError::CannotOpen(err);
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Durable projection of a [`Feed`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeed {
    pub id: i64,
    pub url: String,
    pub origin: Origin,
    pub last_seen_id: Option<String>,
    pub subscribed_at: i64,
}

impl From<&Feed> for StoredFeed {
    fn from(feed: &Feed) -> Self {
        Self {
            id: feed.id,
            url: feed.url.clone(),
            origin: feed.origin.clone(),
            last_seen_id: feed.last_seen_id.clone(),
            subscribed_at: feed.subscribed_at,
        }
    }
}

impl StoredFeed {
    pub fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            url: self.url,
            origin: self.origin,
            last_seen_id: self.last_seen_id,
            subscribed_at: self.subscribed_at,
        }
    }
}

/// Raw `subscriptions` row; `origin` is still JSON text.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubscriptionRow {
    pub id: i64,
    pub url: String,
    pub origin: String,
    pub last_seen_id: Option<String>,
    pub subscribed_at: i64,
}

impl SubscriptionRow {
    pub(crate) fn into_stored(self) -> Result<StoredFeed, DatabaseError> {
        let origin = serde_json::from_str(&self.origin).map_err(|e| DatabaseError::Corrupt {
            id: self.id,
            reason: e.to_string(),
        })?;
        Ok(StoredFeed {
            id: self.id,
            url: self.url,
            origin,
            last_seen_id: self.last_seen_id,
            subscribed_at: self.subscribed_at,
        })
    }
}
