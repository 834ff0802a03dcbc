mod schema;
mod subscriptions;
mod types;

pub use schema::Database;
pub use subscriptions::SubscriptionStore;
pub use types::{DatabaseError, StoredFeed};
