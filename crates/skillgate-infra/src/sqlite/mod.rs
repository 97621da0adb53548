//! SQLite persistence layer.

pub mod pool;
pub mod store;

pub use pool::{default_database_url, DatabasePool};
pub use store::SqliteStore;
