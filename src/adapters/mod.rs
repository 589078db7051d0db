// Adapters layer: concrete implementations of the domain ports (storage, cache, notifications).

pub mod cache;
pub mod notify;
pub mod sqlite;

pub use cache::TtlCache;
pub use notify::{QueuedSink, TracingSink};
pub use sqlite::SqliteStore;
