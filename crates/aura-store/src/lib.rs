//! `aura-store`: key-value document store and append-only history log.
//!
//! # Backends
//!
//! | Backend         | Prefix listing                          | Notes                      |
//! |-----------------|-----------------------------------------|----------------------------|
//! | [`SqliteStore`] | range scan on the `kv` primary key      | default, shares the app DB |
//! | [`MemoryStore`] | filter over a `DashMap`                 | tests, throwaway runs      |
//! | `RedisStore`    | `SCAN MATCH {prefix}*` + MGET           | `redis` cargo feature      |
//!
//! All backends implement [`KvStore`]; callers hold an `Arc<dyn KvStore>`.

pub mod db;
pub mod error;
pub mod history;
pub mod kv;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use history::{HistoryEntry, HistoryKind, HistoryLog, MemoryHistory, NewHistoryEntry, SqliteHistory};
pub use kv::{Entry, KvStore};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use sqlite::SqliteStore;
