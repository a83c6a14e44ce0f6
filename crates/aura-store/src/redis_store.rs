//! Redis-backed [`KvStore`], the layout the original deployment used: one
//! string key per JSON document.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisError};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::error::{Result, StoreError};
use crate::kv::{merge_fields, Entry, KvStore};

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Open a managed (auto-reconnecting) connection to `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis)?;
        let conn = client.get_connection_manager().await.map_err(map_redis)?;
        info!("connected to redis");
        Ok(Self { conn })
    }
}

fn map_redis(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Backend(e.to_string())
    }
}

/// Escape glob metacharacters so the prefix is matched literally by SCAN.
fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await.map_err(map_redis)?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }

    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(value)?;
        conn.set::<_, _, ()>(key, json).await.map_err(map_redis)
    }

    #[instrument(skip(self))]
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<Entry>> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(scan_pattern(prefix))
                .await
                .map_err(map_redis)?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();

        let raw: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(map_redis)?;

        let entries = keys
            .into_iter()
            .zip(raw)
            .filter_map(|(key, raw)| {
                // Deleted between SCAN and MGET.
                let raw = raw?;
                match serde_json::from_str(&raw) {
                    Ok(value) => Some(Entry { key, value }),
                    Err(e) => {
                        warn!(%key, error = %e, "skipping stored value that is not JSON");
                        None
                    }
                }
            })
            .collect();
        Ok(entries)
    }

    /// GET then SET: last writer wins if another client writes the same key
    /// in between.
    async fn merge_update(&self, key: &str, patch: &Map<String, Value>) -> Result<Option<Value>> {
        let Some(mut doc) = self.get(key).await? else {
            return Ok(None);
        };
        merge_fields(key, &mut doc, patch)?;
        self.put(key, &doc).await?;
        Ok(Some(doc))
    }
}
