use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::kv::{merge_fields, Entry, KvStore};

/// Process-local [`KvStore`]. Used by tests and by `store.backend = "memory"`.
///
/// Prefix listing walks the whole map, which is fine at the sizes this
/// backend is meant for.
#[derive(Default)]
pub struct MemoryStore {
    docs: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.docs.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        self.docs.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = self
            .docs
            .iter()
            .filter(|kv| kv.key().starts_with(prefix))
            .map(|kv| Entry {
                key: kv.key().clone(),
                value: kv.value().clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn merge_update(&self, key: &str, patch: &Map<String, Value>) -> Result<Option<Value>> {
        // The shard write lock is held for the whole read-modify-write.
        let Some(mut doc) = self.docs.get_mut(key) else {
            return Ok(None);
        };
        let mut merged = doc.value().clone();
        merge_fields(key, &mut merged, patch)?;
        *doc = merged.clone();
        Ok(Some(merged))
    }
}
