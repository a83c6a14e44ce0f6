use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// A key and its decoded JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

/// Document store contract shared by every backend.
///
/// Values are raw JSON so a malformed record can still be listed and then
/// rejected by the caller's typed decode, one record at a time.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch one document, `None` if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Full overwrite.
    async fn put(&self, key: &str, value: &Value) -> Result<()>;

    /// Every document whose key starts with `prefix`, ordered by key.
    ///
    /// Implementations must scope the lookup by prefix on the backend side;
    /// fetching everything and filtering in memory is not acceptable for the
    /// shared backends.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<Entry>>;

    /// Read-modify-write merge of the non-null fields in `patch` into the
    /// stored object. Returns the merged document, or `None` if the key is
    /// absent (nothing is created).
    async fn merge_update(&self, key: &str, patch: &Map<String, Value>) -> Result<Option<Value>>;
}

/// Apply `patch` onto `current` in place, skipping null values.
pub(crate) fn merge_fields(key: &str, current: &mut Value, patch: &Map<String, Value>) -> Result<()> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| StoreError::NotAnObject { key: key.to_string() })?;
    for (field, value) in patch {
        if !value.is_null() {
            obj.insert(field.clone(), value.clone());
        }
    }
    Ok(())
}
