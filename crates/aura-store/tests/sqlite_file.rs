// Stores opened on the same database file see each other's writes, which is
// how the gateway wires the sweep and the API handlers.

use aura_store::{HistoryKind, HistoryLog, KvStore, NewHistoryEntry, SqliteHistory, SqliteStore};
use rusqlite::Connection;
use serde_json::json;

#[tokio::test]
async fn two_connections_share_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aura.db");

    let writer = SqliteStore::new(Connection::open(&path).unwrap()).unwrap();
    let reader = SqliteStore::new(Connection::open(&path).unwrap()).unwrap();

    writer
        .put("player:alice", &json!({"username": "alice", "aura": 9}))
        .await
        .unwrap();
    let patch = json!({"aura": 5}).as_object().cloned().unwrap();
    writer.merge_update("player:alice", &patch).await.unwrap();

    let seen = reader.get("player:alice").await.unwrap().unwrap();
    assert_eq!(seen["aura"], 5);
    assert_eq!(reader.list_by_prefix("player:").await.unwrap().len(), 1);
}

#[tokio::test]
async fn history_and_documents_coexist_in_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aura.db");

    let store = SqliteStore::new(Connection::open(&path).unwrap()).unwrap();
    let history = SqliteHistory::new(Connection::open(&path).unwrap()).unwrap();

    store
        .put("player:bob", &json!({"username": "bob", "aura": 1}))
        .await
        .unwrap();
    history
        .append(NewHistoryEntry {
            user_id: "bob".into(),
            kind: HistoryKind::Player,
            data: None,
            comments: Some("hello".into()),
        })
        .await
        .unwrap();

    let recent = history.recent("bob", 25).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert!(recent[0].data.is_none());
    assert!(store.get("player:bob").await.unwrap().is_some());
}
