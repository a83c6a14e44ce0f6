//! Read-only views of player records and their history. Operator only.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use aura_core::keys::{is_valid_username, player_key};
use aura_store::HistoryEntry;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::require_operator;
use crate::error::{ApiError, ApiResult};

const DEFAULT_HISTORY_LIMIT: usize = 25;
const MAX_HISTORY_LIMIT: usize = 500;

/// Stands in for the stored password hash in every response.
const PASSWORD_MASK: &str = "hidden";

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

fn check_username(username: &str) -> ApiResult<()> {
    if is_valid_username(username) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("invalid username {username:?}")))
    }
}

/// Replace the password hash, if the record carries one.
fn mask_password(mut doc: Value) -> Value {
    if let Some(password) = doc.get_mut("password") {
        *password = Value::from(PASSWORD_MASK);
    }
    doc
}

/// GET /players/{username}
pub async fn get_player(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    require_operator(&headers, state.operator_token())?;
    check_username(&username)?;
    state
        .store
        .get(&player_key(&username))
        .await?
        .map(|doc| Json(mask_password(doc)))
        .ok_or_else(|| ApiError::NotFound(format!("player {username}")))
}

/// GET /players/{username}/history?limit=N, newest first.
pub async fn player_history(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(q): Query<HistoryQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    require_operator(&headers, state.operator_token())?;
    check_username(&username)?;
    let limit = q
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    Ok(Json(state.history.recent(&username, limit).await?))
}

#[cfg(test)]
mod tests {
    use crate::app::test_support::{body_json, harness, send};
    use aura_store::{HistoryKind, HistoryLog, KvStore, NewHistoryEntry};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn returns_stored_player() {
        let h = harness(None);
        h.store
            .put("player:alice", &json!({"username": "alice", "aura": 12}))
            .await
            .unwrap();

        let resp = send(&h.state, get("/players/alice")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["aura"], 12);
    }

    #[tokio::test]
    async fn missing_player_is_404() {
        let h = harness(None);
        let resp = send(&h.state, get("/players/nobody")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"], "player nobody not found");
    }

    #[tokio::test]
    async fn history_respects_limit() {
        let h = harness(None);
        for i in 0..3 {
            h.history
                .append(NewHistoryEntry {
                    user_id: "alice".into(),
                    kind: HistoryKind::Player,
                    data: None,
                    comments: Some(format!("entry {i}")),
                })
                .await
                .unwrap();
        }

        let resp = send(&h.state, get("/players/alice/history?limit=2")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn password_hash_is_never_returned() {
        let h = harness(Some("s3cret"));
        h.store
            .put(
                "player:alice",
                &json!({"username": "alice", "aura": 3, "password": "$2b$12$hash"}),
            )
            .await
            .unwrap();

        let resp = send(&h.state, get_with_token("/players/alice", "s3cret")).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["password"], "hidden");
        assert_eq!(body["aura"], 3);
        assert!(!body.to_string().contains("$2b$12$hash"));
    }

    #[tokio::test]
    async fn player_routes_require_token_when_configured() {
        let h = harness(Some("s3cret"));
        h.store
            .put("player:alice", &json!({"username": "alice", "password": "$2b$12$hash"}))
            .await
            .unwrap();

        let denied = send(&h.state, get("/players/alice")).await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert!(!body_json(denied).await.to_string().contains("$2b$12$hash"));

        let history = send(&h.state, get("/players/alice/history")).await;
        assert_eq!(history.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn username_with_separator_is_rejected() {
        let h = harness(None);
        let resp = send(&h.state, get("/players/al:ice")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
