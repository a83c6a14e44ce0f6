//! Operator endpoints for the job registry.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use aura_scheduler::{Job, TriggerOutcome};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::auth::require_operator;
use crate::error::{ApiError, ApiResult};

/// GET /jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Job>>> {
    require_operator(&headers, state.operator_token())?;
    Ok(Json(state.scheduler.list_jobs()?))
}

/// POST /jobs/{job_id}/trigger
///
/// Runs the job and waits for it. 200 with the outcome on success, 409 if
/// the job is already running, 500 with the job's error text if it failed.
pub async fn trigger_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<TriggerOutcome>> {
    require_operator(&headers, state.operator_token())?;
    info!(job_id = %job_id, "manual trigger requested");

    let outcome = state.scheduler.trigger(&job_id).await?;
    if outcome.success {
        Ok(Json(outcome))
    } else {
        Err(ApiError::JobFailed(
            outcome.error.unwrap_or_else(|| "job failed".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::app::test_support::{body_json, harness, send};
    use async_trait::async_trait;
    use aura_scheduler::{JobResult, Schedule, ScheduledJob};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;

    struct Succeeds;

    #[async_trait]
    impl ScheduledJob for Succeeds {
        async fn run(&self) -> JobResult {
            Ok(json!({ "players_scanned": 0 }))
        }
    }

    struct Broken;

    #[async_trait]
    impl ScheduledJob for Broken {
        async fn run(&self) -> JobResult {
            Err("store unavailable".into())
        }
    }

    const HOURLY: Schedule = Schedule::Interval { every_secs: 3600 };

    fn post(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::post(uri);
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {t}"));
        }
        req.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn trigger_returns_outcome() {
        let h = harness(None);
        h.state.scheduler.register("sweep", "Sweep", HOURLY, Arc::new(Succeeds)).unwrap();

        let resp = send(&h.state, post("/jobs/sweep/trigger", None)).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["output"]["players_scanned"], 0);
    }

    #[tokio::test]
    async fn unknown_job_is_404() {
        let h = harness(None);
        let resp = send(&h.state, post("/jobs/nope/trigger", None)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failed_job_is_500_with_error_text() {
        let h = harness(None);
        h.state.scheduler.register("sweep", "Sweep", HOURLY, Arc::new(Broken)).unwrap();

        let resp = send(&h.state, post("/jobs/sweep/trigger", None)).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await, json!({ "error": "store unavailable" }));
    }

    #[tokio::test]
    async fn token_required_when_configured() {
        let h = harness(Some("s3cret"));
        h.state.scheduler.register("sweep", "Sweep", HOURLY, Arc::new(Succeeds)).unwrap();

        let denied = send(&h.state, post("/jobs/sweep/trigger", None)).await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = send(&h.state, post("/jobs/sweep/trigger", Some("s3cret"))).await;
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lists_registered_jobs() {
        let h = harness(None);
        h.state.scheduler.register("sweep", "Sweep", HOURLY, Arc::new(Succeeds)).unwrap();

        let resp = send(&h.state, Request::get("/jobs").body(Body::empty()).unwrap()).await;

        let body = body_json(resp).await;
        assert_eq!(body[0]["id"], "sweep");
        assert_eq!(body[0]["status"], "pending");
        assert_eq!(body[0]["schedule"]["kind"], "interval");
    }
}
