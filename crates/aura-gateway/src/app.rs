use axum::{
    routing::{get, post},
    Router,
};
use aura_core::config::AuraConfig;
use aura_scheduler::SchedulerEngine;
use aura_store::{HistoryLog, KvStore};
use std::sync::Arc;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: AuraConfig,
    pub store: Arc<dyn KvStore>,
    pub history: Arc<dyn HistoryLog>,
    pub scheduler: Arc<SchedulerEngine>,
}

impl AppState {
    pub fn new(
        config: AuraConfig,
        store: Arc<dyn KvStore>,
        history: Arc<dyn HistoryLog>,
        scheduler: Arc<SchedulerEngine>,
    ) -> Self {
        Self {
            config,
            store,
            history,
            scheduler,
        }
    }

    pub fn operator_token(&self) -> Option<&str> {
        self.config.gateway.operator_token.as_deref()
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/jobs", get(crate::http::jobs::list_jobs))
        .route("/jobs/{job_id}/trigger", post(crate::http::jobs::trigger_job))
        .route("/players/{username}", get(crate::http::players::get_player))
        .route(
            "/players/{username}/history",
            get(crate::http::players::player_history),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
