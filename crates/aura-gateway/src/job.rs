use async_trait::async_trait;
use aura_penalty::PenaltySweep;
use aura_scheduler::{JobResult, ScheduledJob};
use chrono::{NaiveDate, Utc};

pub const SWEEP_JOB_ID: &str = "penalty_sweep";
pub const SWEEP_JOB_NAME: &str = "Penalty sweep";

/// Runs the penalty sweep against the current UTC date, or a fixed one.
pub struct SweepJob {
    sweep: PenaltySweep,
    today: Option<NaiveDate>,
}

impl SweepJob {
    pub fn new(sweep: PenaltySweep) -> Self {
        Self { sweep, today: None }
    }

    /// Evaluate against `today` instead of the clock.
    pub fn on_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

#[async_trait]
impl ScheduledJob for SweepJob {
    async fn run(&self) -> JobResult {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let report = self.sweep.run(today).await?;
        Ok(serde_json::to_value(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_penalty::PenaltyWeights;
    use aura_store::{KvStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn run_returns_report_json() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("player:alice", &json!({"username": "alice", "aura": 10}))
            .await
            .unwrap();
        store
            .put(
                "task:alice:t1",
                &json!({"id": "t1", "userId": "alice", "name": "old", "due_date": "01-01-20"}),
            )
            .await
            .unwrap();
        let job = SweepJob::new(PenaltySweep::new(store.clone(), PenaltyWeights::default()));

        let out = job.run().await.unwrap();

        assert_eq!(out["players_scanned"], 1);
        assert_eq!(out["penalties"][0]["new_aura"], 8);
    }

    #[tokio::test]
    async fn fixed_date_overrides_clock() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("player:bo", &json!({"username": "bo", "aura": 10}))
            .await
            .unwrap();
        store
            .put(
                "task:bo:t1",
                &json!({"id": "t1", "userId": "bo", "name": "later", "due_date": "10-06-30"}),
            )
            .await
            .unwrap();
        let sweep = PenaltySweep::new(store.clone(), PenaltyWeights::default());
        let job = SweepJob::new(sweep).on_date(NaiveDate::from_ymd_opt(2030, 6, 11).unwrap());

        let out = job.run().await.unwrap();

        assert_eq!(out["today"], "2030-06-11");
        assert_eq!(out["penalties"][0]["new_aura"], 8);
    }
}
