use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aura_scheduler::{JobResult, JobStatus, Schedule, ScheduledJob, SchedulerEngine, SchedulerError};
use rusqlite::Connection;
use serde_json::json;
use tokio::sync::{Notify, Semaphore};

/// Blocks until released, so a run can be held open.
struct Gate {
    entered: Notify,
    release: Semaphore,
}

impl Gate {
    fn new() -> Self {
        Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl ScheduledJob for Gate {
    async fn run(&self) -> JobResult {
        self.entered.notify_one();
        let permit = self.release.acquire().await?;
        permit.forget();
        Ok(json!({}))
    }
}

#[derive(Default)]
struct Counter {
    runs: AtomicUsize,
}

#[async_trait]
impl ScheduledJob for Counter {
    async fn run(&self) -> JobResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(json!({}))
    }
}

fn engine() -> Arc<SchedulerEngine> {
    Arc::new(SchedulerEngine::new(Connection::open_in_memory().unwrap()).unwrap())
}

#[tokio::test]
async fn manual_trigger_while_running_is_busy() {
    let engine = engine();
    let gate = Arc::new(Gate::new());
    engine
        .register("sweep", "Penalty sweep", Schedule::Interval { every_secs: 3600 }, gate.clone())
        .unwrap();

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.trigger("sweep").await })
    };
    gate.entered.notified().await;

    let second = engine.trigger("sweep").await;
    assert!(matches!(second, Err(SchedulerError::Busy { .. })));
    assert_eq!(
        engine.get_job("sweep").unwrap().unwrap().status,
        JobStatus::Running
    );

    gate.release.add_permits(1);
    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.success);

    // Guard released: a new trigger runs again.
    gate.release.add_permits(1);
    assert!(engine.trigger("sweep").await.unwrap().success);
    assert_eq!(engine.get_job("sweep").unwrap().unwrap().run_count, 2);
}

#[tokio::test]
async fn loop_fires_interval_job_and_stops() {
    let engine = engine();
    let counter = Arc::new(Counter::default());
    engine
        .register("tick", "Tick", Schedule::Interval { every_secs: 1 }, counter.clone())
        .unwrap();

    let task = engine.start();
    tokio::time::timeout(Duration::from_secs(10), async {
        while counter.runs.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("job never fired");
    task.stop().await;

    let job = engine.get_job("tick").unwrap().unwrap();
    assert!(job.last_run.is_some());
    assert!(job.next_run.is_some());
}

#[tokio::test]
async fn second_engine_on_same_database_is_busy_while_first_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aura.db");
    let serving = Arc::new(SchedulerEngine::new(Connection::open(&path).unwrap()).unwrap());
    let cli = SchedulerEngine::new(Connection::open(&path).unwrap()).unwrap();
    let gate = Arc::new(Gate::new());
    let hourly = Schedule::Interval { every_secs: 3600 };
    serving
        .register("sweep", "Penalty sweep", hourly.clone(), gate.clone())
        .unwrap();

    let first = {
        let serving = serving.clone();
        tokio::spawn(async move { serving.trigger("sweep").await })
    };
    gate.entered.notified().await;

    let counter = Arc::new(Counter::default());
    let err = cli
        .run_once("sweep", "Penalty sweep", &hourly, counter.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Busy { .. }));
    assert_eq!(counter.runs.load(Ordering::SeqCst), 0);

    gate.release.add_permits(1);
    assert!(first.await.unwrap().unwrap().success);

    // Lease released: the other engine may run now.
    let outcome = cli
        .run_once("sweep", "Penalty sweep", &hourly, counter.clone())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(counter.runs.load(Ordering::SeqCst), 1);
    assert_eq!(serving.get_job("sweep").unwrap().unwrap().run_count, 2);
}

#[tokio::test]
async fn one_shot_run_on_fresh_database_registers_nothing_for_polling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aura.db");
    let cli = SchedulerEngine::new(Connection::open(&path).unwrap()).unwrap();
    let counter = Arc::new(Counter::default());

    cli.run_once("sweep", "Penalty sweep", &Schedule::Interval { every_secs: 60 }, counter.clone())
        .await
        .unwrap();

    // The row exists for a serving engine to pick up, but this engine's
    // registry stays empty.
    assert!(cli.list_jobs().unwrap().is_empty());
    let serving = SchedulerEngine::new(Connection::open(&path).unwrap()).unwrap();
    let job = serving
        .register(
            "sweep",
            "Penalty sweep",
            Schedule::Interval { every_secs: 60 },
            Arc::new(Counter::default()),
        )
        .unwrap();
    assert_eq!(job.run_count, 1);
    assert_eq!(job.status, JobStatus::Pending);
}
