use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{watch, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::init_db,
    error::{Result, SchedulerError},
    job::ScheduledJob,
    schedule::{compute_next_run, timestamp, validate},
    types::{Job, JobStatus, Schedule, TriggerOutcome},
};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long a run lease is honoured. A process that dies mid-run blocks the
/// job for at most this long.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(60 * 60);
const MAX_LEASE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct Registered {
    schedule: Schedule,
    job: Arc<dyn ScheduledJob>,
    guard: Arc<tokio::sync::Mutex<()>>,
}

/// Job registry plus the SQLite-backed state of each job.
///
/// Owned by the caller (usually behind an `Arc` shared with the HTTP layer);
/// nothing here is global.
///
/// Every run holds two guards: an in-process mutex per registered job, and a
/// lease on the job's row (`lease_owner`, `lease_expires`) that excludes other
/// engines on the same database file.
pub struct SchedulerEngine {
    conn: Mutex<Connection>,
    jobs: DashMap<String, Registered>,
    owner: String,
    lease_ttl: Duration,
}

/// Handle to the running poll loop.
pub struct EngineTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl EngineTask {
    /// Signal the loop to exit and wait for it. A run already in flight is
    /// left to finish on its own task.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("scheduler loop ended abnormally: {e}");
        }
    }
}

impl SchedulerEngine {
    /// Create a new engine, initialising the DB schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            jobs: DashMap::new(),
            owner: format!("{}:{}", std::process::id(), Uuid::new_v4()),
            lease_ttl: DEFAULT_LEASE_TTL,
        })
    }

    /// Override [`DEFAULT_LEASE_TTL`]. Capped at one year.
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl.min(MAX_LEASE_TTL);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SchedulerError::Database("scheduler connection mutex poisoned".into()))
    }

    /// Register `job` under a stable `id` and persist its row.
    ///
    /// A row left by a previous process keeps its history (`run_count`,
    /// `last_run`, `last_error`). If its `next_run` passed while nothing was
    /// running, the job is marked `missed` and rescheduled from now rather
    /// than fired immediately.
    pub fn register(
        &self,
        id: &str,
        name: &str,
        schedule: Schedule,
        job: Arc<dyn ScheduledJob>,
    ) -> Result<Job> {
        validate(&schedule)?;
        if self.jobs.contains_key(id) {
            return Err(SchedulerError::DuplicateJob { id: id.to_string() });
        }

        let now = Utc::now();
        let now_str = timestamp(now);
        let next = compute_next_run(&schedule, now)
            .map(timestamp)
            .ok_or_else(|| SchedulerError::InvalidSchedule(format!("no next run for job {id}")))?;
        let schedule_json = serde_json::to_string(&schedule)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

        {
            let conn = self.lock()?;
            let previous: Option<Option<String>> = conn
                .query_row("SELECT next_run FROM jobs WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            let status = match &previous {
                Some(Some(prev)) if prev.as_str() < now_str.as_str() => {
                    warn!(job_id = %id, missed = %prev, "scheduled run missed while offline");
                    JobStatus::Missed
                }
                _ => JobStatus::Pending,
            };

            conn.execute(
                "INSERT INTO jobs (id, name, schedule, status, next_run, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    schedule = excluded.schedule,
                    status = CASE WHEN jobs.lease_expires > excluded.updated_at
                                  THEN jobs.status ELSE excluded.status END,
                    next_run = excluded.next_run,
                    updated_at = excluded.updated_at",
                params![id, name, schedule_json, status.to_string(), next, now_str],
            )?;
        }

        self.jobs.insert(
            id.to_string(),
            Registered {
                schedule,
                job,
                guard: Arc::new(tokio::sync::Mutex::new(())),
            },
        );
        info!(job_id = %id, %name, next_run = %next, "job registered");

        self.get_job(id)?
            .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })
    }

    /// Persisted state of every registered job, ordered by id.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, schedule, status, last_run, next_run,
                    run_count, last_error, last_duration_ms, created_at, updated_at
             FROM jobs ORDER BY id",
        )?;
        let jobs = stmt
            .query_map([], row_to_job)?
            .filter_map(|r| match r {
                Ok(Some(job)) if self.jobs.contains_key(&job.id) => Some(job),
                Ok(_) => None,
                Err(e) => {
                    warn!("skipping unreadable job row: {e}");
                    None
                }
            })
            .collect();
        Ok(jobs)
    }

    pub fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.lock()?;
        let job = conn
            .query_row(
                "SELECT id, name, schedule, status, last_run, next_run,
                        run_count, last_error, last_duration_ms, created_at, updated_at
                 FROM jobs WHERE id = ?1",
                [id],
                row_to_job,
            )
            .optional()?;
        Ok(job.flatten())
    }

    /// Run a job now. Fails with `Busy` if it is already running; a job that
    /// runs and fails still returns `Ok` with `success: false`.
    pub async fn trigger(&self, id: &str) -> Result<TriggerOutcome> {
        let (job, guard) = {
            let entry = self
                .jobs
                .get(id)
                .ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
            (Arc::clone(&entry.job), Arc::clone(&entry.guard))
        };
        let permit = guard
            .try_lock_owned()
            .map_err(|_| SchedulerError::Busy { id: id.to_string() })?;

        info!(job_id = %id, "manual trigger");
        self.execute(id, job, permit).await
    }

    /// Run `job` once under the lease for `id` without registering it for
    /// polling. Creates the job row if no engine has registered it yet.
    ///
    /// For one-shot callers (the CLI) sharing a database with a serving
    /// engine: fails with `Busy` while any engine is running `id`.
    pub async fn run_once(
        &self,
        id: &str,
        name: &str,
        schedule: &Schedule,
        job: Arc<dyn ScheduledJob>,
    ) -> Result<TriggerOutcome> {
        validate(schedule)?;
        self.ensure_row(id, name, schedule)?;
        let guard = self
            .jobs
            .get(id)
            .map(|entry| Arc::clone(&entry.guard))
            .unwrap_or_default();
        let permit = guard
            .try_lock_owned()
            .map_err(|_| SchedulerError::Busy { id: id.to_string() })?;

        info!(job_id = %id, "one-shot run");
        self.execute(id, job, permit).await
    }

    /// Spawn the poll loop. Call [`EngineTask::stop`] to end it.
    pub fn start(self: &Arc<Self>) -> EngineTask {
        let (shutdown, mut rx) = watch::channel(false);
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!(jobs = engine.jobs.len(), "scheduler engine started");
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = engine.tick() {
                            error!("scheduler tick error: {e}");
                        }
                    }
                    _ = rx.changed() => {
                        if *rx.borrow() {
                            info!("scheduler engine shutting down");
                            break;
                        }
                    }
                }
            }
        });
        EngineTask { shutdown, handle }
    }

    // --- private helpers ---------------------------------------------------

    /// Fire every registered job whose next_run has arrived.
    fn tick(self: &Arc<Self>) -> Result<()> {
        let now = Utc::now();
        let now_str = timestamp(now);

        let due: Vec<String> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare_cached(
                "SELECT id FROM jobs WHERE next_run IS NOT NULL AND next_run <= ?1",
            )?;
            let rows: Vec<String> = stmt
                .query_map([&now_str], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        for id in due {
            let Some((schedule, job, guard)) = self
                .jobs
                .get(&id)
                .map(|e| (e.schedule.clone(), Arc::clone(&e.job), Arc::clone(&e.guard)))
            else {
                continue;
            };

            // Advance next_run before running so a long job is not picked up
            // again by the following tick.
            self.reschedule(&id, &schedule, now)?;

            let Ok(permit) = guard.try_lock_owned() else {
                warn!(job_id = %id, "previous run still in progress, skipping this firing");
                continue;
            };

            let engine = Arc::clone(self);
            tokio::spawn(async move {
                match engine.execute(&id, job, permit).await {
                    Ok(outcome) if !outcome.success => {
                        error!(job_id = %id, error = ?outcome.error, "scheduled run failed");
                    }
                    Ok(_) => {}
                    Err(SchedulerError::Busy { .. }) => {
                        warn!(
                            job_id = %id,
                            "another engine holds the run lease, skipping this firing"
                        );
                    }
                    Err(e) => error!(job_id = %id, "scheduled run not started: {e}"),
                }
            });
        }
        Ok(())
    }

    fn reschedule(&self, id: &str, schedule: &Schedule, now: DateTime<Utc>) -> Result<()> {
        let next = compute_next_run(schedule, now).map(timestamp);
        let conn = self.lock()?;
        conn.execute(
            "UPDATE jobs SET next_run = ?1, updated_at = ?2 WHERE id = ?3",
            params![next, timestamp(now), id],
        )?;
        Ok(())
    }

    fn ensure_row(&self, id: &str, name: &str, schedule: &Schedule) -> Result<()> {
        let now = Utc::now();
        let next = compute_next_run(schedule, now).map(timestamp);
        let schedule_json = serde_json::to_string(schedule)
            .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO jobs (id, name, schedule, status, next_run, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?5)
             ON CONFLICT(id) DO NOTHING",
            params![id, name, schedule_json, next, timestamp(now)],
        )?;
        Ok(())
    }

    /// Run `job` while holding its in-process guard and the row lease, then
    /// record the result. `Busy` if another engine holds the lease. State
    /// updates after the run that fail are logged; the outcome is returned
    /// regardless.
    async fn execute(
        &self,
        id: &str,
        job: Arc<dyn ScheduledJob>,
        _permit: OwnedMutexGuard<()>,
    ) -> Result<TriggerOutcome> {
        let now = Utc::now();
        let started_at = timestamp(now);
        if !self.acquire_lease(id, now)? {
            return Err(SchedulerError::Busy { id: id.to_string() });
        }

        let clock = Instant::now();
        let result = job.run().await;
        let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (output, error) = match result {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e.to_string())),
        };
        if let Err(e) = self.mark_finished(id, error.as_deref(), elapsed_ms) {
            error!(job_id = %id, "failed to record job result: {e}");
        }
        info!(job_id = %id, elapsed_ms, success = error.is_none(), "job finished");

        Ok(TriggerOutcome {
            job_id: id.to_string(),
            success: error.is_none(),
            started_at,
            elapsed_ms,
            output,
            error,
        })
    }

    /// Take the row lease for `id` and mark it running. `false` if another
    /// engine holds a lease that has not expired, or the row does not exist.
    fn acquire_lease(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let now_str = timestamp(now);
        let ttl = TimeDelta::from_std(self.lease_ttl)
            .map_err(|e| SchedulerError::Database(format!("lease ttl out of range: {e}")))?;
        let expires = timestamp(now + ttl);
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE jobs SET status = 'running', last_run = ?1, updated_at = ?1,
                    lease_owner = ?2, lease_expires = ?3
             WHERE id = ?4
               AND (lease_owner IS NULL OR lease_expires IS NULL OR lease_expires <= ?1)",
            params![now_str, self.owner, expires, id],
        )?;
        Ok(changed == 1)
    }

    fn mark_finished(&self, id: &str, error: Option<&str>, elapsed_ms: u64) -> Result<()> {
        let status = if error.is_some() {
            JobStatus::Failed
        } else {
            JobStatus::Pending
        };
        let elapsed = i64::try_from(elapsed_ms).unwrap_or(i64::MAX);
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE jobs SET status = ?1, run_count = run_count + 1, last_error = ?2,
                    last_duration_ms = ?3, updated_at = ?4,
                    lease_owner = NULL, lease_expires = NULL
             WHERE id = ?5 AND lease_owner = ?6",
            params![status.to_string(), error, elapsed, timestamp(Utc::now()), id, self.owner],
        )?;
        if changed == 0 {
            warn!(job_id = %id, "run lease expired before the job finished; result not recorded");
        }
        Ok(())
    }
}

/// Decode a `jobs` row. Rows with an unreadable schedule or status yield
/// `None` and are left out of listings.
fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<Job>> {
    let id: String = row.get(0)?;
    let sched_json: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let Ok(schedule) = serde_json::from_str::<Schedule>(&sched_json) else {
        warn!(job_id = %id, "bad schedule JSON in jobs table");
        return Ok(None);
    };
    let Ok(status) = status_str.parse::<JobStatus>() else {
        warn!(job_id = %id, status = %status_str, "unknown job status in jobs table");
        return Ok(None);
    };
    Ok(Some(Job {
        id,
        name: row.get(1)?,
        schedule,
        status,
        last_run: row.get(4)?,
        next_run: row.get(5)?,
        run_count: row.get(6)?,
        last_error: row.get(7)?,
        last_duration_ms: row.get::<_, Option<i64>>(8)?.and_then(|v| u64::try_from(v).ok()),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    }))
}
