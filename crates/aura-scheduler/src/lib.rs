//! `aura-scheduler`: Tokio-based job runner with SQLite-persisted job state.
//!
//! # Overview
//!
//! Jobs are registered in code with a stable id and a [`ScheduledJob`]
//! implementation. Their state (last/next run, run count, last error) lives
//! in a SQLite `jobs` table so it survives restarts and can be listed by the
//! operator API. [`SchedulerEngine::start`] spawns a loop that polls the table
//! every second; [`SchedulerEngine::trigger`] runs a job on demand.
//!
//! # Schedule variants
//!
//! | Variant    | Behaviour                         |
//! |------------|-----------------------------------|
//! | `Interval` | Repeat every N seconds            |
//! | `Daily`    | Fire at HH:MM UTC every day       |
//!
//! # Overlap
//!
//! Each job has an in-process run guard and a lease on its `jobs` row, so
//! engines in different processes sharing one database file exclude each
//! other too. A manual trigger or [`SchedulerEngine::run_once`] that finds
//! either held fails with [`SchedulerError::Busy`]; a scheduled firing that
//! finds either held is skipped and rescheduled. Runs are never queued. A
//! lease abandoned by a dead process expires after [`DEFAULT_LEASE_TTL`].

pub mod db;
pub mod engine;
pub mod error;
pub mod job;
pub mod schedule;
pub mod types;

pub use engine::{EngineTask, SchedulerEngine, DEFAULT_LEASE_TTL};
pub use error::{Result, SchedulerError};
pub use job::{JobResult, ScheduledJob};
pub use types::{Job, JobStatus, Schedule, TriggerOutcome};
