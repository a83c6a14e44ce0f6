use aura_core::config::ScheduleConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Defines when and how often a job should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },

    /// Run every day at the given hour and minute (UTC).
    Daily { hour: u8, minute: u8 },
}

impl From<&ScheduleConfig> for Schedule {
    fn from(cfg: &ScheduleConfig) -> Self {
        match *cfg {
            ScheduleConfig::Interval { every_secs } => Schedule::Interval { every_secs },
            ScheduleConfig::Daily { hour, minute } => Schedule::Daily { hour, minute },
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next_run time.
    Pending,
    /// Currently being executed.
    Running,
    /// Last execution returned an error.
    Failed,
    /// A scheduled window passed while the engine was offline.
    Missed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Failed => "failed",
            JobStatus::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "failed" => Ok(JobStatus::Failed),
            "missed" => Ok(JobStatus::Missed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A persisted job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Stable id chosen at registration (e.g. `penalty_sweep`).
    pub id: String,
    /// Human-readable label.
    pub name: String,
    pub schedule: Schedule,
    pub status: JobStatus,
    /// RFC 3339 start of the most recent execution, if any.
    pub last_run: Option<String>,
    /// RFC 3339 time of the next planned execution.
    pub next_run: Option<String>,
    /// Total number of finished runs, scheduled or manual.
    pub run_count: u32,
    /// Error text of the last run, cleared by a successful run.
    pub last_error: Option<String>,
    pub last_duration_ms: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Result of a manual trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub job_id: String,
    pub success: bool,
    pub started_at: String,
    pub elapsed_ms: u64,
    /// The job's JSON summary when it succeeded.
    pub output: Option<Value>,
    pub error: Option<String>,
}
