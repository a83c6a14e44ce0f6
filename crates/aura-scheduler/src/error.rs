use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// SQLite failure, or the connection mutex was poisoned.
    #[error("Database error: {0}")]
    Database(String),

    /// The provided schedule definition is invalid.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No job with the given ID is registered.
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// The job is already running.
    #[error("Job already running: {id}")]
    Busy { id: String },

    /// A job with this ID was already registered on this engine.
    #[error("Job already registered: {id}")]
    DuplicateJob { id: String },
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) => "DATABASE_ERROR",
            SchedulerError::InvalidSchedule(_) => "INVALID_SCHEDULE",
            SchedulerError::JobNotFound { .. } => "JOB_NOT_FOUND",
            SchedulerError::Busy { .. } => "JOB_BUSY",
            SchedulerError::DuplicateJob { .. } => "DUPLICATE_JOB",
        }
    }
}

impl From<rusqlite::Error> for SchedulerError {
    fn from(e: rusqlite::Error) -> Self {
        SchedulerError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
