use aura_store::StoreError;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors from building or evaluating a recurrence rule. Entity-scoped: the
/// sweep logs them and skips the item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("Invalid recurrence unit: {0:?} (expected days, weeks or months)")]
    InvalidRecurrenceUnit(String),

    #[error("Invalid recurrence multiplier: {0} (must be a positive integer)")]
    InvalidRecurrenceMultiplier(i64),

    #[error("Next due date out of range: {anchor} + {days} days")]
    DateOutOfRange { anchor: NaiveDate, days: u64 },
}

/// Errors that abort a whole sweep. Everything narrower is recorded in the
/// report instead.
#[derive(Debug, Error)]
pub enum SweepError {
    /// The store went away. `players_written` players were already updated
    /// before the outage (always 0 if it happened while reading).
    #[error("Store unavailable after {players_written} player update(s): {source}")]
    StoreUnavailable {
        #[source]
        source: StoreError,
        players_written: usize,
    },

    /// The player listing itself failed, so there is nothing to sweep.
    #[error("Failed to list players: {0}")]
    ListPlayers(#[source] StoreError),
}

impl SweepError {
    pub fn code(&self) -> &'static str {
        match self {
            SweepError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            SweepError::ListPlayers(_) => "LIST_PLAYERS_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, RecurrenceError>;
