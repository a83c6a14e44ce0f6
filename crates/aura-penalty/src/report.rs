use aura_core::types::EntityKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An item that contributed to a player's penalty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueItem {
    pub kind: EntityKind,
    pub id: String,
    pub name: String,
    /// Task due date, or the computed next occurrence for habits/routines.
    pub due: NaiveDate,
    pub penalty: i64,
}

/// One player's aura write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPenalty {
    pub username: String,
    /// Sum of the overdue items' weights.
    pub penalty: i64,
    /// Aura read immediately before the write.
    pub previous_aura: i64,
    /// `max(0, previous_aura - penalty)`.
    pub new_aura: i64,
    pub overdue_items: Vec<OverdueItem>,
}

impl PlayerPenalty {
    /// Aura actually removed, after clamping at zero.
    pub fn applied(&self) -> i64 {
        self.previous_aura - self.new_aura
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepIssueKind {
    /// The player document could not be decoded.
    MalformedPlayer,
    /// Listing the player's items failed.
    ReadFailed,
    /// The player record disappeared before the write.
    PlayerMissing,
    /// The aura write failed.
    PlayerWriteFailed,
}

/// A player-scoped failure. The sweep carried on past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepIssue {
    pub key: String,
    pub kind: SweepIssueKind,
    pub message: String,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub today: Option<NaiveDate>,
    pub players_scanned: usize,
    /// Players whose aura was written.
    pub players_penalized: usize,
    /// Total aura removed across all players, after clamping.
    pub total_penalty_applied: i64,
    /// Items that were skipped as malformed or with an invalid recurrence.
    pub entities_skipped: usize,
    pub penalties: Vec<PlayerPenalty>,
    pub errors: Vec<SweepIssue>,
}

impl SweepReport {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Some(today),
            ..Self::default()
        }
    }

    pub(crate) fn record_penalty(&mut self, penalty: PlayerPenalty) {
        self.players_penalized += 1;
        self.total_penalty_applied += penalty.applied();
        self.penalties.push(penalty);
    }

    pub(crate) fn record_issue(&mut self, key: &str, kind: SweepIssueKind, message: impl Into<String>) {
        self.errors.push(SweepIssue {
            key: key.to_string(),
            kind,
            message: message.into(),
        });
    }

    /// Penalty record for `username`, if the sweep wrote one.
    pub fn penalty_for(&self, username: &str) -> Option<&PlayerPenalty> {
        self.penalties.iter().find(|p| p.username == username)
    }
}
