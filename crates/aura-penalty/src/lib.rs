//! `aura-penalty`: recurrence math, overdue classification and the sweep
//! that turns overdue items into aura penalties.
//!
//! # Pipeline
//!
//! ```text
//! PenaltySweep::run(today)
//!   └─ per player: list task/habit/routine by scoped prefix
//!        └─ classify(item, today)        (one function per item kind)
//!             └─ next_due(anchor, rule)  (habits and routines only)
//! ```
//!
//! `today` is always supplied by the caller; nothing here reads the clock
//! to decide whether an item is overdue.
//!
//! # Repeated penalties
//!
//! The sweep only ever writes a player's `aura`. It never completes,
//! advances or marks an item, so an item that stays overdue is charged
//! again on every sweep until the player acts on it. There is no
//! "already penalized this cycle" bookkeeping.

pub mod classify;
pub mod error;
pub mod recurrence;
pub mod report;
pub mod sweep;

pub use classify::{classify, PenaltyWeights, Verdict};
pub use error::{RecurrenceError, SweepError};
pub use recurrence::{next_due, RecurrenceRule, RecurrenceUnit};
pub use report::{OverdueItem, PlayerPenalty, SweepIssue, SweepIssueKind, SweepReport};
pub use sweep::PenaltySweep;
