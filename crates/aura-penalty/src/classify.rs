use aura_core::config::PenaltyConfig;
use aura_core::types::{Habit, Routine, Task, TrackedItem};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::recurrence::{next_due, RecurrenceRule};

/// Aura deducted per overdue item, by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyWeights {
    pub task: i64,
    pub habit: i64,
    pub routine: i64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        PenaltyConfig::default().into()
    }
}

impl From<PenaltyConfig> for PenaltyWeights {
    fn from(cfg: PenaltyConfig) -> Self {
        Self {
            task: cfg.task,
            habit: cfg.habit,
            routine: cfg.routine,
        }
    }
}

/// Outcome of classifying one item against `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The deadline (`due`) is strictly before today.
    Overdue { penalty: i64, due: NaiveDate },
    /// Not due yet, due today, or already completed.
    Current,
}

impl Verdict {
    pub fn penalty(&self) -> i64 {
        match self {
            Verdict::Overdue { penalty, .. } => *penalty,
            Verdict::Current => 0,
        }
    }
}

pub fn classify(item: &TrackedItem, today: NaiveDate, weights: &PenaltyWeights) -> Result<Verdict> {
    match item {
        TrackedItem::Task(task) => Ok(classify_task(task, today, weights.task)),
        TrackedItem::Habit(habit) => classify_habit(habit, today, weights.habit),
        TrackedItem::Routine(routine) => classify_routine(routine, today, weights.routine),
    }
}

/// Completed tasks are never overdue, whatever their date.
pub fn classify_task(task: &Task, today: NaiveDate, weight: i64) -> Verdict {
    if !task.completed && task.due_date < today {
        Verdict::Overdue {
            penalty: weight,
            due: task.due_date,
        }
    } else {
        Verdict::Current
    }
}

pub fn classify_habit(habit: &Habit, today: NaiveDate, weight: i64) -> Result<Verdict> {
    classify_recurring(habit.start_date, &habit.occurence, habit.x_occurence, today, weight)
}

pub fn classify_routine(routine: &Routine, today: NaiveDate, weight: i64) -> Result<Verdict> {
    classify_recurring(
        routine.start_date,
        &routine.occurence,
        routine.x_occurence,
        today,
        weight,
    )
}

// `last_completed` is deliberately not consulted: the next occurrence is
// computed from `start_date` alone.
fn classify_recurring(
    start_date: NaiveDate,
    unit: &str,
    multiplier: i64,
    today: NaiveDate,
    weight: i64,
) -> Result<Verdict> {
    let rule = RecurrenceRule::parse(unit, multiplier)?;
    let due = next_due(start_date, &rule)?;
    Ok(if due < today {
        Verdict::Overdue {
            penalty: weight,
            due,
        }
    } else {
        Verdict::Current
    })
}
