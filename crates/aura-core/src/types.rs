use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{AuraError, Result};

/// Default per-item aura weight written by the API when a client omits it.
pub const DEFAULT_ITEM_AURA: i64 = 5;

fn default_item_aura() -> i64 {
    DEFAULT_ITEM_AURA
}

/// A player record as the penalty engine sees it.
///
/// Only the fields the engine reads are typed; the rest of the profile
/// (mentor, goals, password hash, …) stays in the stored document and is
/// preserved because aura writes are field-level merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub aura: i64,
}

impl Player {
    pub fn decode(key: &str, value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| AuraError::MalformedPlayer {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// One-off item with a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "crate::dates")]
    pub due_date: NaiveDate,
    #[serde(default = "default_item_aura")]
    pub aura: i64,
    #[serde(default)]
    pub completed: bool,
}

/// Recurring item. `occurence` / `x_occurence` are kept as stored; they are
/// validated into a recurrence rule only when the item is classified, so a
/// bad unit is reported as such instead of as a generic decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_item_aura")]
    pub aura: i64,
    #[serde(with = "crate::dates")]
    pub start_date: NaiveDate,
    #[serde(with = "crate::dates")]
    pub last_completed: NaiveDate,
    pub occurence: String,
    pub x_occurence: i64,
}

/// Recurring item with a checklist. Same recurrence fields as [`Habit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_item_aura")]
    pub aura: i64,
    #[serde(with = "crate::dates")]
    pub start_date: NaiveDate,
    #[serde(with = "crate::dates")]
    pub last_completed: NaiveDate,
    pub occurence: String,
    pub x_occurence: i64,
    #[serde(default)]
    pub checklist: String,
}

/// The three kinds of tracked item. Also the first segment of their keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Habit,
    Routine,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Task, EntityKind::Habit, EntityKind::Routine];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Habit => "habit",
            EntityKind::Routine => "routine",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "task" => Ok(EntityKind::Task),
            "habit" => Ok(EntityKind::Habit),
            "routine" => Ok(EntityKind::Routine),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// A decoded task, habit or routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedItem {
    Task(Task),
    Habit(Habit),
    Routine(Routine),
}

impl TrackedItem {
    /// Decode a stored document of the given kind.
    pub fn decode(kind: EntityKind, key: &str, value: Value) -> Result<Self> {
        let malformed = |e: serde_json::Error| AuraError::MalformedEntity {
            kind,
            key: key.to_string(),
            reason: e.to_string(),
        };
        Ok(match kind {
            EntityKind::Task => TrackedItem::Task(serde_json::from_value(value).map_err(malformed)?),
            EntityKind::Habit => {
                TrackedItem::Habit(serde_json::from_value(value).map_err(malformed)?)
            }
            EntityKind::Routine => {
                TrackedItem::Routine(serde_json::from_value(value).map_err(malformed)?)
            }
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            TrackedItem::Task(_) => EntityKind::Task,
            TrackedItem::Habit(_) => EntityKind::Habit,
            TrackedItem::Routine(_) => EntityKind::Routine,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TrackedItem::Task(t) => &t.id,
            TrackedItem::Habit(h) => &h.id,
            TrackedItem::Routine(r) => &r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TrackedItem::Task(t) => &t.name,
            TrackedItem::Habit(h) => &h.name,
            TrackedItem::Routine(r) => &r.name,
        }
    }
}
