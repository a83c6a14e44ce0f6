//! `aura-core`: shared domain types, configuration and errors for the Aura
//! backend.
//!
//! Players, tasks, habits and routines are stored as JSON documents in a
//! key-value store. The types here describe those documents exactly as they
//! are persisted (`userId`, `occurence`, `x_occurence`, `DD-MM-YY` dates) so
//! every crate in the workspace decodes them the same way.

pub mod config;
pub mod dates;
pub mod error;
pub mod keys;
pub mod types;

pub use error::{AuraError, Result};
pub use types::{EntityKind, Habit, Player, Routine, Task, TrackedItem};
