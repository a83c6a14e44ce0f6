//! Key layout of the key-value store.
//!
//! ```text
//! player:{username}
//! task:{username}:{id}
//! habit:{username}:{id}
//! routine:{username}:{id}
//! ```
//!
//! Every per-user listing goes through [`items_prefix`] so backends can
//! serve it with a scoped range or SCAN pattern instead of a global scan.
//! Neither usernames nor item ids may contain `:`; otherwise `task:al:` would
//! also match the items of a user named `al:ice`.

use crate::types::EntityKind;

pub const PLAYER_PREFIX: &str = "player:";
pub const SEPARATOR: char = ':';

/// Non-empty and free of the key separator.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty() && !username.contains(SEPARATOR)
}

pub fn player_key(username: &str) -> String {
    format!("{PLAYER_PREFIX}{username}")
}

/// Recover the username from a `player:{username}` key. `None` when the
/// key carries no valid username.
pub fn username_from_player_key(key: &str) -> Option<&str> {
    key.strip_prefix(PLAYER_PREFIX).filter(|u| is_valid_username(u))
}

pub fn item_key(kind: EntityKind, username: &str, id: &str) -> String {
    format!("{}:{}:{}", kind.as_str(), username, id)
}

/// Prefix matching every item of `kind` owned by `username`. Always ends in
/// `:` so `alice` never matches `alice2`.
pub fn items_prefix(kind: EntityKind, username: &str) -> String {
    format!("{}:{}:", kind.as_str(), username)
}

/// The id segment of a key returned by a listing on `prefix`. `None` when
/// the remainder holds another separator, i.e. the key belongs to a
/// different owner whose name extends this one.
pub fn item_id_from_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(prefix)
        .filter(|id| !id.is_empty() && !id.contains(SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_key_roundtrip() {
        let key = player_key("alice");
        assert_eq!(key, "player:alice");
        assert_eq!(username_from_player_key(&key), Some("alice"));
        assert_eq!(username_from_player_key("player:"), None);
        assert_eq!(username_from_player_key("task:alice:1"), None);
    }

    #[test]
    fn item_prefix_is_scoped() {
        let prefix = items_prefix(EntityKind::Habit, "alice");
        assert_eq!(prefix, "habit:alice:");
        assert!(item_key(EntityKind::Habit, "alice", "h1").starts_with(&prefix));
        assert!(!item_key(EntityKind::Habit, "alice2", "h1").starts_with(&prefix));
    }

    #[test]
    fn separator_in_username_is_rejected() {
        assert!(is_valid_username("alice"));
        assert!(!is_valid_username("al:ice"));
        assert!(!is_valid_username(""));
        assert_eq!(username_from_player_key("player:al:ice"), None);
    }

    #[test]
    fn foreign_items_under_a_shorter_name_are_not_ours() {
        let prefix = items_prefix(EntityKind::Task, "al");
        let foreign = item_key(EntityKind::Task, "al:ice", "t1");
        assert!(foreign.starts_with(&prefix));
        assert_eq!(item_id_from_key(&prefix, &foreign), None);
        assert_eq!(item_id_from_key(&prefix, "task:al:t1"), Some("t1"));
    }
}
