//! Active-user tracking.
//!
//! Membership is server-authoritative: the set only changes in response to
//! `user_joined`, `user_left`, `active_users` and `cursor_update` messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// A collaborator currently connected to the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
}

impl ActiveUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            cursor: None,
        }
    }
}

/// Ordered set of active users keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PresenceSet {
    users: Vec<ActiveUser>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user. Joining an id that is already present is a no-op.
    /// Returns true if the user was added.
    pub fn join(&mut self, user: ActiveUser) -> bool {
        if self.contains(&user.id) {
            return false;
        }
        self.users.push(user);
        true
    }

    /// Remove a user by id. Returns the removed entry, if any.
    pub fn leave(&mut self, id: &str) -> Option<ActiveUser> {
        let pos = self.users.iter().position(|u| u.id == id)?;
        Some(self.users.remove(pos))
    }

    /// Replace the whole set. Later duplicates of an id are dropped.
    pub fn replace(&mut self, users: Vec<ActiveUser>) {
        self.users.clear();
        for user in users {
            self.join(user);
        }
    }

    /// Patch one user's cursor. Unknown ids are ignored.
    /// Returns true if a user was updated.
    pub fn update_cursor(&mut self, id: &str, cursor: CursorPosition) -> bool {
        match self.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.cursor = Some(cursor);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&ActiveUser> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveUser> {
        self.users.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_join_is_idempotent() {
        let mut presence = PresenceSet::new();
        assert!(presence.join(ActiveUser::new("u1", "a@example.com")));
        assert!(!presence.join(ActiveUser::new("u1", "a@example.com")));
        assert_eq!(presence.len(), 1);
    }

    #[test]
    fn test_leave_absent_is_noop() {
        let mut presence = PresenceSet::new();
        presence.join(ActiveUser::new("u1", "a@example.com"));
        assert!(presence.leave("ghost").is_none());
        assert_eq!(presence.len(), 1);
        assert!(presence.leave("u1").is_some());
        assert!(presence.is_empty());
    }

    #[test]
    fn test_cursor_patch_only_touches_cursor() {
        let mut presence = PresenceSet::new();
        presence.join(ActiveUser::new("u1", "a@example.com"));
        assert!(presence.update_cursor("u1", CursorPosition { x: 3.0, y: 4.0 }));
        assert!(!presence.update_cursor("u2", CursorPosition { x: 0.0, y: 0.0 }));

        let user = presence.get("u1").unwrap();
        assert_eq!(user.email, "a@example.com");
        assert_eq!(user.cursor, Some(CursorPosition { x: 3.0, y: 4.0 }));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut presence = PresenceSet::new();
        presence.join(ActiveUser::new("old", "old@example.com"));
        presence.replace(vec![
            ActiveUser::new("a", "a@example.com"),
            ActiveUser::new("b", "b@example.com"),
            ActiveUser::new("a", "dup@example.com"),
        ]);
        let ids: Vec<_> = presence.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
