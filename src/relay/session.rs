//! Session context.
//!
//! Who is chatting and which channel has their focus. Passed explicitly
//! and owned by the dispatcher; there is no process-wide "current
//! channel" global to mutate from random tasks.

/// Mutable per-session state, guarded by the dispatcher's lock.
#[derive(Debug, Clone)]
pub struct Session {
    /// Display name messages are sent under.
    pub user: String,
    /// The channel whose traffic is rendered in the foreground.
    pub focused: String,
}

impl Session {
    pub fn new(user: impl Into<String>, focused: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            focused: focused.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_holds_user_and_focus() {
        let session = Session::new("alice", "general");
        assert_eq!(session.user, "alice");
        assert_eq!(session.focused, "general");
    }
}
