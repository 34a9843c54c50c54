//! Current user session state
//!
//! Exactly one session exists per worker instance, owned by the worker
//! actor. It starts empty, is populated on login, and is cleared again by
//! `close_session`.

use serde::{Deserialize, Serialize};

/// Presence state shared by the session and roster entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Connected,
    Disconnected,
}

impl Presence {
    pub fn is_connected(&self) -> bool {
        matches!(self, Presence::Connected)
    }

    /// Wire representation, matching the serde rename
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Connected => "connected",
            Presence::Disconnected => "disconnected",
        }
    }
}

/// The current user's identity and presence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Identifier the user signed in with, if any
    pub identity: Option<String>,

    /// Upstream-visible presence
    pub presence: Presence,
}

impl Session {
    /// Create an empty, signed-out session
    pub fn new() -> Self {
        Self {
            identity: None,
            presence: Presence::Disconnected,
        }
    }

    /// Populate the session on a successful login
    pub fn sign_in(&mut self, identity: impl Into<String>) {
        self.identity = Some(identity.into());
        self.presence = Presence::Connected;
    }

    /// Clear the session back to its empty state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::new();
        assert_eq!(session.identity, None);
        assert_eq!(session.presence, Presence::Disconnected);
        assert!(!session.is_signed_in());
    }

    #[test]
    fn test_sign_in_populates() {
        let mut session = Session::new();
        session.sign_in("andreas");

        assert_eq!(session.identity.as_deref(), Some("andreas"));
        assert!(session.presence.is_connected());
        assert!(session.is_signed_in());
    }

    #[test]
    fn test_reset_clears() {
        let mut session = Session::new();
        session.sign_in("andreas");
        session.reset();

        assert_eq!(session, Session::new());
    }

    #[test]
    fn test_presence_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Presence::Connected).unwrap(), r#""connected""#);
        assert_eq!(
            serde_json::to_string(&Presence::Disconnected).unwrap(),
            r#""disconnected""#
        );
    }
}
