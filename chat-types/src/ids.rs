//! Identity types for Parley.
//!
//! Both identifiers are opaque strings minted by the server. The client never
//! parses them; it only compares and echoes them back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a participant, assigned by the server on registration.
///
/// Stable for the lifetime of the participant's session.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a server-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque credential that lets a later process resume a session without
/// registering a display name again.
///
/// `Debug` output is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a server-issued token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token, e.g. for persisting it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short, log-safe prefix of the token.
    pub fn fingerprint(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

impl From<&str> for SessionToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_displays_raw_value() {
        let id = PeerId::new("u42");
        assert_eq!(id.to_string(), "u42");
        assert_eq!(id.as_str(), "u42");
        assert_eq!(format!("{:?}", id), "PeerId(u42)");
    }

    #[test]
    fn peer_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PeerId::new("u1")).unwrap();
        assert_eq!(json, "\"u1\"");
    }

    #[test]
    fn session_token_debug_is_redacted() {
        let token = SessionToken::new("very-secret-token");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret"), "token leaked: {}", debug);
        assert_eq!(token.expose(), "very-secret-token");
    }

    #[test]
    fn session_token_fingerprint_is_short() {
        let token = SessionToken::new("abcdef123");
        assert_eq!(token.fingerprint(), "abcd…");
    }
}
