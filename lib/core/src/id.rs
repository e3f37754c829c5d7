//! Identifier types for sessions, platform calls and per-session bindings.
//!
//! A [`SessionId`] is minted when a response starts being built, before the
//! platform has assigned anything. Once the platform hands back its own
//! [`CallId`], the session may be re-keyed under it. Both forms are unified
//! as a [`SessionKey`]. Within one session every tool or assistant instance
//! gets a [`SubId`] from that session's [`SubIdGenerator`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use ulid::{Generator, Ulid};

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Provisional identifier for one inbound request's worth of configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Ulid);

impl SessionId {
    const PREFIX: &'static str = "sess";

    /// Creates a new ID with a randomly generated ULID.
    ///
    /// Prefer [`SessionIdGenerator::next_id`] where ordering matters.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates an ID from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", Self::PREFIX, self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(Self::PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(s);

        Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
            id_type: "SessionId",
            reason: e.to_string(),
        })
    }
}

/// Identifier the calling platform assigns to a call.
///
/// Opaque to us; only ever compared and displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Creates a call ID from the platform's string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the call ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The key a session is currently reachable under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SessionKey {
    /// Provisional key minted before the platform knew about the call.
    Session(SessionId),
    /// Platform-assigned call identifier.
    Call(CallId),
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => id.fmt(f),
            Self::Call(id) => id.fmt(f),
        }
    }
}

impl From<SessionId> for SessionKey {
    fn from(id: SessionId) -> Self {
        Self::Session(id)
    }
}

impl From<CallId> for SessionKey {
    fn from(id: CallId) -> Self {
        Self::Call(id)
    }
}

/// Identifier of one binding within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubId(u32);

impl SubId {
    /// Wraps a raw value, e.g. one echoed back by the platform.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(Self).map_err(|e| ParseIdError {
            id_type: "SubId",
            reason: e.to_string(),
        })
    }
}

/// Process-wide source of session identifiers.
///
/// IDs come out strictly increasing, even when several are minted within the
/// same millisecond from different threads.
pub struct SessionIdGenerator {
    inner: Mutex<Generator>,
}

impl SessionIdGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Mints the next session ID.
    pub fn next_id(&self) -> SessionId {
        match self.inner.lock().generate() {
            Ok(ulid) => SessionId(ulid),
            Err(e) => {
                // Random part exhausted for this millisecond. A fresh random
                // ULID is still unique, just not ordered.
                tracing::warn!(error = %e, "monotonic session id overflow");
                SessionId(Ulid::new())
            }
        }
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdGenerator").finish_non_exhaustive()
    }
}

/// Per-session counter handing out [`SubId`]s in call order.
#[derive(Debug, Default)]
pub struct SubIdGenerator {
    next: AtomicU32,
}

impl SubIdGenerator {
    /// Creates a generator whose first ID is 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next sub ID.
    pub fn next_id(&self) -> SubId {
        SubId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of IDs issued so far.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}
