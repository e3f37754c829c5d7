//! Error types for the session cache.
//!
//! Lookup misses are not errors; [`SessionCache::get`](crate::SessionCache::get)
//! returns `None` for them. Only writes that would break the append-only
//! contract of a session entry are reported here.

use std::fmt;
use switchboard_core::{SessionKey, SubId};

/// Errors from cache writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A binding already exists for this sub ID within the session.
    DuplicateBinding { key: SessionKey, sub_id: SubId },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateBinding { key, sub_id } => {
                write!(f, "binding {sub_id} already registered for session {key}")
            }
        }
    }
}

impl std::error::Error for CacheError {}
