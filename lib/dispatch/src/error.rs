//! Error types for the dispatch crate.
//!
//! - `ListenerError`: returned by registered handlers
//! - `ResponseError`: returned by a response event's payload computation
//! - `DispatchError`: raised by the dispatcher itself

use std::fmt;

/// Failure reported by a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The handler could not do its work.
    Failed { reason: String },
    /// The handler ran past the configured timeout.
    TimedOut { after_seconds: u64 },
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Failed`].
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "listener failed: {reason}"),
            Self::TimedOut { after_seconds } => {
                write!(f, "listener timed out after {after_seconds}s")
            }
        }
    }
}

impl std::error::Error for ListenerError {}

/// Failure computing a response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// The response could not be produced.
    ComputationFailed { reason: String },
    /// The response could not be turned into JSON.
    SerializationFailed { reason: String },
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ComputationFailed { reason } => {
                write!(f, "response computation failed: {reason}")
            }
            Self::SerializationFailed { reason } => {
                write!(f, "response serialization failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ResponseError {}

/// Errors from the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher has stopped accepting events.
    Closed,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "event dispatcher is closed"),
        }
    }
}

impl std::error::Error for DispatchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_error_display() {
        assert!(ListenerError::failed("boom").to_string().contains("boom"));
        let err = ListenerError::TimedOut { after_seconds: 30 };
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn response_error_display() {
        let err = ResponseError::ComputationFailed {
            reason: "no model".to_string(),
        };
        assert!(err.to_string().contains("no model"));
    }

    #[test]
    fn dispatch_error_display() {
        assert!(DispatchError::Closed.to_string().contains("closed"));
    }
}
