//! Core identifier types for switchboard.
//!
//! Sessions start life under a provisional [`SessionId`] and may later be
//! re-keyed under the platform's [`CallId`]; both are a [`SessionKey`].

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{
    CallId, ParseIdError, SessionId, SessionIdGenerator, SessionKey, SubId, SubIdGenerator,
};
