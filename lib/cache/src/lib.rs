//! Session-scoped binding cache for switchboard.
//!
//! This crate provides:
//!
//! - **Session Cache**: bindings keyed by `(session key, sub id)`, with an
//!   atomic key rename for when the platform assigns its call ID
//! - **Session Scope**: sub-ID issuance and registration while one response
//!   is being built
//! - **Reaper**: time-driven eviction of sessions that were never called back

pub mod cache;
pub mod config;
pub mod error;
pub mod reaper;
pub mod scope;

pub use cache::{RenameOutcome, SessionCache};
pub use config::CacheConfig;
pub use error::CacheError;
pub use reaper::{Reaper, ReaperHandle};
pub use scope::SessionScope;
