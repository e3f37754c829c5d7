//! Switchboard server.
//!
//! Serves the assistant platform's webhook: builds assistants for new
//! calls, routes tool calls back to the bindings registered for them, and
//! publishes every request and response to the event dispatcher.

pub mod app;
pub mod assistant;
pub mod config;
pub mod error;
pub mod listeners;
pub mod outbound;
pub mod secret;
pub mod state;
pub mod tool;
pub mod webhook;
