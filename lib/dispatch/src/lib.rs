//! Request/response event dispatch for switchboard.
//!
//! Inbound webhook requests and the responses computed for them are
//! published as [`Event`]s. A single consumer loop delivers them, in
//! publication order, to the [`Listeners`] registered for their
//! [`RequestType`], running each listener as an isolated task.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;
pub mod request_type;

pub use config::DispatchConfig;
pub use dispatcher::{DispatchStats, Dispatcher, EventPublisher, RunningDispatcher};
pub use error::{DispatchError, ListenerError, ResponseError};
pub use event::{Event, RequestEvent, ResponseDelivery, ResponseEvent, ResponseOutcome, ResponseThunk};
pub use listener::{HandlerResult, Listeners};
pub use request_type::RequestType;
