//! Listener registration.
//!
//! Handlers are registered on a [`Listeners`] set before the dispatcher
//! starts. Each kind of event (request, response) has an unconditional set
//! that sees every event of that kind, plus per-type sets.

use crate::error::ListenerError;
use crate::event::{RequestEvent, ResponseDelivery};
use crate::request_type::RequestType;
use futures::FutureExt;
use futures::future::BoxFuture;
use rootcause::Report;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What every listener returns.
pub type HandlerResult = Result<(), Report<ListenerError>>;

pub(crate) type Handler<E> = Arc<dyn Fn(Arc<E>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

fn boxed<E, F, Fut>(handler: F) -> Handler<E>
where
    E: Send + Sync + 'static,
    F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |event| handler(event).boxed())
}

struct HandlerSet<E> {
    every: Vec<Handler<E>>,
    by_type: HashMap<RequestType, Vec<Handler<E>>>,
}

impl<E> Default for HandlerSet<E> {
    fn default() -> Self {
        Self {
            every: Vec::new(),
            by_type: HashMap::new(),
        }
    }
}

impl<E> HandlerSet<E> {
    /// Unconditional handlers first, then the type-specific ones, each in
    /// registration order.
    fn matching(&self, request_type: RequestType) -> Vec<Handler<E>> {
        let typed = self.by_type.get(&request_type).map_or(&[][..], Vec::as_slice);
        self.every.iter().chain(typed).cloned().collect()
    }

    fn len(&self) -> usize {
        self.every.len() + self.by_type.values().map(Vec::len).sum::<usize>()
    }
}

/// Registered request and response handlers.
#[derive(Default)]
pub struct Listeners {
    requests: HandlerSet<RequestEvent>,
    responses: HandlerSet<ResponseDelivery>,
}

impl Listeners {
    /// Creates an empty registration set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `handler` for every request.
    pub fn on_every_request<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(Arc<RequestEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.requests.every.push(boxed(handler));
        self
    }

    /// Runs `handler` for requests of `request_type`.
    pub fn on_request_of_type<F, Fut>(&mut self, request_type: RequestType, handler: F) -> &mut Self
    where
        F: Fn(Arc<RequestEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.requests
            .by_type
            .entry(request_type)
            .or_default()
            .push(boxed(handler));
        self
    }

    /// Runs `handler` for every response.
    pub fn on_every_response<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(Arc<ResponseDelivery>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.responses.every.push(boxed(handler));
        self
    }

    /// Runs `handler` for responses to requests of `request_type`.
    pub fn on_response_of_type<F, Fut>(
        &mut self,
        request_type: RequestType,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Arc<ResponseDelivery>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.responses
            .by_type
            .entry(request_type)
            .or_default()
            .push(boxed(handler));
        self
    }

    /// Total number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len() + self.responses.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn request_handlers(&self, request_type: RequestType) -> Vec<Handler<RequestEvent>> {
        self.requests.matching(request_type)
    }

    pub(crate) fn response_handlers(
        &self,
        request_type: RequestType,
    ) -> Vec<Handler<ResponseDelivery>> {
        self.responses.matching(request_type)
    }

    pub(crate) fn has_response_handlers(&self, request_type: RequestType) -> bool {
        !self.responses.every.is_empty() || self.responses.by_type.contains_key(&request_type)
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("requests", &self.requests.len())
            .field("responses", &self.responses.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_puts_unconditional_handlers_first() {
        let mut listeners = Listeners::new();
        listeners
            .on_request_of_type(RequestType::ToolCalls, |_| async { Ok(()) })
            .on_every_request(|_| async { Ok(()) })
            .on_request_of_type(RequestType::Hang, |_| async { Ok(()) });

        assert_eq!(listeners.request_handlers(RequestType::ToolCalls).len(), 2);
        assert_eq!(listeners.request_handlers(RequestType::Hang).len(), 2);
        assert_eq!(listeners.request_handlers(RequestType::Transcript).len(), 1);
        assert_eq!(listeners.response_handlers(RequestType::ToolCalls).len(), 0);
        assert_eq!(listeners.len(), 3);
    }

    #[test]
    fn response_handler_presence_is_per_type() {
        let mut listeners = Listeners::new();
        listeners.on_response_of_type(RequestType::EndOfCallReport, |_| async { Ok(()) });

        assert!(listeners.has_response_handlers(RequestType::EndOfCallReport));
        assert!(!listeners.has_response_handlers(RequestType::ToolCalls));

        listeners.on_every_response(|_| async { Ok(()) });
        assert!(listeners.has_response_handlers(RequestType::ToolCalls));
    }

    #[test]
    fn empty_listeners() {
        assert!(Listeners::new().is_empty());
    }
}
