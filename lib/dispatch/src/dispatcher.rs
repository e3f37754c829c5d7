//! Ordered, single-consumer event fan-out.
//!
//! Publishers push onto an unbounded queue. One loop task pops events in
//! FIFO order and, for each, calls every matching listener before moving to
//! the next event. The future a listener returns runs as its own task.
//! Listener failures, panics and timeouts are caught and logged; they never
//! reach the loop or sibling listeners.
//!
//! A response event's payload thunk is evaluated by the loop (on the blocking
//! pool) right before its listeners are called, so evaluation stays lazy and
//! listeners still start in publication order. The handler timeout bounds
//! that evaluation too.

use crate::config::DispatchConfig;
use crate::error::{DispatchError, ListenerError};
use crate::event::{Event, RequestEvent, ResponseDelivery, ResponseEvent, ResponseOutcome};
use crate::listener::{Handler, HandlerResult, Listeners};
use crate::request_type::RequestType;
use futures::FutureExt;
use futures::future::BoxFuture;
use rootcause::Report;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Point-in-time dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events taken off the queue.
    pub events_dispatched: u64,
    /// Listener tasks spawned.
    pub handler_invocations: u64,
    /// Listener invocations that errored, panicked or timed out.
    pub handler_failures: u64,
    /// Response thunks that errored or panicked.
    pub response_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    events_dispatched: AtomicU64,
    handler_invocations: AtomicU64,
    handler_failures: AtomicU64,
    response_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            handler_invocations: self.handler_invocations.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            response_failures: self.response_failures.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable entry point for publishing events.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventPublisher {
    /// Enqueues an event. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Closed`] once the dispatcher has stopped.
    pub fn publish(&self, event: impl Into<Event>) -> Result<(), Report<DispatchError>> {
        self.tx.send(event.into()).map_err(|_| DispatchError::Closed)?;
        Ok(())
    }
}

impl fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPublisher")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// A dispatcher that has not started consuming yet.
///
/// Events published before [`start`](Self::start) are queued and delivered
/// once it runs.
pub struct Dispatcher {
    listeners: Listeners,
    config: DispatchConfig,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Creates a dispatcher over a fixed set of listeners.
    #[must_use]
    pub fn new(listeners: Listeners, config: DispatchConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            listeners,
            config,
            tx,
            rx,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns a publisher for this dispatcher.
    #[must_use]
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            tx: self.tx.clone(),
        }
    }

    /// Spawns the consumption loop on the current tokio runtime.
    #[must_use]
    pub fn start(self) -> RunningDispatcher {
        let Self {
            listeners,
            config,
            tx,
            rx,
            counters,
        } = self;

        info!(
            listeners = listeners.len(),
            handler_timeout = ?config.handler_timeout(),
            "event dispatcher started"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let consumer = Consumer {
            listeners: Arc::new(listeners),
            handler_timeout: config.handler_timeout(),
            counters: Arc::clone(&counters),
            in_flight: JoinSet::new(),
        };
        let task = tokio::spawn(consumer.run(rx, shutdown_rx));

        RunningDispatcher {
            publisher: EventPublisher { tx },
            counters,
            shutdown_tx,
            task,
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Handle to a running dispatcher.
///
/// Dropping it without calling [`stop`](Self::stop) also closes intake; the
/// loop then drains what is queued and exits on its own.
pub struct RunningDispatcher {
    publisher: EventPublisher,
    counters: Arc<Counters>,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RunningDispatcher {
    /// Returns a publisher for this dispatcher.
    #[must_use]
    pub fn publisher(&self) -> EventPublisher {
        self.publisher.clone()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Closes intake, dispatches everything already queued, waits for every
    /// in-flight listener, and returns the final counters.
    pub async fn stop(self) -> DispatchStats {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "event dispatcher loop ended abnormally");
        }
        let stats = self.counters.snapshot();
        info!(
            events = stats.events_dispatched,
            handler_failures = stats.handler_failures,
            "event dispatcher stopped"
        );
        stats
    }
}

impl fmt::Debug for RunningDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningDispatcher")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

struct Consumer {
    listeners: Arc<Listeners>,
    handler_timeout: Option<Duration>,
    counters: Arc<Counters>,
    in_flight: JoinSet<()>,
}

impl Consumer {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Event>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut closing = false;
        loop {
            let next = if closing {
                rx.recv().await
            } else {
                tokio::select! {
                    biased;
                    event = rx.recv() => event,
                    // Stop requested or handle dropped: refuse new events,
                    // keep draining the queued ones.
                    _ = &mut shutdown => {
                        closing = true;
                        rx.close();
                        continue;
                    }
                }
            };

            let Some(event) = next else { break };
            self.dispatch(event).await;
            self.reap_finished();
        }

        while let Some(joined) = self.in_flight.join_next().await {
            log_join_error(joined);
        }
        debug!("event dispatcher loop exited");
    }

    async fn dispatch(&mut self, event: Event) {
        self.counters.events_dispatched.fetch_add(1, Ordering::Relaxed);
        match event {
            Event::Request(event) => {
                let handlers = self.listeners.request_handlers(event.request_type);
                self.spawn_all(handlers, Arc::new(event), "request");
            }
            Event::Response(event) => {
                let request_type = event.request_type;
                if !self.listeners.has_response_handlers(request_type) {
                    return;
                }
                let delivery = self.evaluate(event).await;
                let handlers = self.listeners.response_handlers(request_type);
                self.spawn_all(handlers, Arc::new(delivery), "response");
            }
        }
    }

    async fn evaluate(&self, event: ResponseEvent) -> ResponseDelivery {
        let (request_type, elapsed, thunk) = event.into_parts();

        let computation = tokio::task::spawn_blocking(thunk);
        let joined = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, computation).await.ok(),
            None => Some(computation.await),
        };

        let outcome = match joined {
            Some(Ok(Ok(value))) => ResponseOutcome::Computed(value),
            Some(Ok(Err(report))) => {
                self.counters.response_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%request_type, error = %report, "response computation failed");
                ResponseOutcome::Failed {
                    reason: report.to_string(),
                }
            }
            Some(Err(e)) => {
                self.counters.response_failures.fetch_add(1, Ordering::Relaxed);
                let reason = if e.is_panic() {
                    let payload = e.into_panic();
                    format!("response computation panicked: {}", panic_message(&*payload))
                } else {
                    "response computation was cancelled".to_string()
                };
                error!(%request_type, %reason, "response computation failed");
                ResponseOutcome::Failed { reason }
            }
            // The blocking thread keeps running; only the loop moves on.
            None => {
                self.counters.response_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%request_type, "response computation timed out");
                ResponseOutcome::Failed {
                    reason: "response computation timed out".to_string(),
                }
            }
        };

        ResponseDelivery {
            request_type,
            elapsed,
            outcome,
        }
    }

    /// Calls every handler on the loop, in order, and spawns the futures
    /// they return. Handlers of one event have all been entered before the
    /// next event is taken.
    fn spawn_all<E>(&mut self, handlers: Vec<Handler<E>>, event: Arc<E>, kind: &'static str)
    where
        E: EventSubject + Send + Sync + 'static,
    {
        for (index, handler) in handlers.into_iter().enumerate() {
            self.counters.handler_invocations.fetch_add(1, Ordering::Relaxed);
            let invocation = Invocation {
                kind,
                request_type: event.request_type(),
                index,
                timeout: self.handler_timeout,
                counters: Arc::clone(&self.counters),
            };
            let subject = Arc::clone(&event);
            match std::panic::catch_unwind(AssertUnwindSafe(|| handler(subject))) {
                Ok(future) => {
                    self.in_flight.spawn(invocation.run(future));
                }
                Err(panic) => invocation.finish(Err(panic)),
            }
        }
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            log_join_error(joined);
        }
    }
}

/// Anything a listener can be invoked with.
trait EventSubject {
    fn request_type(&self) -> RequestType;
}

impl EventSubject for RequestEvent {
    fn request_type(&self) -> RequestType {
        self.request_type
    }
}

impl EventSubject for ResponseDelivery {
    fn request_type(&self) -> RequestType {
        self.request_type
    }
}

struct Invocation {
    kind: &'static str,
    request_type: RequestType,
    index: usize,
    timeout: Option<Duration>,
    counters: Arc<Counters>,
}

impl Invocation {
    async fn run(self, future: BoxFuture<'static, HandlerResult>) {
        let guarded = AssertUnwindSafe(future).catch_unwind();

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => Ok(Err(ListenerError::TimedOut {
                    after_seconds: limit.as_secs(),
                }
                .into())),
            },
            None => guarded.await,
        };

        self.finish(result);
    }

    fn finish(&self, result: Result<HandlerResult, Box<dyn Any + Send>>) {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(report)) => {
                self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = self.kind,
                    request_type = %self.request_type,
                    handler = self.index,
                    error = %report,
                    "listener failed"
                );
            }
            Err(panic) => {
                self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    kind = self.kind,
                    request_type = %self.request_type,
                    handler = self.index,
                    panic = %panic_message(&*panic),
                    "listener panicked"
                );
            }
        }
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "listener task ended abnormally");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
