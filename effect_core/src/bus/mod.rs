//! Event Bus - named publish/subscribe channel between plugins
//!
//! Subscribers are identified by a [`SubscriptionId`] handed out on
//! subscription. Dispatch always iterates over a copy of the subscriber list
//! taken under the read lock, so handlers may subscribe or unsubscribe (even
//! themselves) while an emission is in flight.

mod event;
mod metrics;

pub use event::{names, Event};
pub use metrics::EventMetrics;

use crate::config::BusConfig;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinSet;

/// Failure reported by (or caught from) a subscriber
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
    #[error("entity lock poisoned: {0}")]
    Poisoned(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

pub type HandlerResult = Result<(), HandlerError>;

/// Boxed future returned by async subscribers
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

type SyncHandler = Arc<dyn Fn(&Event) -> HandlerResult + Send + Sync>;
type AsyncHandler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Opaque handle for one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// An event name paired with the subscription registered on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub event: String,
    pub id: SubscriptionId,
}

#[derive(Clone)]
enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    /// Used in failure logs
    name: String,
    handler: Handler,
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn run_sync(handler: &SyncHandler, event: &Event) -> HandlerResult {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::Panicked(panic_message(payload))),
    }
}

fn log_failure(event: &str, handler: &str, error: &HandlerError) {
    match error {
        HandlerError::Panicked(_) => {
            tracing::error!(event, handler, error = %error, "event subscriber panicked")
        }
        _ => tracing::warn!(event, handler, error = %error, "event subscriber failed"),
    }
}

/// Process- or session-scoped publish/subscribe registry
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
    metrics: Mutex<HashMap<String, EventMetrics>>,
    slow_emit_warn: Duration,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_config(&BusConfig::default())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.read().len())
            .field("slow_emit_warn", &self.slow_emit_warn)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &BusConfig) -> Self {
        EventBus {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            metrics: Mutex::new(HashMap::new()),
            slow_emit_warn: Duration::from_millis(config.slow_emit_warn_ms),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Subscriber>>> {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Subscriber>>> {
        self.subscribers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, event: &str, name: &str, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write()
            .entry(event.to_string())
            .or_default()
            .push(Subscriber {
                id,
                name: name.to_string(),
                handler,
            });
        tracing::trace!(event, handler = name, "subscribed");
        id
    }

    /// Register a synchronous handler; handlers run in subscription order
    pub fn subscribe<F>(&self, event: &str, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(event, name, Handler::Sync(Arc::new(handler)))
    }

    /// Register a handler that may suspend
    pub fn subscribe_async<F, Fut>(&self, event: &str, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let wrapped: AsyncHandler = Arc::new(move |e: Event| Box::pin(handler(e)) as HandlerFuture);
        self.register(event, name, Handler::Async(wrapped))
    }

    /// Remove a subscription; false if it was not registered
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.write();
        let Some(list) = subscribers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscribers.remove(event);
        }
        removed
    }

    pub fn unsubscribe_all(&self, subscriptions: &[Subscription]) -> usize {
        subscriptions
            .iter()
            .filter(|s| self.unsubscribe(&s.event, s.id))
            .count()
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.read().get(event).map_or(0, Vec::len)
    }

    /// Drop every subscription and metric, for a fresh session
    pub fn clear(&self) {
        self.write().clear();
        self.clear_metrics();
    }

    fn snapshot(&self, event: &str) -> Vec<Subscriber> {
        self.read().get(event).cloned().unwrap_or_default()
    }

    /// Synchronous fan-out
    ///
    /// Sync handlers run inline, in order; a failing or panicking handler is
    /// logged and the rest still run. Async handlers are spawned on the
    /// ambient tokio runtime, or skipped with a warning when there is none.
    pub fn emit(&self, event: &Event) {
        let subscribers = self.snapshot(&event.name);
        if subscribers.is_empty() {
            return;
        }
        let start = Instant::now();
        let mut errors = 0;

        for sub in &subscribers {
            match &sub.handler {
                Handler::Sync(handler) => {
                    if let Err(err) = run_sync(handler, event) {
                        errors += 1;
                        log_failure(&event.name, &sub.name, &err);
                    }
                }
                Handler::Async(handler) => match Handle::try_current() {
                    Ok(runtime) => {
                        let task = runtime.spawn(handler(event.clone()));
                        let event_name = event.name.clone();
                        let name = sub.name.clone();
                        runtime.spawn(async move {
                            match task.await {
                                Ok(Ok(())) => {}
                                Ok(Err(err)) => log_failure(&event_name, &name, &err),
                                Err(join) => log_failure(
                                    &event_name,
                                    &name,
                                    &HandlerError::Panicked(join.to_string()),
                                ),
                            }
                        });
                    }
                    Err(_) => {
                        tracing::warn!(
                            event = %event.name,
                            handler = %sub.name,
                            "no async runtime, skipping async subscriber"
                        );
                    }
                },
            }
        }

        self.record(&event.name, start.elapsed(), errors, subscribers.len());
    }

    pub fn emit_all<I>(&self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            self.emit(&event);
        }
    }

    /// Fan-out that waits for every async subscriber to finish
    ///
    /// Sync handlers run inline first; async handlers run concurrently with
    /// no ordering guarantee. Failures and panics are logged per handler.
    pub async fn emit_async(&self, event: &Event) {
        let subscribers = self.snapshot(&event.name);
        if subscribers.is_empty() {
            return;
        }
        let start = Instant::now();
        let mut errors = 0;
        let mut tasks = JoinSet::new();

        for sub in &subscribers {
            match &sub.handler {
                Handler::Sync(handler) => {
                    if let Err(err) = run_sync(handler, event) {
                        errors += 1;
                        log_failure(&event.name, &sub.name, &err);
                    }
                }
                Handler::Async(handler) => {
                    let task = tokio::spawn(handler(event.clone()));
                    let name = sub.name.clone();
                    tasks.spawn(async move { (name, task.await) });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            let (name, outcome) = match joined {
                Ok(pair) => pair,
                Err(join) => {
                    errors += 1;
                    tracing::error!(event = %event.name, error = %join, "subscriber task lost");
                    continue;
                }
            };
            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(join) => HandlerError::Panicked(join.to_string()),
            };
            errors += 1;
            log_failure(&event.name, &name, &err);
        }

        self.record(&event.name, start.elapsed(), errors, subscribers.len());
    }

    fn record(&self, event: &str, elapsed: Duration, errors: u64, subscribers: usize) {
        if elapsed > self.slow_emit_warn {
            tracing::warn!(
                event,
                elapsed_ms = elapsed.as_millis() as u64,
                subscribers,
                "slow event emission"
            );
        }
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .record(elapsed, errors);
    }

    /// Copy of the per-event metrics
    pub fn metrics(&self) -> HashMap<String, EventMetrics> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_metrics(&self) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
