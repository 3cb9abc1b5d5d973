//! Event types for exchange processing.
//!
//! Events are emitted while exchanges flow through routes to notify
//! subscribers about creation, sends, completions, failures, and logs.

mod exchange;

pub use exchange::ExchangeEvent;

use crate::runtime::ExchangeId;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Event message carrying the exchange and route context.
#[derive(Debug, Clone)]
pub struct Message {
    /// Exchange that generated this event.
    pub exchange_id: ExchangeId,
    /// Route the exchange was in when the event fired.
    pub route_id: String,
    /// The actual event data.
    pub event: ExchangeEvent,
}

/// Log entry emitted by a `log` node or endpoint.
#[derive(Debug, Clone)]
pub struct Log {
    pub exchange_id: ExchangeId,
    pub route_id: String,
    /// Node or endpoint that logged.
    pub source: String,
    pub content: String,
    /// Timestamp in milliseconds of the log entry.
    pub timestamp: i64,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl Message {
    pub fn is_complete(&self) -> bool {
        matches!(self.event, ExchangeEvent::Completed)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.event, ExchangeEvent::Failed(_))
    }
}
