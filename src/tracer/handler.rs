use std::sync::Arc;

use tracing::Level;

use super::{TraceDirection, TraceEventMessage, TraceInterceptor};
use crate::{
    Result,
    model::NodeDefinition,
    runtime::{Exchange, Processor},
};

/// State carried from `trace_exchange_in` to `trace_exchange_out`.
pub type TraceState = Option<Arc<TraceEventMessage>>;

/// Receives trace callbacks for every traced node.
///
/// With out tracing enabled each node produces an in/out pair; otherwise a
/// single `trace_exchange` call once the node completed.
pub trait TraceHandler: Send + Sync {
    fn trace_exchange_in(
        &self,
        node: &NodeDefinition,
        target: &dyn Processor,
        interceptor: &TraceInterceptor,
        exchange: &Exchange,
    ) -> Result<TraceState>;

    fn trace_exchange_out(
        &self,
        node: &NodeDefinition,
        target: &dyn Processor,
        interceptor: &TraceInterceptor,
        exchange: &Exchange,
        state: TraceState,
    ) -> Result<()>;

    fn trace_exchange(
        &self,
        node: &NodeDefinition,
        target: &dyn Processor,
        interceptor: &TraceInterceptor,
        exchange: &Exchange,
    ) -> Result<()>;
}

/// Logs each event with the tracer's formatter, keeps it in the backlog and
/// forwards it to the destination endpoint if one is set.
#[derive(Debug, Default)]
pub struct DefaultTraceEventHandler;

impl DefaultTraceEventHandler {
    fn publish(
        &self,
        interceptor: &TraceInterceptor,
        event: Arc<TraceEventMessage>,
    ) -> Result<()> {
        let tracer = interceptor.tracer();
        let line = tracer.formatter().format(&event);
        match tracer.log_level() {
            Level::TRACE => tracing::trace!(target: "routeweave::tracer", "{}", line),
            Level::DEBUG => tracing::debug!(target: "routeweave::tracer", "{}", line),
            Level::WARN => tracing::warn!(target: "routeweave::tracer", "{}", line),
            Level::ERROR => tracing::error!(target: "routeweave::tracer", "{}", line),
            _ => tracing::info!(target: "routeweave::tracer", "{}", line),
        }

        tracer.backlog().push(event.clone());
        tracer.dispatch(&event)
    }
}

impl TraceHandler for DefaultTraceEventHandler {
    fn trace_exchange_in(
        &self,
        node: &NodeDefinition,
        _target: &dyn Processor,
        interceptor: &TraceInterceptor,
        exchange: &Exchange,
    ) -> Result<TraceState> {
        let event = Arc::new(TraceEventMessage::new(node, exchange, TraceDirection::In));
        self.publish(interceptor, event.clone())?;
        Ok(Some(event))
    }

    fn trace_exchange_out(
        &self,
        node: &NodeDefinition,
        _target: &dyn Processor,
        interceptor: &TraceInterceptor,
        exchange: &Exchange,
        state: TraceState,
    ) -> Result<()> {
        let event = match state {
            Some(incoming) => TraceEventMessage::out_of(&incoming, exchange),
            None => TraceEventMessage::new(node, exchange, TraceDirection::Out),
        };
        self.publish(interceptor, Arc::new(event))
    }

    fn trace_exchange(
        &self,
        node: &NodeDefinition,
        _target: &dyn Processor,
        interceptor: &TraceInterceptor,
        exchange: &Exchange,
    ) -> Result<()> {
        self.publish(interceptor, Arc::new(TraceEventMessage::new(node, exchange, TraceDirection::Complete)))
    }
}
