//! Tracer: records a trace event for every node an exchange passes.
//!
//! The tracer is always woven into routes and checked at runtime, so it can
//! be switched on and off while routes run. Events go to the registered
//! [`TraceHandler`]s; the default handler logs them through `tracing`,
//! keeps them in a bounded backlog and optionally sends them to a
//! destination endpoint.

mod backlog;
mod dispatcher;
mod event;
mod formatter;
mod handler;

use std::{
    str::FromStr,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tracing::Level;

pub use backlog::TraceBacklog;
pub use dispatcher::TraceDispatcher;
pub use event::{NULL_BODY_PLACEHOLDER, STREAM_BODY_PLACEHOLDER, TraceDirection, TraceEventMessage, render_body};
pub use formatter::{DefaultTraceFormatter, TraceFormatter};
pub use handler::{DefaultTraceEventHandler, TraceHandler, TraceState};

use crate::{
    Result, RouteError,
    config::TracerConfig,
    intercept::InterceptStrategy,
    model::{NodeDefinition, Predicate, RouteDefinition},
    runtime::{Exchange, Processor, ProcessorRef, TRACE_EVENT},
};

pub struct Tracer {
    enabled: AtomicBool,
    trace_out_exchanges: AtomicBool,
    trace_exceptions: AtomicBool,
    log_level: RwLock<Level>,
    filter: RwLock<Option<Predicate>>,
    formatter: RwLock<Arc<dyn TraceFormatter>>,
    handlers: RwLock<Vec<Arc<dyn TraceHandler>>>,
    backlog: TraceBacklog,
    destination: RwLock<Option<Arc<TraceDispatcher>>>,
}

impl Tracer {
    pub fn new(config: &TracerConfig) -> Result<Self> {
        let log_level = Level::from_str(&config.log_level).map_err(|_| RouteError::Config(format!("invalid tracer log level: {}", config.log_level)))?;
        Ok(Self {
            enabled: AtomicBool::new(config.enabled),
            trace_out_exchanges: AtomicBool::new(config.trace_out_exchanges),
            trace_exceptions: AtomicBool::new(config.trace_exceptions),
            log_level: RwLock::new(log_level),
            filter: RwLock::new(None),
            formatter: RwLock::new(Arc::new(config.formatter.clone())),
            handlers: RwLock::new(vec![Arc::new(DefaultTraceEventHandler)]),
            backlog: TraceBacklog::new(config.backlog_size),
            destination: RwLock::new(None),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(
        &self,
        enabled: bool,
    ) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_trace_out_exchanges(&self) -> bool {
        self.trace_out_exchanges.load(Ordering::Relaxed)
    }

    /// Trace an in/out pair per node instead of one completion event.
    pub fn set_trace_out_exchanges(
        &self,
        enabled: bool,
    ) {
        self.trace_out_exchanges.store(enabled, Ordering::Relaxed);
    }

    pub fn is_trace_exceptions(&self) -> bool {
        self.trace_exceptions.load(Ordering::Relaxed)
    }

    /// When off, nodes that failed are not traced after processing.
    pub fn set_trace_exceptions(
        &self,
        enabled: bool,
    ) {
        self.trace_exceptions.store(enabled, Ordering::Relaxed);
    }

    pub fn log_level(&self) -> Level {
        *self.log_level.read().unwrap()
    }

    pub fn set_log_level(
        &self,
        level: Level,
    ) {
        *self.log_level.write().unwrap() = level;
    }

    /// Only trace exchanges matching the predicate.
    pub fn set_filter(
        &self,
        filter: Option<Predicate>,
    ) {
        *self.filter.write().unwrap() = filter;
    }

    pub fn formatter(&self) -> Arc<dyn TraceFormatter> {
        self.formatter.read().unwrap().clone()
    }

    pub fn set_formatter(
        &self,
        formatter: Arc<dyn TraceFormatter>,
    ) {
        *self.formatter.write().unwrap() = formatter;
    }

    pub fn handlers(&self) -> Vec<Arc<dyn TraceHandler>> {
        self.handlers.read().unwrap().clone()
    }

    pub fn add_trace_handler(
        &self,
        handler: Arc<dyn TraceHandler>,
    ) {
        self.handlers.write().unwrap().push(handler);
    }

    /// Replace all handlers, including the default one, with `handler`.
    pub fn set_trace_handler(
        &self,
        handler: Arc<dyn TraceHandler>,
    ) {
        *self.handlers.write().unwrap() = vec![handler];
    }

    pub fn backlog(&self) -> &TraceBacklog {
        &self.backlog
    }

    pub fn destination_uri(&self) -> Option<String> {
        self.destination.read().unwrap().as_ref().map(|d| d.uri().to_string())
    }

    pub fn set_destination(
        &self,
        dispatcher: Option<TraceDispatcher>,
    ) {
        *self.destination.write().unwrap() = dispatcher.map(Arc::new);
    }

    /// Queue an event to the destination endpoint, if any.
    pub fn dispatch(
        &self,
        event: &TraceEventMessage,
    ) -> Result<()> {
        let destination = self.destination.read().unwrap().clone();
        match destination {
            Some(dispatcher) => dispatcher.dispatch(event),
            None => Ok(()),
        }
    }

    fn should_trace(
        &self,
        exchange: &Exchange,
    ) -> Result<bool> {
        if !self.is_enabled() || exchange.property(TRACE_EVENT).is_some() {
            return Ok(false);
        }
        let filter = self.filter.read().unwrap().clone();
        match filter {
            Some(predicate) => predicate.matches(exchange),
            None => Ok(true),
        }
    }
}

/// Weaves a [`TraceInterceptor`] around every node.
pub struct TracerStrategy {
    tracer: Arc<Tracer>,
}

impl TracerStrategy {
    pub fn new(tracer: Arc<Tracer>) -> Self {
        Self {
            tracer,
        }
    }
}

impl InterceptStrategy for TracerStrategy {
    fn wrap(
        &self,
        _route: &RouteDefinition,
        node: &NodeDefinition,
        target: ProcessorRef,
    ) -> Result<ProcessorRef> {
        Ok(Arc::new(TraceInterceptor {
            tracer: self.tracer.clone(),
            node: node.clone(),
            target,
        }))
    }
}

pub struct TraceInterceptor {
    tracer: Arc<Tracer>,
    node: NodeDefinition,
    target: ProcessorRef,
}

impl TraceInterceptor {
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn node(&self) -> &NodeDefinition {
        &self.node
    }

    async fn trace_in_out(
        &self,
        exchange: &mut Exchange,
        handlers: &[Arc<dyn TraceHandler>],
    ) -> Result<()> {
        let mut states = Vec::with_capacity(handlers.len());
        for handler in handlers {
            states.push(handler.trace_exchange_in(&self.node, self.target.as_ref(), self, exchange)?);
        }

        let result = self.target.process(exchange).await;
        let result = exchange.capture(self.node.id().unwrap_or_default(), result);
        if result.is_err() && !self.tracer.is_trace_exceptions() {
            return result;
        }

        let mut traced = Ok(());
        for (handler, state) in handlers.iter().zip(states) {
            traced = traced.and(handler.trace_exchange_out(&self.node, self.target.as_ref(), self, exchange, state));
        }
        result.and(traced)
    }

    async fn trace_complete(
        &self,
        exchange: &mut Exchange,
        handlers: &[Arc<dyn TraceHandler>],
    ) -> Result<()> {
        let result = self.target.process(exchange).await;
        let result = exchange.capture(self.node.id().unwrap_or_default(), result);
        if result.is_err() && !self.tracer.is_trace_exceptions() {
            return result;
        }

        let mut traced = Ok(());
        for handler in handlers {
            traced = traced.and(handler.trace_exchange(&self.node, self.target.as_ref(), self, exchange));
        }
        result.and(traced)
    }
}

#[async_trait]
impl Processor for TraceInterceptor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        if !self.tracer.should_trace(exchange)? {
            return self.target.process(exchange).await;
        }

        let handlers = self.tracer.handlers();
        if self.tracer.is_trace_out_exchanges() {
            self.trace_in_out(exchange, &handlers).await
        } else {
            self.trace_complete(exchange, &handlers).await
        }
    }

    fn describe(&self) -> String {
        self.target.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RouteError, runtime::processor_fn};

    fn tracer(trace_out: bool) -> Arc<Tracer> {
        let config = TracerConfig {
            enabled: true,
            trace_out_exchanges: trace_out,
            ..Default::default()
        };
        Arc::new(Tracer::new(&config).unwrap())
    }

    fn interceptor(
        tracer: &Arc<Tracer>,
        node_id: &str,
        target: ProcessorRef,
    ) -> ProcessorRef {
        let route = RouteDefinition::from_uri("direct:start");
        TracerStrategy::new(tracer.clone()).wrap(&route, &NodeDefinition::to("mock:a").with_id(node_id), target).unwrap()
    }

    #[tokio::test]
    async fn test_complete_mode_traces_once() {
        let tracer = tracer(false);
        let p = interceptor(&tracer, "to1", processor_fn("noop", |_| Ok(())));
        p.process(&mut Exchange::with_body("x")).await.unwrap();

        let events = tracer.backlog().dump_all();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, TraceDirection::Complete);
    }

    #[tokio::test]
    async fn test_in_out_mode_traces_pair() {
        let tracer = tracer(true);
        let p = interceptor(
            &tracer,
            "to1",
            processor_fn("upper", |ex| {
                ex.set_body("OUT");
                Ok(())
            }),
        );
        p.process(&mut Exchange::with_body("in")).await.unwrap();

        let events = tracer.backlog().dump_traced_messages("to1");
        let directions: Vec<TraceDirection> = events.iter().map(|e| e.direction).collect();
        assert_eq!(directions, vec![TraceDirection::In, TraceDirection::Out]);
        assert_eq!(events[1].out_body.as_deref(), Some("OUT"));
    }

    #[tokio::test]
    async fn test_disabled_filtered_and_trace_events_are_skipped() {
        let tracer = tracer(false);
        let p = interceptor(&tracer, "to1", processor_fn("noop", |_| Ok(())));

        let mut own = Exchange::with_body("x");
        own.set_property(TRACE_EVENT, true);
        p.process(&mut own).await.unwrap();

        tracer.set_filter(Some(Predicate::body_contains("trace me")));
        p.process(&mut Exchange::with_body("x")).await.unwrap();
        p.process(&mut Exchange::with_body("trace me")).await.unwrap();

        tracer.set_enabled(false);
        p.process(&mut Exchange::with_body("trace me")).await.unwrap();
        assert_eq!(tracer.backlog().dump_all().len(), 1);
    }

    #[tokio::test]
    async fn test_exception_is_traced_and_propagated() {
        let tracer = tracer(false);
        let p = interceptor(&tracer, "to1", processor_fn("boom", |_| Err(RouteError::Processing("boom".to_string()))));

        let mut exchange = Exchange::with_body("x");
        assert!(p.process(&mut exchange).await.is_err());
        assert_eq!(exchange.failure_node_id(), Some("to1"));
        assert_eq!(tracer.backlog().dump_all()[0].caught_exception.as_deref(), Some("boom"));

        tracer.set_trace_exceptions(false);
        tracer.backlog().clear();
        assert!(p.process(&mut Exchange::with_body("x")).await.is_err());
        assert!(tracer.backlog().dump_all().is_empty());
    }
}
