use std::time::Duration;

use crate::{
    Result,
    events::ExchangeEvent,
    model::NodeDefinition,
    runtime::{Exchange, Processor},
};

/// Callbacks fired synchronously on the task processing the exchange.
///
/// An error returned by a callback interrupts the exchange like a failing
/// processor.
pub trait Breakpoint: Send + Sync {
    fn before_process(
        &self,
        _exchange: &mut Exchange,
        _processor: &dyn Processor,
        _node: &NodeDefinition,
    ) -> Result<()> {
        Ok(())
    }

    fn after_process(
        &self,
        _exchange: &mut Exchange,
        _processor: &dyn Processor,
        _node: &NodeDefinition,
        _elapsed: Duration,
    ) -> Result<()> {
        Ok(())
    }

    fn on_event(
        &self,
        _exchange: &mut Exchange,
        _event: &ExchangeEvent,
    ) -> Result<()> {
        Ok(())
    }
}

type ProcessCallback = Box<dyn Fn(&mut Exchange, &NodeDefinition) -> Result<()> + Send + Sync>;
type AfterCallback = Box<dyn Fn(&mut Exchange, &NodeDefinition, Duration) -> Result<()> + Send + Sync>;
type EventCallback = Box<dyn Fn(&mut Exchange, &ExchangeEvent) -> Result<()> + Send + Sync>;

/// Breakpoint assembled from closures.
///
/// ```rust,ignore
/// let bp = BreakpointSupport::new().on_after(|exchange, node, _| {
///     tracing::info!("{} after {}", exchange.id(), node.label());
///     Ok(())
/// });
/// ```
#[derive(Default)]
pub struct BreakpointSupport {
    before: Option<ProcessCallback>,
    after: Option<AfterCallback>,
    event: Option<EventCallback>,
}

impl BreakpointSupport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(&mut Exchange, &NodeDefinition) -> Result<()> + Send + Sync + 'static,
    {
        self.before = Some(Box::new(f));
        self
    }

    pub fn on_after<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(&mut Exchange, &NodeDefinition, Duration) -> Result<()> + Send + Sync + 'static,
    {
        self.after = Some(Box::new(f));
        self
    }

    pub fn on_event<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(&mut Exchange, &ExchangeEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.event = Some(Box::new(f));
        self
    }
}

impl Breakpoint for BreakpointSupport {
    fn before_process(
        &self,
        exchange: &mut Exchange,
        _processor: &dyn Processor,
        node: &NodeDefinition,
    ) -> Result<()> {
        match &self.before {
            Some(f) => f(exchange, node),
            None => Ok(()),
        }
    }

    fn after_process(
        &self,
        exchange: &mut Exchange,
        _processor: &dyn Processor,
        node: &NodeDefinition,
        elapsed: Duration,
    ) -> Result<()> {
        match &self.after {
            Some(f) => f(exchange, node, elapsed),
            None => Ok(()),
        }
    }

    fn on_event(
        &self,
        exchange: &mut Exchange,
        event: &ExchangeEvent,
    ) -> Result<()> {
        match &self.event {
            Some(f) => f(exchange, event),
            None => Ok(()),
        }
    }
}
