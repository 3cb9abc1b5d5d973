use crate::{
    events::ExchangeEvent,
    model::NodeDefinition,
    runtime::{Exchange, Processor},
};

/// Decides whether a breakpoint fires.
///
/// A breakpoint fires when all of its conditions match. Both methods
/// default to `false`, so a condition only implementing
/// [`match_process`](Condition::match_process) never fires on events.
pub trait Condition: Send + Sync {
    fn match_process(
        &self,
        _exchange: &Exchange,
        _processor: &dyn Processor,
        _node: &NodeDefinition,
    ) -> bool {
        false
    }

    fn match_event(
        &self,
        _exchange: &Exchange,
        _event: &ExchangeEvent,
    ) -> bool {
        false
    }
}

/// Matches the node with the given id.
pub struct NodeIdCondition {
    node_id: String,
}

impl NodeIdCondition {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

impl Condition for NodeIdCondition {
    fn match_process(
        &self,
        _exchange: &Exchange,
        _processor: &dyn Processor,
        node: &NodeDefinition,
    ) -> bool {
        node.id() == Some(self.node_id.as_str())
    }
}

/// Matches exchanges that entered through the given route.
pub struct RouteIdCondition {
    route_id: String,
}

impl RouteIdCondition {
    pub fn new(route_id: impl Into<String>) -> Self {
        Self {
            route_id: route_id.into(),
        }
    }

    fn matches(
        &self,
        exchange: &Exchange,
    ) -> bool {
        exchange.from_route_id() == Some(self.route_id.as_str())
    }
}

impl Condition for RouteIdCondition {
    fn match_process(
        &self,
        exchange: &Exchange,
        _processor: &dyn Processor,
        _node: &NodeDefinition,
    ) -> bool {
        self.matches(exchange)
    }

    fn match_event(
        &self,
        exchange: &Exchange,
        _event: &ExchangeEvent,
    ) -> bool {
        self.matches(exchange)
    }
}

/// Matches the node an exception was raised by.
///
/// Enclosing nodes that merely observe the same exception do not match, so
/// an exception breakpoint fires once per failed exchange.
pub struct ExceptionCondition;

impl Condition for ExceptionCondition {
    fn match_process(
        &self,
        exchange: &Exchange,
        _processor: &dyn Processor,
        node: &NodeDefinition,
    ) -> bool {
        exchange.exception().is_some() && node.id().is_some() && exchange.failure_node_id() == node.id()
    }
}

/// Matches events by kind, e.g. `Failed` or `Completed`.
pub struct EventCondition {
    kinds: Vec<String>,
}

impl EventCondition {
    pub fn new(kinds: &[&str]) -> Self {
        Self {
            kinds: kinds.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Condition for EventCondition {
    fn match_event(
        &self,
        _exchange: &Exchange,
        event: &ExchangeEvent,
    ) -> bool {
        self.kinds.iter().any(|k| k == event.str())
    }
}

/// Condition backed by a closure over the exchange and node.
pub struct FnCondition<F> {
    f: F,
}

impl<F> FnCondition<F>
where
    F: Fn(&Exchange, &NodeDefinition) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
        }
    }
}

impl<F> Condition for FnCondition<F>
where
    F: Fn(&Exchange, &NodeDefinition) -> bool + Send + Sync,
{
    fn match_process(
        &self,
        exchange: &Exchange,
        _processor: &dyn Processor,
        node: &NodeDefinition,
    ) -> bool {
        (self.f)(exchange, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RouteError, runtime::processor_fn};

    #[test]
    fn test_exception_condition_matches_origin_only() {
        let processor = processor_fn("noop", |_| Ok(()));
        let origin = NodeDefinition::to("mock:a").with_id("to1");
        let parent = NodeDefinition::to("mock:b").with_id("pipeline1");

        let mut exchange = Exchange::with_body("x");
        assert!(!ExceptionCondition.match_process(&exchange, processor.as_ref(), &origin));

        let _ = exchange.capture("to1", Err(RouteError::Processing("boom".to_string())));
        assert!(ExceptionCondition.match_process(&exchange, processor.as_ref(), &origin));
        assert!(!ExceptionCondition.match_process(&exchange, processor.as_ref(), &parent));
    }

    #[test]
    fn test_event_and_node_conditions() {
        let exchange = Exchange::with_body("x");
        let condition = EventCondition::new(&["Failed"]);
        assert!(condition.match_event(&exchange, &ExchangeEvent::Failed(RouteError::Processing("x".to_string()))));
        assert!(!condition.match_event(&exchange, &ExchangeEvent::Completed));

        let processor = processor_fn("noop", |_| Ok(()));
        let node = NodeDefinition::to("mock:a").with_id("foo");
        assert!(NodeIdCondition::new("foo").match_process(&exchange, processor.as_ref(), &node));
        assert!(!NodeIdCondition::new("bar").match_process(&exchange, processor.as_ref(), &node));
        assert!(!NodeIdCondition::new("foo").match_event(&exchange, &ExchangeEvent::Created));
    }
}
