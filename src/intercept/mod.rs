//! Cross-cutting decorators woven around every node's processor.
//!
//! When a route is built each executable node's processor is wrapped,
//! from the inside out, by:
//! 1. the registered [`InterceptStrategy`]s in registration order (the
//!    first registered is innermost),
//! 2. the message history recorder,
//! 3. stream caching, when enabled globally or for the part of the route
//!    after the point it was enabled.

mod history;
mod stream_cache;

pub use history::MessageHistoryProcessor;
pub use stream_cache::{StreamCacheProcessor, StreamCachingStrategy};

use crate::{
    Result,
    model::{NodeDefinition, RouteDefinition},
    runtime::ProcessorRef,
};

/// Decides whether and how to decorate a node's processor.
///
/// A decorator owns its target and must always invoke it unless its own
/// contract is to skip it. Errors of the target are recorded on the
/// exchange with [`Exchange::capture`](crate::runtime::Exchange::capture)
/// and propagated after the decorator's after-logic ran.
pub trait InterceptStrategy: Send + Sync {
    fn wrap(
        &self,
        route: &RouteDefinition,
        node: &NodeDefinition,
        target: ProcessorRef,
    ) -> Result<ProcessorRef>;
}

impl<F> InterceptStrategy for F
where
    F: Fn(&RouteDefinition, &NodeDefinition, ProcessorRef) -> Result<ProcessorRef> + Send + Sync,
{
    fn wrap(
        &self,
        route: &RouteDefinition,
        node: &NodeDefinition,
        target: ProcessorRef,
    ) -> Result<ProcessorRef> {
        (self)(route, node, target)
    }
}
