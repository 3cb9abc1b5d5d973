//! Turns a route definition into a runnable route.
//!
//! Each executable node becomes a processor wrapped by the intercept
//! strategies, the message history recorder and stream caching. Endpoints
//! are resolved while building, so an unknown uri fails the build with
//! `FailedToCreateRoute`.

use std::sync::Arc;

use crate::{
    Result, RouteError,
    intercept::{InterceptStrategy, MessageHistoryProcessor},
    model::{NodeDefinition, NodeKind, RouteDefinition},
    runtime::{
        Context, Endpoint, EndpointUri, ProcessorRef, Route, matches_endpoint,
        processors::{
            BeanProcessor, ChoiceProcessor, DelayProcessor, FilterProcessor, InterceptSendProcessor, LogProcessor, MockSendProcessor, MulticastProcessor,
            Pipeline, RemoveHeaderProcessor, SendProcessor, SetBodyProcessor, SetHeaderProcessor, SetPropertyProcessor, StopProcessor,
            ThrowExceptionProcessor, WireTapProcessor,
        },
        route::{OnExceptionClause, RouteProcessor},
    },
};

/// Build the runtime route of a definition whose ids are assigned.
pub(crate) fn reify(
    context: &Context,
    definition: &RouteDefinition,
) -> Result<Route> {
    let route_id = definition.route_id().to_string();
    let mut reifier = Reifier::new(context, definition);
    reifier.build().map_err(|e| {
        reifier.release_created();
        e.into_route_failure(&route_id)
    })
}

struct Reifier<'a> {
    context: &'a Context,
    route: &'a RouteDefinition,
    strategies: Vec<Arc<dyn InterceptStrategy>>,
    endpoint_uris: Vec<String>,
    /// Endpoints this build created, removed again when it fails.
    created: Vec<String>,
    /// Index of the top-level output being built.
    position: usize,
}

impl<'a> Reifier<'a> {
    fn new(
        context: &'a Context,
        route: &'a RouteDefinition,
    ) -> Self {
        Self {
            context,
            route,
            strategies: context.intercept_strategies(),
            endpoint_uris: Vec::new(),
            created: Vec::new(),
            position: 0,
        }
    }

    fn build(&mut self) -> Result<Route> {
        let route = self.route;
        route.validate()?;
        let from_uri = route.input_uri().unwrap_or_default().to_string();
        let endpoint = self.resolve(&from_uri)?;
        self.record(&from_uri);

        let mut steps = Vec::new();
        let mut clauses = Vec::new();
        for (position, node) in route.outputs().iter().enumerate() {
            self.position = position;
            match node.kind() {
                NodeKind::OnException {
                    exceptions,
                    handled,
                } => {
                    let processor = self.pipeline(node.children())?;
                    clauses.push(OnExceptionClause::new(exceptions.clone(), *handled, processor));
                }
                _ => steps.push(self.wrapped(node)?),
            }
        }

        let processor = Arc::new(RouteProcessor::new(
            self.route.route_id(),
            &from_uri,
            Arc::new(Pipeline::new(steps)),
            clauses,
            self.context.clone(),
        ));
        tracing::debug!(route_id = %self.route.route_id(), "route built: {}", self.route);
        Ok(Route::new(self.route.clone(), endpoint, processor, std::mem::take(&mut self.endpoint_uris)))
    }

    fn resolve(
        &mut self,
        uri: &str,
    ) -> Result<Arc<dyn Endpoint>> {
        let endpoints = self.context.endpoints();
        let existed = endpoints.has_endpoint(uri);
        let endpoint = endpoints.resolve(uri)?;
        if !existed {
            self.created.push(uri.to_string());
        }
        Ok(endpoint)
    }

    fn release_created(&mut self) {
        let endpoints = self.context.endpoints();
        for uri in self.created.drain(..) {
            if endpoints.remove(&uri).is_some() {
                tracing::debug!(uri = %uri, "endpoint of failed route removed");
            }
        }
    }

    fn record(
        &mut self,
        uri: &str,
    ) {
        let uri = uri.to_string();
        if !self.endpoint_uris.contains(&uri) {
            self.endpoint_uris.push(uri);
        }
    }

    fn pipeline(
        &mut self,
        nodes: &[NodeDefinition],
    ) -> Result<ProcessorRef> {
        let processors = nodes.iter().map(|n| self.wrapped(n)).collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(Pipeline::new(processors)))
    }

    /// The node's processor with all decorators applied.
    fn wrapped(
        &mut self,
        node: &NodeDefinition,
    ) -> Result<ProcessorRef> {
        let mut processor = self.create_processor(node)?;
        for strategy in &self.strategies {
            processor = strategy.wrap(self.route, node, processor)?;
        }

        let node_id = node.id().unwrap_or_default();
        processor = Arc::new(MessageHistoryProcessor::new(
            self.route.route_id(),
            node_id,
            &node.label(),
            self.context.config().message_history,
            processor,
        ));
        Ok(self.context.stream_caching().wrap(self.route, self.position, processor))
    }

    fn create_processor(
        &mut self,
        node: &NodeDefinition,
    ) -> Result<ProcessorRef> {
        let processor: ProcessorRef = match node.kind() {
            NodeKind::To {
                uri,
            } => self.send_to(uri)?,
            NodeKind::WireTap {
                uri,
            } => {
                let producer = self.send_to(uri)?;
                Arc::new(WireTapProcessor::new(uri, producer, self.context.runtime().clone()))
            }
            NodeKind::Choice => {
                let mut clauses = Vec::new();
                let mut otherwise = None;
                for child in node.children() {
                    match child.kind() {
                        NodeKind::When {
                            predicate,
                        } => clauses.push((predicate.clone(), self.pipeline(child.children())?)),
                        NodeKind::Otherwise => otherwise = Some(self.pipeline(child.children())?),
                        _ => return Err(RouteError::IllegalArgument(format!("{} is not allowed inside choice", child))),
                    }
                }
                Arc::new(ChoiceProcessor::new(clauses, otherwise))
            }
            NodeKind::When {
                ..
            }
            | NodeKind::Otherwise => return Err(RouteError::IllegalArgument(format!("{} must be inside a choice", node))),
            NodeKind::OnException {
                ..
            } => return Err(RouteError::IllegalArgument(format!("{} must be defined at route level", node))),
            NodeKind::Multicast => {
                let processors = node.children().iter().map(|c| self.wrapped(c)).collect::<Result<Vec<_>>>()?;
                Arc::new(MulticastProcessor::new(processors))
            }
            NodeKind::Filter {
                predicate,
            } => Arc::new(FilterProcessor::new(predicate.clone(), self.pipeline(node.children())?)),
            NodeKind::Pipeline => self.pipeline(node.children())?,
            NodeKind::Transform {
                expression,
            }
            | NodeKind::SetBody {
                expression,
            } => Arc::new(SetBodyProcessor::new(expression.clone())),
            NodeKind::SetHeader {
                name,
                expression,
            } => Arc::new(SetHeaderProcessor::new(name.clone(), expression.clone())),
            NodeKind::RemoveHeader {
                name,
            } => Arc::new(RemoveHeaderProcessor::new(name.clone())),
            NodeKind::SetProperty {
                name,
                expression,
            } => Arc::new(SetPropertyProcessor::new(name.clone(), expression.clone())),
            NodeKind::Log {
                message,
            } => Arc::new(LogProcessor::new(node.id().unwrap_or_default().to_string(), message.clone(), self.context.clone())),
            NodeKind::Process {
                reference,
            } => Arc::new(BeanProcessor::new(reference.clone(), self.context.lookup(reference)?)),
            NodeKind::Delay {
                millis,
            } => Arc::new(DelayProcessor::new(*millis)),
            NodeKind::ThrowException {
                ecode,
                message,
            } => Arc::new(ThrowExceptionProcessor::new(ecode.clone(), message.clone())),
            NodeKind::Stop => Arc::new(StopProcessor),
        };
        Ok(processor)
    }

    /// A plain send, without mocking or interception.
    fn plain_send(
        &mut self,
        uri: &str,
    ) -> Result<ProcessorRef> {
        let producer = self.resolve(uri)?.create_producer()?;
        self.record(uri);
        Ok(Arc::new(SendProcessor::new(uri, self.route.route_id(), producer, self.context.clone())))
    }

    /// A send with the route's endpoint mocking and interception applied.
    fn send_to(
        &mut self,
        uri: &str,
    ) -> Result<ProcessorRef> {
        let route = self.route;
        let mut processor = self.plain_send(uri)?;

        if !uri.starts_with("mock:")
            && let Some(mock) = route.mock_endpoints().iter().find(|m| matches_endpoint(uri, &m.pattern))
        {
            let parsed = EndpointUri::parse(uri)?;
            let mock_uri = format!("mock:{}:{}", parsed.scheme(), parsed.path());
            let mock_send = self.plain_send(&mock_uri)?;
            tracing::debug!(route_id = %route.route_id(), "adviced endpoint [{}] with mock endpoint [{}]", uri, mock_uri);
            processor = Arc::new(MockSendProcessor::new(mock_send, mock.skip, processor));
        }

        for intercept in route.intercept_send_to_endpoints() {
            if !matches_endpoint(uri, &intercept.uri) {
                continue;
            }
            let steps = if intercept.outputs.is_empty() {
                None
            } else {
                Some(self.pipeline(&intercept.outputs)?)
            };
            let after = match &intercept.after_uri {
                Some(after_uri) => Some(self.plain_send(after_uri)?),
                None => None,
            };
            processor = Arc::new(InterceptSendProcessor::new(
                uri,
                intercept.when.clone(),
                intercept.skip_send_to_original_endpoint,
                steps,
                processor,
                after,
            ));
        }
        Ok(processor)
    }
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Handle;

    use super::*;
    use crate::{Config, model::Predicate};

    fn route(outputs: Vec<NodeDefinition>) -> RouteDefinition {
        let mut route = RouteDefinition::from_uri("direct:start");
        route.outputs_mut().extend(outputs);
        route
    }

    #[tokio::test]
    async fn test_unknown_scheme_fails_route() {
        let context = Context::new(Config::default(), Handle::current());
        let mut definition = route(vec![NodeDefinition::to("invalid:scheme")]);
        context.id_factory().assign_route(&mut definition);

        let err = reify(&context, &definition).err().unwrap();
        assert!(matches!(err, RouteError::FailedToCreateRoute { .. }));
        assert!(matches!(err.cause(), Some(RouteError::ResolveEndpointFailed { .. })));
    }

    #[tokio::test]
    async fn test_missing_bean_fails_route() {
        let context = Context::new(Config::default(), Handle::current());
        let mut definition = route(vec![NodeDefinition::new(NodeKind::Process {
            reference: "nope".to_string(),
        })]);
        context.id_factory().assign_route(&mut definition);

        let err = reify(&context, &definition).err().unwrap();
        assert!(matches!(err.cause(), Some(RouteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_when_outside_choice_is_rejected() {
        let context = Context::new(Config::default(), Handle::current());
        let mut definition = route(vec![NodeDefinition::new(NodeKind::When {
            predicate: Predicate::Constant(true),
        })]);
        context.id_factory().assign_route(&mut definition);

        let err = reify(&context, &definition).err().unwrap();
        assert!(matches!(err.cause(), Some(RouteError::IllegalArgument(_))));
    }

    #[tokio::test]
    async fn test_failed_build_removes_created_endpoints() {
        let context = Context::new(Config::default(), Handle::current());
        context.endpoints().resolve("mock:shared").unwrap();
        let mut definition = route(vec![NodeDefinition::to("mock:shared"), NodeDefinition::to("mock:leak"), NodeDefinition::to("invalid:x")]);
        context.id_factory().assign_route(&mut definition);

        assert!(reify(&context, &definition).is_err());
        assert!(!context.endpoints().has_endpoint("mock:leak"));
        assert!(!context.endpoints().has_endpoint("direct:start"));
        assert!(context.endpoints().has_endpoint("mock:shared"));
    }

    #[tokio::test]
    async fn test_endpoint_uris_are_recorded() {
        let context = Context::new(Config::default(), Handle::current());
        let mut definition = route(vec![NodeDefinition::to("mock:a"), NodeDefinition::to("mock:b"), NodeDefinition::to("mock:a")]);
        context.id_factory().assign_route(&mut definition);

        let built = reify(&context, &definition).unwrap();
        assert_eq!(built.endpoint_uris(), &["direct:start", "mock:a", "mock:b"]);
    }
}
