//! Fluent builders for route definitions.
//!
//! ```rust,ignore
//! use routeweave::{Predicate, RouteBuilder, StepsDsl};
//!
//! let route = RouteBuilder::from("direct:start")
//!     .route_id("orders")
//!     .to("mock:foo")
//!     .id("foo")
//!     .choice(|c| {
//!         c.when(Predicate::header_equals("vip", true), |s| s.to("mock:vip"))
//!             .otherwise(|s| s.to("mock:standard"))
//!     })
//!     .multicast(|m| m.to("mock:a").to("mock:b"))
//!     .build();
//! ```

use super::{Expression, NodeDefinition, NodeKind, Predicate, RouteDefinition};

/// Steps shared by route builders and nested step builders.
pub trait StepsDsl: Sized {
    fn nodes_mut(&mut self) -> &mut Vec<NodeDefinition>;

    /// Append a node.
    fn node(
        mut self,
        node: NodeDefinition,
    ) -> Self {
        self.nodes_mut().push(node);
        self
    }

    /// Set the id of the last added node.
    fn id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        match self.nodes_mut().last_mut() {
            Some(node) => node.set_id(id),
            None => tracing::warn!("id() called before any node was added"),
        }
        self
    }

    fn to(
        self,
        uri: impl Into<String>,
    ) -> Self {
        self.node(NodeDefinition::to(uri))
    }

    fn wire_tap(
        self,
        uri: impl Into<String>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::WireTap {
            uri: uri.into(),
        }))
    }

    fn choice(
        self,
        f: impl FnOnce(ChoiceBuilder) -> ChoiceBuilder,
    ) -> Self {
        let choice = f(ChoiceBuilder::default());
        self.node(NodeDefinition::new(NodeKind::Choice).with_children(choice.clauses))
    }

    fn multicast(
        self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::Multicast).with_children(f(StepsBuilder::new()).into_nodes()))
    }

    fn filter(
        self,
        predicate: Predicate,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Self {
        self.node(
            NodeDefinition::new(NodeKind::Filter {
                predicate,
            })
            .with_children(f(StepsBuilder::new()).into_nodes()),
        )
    }

    fn pipeline(
        self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::Pipeline).with_children(f(StepsBuilder::new()).into_nodes()))
    }

    fn transform(
        self,
        expression: impl Into<Expression>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::Transform {
            expression: expression.into(),
        }))
    }

    fn set_body(
        self,
        expression: impl Into<Expression>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::SetBody {
            expression: expression.into(),
        }))
    }

    fn set_header(
        self,
        name: impl Into<String>,
        expression: impl Into<Expression>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::SetHeader {
            name: name.into(),
            expression: expression.into(),
        }))
    }

    fn remove_header(
        self,
        name: impl Into<String>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::RemoveHeader {
            name: name.into(),
        }))
    }

    fn set_property(
        self,
        name: impl Into<String>,
        expression: impl Into<Expression>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::SetProperty {
            name: name.into(),
            expression: expression.into(),
        }))
    }

    fn log(
        self,
        message: impl Into<String>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::Log {
            message: message.into(),
        }))
    }

    /// Call a processor bound on the engine under `reference`.
    fn process(
        self,
        reference: impl Into<String>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::Process {
            reference: reference.into(),
        }))
    }

    fn delay(
        self,
        millis: u64,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::Delay {
            millis,
        }))
    }

    fn throw_exception(
        self,
        ecode: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.node(NodeDefinition::new(NodeKind::ThrowException {
            ecode: ecode.into(),
            message: message.into(),
        }))
    }

    fn stop(self) -> Self {
        self.node(NodeDefinition::new(NodeKind::Stop))
    }

    /// Route scoped exception clause. `exceptions` match error codes or
    /// variant names, or a substring of the error message.
    fn on_exception(
        self,
        exceptions: &[&str],
        handled: bool,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Self {
        self.node(
            NodeDefinition::new(NodeKind::OnException {
                exceptions: exceptions.iter().map(|e| e.to_string()).collect(),
                handled,
            })
            .with_children(f(StepsBuilder::new()).into_nodes()),
        )
    }
}

/// Builder for a nested sequence of steps.
#[derive(Debug, Default, Clone)]
pub struct StepsBuilder {
    nodes: Vec<NodeDefinition>,
}

impl StepsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_nodes(self) -> Vec<NodeDefinition> {
        self.nodes
    }
}

impl StepsDsl for StepsBuilder {
    fn nodes_mut(&mut self) -> &mut Vec<NodeDefinition> {
        &mut self.nodes
    }
}

/// Builder for the `when` / `otherwise` clauses of a choice.
#[derive(Debug, Default)]
pub struct ChoiceBuilder {
    clauses: Vec<NodeDefinition>,
}

impl ChoiceBuilder {
    pub fn when(
        mut self,
        predicate: Predicate,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Self {
        self.clauses.push(
            NodeDefinition::new(NodeKind::When {
                predicate,
            })
            .with_children(f(StepsBuilder::new()).into_nodes()),
        );
        self
    }

    pub fn otherwise(
        mut self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Self {
        self.clauses.push(NodeDefinition::new(NodeKind::Otherwise).with_children(f(StepsBuilder::new()).into_nodes()));
        self
    }

    /// Set the id of the last clause.
    pub fn id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        if let Some(clause) = self.clauses.last_mut() {
            clause.set_id(id);
        }
        self
    }
}

/// Builder for a whole route.
#[derive(Debug, Default, Clone)]
pub struct RouteBuilder {
    route: RouteDefinition,
}

impl RouteBuilder {
    /// A route without input. Building it succeeds, adding it to an
    /// engine fails.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(uri: impl Into<String>) -> Self {
        Self {
            route: RouteDefinition::from_uri(uri),
        }
    }

    pub fn route_id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        self.route.set_id(id);
        self
    }

    /// Cache stream bodies from this point of the route onwards. Nodes
    /// added before the call see the original stream.
    pub fn stream_caching(mut self) -> Self {
        let at = self.route.outputs().len();
        self.route.enable_stream_caching_from(at);
        self
    }

    pub fn build(self) -> RouteDefinition {
        self.route
    }
}

impl StepsDsl for RouteBuilder {
    fn nodes_mut(&mut self) -> &mut Vec<NodeDefinition> {
        self.route.outputs_mut()
    }
}

impl From<RouteBuilder> for RouteDefinition {
    fn from(builder: RouteBuilder) -> Self {
        builder.build()
    }
}
