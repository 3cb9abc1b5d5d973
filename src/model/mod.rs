//! Route definition model: the node tree built from the DSL or JSON.

mod dsl;
mod expression;
mod id;
mod node;
mod route;

pub use dsl::{ChoiceBuilder, RouteBuilder, StepsBuilder, StepsDsl};
pub use expression::{Expression, Predicate, resolve_simple};
pub(crate) use expression::value_text;
pub use id::NodeIdFactory;
pub use node::{NodeDefinition, NodeKind};
pub use route::{FromDefinition, InterceptSendToEndpointDefinition, MockEndpointsDefinition, RouteDefinition};
