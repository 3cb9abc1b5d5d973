//! Runtime: exchanges, processors, endpoints, and built routes.

mod channel;
mod context;
pub mod endpoint;
mod exchange;
mod processor;
pub mod processors;
mod reifier;
mod route;
mod template;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::Context;
pub use endpoint::{Component, Consumer, Endpoint, EndpointRegistry, EndpointUri, MockEndpoint, matches_endpoint, normalize_uri};
pub(crate) use endpoint::{DirectComponent, LogComponent, MockComponent, SedaComponent};
pub use exchange::{
    Body, CORRELATION_ID, EXCEPTION_CAUGHT, Exchange, ExchangeId, ExchangePattern, FILTER_MATCHED, INTERCEPTED_ENDPOINT, Message, MessageHistory,
    StreamBody, TRACE_EVENT,
};
pub use processor::{FnProcessor, Processor, ProcessorRef, processor_fn};
pub(crate) use reifier::reify;
pub use route::{OnExceptionClause, Route, RouteProcessor, RouteStatus};
pub use template::ProducerTemplate;
