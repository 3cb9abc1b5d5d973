//! # Routeweave
//!
//! Routeweave is a route interception and advice-with engine written in Rust.
//! Routes are trees of processing nodes; they can be rewritten before they
//! start, and cross-cutting behaviour is woven around every node without
//! touching the route definition.
//!
//! ## Core Features
//!
//! - **Advice-with**: weave by id, endpoint uri, to-string pattern or type; insert before/after, replace, remove, replace the route input
//! - **Interceptors**: intercept strategies wrap every node's processor, in registration order
//! - **Debugger**: breakpoints with conditions, single stepping, suspend and resume
//! - **Tracer**: per-node trace events, pluggable formatting and handlers, a bounded backlog and a destination endpoint
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use routeweave::{EngineBuilder, RouteBuilder, StepsDsl};
//!
//! let engine = EngineBuilder::new().tracing(true).build()?;
//! engine.add_route(RouteBuilder::from("direct:start").route_id("r1").to("mock:foo").to("mock:bar").to("mock:result"))?;
//!
//! engine.advice_with("r1", |a| {
//!     a.weave_by_to_string(".*bar.*").replace(|s| s.multicast(|m| m.to("mock:a").to("mock:b")))
//! })?;
//! engine.start()?;
//! engine.producer_template().send_body("direct:start", "Hello World").await?;
//! ```

pub mod advice;
mod builder;
mod common;
mod config;
pub mod debugger;
mod engine;
mod error;
pub mod events;
pub mod intercept;
mod model;
pub mod runtime;
pub mod tracer;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use config::{Config, DebuggerConfig, MockConfig, TracerConfig};
pub use engine::{Engine, RouteStats};
pub use error::RouteError;
pub use model::*;
pub use runtime::{Body, ChannelEvent, ChannelOptions, Exchange, ExchangePattern, MockEndpoint, Processor, ProcessorRef, ProducerTemplate, RouteStatus, processor_fn};

/// Result type alias for Routeweave operations.
pub type Result<T> = std::result::Result<T, RouteError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
