//! Route engine - the main entry point for Routeweave.
//!
//! The engine owns the routes and their lifecycle:
//! - adding route definitions and assigning their ids
//! - advising routes before they (re)start
//! - building routes with the tracer, debugger and custom intercept strategies woven in
//! - starting, stopping and removing routes, and graceful shutdown

mod monitor;

use std::sync::{
    Arc, RwLock,
    atomic::{AtomicBool, Ordering},
};

use tokio::runtime::{Builder, Handle, Runtime};

use crate::{
    Config, Result, RouteError, ShareLock,
    advice::AdviceWithRoute,
    common::Shutdown,
    debugger::{Debugger, DebuggerStrategy},
    intercept::InterceptStrategy,
    model::RouteDefinition,
    runtime::{Channel, Component, Context, Endpoint, MockEndpoint, ProcessorRef, ProducerTemplate, Route, RouteStatus, processor_fn, reify},
    tracer::{TraceDispatcher, Tracer, TracerStrategy},
};

pub use monitor::RouteStats;
use monitor::Monitor;

/// A route definition and, once built, its runtime route.
struct RouteEntry {
    definition: RouteDefinition,
    route: Option<Arc<Route>>,
}

/// The route engine.
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().build()?;
/// engine.add_route(RouteBuilder::from("direct:start").route_id("r1").to("mock:foo").to("mock:bar"))?;
///
/// engine.advice_with("r1", |a| {
///     a.weave_by_to_uri("mock:bar").replace(|s| s.to("mock:baz"))?;
///     Ok(())
/// })?;
/// engine.start()?;
///
/// engine.producer_template().send_body("direct:start", "Hello World").await?;
/// engine.mock_endpoint("mock:baz")?.assert_is_satisfied().await?;
/// engine.shutdown();
/// ```
pub struct Engine {
    context: Context,
    routes: ShareLock<Vec<RouteEntry>>,
    /// Background monitor aggregating route statistics.
    monitor: Monitor,
    tracer: Arc<Tracer>,

    running: Arc<AtomicBool>,
    /// Set once the monitor and channel tasks are spawned.
    listening: AtomicBool,
    shutdown: Arc<Shutdown>,
    /// Runtime owned by the engine when it was not given one and was
    /// created outside of tokio.
    _runtime: Option<Arc<Runtime>>,
}

impl Engine {
    /// Creates an engine from a configuration.
    ///
    /// Uses the current tokio runtime when called inside one, otherwise
    /// starts a runtime with the configured worker threads.
    pub fn new_with_config(config: Config) -> Result<Self> {
        Self::new(config, None, Vec::new())
    }

    pub(crate) fn new(
        config: Config,
        runtime: Option<Arc<Runtime>>,
        strategies: Vec<Arc<dyn InterceptStrategy>>,
    ) -> Result<Self> {
        let (handle, owned) = match runtime {
            Some(runtime) => (runtime.handle().clone(), Some(runtime)),
            None => match Handle::try_current() {
                Ok(handle) => (handle, None),
                Err(_) => {
                    let runtime = Arc::new(
                        Builder::new_multi_thread()
                            .worker_threads(config.async_worker_thread_number.into())
                            .enable_all()
                            .build()
                            .map_err(|e| RouteError::Engine(format!("failed to start runtime: {}", e)))?,
                    );
                    (runtime.handle().clone(), Some(runtime))
                }
            },
        };

        let tracer = Arc::new(Tracer::new(&config.tracer)?);
        let context = Context::new(config, handle.clone());

        // first registered is innermost
        context.add_intercept_strategy(Arc::new(TracerStrategy::new(tracer.clone())));
        context.add_intercept_strategy(Arc::new(DebuggerStrategy::new(context.debugger())));
        for strategy in strategies {
            context.add_intercept_strategy(strategy);
        }

        let shutdown = Arc::new(Shutdown::new());
        let monitor = Monitor::new(context.channel(), handle, shutdown.clone());

        Ok(Self {
            context,
            routes: Arc::new(RwLock::new(Vec::new())),
            monitor,
            tracer,
            running: Arc::new(AtomicBool::new(false)),
            listening: AtomicBool::new(false),
            shutdown,
            _runtime: owned,
        })
    }

    /// Starts the engine: the event channel, the monitor, the trace
    /// destination and every route added so far.
    ///
    /// When a route or the trace destination fails to start, the routes are
    /// stopped again and the engine stays stopped, so `start` can be retried.
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        if self.shutdown.is_terminated() {
            self.running.store(false, Ordering::Relaxed);
            return Err(RouteError::Engine("Engine was shut down and cannot be started again".to_string()));
        }

        if let Err(e) = self.start_all() {
            for route_id in self.route_ids() {
                if let Err(stop) = self.stop_route(&route_id) {
                    tracing::warn!(route_id = %route_id, "failed to stop route: {}", stop);
                }
            }
            self.running.store(false, Ordering::Relaxed);
            tracing::warn!("engine failed to start: {}", e);
            return Err(e);
        }
        Ok(())
    }

    fn start_all(&self) -> Result<()> {
        // background tasks live until shutdown, a retried start keeps them
        if !self.listening.swap(true, Ordering::Relaxed) {
            // Register handlers first, then start listening
            self.monitor.monitor();
            self.context.channel().listen();
        }

        if let Some(uri) = self.context.config().tracer.destination_uri.clone()
            && self.tracer.destination_uri().is_none()
        {
            let producer = self.context.endpoints().resolve(&uri)?.create_producer()?;
            let dispatcher = TraceDispatcher::start(&uri, producer, self.context.runtime(), self.shutdown.clone());
            self.tracer.set_destination(Some(dispatcher));
        }

        let route_ids = self.route_ids();
        for route_id in &route_ids {
            self.start_route(route_id)?;
        }
        tracing::info!("engine started with {} routes", route_ids.len());
        Ok(())
    }

    /// Stops every route and background task. A shut down engine cannot be
    /// started again.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        for route_id in self.route_ids() {
            if let Err(e) = self.stop_route(&route_id) {
                tracing::warn!(route_id = %route_id, "failed to stop route: {}", e);
            }
        }
        self.tracer.set_destination(None);
        self.shutdown.shutdown();
        self.context.channel().shutdown();
        tracing::info!("engine shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Adds a route and returns its id. The route is started right away
    /// when the engine is running.
    pub fn add_route(
        &self,
        route: impl Into<RouteDefinition>,
    ) -> Result<String> {
        let mut definition = route.into();
        self.context.id_factory().assign_route(&mut definition);
        let route_id = definition.route_id().to_string();
        definition.validate().map_err(|e| e.into_route_failure(&route_id))?;

        {
            let mut routes = self.routes.write().unwrap();
            if routes.iter().any(|e| e.definition.route_id() == route_id) {
                return Err(RouteError::IllegalArgument(format!("Route with id {} already exists", route_id)));
            }
            routes.push(RouteEntry {
                definition,
                route: None,
            });
        }
        tracing::debug!(route_id = %route_id, "route added");

        if self.is_running() {
            self.start_route(&route_id)?;
        }
        Ok(route_id)
    }

    pub fn add_routes<I, R>(
        &self,
        routes: I,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = R>,
        R: Into<RouteDefinition>,
    {
        routes.into_iter().map(|r| self.add_route(r)).collect()
    }

    /// Builds the route if needed and starts consuming.
    pub fn start_route(
        &self,
        route_id: &str,
    ) -> Result<()> {
        let route = self.built_route(route_id)?;
        route.start().map_err(|e| e.into_route_failure(route_id))
    }

    pub fn stop_route(
        &self,
        route_id: &str,
    ) -> Result<()> {
        match self.route(route_id)? {
            Some(route) => route.stop(),
            None => Ok(()),
        }
    }

    /// Stops and removes a route. Endpoints no other route uses are
    /// removed with it.
    pub fn remove_route(
        &self,
        route_id: &str,
    ) -> Result<()> {
        self.stop_route(route_id)?;
        let entry = {
            let mut routes = self.routes.write().unwrap();
            let index = routes.iter().position(|e| e.definition.route_id() == route_id).ok_or_else(|| not_found(route_id))?;
            routes.remove(index)
        };
        if let Some(route) = entry.route {
            self.release_endpoints(route.endpoint_uris());
        }
        self.monitor.remove(route_id);
        tracing::info!(route_id = %route_id, "route removed");
        Ok(())
    }

    pub fn route_ids(&self) -> Vec<String> {
        self.routes.read().unwrap().iter().map(|e| e.definition.route_id().to_string()).collect()
    }

    pub fn route_definition(
        &self,
        route_id: &str,
    ) -> Option<RouteDefinition> {
        self.routes.read().unwrap().iter().find(|e| e.definition.route_id() == route_id).map(|e| e.definition.clone())
    }

    /// Status of a route, `None` if the route does not exist.
    pub fn route_status(
        &self,
        route_id: &str,
    ) -> Option<RouteStatus> {
        let routes = self.routes.read().unwrap();
        let entry = routes.iter().find(|e| e.definition.route_id() == route_id)?;
        Some(entry.route.as_ref().map(|r| r.status()).unwrap_or(RouteStatus::Stopped))
    }

    /// Rewrites a route with advice-with.
    ///
    /// The edits run on a copy of the definition; an error from `f` leaves
    /// the route untouched. The advised route is built right away. When the
    /// build fails, for instance on an input uri that cannot be resolved,
    /// the route is removed and `FailedToCreateRoute` is returned. A route
    /// that was started is restarted with the advised definition.
    pub fn advice_with<F>(
        &self,
        route_id: &str,
        f: F,
    ) -> Result<RouteDefinition>
    where
        F: FnOnce(&mut AdviceWithRoute) -> Result<()>,
    {
        let definition = self.route_definition(route_id).ok_or_else(|| not_found(route_id))?;
        tracing::info!(route_id = %route_id, "AdviceWith route before: {}", definition);

        let mut advice = AdviceWithRoute::new(definition, self.context.id_factory());
        f(&mut advice)?;
        let mut advised = advice.into_definition();
        self.context.id_factory().assign_route(&mut advised);
        tracing::info!(route_id = %route_id, "AdviceWith route after: {}", advised);

        let was_started = self.route_status(route_id) == Some(RouteStatus::Started);
        self.stop_route(route_id)?;

        let built = advised.validate().and_then(|_| reify(&self.context, &advised)).map_err(|e| e.into_route_failure(route_id));
        let route = match built {
            Ok(route) => Arc::new(route),
            Err(e) => {
                tracing::warn!(route_id = %route_id, "advised route could not be built, removing it: {}", e);
                self.remove_route(route_id)?;
                return Err(e);
            }
        };

        let previous = {
            let mut routes = self.routes.write().unwrap();
            let entry = routes.iter_mut().find(|e| e.definition.route_id() == route_id).ok_or_else(|| not_found(route_id))?;
            entry.definition = advised.clone();
            entry.route.replace(route.clone())
        };
        if let Some(previous) = previous {
            self.release_endpoints(previous.endpoint_uris());
        }

        if was_started {
            route.start().map_err(|e| e.into_route_failure(route_id))?;
        }
        Ok(advised)
    }

    /// Gets an endpoint, creating it if needed.
    pub fn endpoint(
        &self,
        uri: &str,
    ) -> Result<Arc<dyn Endpoint>> {
        self.context.endpoints().resolve(uri)
    }

    /// Returns true if an endpoint for `uri` was created.
    pub fn has_endpoint(
        &self,
        uri: &str,
    ) -> bool {
        self.context.endpoints().has_endpoint(uri)
    }

    pub fn mock_endpoint(
        &self,
        uri: &str,
    ) -> Result<Arc<MockEndpoint>> {
        self.context.endpoints().mock(uri)
    }

    pub fn producer_template(&self) -> ProducerTemplate {
        ProducerTemplate::new(self.context.clone())
    }

    /// Registers a component for a uri scheme.
    pub fn add_component(
        &self,
        scheme: impl Into<String>,
        component: Arc<dyn Component>,
    ) {
        self.context.endpoints().add_component(scheme, component);
    }

    /// Binds a processor that `process(name)` nodes call.
    pub fn bind(
        &self,
        name: impl Into<String>,
        processor: ProcessorRef,
    ) {
        self.context.bind(name, processor);
    }

    pub fn bind_fn<F>(
        &self,
        name: impl Into<String>,
        f: F,
    ) where
        F: Fn(&mut crate::runtime::Exchange) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        self.context.bind(name.clone(), processor_fn(name, f));
    }

    /// Registers a strategy woven into routes built from now on.
    pub fn add_intercept_strategy(
        &self,
        strategy: Arc<dyn InterceptStrategy>,
    ) {
        self.context.add_intercept_strategy(strategy);
    }

    pub fn tracer(&self) -> Arc<Tracer> {
        self.tracer.clone()
    }

    pub fn debugger(&self) -> Arc<Debugger> {
        self.context.debugger()
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.context.channel()
    }

    /// Statistics of a route collected since the engine started.
    pub fn route_stats(
        &self,
        route_id: &str,
    ) -> Option<RouteStats> {
        self.monitor.stats(route_id)
    }

    pub fn config(&self) -> &Config {
        self.context.config()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    fn route(
        &self,
        route_id: &str,
    ) -> Result<Option<Arc<Route>>> {
        let routes = self.routes.read().unwrap();
        let entry = routes.iter().find(|e| e.definition.route_id() == route_id).ok_or_else(|| not_found(route_id))?;
        Ok(entry.route.clone())
    }

    /// The runtime route, built from its definition on first use.
    fn built_route(
        &self,
        route_id: &str,
    ) -> Result<Arc<Route>> {
        if let Some(route) = self.route(route_id)? {
            return Ok(route);
        }

        let definition = self.route_definition(route_id).ok_or_else(|| not_found(route_id))?;
        let route = Arc::new(reify(&self.context, &definition)?);

        let mut routes = self.routes.write().unwrap();
        let entry = routes.iter_mut().find(|e| e.definition.route_id() == route_id).ok_or_else(|| not_found(route_id))?;
        Ok(entry.route.get_or_insert(route).clone())
    }

    /// Removes endpoints of `uris` that no remaining route uses.
    fn release_endpoints(
        &self,
        uris: &[String],
    ) {
        let in_use: Vec<String> = self.routes.read().unwrap().iter().filter_map(|e| e.route.as_ref()).flat_map(|r| r.endpoint_uris().to_vec()).collect();
        let endpoints = self.context.endpoints();
        for uri in uris {
            if !in_use.contains(uri) && endpoints.remove(uri).is_some() {
                tracing::debug!(uri = %uri, "endpoint removed");
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn not_found(route_id: &str) -> RouteError {
    RouteError::NotFound(format!("Route {} not found", route_id))
}
