use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use tokio::runtime::Handle;

use crate::{
    Config, Result, RouteError, ShareLock,
    debugger::Debugger,
    events::{ExchangeEvent, Log, Message},
    intercept::{InterceptStrategy, StreamCachingStrategy},
    model::NodeIdFactory,
    runtime::{Channel, DirectComponent, EndpointRegistry, Exchange, LogComponent, MockComponent, ProcessorRef, SedaComponent},
    utils,
};

/// Engine-wide state shared by routes, processors, and decorators.
#[derive(Clone)]
pub struct Context {
    config: Arc<Config>,
    endpoints: Arc<EndpointRegistry>,
    beans: ShareLock<HashMap<String, ProcessorRef>>,
    strategies: ShareLock<Vec<Arc<dyn InterceptStrategy>>>,
    stream_caching: Arc<StreamCachingStrategy>,
    channel: Arc<Channel>,
    debugger: Arc<Debugger>,
    id_factory: Arc<NodeIdFactory>,
    runtime: Handle,
}

impl Context {
    pub fn new(
        config: Config,
        runtime: Handle,
    ) -> Self {
        let channel = Arc::new(Channel::new(runtime.clone()));
        let endpoints = Arc::new(EndpointRegistry::new());
        endpoints.add_component("direct", Arc::new(DirectComponent::new()));
        endpoints.add_component("mock", Arc::new(MockComponent::new(Duration::from_millis(config.mock.result_wait_millis))));
        endpoints.add_component("seda", Arc::new(SedaComponent::new(runtime.clone())));
        endpoints.add_component("log", Arc::new(LogComponent::new(channel.clone())));

        Self {
            stream_caching: Arc::new(StreamCachingStrategy::new(config.stream_caching)),
            debugger: Arc::new(Debugger::new(config.debugger.enabled)),
            config: Arc::new(config),
            endpoints,
            beans: Arc::new(RwLock::new(HashMap::new())),
            strategies: Arc::new(RwLock::new(Vec::new())),
            channel,
            id_factory: Arc::new(NodeIdFactory::new()),
            runtime,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endpoints(&self) -> Arc<EndpointRegistry> {
        self.endpoints.clone()
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn debugger(&self) -> Arc<Debugger> {
        self.debugger.clone()
    }

    pub fn id_factory(&self) -> Arc<NodeIdFactory> {
        self.id_factory.clone()
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub(crate) fn stream_caching(&self) -> Arc<StreamCachingStrategy> {
        self.stream_caching.clone()
    }

    pub fn bind(
        &self,
        name: impl Into<String>,
        processor: ProcessorRef,
    ) {
        self.beans.write().unwrap().insert(name.into(), processor);
    }

    pub fn lookup(
        &self,
        name: &str,
    ) -> Result<ProcessorRef> {
        self.beans.read().unwrap().get(name).cloned().ok_or_else(|| RouteError::NotFound(format!("No bean could be found in the registry for: {}", name)))
    }

    pub fn add_intercept_strategy(
        &self,
        strategy: Arc<dyn InterceptStrategy>,
    ) {
        self.strategies.write().unwrap().push(strategy);
    }

    pub fn intercept_strategies(&self) -> Vec<Arc<dyn InterceptStrategy>> {
        self.strategies.read().unwrap().clone()
    }

    /// Notify the debugger synchronously, then publish on the channel.
    pub fn notify(
        &self,
        exchange: &mut Exchange,
        route_id: &str,
        event: ExchangeEvent,
    ) -> Result<()> {
        let result = self.debugger.on_event(exchange, &event);
        self.channel.emit(Message {
            exchange_id: exchange.id().to_string(),
            route_id: route_id.to_string(),
            event,
        });
        result
    }

    pub fn emit_log(
        &self,
        exchange: &Exchange,
        source: &str,
        content: String,
    ) {
        self.channel.emit_log(Log {
            exchange_id: exchange.id().to_string(),
            route_id: exchange.from_route_id().unwrap_or_default().to_string(),
            source: source.to_string(),
            content,
            timestamp: utils::time::time_millis(),
        });
    }
}
