use std::{
    any::Any,
    collections::HashMap,
    sync::Arc,
};

use async_trait::async_trait;

use super::{Component, Consumer, Endpoint, EndpointUri};
use crate::{
    Result, RouteError, ShareLock,
    runtime::{Exchange, Processor, ProcessorRef},
};

type Consumers = ShareLock<HashMap<String, ProcessorRef>>;

/// Synchronous in-line call of the route consuming the endpoint.
#[derive(Default)]
pub struct DirectComponent {
    consumers: Consumers,
}

impl DirectComponent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for DirectComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
    ) -> Result<Arc<dyn Endpoint>> {
        Ok(Arc::new(DirectEndpoint {
            uri: uri.raw().to_string(),
            key: uri.normalized(),
            consumers: self.consumers.clone(),
        }))
    }
}

pub struct DirectEndpoint {
    uri: String,
    key: String,
    consumers: Consumers,
}

impl Endpoint for DirectEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn create_producer(&self) -> Result<ProcessorRef> {
        Ok(Arc::new(DirectProducer {
            uri: self.uri.clone(),
            key: self.key.clone(),
            consumers: self.consumers.clone(),
        }))
    }

    fn create_consumer(
        &self,
        processor: ProcessorRef,
    ) -> Result<Box<dyn Consumer>> {
        Ok(Box::new(DirectConsumer {
            uri: self.uri.clone(),
            key: self.key.clone(),
            consumers: self.consumers.clone(),
            processor,
        }))
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct DirectProducer {
    uri: String,
    key: String,
    consumers: Consumers,
}

#[async_trait]
impl Processor for DirectProducer {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let consumer = self.consumers.read().unwrap().get(&self.key).cloned();
        match consumer {
            Some(processor) => processor.process(exchange).await,
            None => Err(RouteError::NoConsumer(self.uri.clone())),
        }
    }

    fn describe(&self) -> String {
        format!("direct producer[{}]", self.uri)
    }
}

struct DirectConsumer {
    uri: String,
    key: String,
    consumers: Consumers,
    processor: ProcessorRef,
}

impl Consumer for DirectConsumer {
    fn start(&self) -> Result<()> {
        let mut consumers = self.consumers.write().unwrap();
        if consumers.contains_key(&self.key) {
            return Err(RouteError::IllegalArgument(format!("Multiple consumers for the same endpoint is not allowed: {}", self.uri)));
        }
        consumers.insert(self.key.clone(), self.processor.clone());
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.consumers.write().unwrap().remove(&self.key);
        Ok(())
    }
}
