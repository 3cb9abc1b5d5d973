use std::{
    any::Any,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::runtime::Handle;

use super::{Component, Consumer, Endpoint, EndpointUri};
use crate::{
    Result, RouteError,
    common::{Queue, Shutdown},
    runtime::{Exchange, Processor, ProcessorRef},
};

const DEFAULT_QUEUE_SIZE: usize = 1000;

/// Asynchronous in-memory queue between routes.
///
/// Uri parameter `size` bounds the queue; sends to a full queue fail.
pub struct SedaComponent {
    runtime: Handle,
}

impl SedaComponent {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
        }
    }
}

impl Component for SedaComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
    ) -> Result<Arc<dyn Endpoint>> {
        let size = match uri.param("size") {
            Some(size) => size.parse::<usize>().map_err(|_| RouteError::IllegalArgument(format!("invalid seda queue size: {}", size)))?,
            None => DEFAULT_QUEUE_SIZE,
        };
        Ok(Arc::new(SedaEndpoint {
            uri: uri.raw().to_string(),
            queue: Queue::new(size),
            runtime: self.runtime.clone(),
        }))
    }
}

pub struct SedaEndpoint {
    uri: String,
    queue: Arc<Queue<Exchange>>,
    runtime: Handle,
}

impl SedaEndpoint {
    /// Number of exchanges waiting in the queue.
    pub fn queue_size(&self) -> usize {
        self.queue.len()
    }
}

impl Endpoint for SedaEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn create_producer(&self) -> Result<ProcessorRef> {
        Ok(Arc::new(SedaProducer {
            uri: self.uri.clone(),
            queue: self.queue.clone(),
        }))
    }

    fn create_consumer(
        &self,
        processor: ProcessorRef,
    ) -> Result<Box<dyn Consumer>> {
        Ok(Box::new(SedaConsumer {
            uri: self.uri.clone(),
            queue: self.queue.clone(),
            processor,
            runtime: self.runtime.clone(),
            shutdown: Mutex::new(None),
        }))
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct SedaProducer {
    uri: String,
    queue: Arc<Queue<Exchange>>,
}

#[async_trait]
impl Processor for SedaProducer {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        self.queue.try_send(exchange.correlated_copy()).map_err(|e| RouteError::Queue(format!("{}: {}", self.uri, e)))
    }

    fn describe(&self) -> String {
        format!("seda producer[{}]", self.uri)
    }
}

struct SedaConsumer {
    uri: String,
    queue: Arc<Queue<Exchange>>,
    processor: ProcessorRef,
    runtime: Handle,
    shutdown: Mutex<Option<Arc<Shutdown>>>,
}

impl Consumer for SedaConsumer {
    fn start(&self) -> Result<()> {
        let mut current = self.shutdown.lock().unwrap();
        if current.is_some() {
            return Ok(());
        }
        let shutdown = Arc::new(Shutdown::new());
        *current = Some(shutdown.clone());

        let queue = self.queue.clone();
        let processor = self.processor.clone();
        let uri = self.uri.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(mut exchange) = queue.next_async() => {
                        if let Err(e) = processor.process(&mut exchange).await {
                            tracing::warn!(endpoint = %uri, exchange_id = %exchange.id(), "error processing exchange: {}", e);
                        }
                    }
                }
            }
        });
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.lock().unwrap().take() {
            shutdown.shutdown();
        }
        Ok(())
    }
}
