use std::sync::Arc;

use tokio::runtime::Handle;

use super::TraceEventMessage;
use crate::{
    Result,
    common::{Queue, Shutdown},
    runtime::{Body, Exchange, ProcessorRef, TRACE_EVENT},
};

const DISPATCH_QUEUE_SIZE: usize = 1024;

/// Sends trace events to a destination endpoint from a background task.
///
/// Each event becomes a fresh InOnly exchange with a JSON body, so the
/// traced exchange is never blocked or changed. When the queue is full the
/// event is dropped with a warning.
pub struct TraceDispatcher {
    uri: String,
    queue: Arc<Queue<Exchange>>,
}

impl TraceDispatcher {
    pub fn start(
        uri: &str,
        producer: ProcessorRef,
        runtime: &Handle,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let queue: Arc<Queue<Exchange>> = Queue::new(DISPATCH_QUEUE_SIZE);

        let receiver = queue.clone();
        let destination = uri.to_string();
        runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(mut exchange) = receiver.next_async() => {
                        if let Err(e) = producer.process(&mut exchange).await {
                            tracing::warn!(destination = %destination, "failed to send trace event: {}", e);
                        }
                    }
                }
            }
        });

        Self {
            uri: uri.to_string(),
            queue,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn dispatch(
        &self,
        event: &TraceEventMessage,
    ) -> Result<()> {
        let mut exchange = Exchange::with_body(Body::Json(serde_json::to_value(event)?));
        exchange.set_property(TRACE_EVENT, true);
        if let Err(e) = self.queue.try_send(exchange) {
            tracing::warn!(destination = %self.uri, "trace event dropped: {}", e);
        }
        Ok(())
    }
}
