use std::{any::Any, sync::Arc};

use async_trait::async_trait;

use super::{Component, Consumer, Endpoint, EndpointUri};
use crate::{
    Result, RouteError,
    events::Log,
    runtime::{Channel, Exchange, Processor, ProcessorRef},
    utils,
};

/// Logs every exchange sent to `log:<category>`.
pub struct LogComponent {
    channel: Arc<Channel>,
}

impl LogComponent {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self {
            channel,
        }
    }
}

impl Component for LogComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
    ) -> Result<Arc<dyn Endpoint>> {
        Ok(Arc::new(LogEndpoint {
            uri: uri.raw().to_string(),
            category: uri.path().to_string(),
            show_headers: uri.param("showHeaders") == Some("true"),
            channel: self.channel.clone(),
        }))
    }
}

struct LogEndpoint {
    uri: String,
    category: String,
    show_headers: bool,
    channel: Arc<Channel>,
}

impl Endpoint for LogEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn create_producer(&self) -> Result<ProcessorRef> {
        Ok(Arc::new(LogProducer {
            uri: self.uri.clone(),
            category: self.category.clone(),
            show_headers: self.show_headers,
            channel: self.channel.clone(),
        }))
    }

    fn create_consumer(
        &self,
        _processor: ProcessorRef,
    ) -> Result<Box<dyn Consumer>> {
        Err(RouteError::IllegalArgument(format!("Cannot consume from log endpoint: {}", self.uri)))
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct LogProducer {
    uri: String,
    category: String,
    show_headers: bool,
    channel: Arc<Channel>,
}

#[async_trait]
impl Processor for LogProducer {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let body = if exchange.body().is_stream() {
            "[Body is stream based]".to_string()
        } else {
            exchange.body_text().unwrap_or_else(|| "[Body is null]".to_string())
        };
        let content = if self.show_headers {
            format!("Exchange[Headers: {:?}, BodyType: {}, Body: {}]", exchange.message().headers(), exchange.body().type_name(), body)
        } else {
            format!("Exchange[BodyType: {}, Body: {}]", exchange.body().type_name(), body)
        };
        tracing::info!(category = %self.category, "{}", content);

        self.channel.emit_log(Log {
            exchange_id: exchange.id().to_string(),
            route_id: exchange.from_route_id().unwrap_or_default().to_string(),
            source: self.uri.clone(),
            content,
            timestamp: utils::time::time_millis(),
        });
        Ok(())
    }

    fn describe(&self) -> String {
        format!("log producer[{}]", self.uri)
    }
}
