use serde_json::Value;

use crate::{
    Result,
    runtime::{Body, Context, Exchange, ExchangePattern},
};

/// Sends exchanges to endpoints from outside of a route.
///
/// ```rust,ignore
/// let template = engine.producer_template();
/// template.send_body("direct:start", "Hello World").await?;
/// let reply = template.request_body("direct:echo", "ping").await?;
/// ```
#[derive(Clone)]
pub struct ProducerTemplate {
    context: Context,
}

impl ProducerTemplate {
    pub fn new(context: Context) -> Self {
        Self {
            context,
        }
    }

    /// Send an exchange and return it once processed.
    ///
    /// Only a failure to resolve the endpoint is returned as an error; a
    /// failure while routing is left on the returned exchange.
    pub async fn send(
        &self,
        uri: &str,
        mut exchange: Exchange,
    ) -> Result<Exchange> {
        let producer = self.context.endpoints().resolve(uri)?.create_producer()?;
        if let Err(e) = producer.process(&mut exchange).await
            && !exchange.is_failed()
        {
            exchange.set_exception(e);
        }
        Ok(exchange)
    }

    /// Send a one-way message, failing when routing failed.
    pub async fn send_body(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<()> {
        self.send_in_only(uri, Exchange::with_body(body)).await
    }

    pub async fn send_body_and_header(
        &self,
        uri: &str,
        body: impl Into<Body>,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let mut exchange = Exchange::with_body(body);
        exchange.set_header(name, value);
        self.send_in_only(uri, exchange).await
    }

    /// Send a request and return the reply body.
    pub async fn request_body(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<Body> {
        let mut exchange = Exchange::with_body(body);
        exchange.set_pattern(ExchangePattern::InOut);
        let mut exchange = self.send(uri, exchange).await?;
        match exchange.take_exception() {
            Some(e) => Err(e),
            None => Ok(exchange.message_mut().take_body()),
        }
    }

    async fn send_in_only(
        &self,
        uri: &str,
        exchange: Exchange,
    ) -> Result<()> {
        let mut exchange = self.send(uri, exchange).await?;
        match exchange.take_exception() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Handle;

    use super::*;
    use crate::{Config, RouteError};

    #[tokio::test]
    async fn test_send_to_mock() {
        let context = Context::new(Config::default(), Handle::current());
        let template = ProducerTemplate::new(context.clone());
        template.send_body_and_header("mock:result", "Hello", "foo", "bar").await.unwrap();

        let mock = context.endpoints().mock("mock:result").unwrap();
        assert_eq!(mock.received_bodies(), vec!["Hello".to_string()]);
        assert_eq!(mock.received_exchanges()[0].header("foo"), Some(&serde_json::json!("bar")));
    }

    #[tokio::test]
    async fn test_send_keeps_failure_on_exchange() {
        let context = Context::new(Config::default(), Handle::current());
        let template = ProducerTemplate::new(context);

        let exchange = template.send("direct:nobody", Exchange::with_body("x")).await.unwrap();
        assert!(matches!(exchange.exception(), Some(RouteError::NoConsumer(_))));

        let err = template.send_body("invalid:scheme", "x").await.unwrap_err();
        assert!(matches!(err, RouteError::ResolveEndpointFailed { .. }));
    }
}
