use std::time::Instant;

use async_trait::async_trait;
use tokio::runtime::Handle;

use crate::{
    Result,
    events::ExchangeEvent,
    model::Predicate,
    runtime::{Context, Exchange, INTERCEPTED_ENDPOINT, Processor, ProcessorRef},
};

/// Sends the exchange to an endpoint's producer.
pub struct SendProcessor {
    uri: String,
    route_id: String,
    producer: ProcessorRef,
    context: Context,
}

impl SendProcessor {
    pub fn new(
        uri: &str,
        route_id: &str,
        producer: ProcessorRef,
        context: Context,
    ) -> Self {
        Self {
            uri: uri.to_string(),
            route_id: route_id.to_string(),
            producer,
            context,
        }
    }
}

#[async_trait]
impl Processor for SendProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        self.context.notify(
            exchange,
            &self.route_id,
            ExchangeEvent::Sending {
                uri: self.uri.clone(),
            },
        )?;

        let start = Instant::now();
        let result = self.producer.process(exchange).await;
        let notified = self.context.notify(
            exchange,
            &self.route_id,
            ExchangeEvent::Sent {
                uri: self.uri.clone(),
                elapsed_millis: start.elapsed().as_millis() as i64,
            },
        );
        result.and(notified)
    }

    fn describe(&self) -> String {
        format!("sendTo({})", self.uri)
    }
}

/// Sends a copy of the exchange to an endpoint without waiting for it.
pub struct WireTapProcessor {
    uri: String,
    producer: ProcessorRef,
    runtime: Handle,
}

impl WireTapProcessor {
    pub fn new(
        uri: &str,
        producer: ProcessorRef,
        runtime: Handle,
    ) -> Self {
        Self {
            uri: uri.to_string(),
            producer,
            runtime,
        }
    }
}

#[async_trait]
impl Processor for WireTapProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let mut copy = exchange.correlated_copy();
        let producer = self.producer.clone();
        let uri = self.uri.clone();
        self.runtime.spawn(async move {
            if let Err(e) = producer.process(&mut copy).await {
                tracing::warn!(endpoint = %uri, exchange_id = %copy.id(), "wire tap failed: {}", e);
            }
        });
        Ok(())
    }

    fn describe(&self) -> String {
        format!("wireTap({})", self.uri)
    }
}

/// Runs intercept steps before a send to an intercepted endpoint.
///
/// When the `when` predicate does not match the send goes through
/// untouched. Otherwise the steps run first; the original send is then
/// skipped or performed, followed by the optional after endpoint.
pub struct InterceptSendProcessor {
    uri: String,
    when: Option<Predicate>,
    skip: bool,
    steps: Option<ProcessorRef>,
    send: ProcessorRef,
    after: Option<ProcessorRef>,
}

impl InterceptSendProcessor {
    pub fn new(
        uri: &str,
        when: Option<Predicate>,
        skip: bool,
        steps: Option<ProcessorRef>,
        send: ProcessorRef,
        after: Option<ProcessorRef>,
    ) -> Self {
        Self {
            uri: uri.to_string(),
            when,
            skip,
            steps,
            send,
            after,
        }
    }
}

#[async_trait]
impl Processor for InterceptSendProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let matched = match &self.when {
            Some(predicate) => predicate.matches(exchange)?,
            None => true,
        };
        if !matched {
            return self.send.process(exchange).await;
        }

        exchange.set_header(INTERCEPTED_ENDPOINT, self.uri.clone());
        if let Some(steps) = &self.steps {
            steps.process(exchange).await?;
        }
        if self.skip || exchange.is_route_stop() {
            return Ok(());
        }

        self.send.process(exchange).await?;
        if let Some(after) = &self.after {
            after.process(exchange).await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("interceptSendToEndpoint({})", self.uri)
    }
}

/// Copies a send to a mock endpoint, optionally skipping the original.
pub struct MockSendProcessor {
    mock: ProcessorRef,
    skip: bool,
    send: ProcessorRef,
}

impl MockSendProcessor {
    pub fn new(
        mock: ProcessorRef,
        skip: bool,
        send: ProcessorRef,
    ) -> Self {
        Self {
            mock,
            skip,
            send,
        }
    }
}

#[async_trait]
impl Processor for MockSendProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        self.mock.process(exchange).await?;
        if self.skip {
            return Ok(());
        }
        self.send.process(exchange).await
    }

    fn describe(&self) -> String {
        self.send.describe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::runtime::processor_fn;

    fn recorder(
        name: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    ) -> ProcessorRef {
        processor_fn(name, move |_| {
            seen.lock().unwrap().push(name);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_intercept_steps_run_before_send() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let p = InterceptSendProcessor::new(
            "mock:foo",
            None,
            false,
            Some(recorder("steps", seen.clone())),
            recorder("send", seen.clone()),
            Some(recorder("after", seen.clone())),
        );
        let mut exchange = Exchange::with_body("x");
        p.process(&mut exchange).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["steps", "send", "after"]);
        assert_eq!(exchange.header(INTERCEPTED_ENDPOINT), Some(&serde_json::json!("mock:foo")));
    }

    #[tokio::test]
    async fn test_intercept_skip_and_when() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let p = InterceptSendProcessor::new(
            "mock:foo",
            Some(Predicate::body_contains("skip")),
            true,
            Some(recorder("steps", seen.clone())),
            recorder("send", seen.clone()),
            None,
        );
        p.process(&mut Exchange::with_body("please skip")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["steps"]);

        p.process(&mut Exchange::with_body("normal")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["steps", "send"]);
    }

    #[tokio::test]
    async fn test_mock_send() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let p = MockSendProcessor::new(recorder("mock", seen.clone()), false, recorder("send", seen.clone()));
        p.process(&mut Exchange::with_body("x")).await.unwrap();
        let p = MockSendProcessor::new(recorder("mock", seen.clone()), true, recorder("send", seen.clone()));
        p.process(&mut Exchange::with_body("x")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["mock", "send", "mock"]);
    }
}
