use std::{
    any::Any,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use super::{Component, Consumer, Endpoint, EndpointUri};
use crate::{
    Result, RouteError,
    model::value_text,
    runtime::{Exchange, Processor, ProcessorRef},
};

/// Creates [`MockEndpoint`]s.
pub struct MockComponent {
    result_wait_time: Duration,
}

impl MockComponent {
    pub fn new(result_wait_time: Duration) -> Self {
        Self {
            result_wait_time,
        }
    }
}

impl Component for MockComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
    ) -> Result<Arc<dyn Endpoint>> {
        Ok(Arc::new(MockEndpoint::new(uri.raw(), self.result_wait_time)))
    }
}

#[derive(Default)]
struct Expectations {
    message_count: Option<usize>,
    minimum_message_count: Option<usize>,
    bodies: Option<Vec<String>>,
    headers: Vec<(String, Value)>,
}

struct MockState {
    received: Mutex<Vec<Exchange>>,
    expectations: Mutex<Expectations>,
    result_wait_time: Mutex<Duration>,
    notify: Notify,
}

/// Endpoint recording every exchange sent to it, with expectations that
/// can be asserted once the test has sent its messages.
pub struct MockEndpoint {
    uri: String,
    state: Arc<MockState>,
}

impl MockEndpoint {
    pub fn new(
        uri: &str,
        result_wait_time: Duration,
    ) -> Self {
        Self {
            uri: uri.to_string(),
            state: Arc::new(MockState {
                received: Mutex::new(Vec::new()),
                expectations: Mutex::new(Expectations::default()),
                result_wait_time: Mutex::new(result_wait_time),
                notify: Notify::new(),
            }),
        }
    }

    pub fn expected_message_count(
        &self,
        count: usize,
    ) {
        self.state.expectations.lock().unwrap().message_count = Some(count);
    }

    pub fn expected_minimum_message_count(
        &self,
        count: usize,
    ) {
        self.state.expectations.lock().unwrap().minimum_message_count = Some(count);
    }

    /// Expect these bodies, in order. Implies the message count.
    pub fn expected_bodies_received<S: AsRef<str>>(
        &self,
        bodies: &[S],
    ) {
        let mut expectations = self.state.expectations.lock().unwrap();
        expectations.bodies = Some(bodies.iter().map(|b| b.as_ref().to_string()).collect());
        expectations.message_count = Some(bodies.len());
    }

    /// Expect every received message to carry the header.
    pub fn expected_header_received(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.state.expectations.lock().unwrap().headers.push((name.into(), value.into()));
    }

    pub fn set_result_wait_time(
        &self,
        wait: Duration,
    ) {
        *self.state.result_wait_time.lock().unwrap() = wait;
    }

    pub fn received_counter(&self) -> usize {
        self.state.received.lock().unwrap().len()
    }

    pub fn received_exchanges(&self) -> Vec<Exchange> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn received_bodies(&self) -> Vec<String> {
        self.state.received.lock().unwrap().iter().map(|e| e.body_text().unwrap_or_default()).collect()
    }

    /// Clear received exchanges and expectations.
    pub fn reset(&self) {
        self.state.received.lock().unwrap().clear();
        *self.state.expectations.lock().unwrap() = Expectations::default();
    }

    /// Wait until enough messages arrived (bounded by the result wait
    /// time) and check every expectation.
    pub async fn assert_is_satisfied(&self) -> Result<()> {
        let required = {
            let expectations = self.state.expectations.lock().unwrap();
            expectations.message_count.max(expectations.minimum_message_count).unwrap_or(0)
        };

        if required > 0 {
            let wait = *self.state.result_wait_time.lock().unwrap();
            let _ = tokio::time::timeout(wait, self.wait_for(required)).await;
        }

        self.check()
    }

    async fn wait_for(
        &self,
        count: usize,
    ) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.received_counter() >= count {
                return;
            }
            notified.await;
        }
    }

    fn check(&self) -> Result<()> {
        let expectations = self.state.expectations.lock().unwrap();
        let received = self.state.received.lock().unwrap();

        if let Some(count) = expectations.message_count
            && received.len() != count
        {
            return Err(RouteError::Assertion(format!("{} Received message count. Expected: <{}> but was: <{}>", self.uri, count, received.len())));
        }
        if let Some(min) = expectations.minimum_message_count
            && received.len() < min
        {
            return Err(RouteError::Assertion(format!(
                "{} Received message count. Expected at least: <{}> but was: <{}>",
                self.uri,
                min,
                received.len()
            )));
        }
        if let Some(bodies) = &expectations.bodies {
            for (i, expected) in bodies.iter().enumerate() {
                let actual = received.get(i).and_then(|e| e.body_text()).unwrap_or_default();
                if &actual != expected {
                    return Err(RouteError::Assertion(format!("{} Body of message: {}. Expected: <{}> but was: <{}>", self.uri, i, expected, actual)));
                }
            }
        }
        for (name, value) in &expectations.headers {
            for (i, exchange) in received.iter().enumerate() {
                let actual = exchange.header(name);
                if actual != Some(value) && actual.map(value_text) != Some(value_text(value)) {
                    return Err(RouteError::Assertion(format!(
                        "{} Header with name {} for message: {}. Expected: <{}> but was: <{}>",
                        self.uri,
                        name,
                        i,
                        value_text(value),
                        actual.map(value_text).unwrap_or_else(|| "null".to_string())
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Endpoint for MockEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn create_producer(&self) -> Result<ProcessorRef> {
        Ok(Arc::new(MockProducer {
            uri: self.uri.clone(),
            state: self.state.clone(),
        }))
    }

    fn create_consumer(
        &self,
        _processor: ProcessorRef,
    ) -> Result<Box<dyn Consumer>> {
        Err(RouteError::IllegalArgument(format!("Cannot consume from mock endpoint: {}", self.uri)))
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct MockProducer {
    uri: String,
    state: Arc<MockState>,
}

#[async_trait]
impl Processor for MockProducer {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        self.state.received.lock().unwrap().push(exchange.clone());
        self.state.notify.notify_waiters();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("mock producer[{}]", self.uri)
    }
}
