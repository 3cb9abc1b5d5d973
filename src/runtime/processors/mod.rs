//! Built-in processors, one per node kind.

mod flow;
mod message;
mod send;

use async_trait::async_trait;

pub use flow::{ChoiceProcessor, FilterProcessor, MulticastProcessor};
pub use message::{BeanProcessor, DelayProcessor, LogProcessor, RemoveHeaderProcessor, SetBodyProcessor, SetHeaderProcessor, SetPropertyProcessor, StopProcessor, ThrowExceptionProcessor};
pub use send::{InterceptSendProcessor, MockSendProcessor, SendProcessor, WireTapProcessor};

use crate::{
    Result,
    runtime::{Exchange, Processor, ProcessorRef},
};

/// Runs processors in order.
///
/// Stops at the first error, or when a processor marked the exchange to
/// stop routing.
pub struct Pipeline {
    processors: Vec<ProcessorRef>,
}

impl Pipeline {
    pub fn new(processors: Vec<ProcessorRef>) -> Self {
        Self {
            processors,
        }
    }
}

#[async_trait]
impl Processor for Pipeline {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        for processor in &self.processors {
            if exchange.is_route_stop() {
                break;
            }
            processor.process(exchange).await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Pipeline[{}]", self.processors.iter().map(|p| p.describe()).collect::<Vec<_>>().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{RouteError, runtime::processor_fn};

    fn append(text: &'static str) -> ProcessorRef {
        processor_fn(text, move |ex| {
            let body = ex.body_text().unwrap_or_default();
            ex.set_body(format!("{}{}", body, text));
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_pipeline_runs_in_order() {
        let pipeline = Pipeline::new(vec![append("a"), append("b"), append("c")]);
        let mut exchange = Exchange::with_body("");
        pipeline.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.body_text().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_pipeline_stops_on_error_and_stop() {
        let failing = processor_fn("boom", |_| Err(RouteError::Processing("boom".to_string())));
        let pipeline = Pipeline::new(vec![append("a"), failing, append("b")]);
        let mut exchange = Exchange::with_body("");
        assert!(pipeline.process(&mut exchange).await.is_err());
        assert_eq!(exchange.body_text().as_deref(), Some("a"));

        let pipeline = Pipeline::new(vec![append("a"), Arc::new(StopProcessor), append("b")]);
        let mut exchange = Exchange::with_body("");
        pipeline.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.body_text().as_deref(), Some("a"));
    }
}
