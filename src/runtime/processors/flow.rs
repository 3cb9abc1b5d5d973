use async_trait::async_trait;

use crate::{
    Result,
    model::Predicate,
    runtime::{Exchange, FILTER_MATCHED, Processor, ProcessorRef},
};

/// Routes to the first `when` clause whose predicate matches, else to
/// `otherwise`.
pub struct ChoiceProcessor {
    clauses: Vec<(Predicate, ProcessorRef)>,
    otherwise: Option<ProcessorRef>,
}

impl ChoiceProcessor {
    pub fn new(
        clauses: Vec<(Predicate, ProcessorRef)>,
        otherwise: Option<ProcessorRef>,
    ) -> Self {
        Self {
            clauses,
            otherwise,
        }
    }
}

#[async_trait]
impl Processor for ChoiceProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        for (predicate, processor) in &self.clauses {
            if predicate.matches(exchange)? {
                return processor.process(exchange).await;
            }
        }
        match &self.otherwise {
            Some(processor) => processor.process(exchange).await,
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        "Choice".to_string()
    }
}

pub struct FilterProcessor {
    predicate: Predicate,
    processor: ProcessorRef,
}

impl FilterProcessor {
    pub fn new(
        predicate: Predicate,
        processor: ProcessorRef,
    ) -> Self {
        Self {
            predicate,
            processor,
        }
    }
}

#[async_trait]
impl Processor for FilterProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let matched = self.predicate.matches(exchange)?;
        exchange.set_property(FILTER_MATCHED, matched);
        if matched {
            self.processor.process(exchange).await
        } else {
            Ok(())
        }
    }

    fn describe(&self) -> String {
        format!("Filter[{}]", self.predicate)
    }
}

/// Sends a copy of the exchange to each output in turn.
///
/// The message of the latest copy becomes the result. The first failing
/// output stops the multicast and its error is propagated.
pub struct MulticastProcessor {
    processors: Vec<ProcessorRef>,
}

impl MulticastProcessor {
    pub fn new(processors: Vec<ProcessorRef>) -> Self {
        Self {
            processors,
        }
    }
}

#[async_trait]
impl Processor for MulticastProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        for processor in &self.processors {
            let mut copy = exchange.correlated_copy();
            if let Err(e) = processor.process(&mut copy).await {
                exchange.adopt_failure(&copy);
                return Err(e);
            }
            exchange.set_message(copy.message().clone());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Multicast[{}]", self.processors.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{RouteError, runtime::processor_fn};

    fn record(
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    ) -> ProcessorRef {
        processor_fn(name, move |ex| {
            seen.lock().unwrap().push(format!("{}:{}", name, ex.id()));
            ex.set_body(name);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_choice() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let choice = ChoiceProcessor::new(vec![(Predicate::header_equals("k", "a"), record("a", seen.clone()))], Some(record("other", seen.clone())));

        let mut exchange = Exchange::with_body("x");
        exchange.set_header("k", "a");
        choice.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.body_text().as_deref(), Some("a"));

        let mut exchange = Exchange::with_body("x");
        choice.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.body_text().as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn test_filter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let filter = FilterProcessor::new(Predicate::body_contains("camel"), record("hit", seen.clone()));

        let mut exchange = Exchange::with_body("no match");
        filter.process(&mut exchange).await.unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(exchange.property(FILTER_MATCHED), Some(&serde_json::json!(false)));

        let mut exchange = Exchange::with_body("camel rocks");
        filter.process(&mut exchange).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_multicast_uses_copies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let multicast = MulticastProcessor::new(vec![record("a", seen.clone()), record("b", seen.clone())]);

        let mut exchange = Exchange::with_body("x");
        multicast.process(&mut exchange).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|s| !s.ends_with(exchange.id())));
        assert_eq!(exchange.body_text().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_multicast_propagates_first_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let failing = processor_fn("boom", |ex| ex.capture("process1", Err(RouteError::Processing("boom".to_string()))));
        let multicast = MulticastProcessor::new(vec![failing, record("b", seen.clone())]);

        let mut exchange = Exchange::with_body("x");
        assert!(multicast.process(&mut exchange).await.is_err());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(exchange.failure_node_id(), Some("process1"));
    }
}
