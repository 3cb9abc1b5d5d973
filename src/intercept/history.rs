use std::time::Instant;

use async_trait::async_trait;

use crate::{
    Result,
    runtime::{Exchange, MessageHistory, Processor, ProcessorRef},
    utils,
};

/// Records a message history entry for its node on every exchange.
pub struct MessageHistoryProcessor {
    route_id: String,
    node_id: String,
    label: String,
    enabled: bool,
    target: ProcessorRef,
}

impl MessageHistoryProcessor {
    pub fn new(
        route_id: &str,
        node_id: &str,
        label: &str,
        enabled: bool,
        target: ProcessorRef,
    ) -> Self {
        Self {
            route_id: route_id.to_string(),
            node_id: node_id.to_string(),
            label: label.to_string(),
            enabled,
            target,
        }
    }
}

#[async_trait]
impl Processor for MessageHistoryProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        if !self.enabled {
            let result = self.target.process(exchange).await;
            return exchange.capture(&self.node_id, result);
        }

        let index = exchange.history().len();
        exchange.push_history(MessageHistory {
            route_id: self.route_id.clone(),
            node_id: self.node_id.clone(),
            label: self.label.clone(),
            timestamp: utils::time::now(),
            elapsed_millis: 0,
        });

        let start = Instant::now();
        let result = self.target.process(exchange).await;
        exchange.set_history_elapsed(index, start.elapsed().as_millis() as i64);

        tracing::trace!(route_id = %self.route_id, node_id = %self.node_id, "processed {}", self.label);
        exchange.capture(&self.node_id, result)
    }

    fn describe(&self) -> String {
        self.target.describe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{RouteError, runtime::processor_fn};

    #[tokio::test]
    async fn test_history_is_recorded_in_entry_order() {
        let inner = Arc::new(MessageHistoryProcessor::new("r1", "to2", "mock:b", true, processor_fn("b", |_| Ok(()))));
        let outer = MessageHistoryProcessor::new(
            "r1",
            "pipeline1",
            "pipeline",
            true,
            Arc::new(MessageHistoryProcessor::new("r1", "to1", "mock:a", true, inner)),
        );

        let mut exchange = Exchange::with_body("x");
        outer.process(&mut exchange).await.unwrap();
        let ids: Vec<&str> = exchange.history().iter().map(|h| h.node_id.as_str()).collect();
        assert_eq!(ids, vec!["pipeline1", "to1", "to2"]);
    }

    #[tokio::test]
    async fn test_error_is_captured() {
        let p = MessageHistoryProcessor::new("r1", "process1", "ref:boom", false, processor_fn("boom", |_| Err(RouteError::Processing("boom".to_string()))));
        let mut exchange = Exchange::with_body("x");
        assert!(p.process(&mut exchange).await.is_err());
        assert_eq!(exchange.failure_node_id(), Some("process1"));
        assert!(exchange.history().is_empty());
    }
}
