use std::{sync::Arc, time::Instant};

use async_trait::async_trait;

use super::Debugger;
use crate::{
    Result,
    intercept::InterceptStrategy,
    model::{NodeDefinition, RouteDefinition},
    runtime::{Exchange, Processor, ProcessorRef},
};

/// Wraps every node so the debugger sees it before and after it runs.
pub struct DebuggerStrategy {
    debugger: Arc<Debugger>,
}

impl DebuggerStrategy {
    pub fn new(debugger: Arc<Debugger>) -> Self {
        Self {
            debugger,
        }
    }
}

impl InterceptStrategy for DebuggerStrategy {
    fn wrap(
        &self,
        _route: &RouteDefinition,
        node: &NodeDefinition,
        target: ProcessorRef,
    ) -> Result<ProcessorRef> {
        Ok(Arc::new(DebugProcessor {
            debugger: self.debugger.clone(),
            node: node.clone(),
            target,
        }))
    }
}

pub struct DebugProcessor {
    debugger: Arc<Debugger>,
    node: NodeDefinition,
    target: ProcessorRef,
}

#[async_trait]
impl Processor for DebugProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        if !self.debugger.is_enabled() {
            return self.target.process(exchange).await;
        }

        self.debugger.before_process(exchange, self.target.as_ref(), &self.node)?;
        let start = Instant::now();
        let result = self.target.process(exchange).await;
        let result = exchange.capture(self.node.id().unwrap_or_default(), result);
        let after = self.debugger.after_process(exchange, self.target.as_ref(), &self.node, start.elapsed());
        result.and(after)
    }

    fn describe(&self) -> String {
        self.target.describe()
    }
}
