use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::{Config, Engine, Result, intercept::InterceptStrategy};

/// Builds an [`Engine`].
///
/// ```rust,ignore
/// let engine = EngineBuilder::new()
///     .tracing(true)
///     .trace_destination("seda:traced")
///     .debugging(true)
///     .build()?;
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    strategies: Vec<Arc<dyn InterceptStrategy>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration. Call before the other setters.
    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn tracing(
        mut self,
        enabled: bool,
    ) -> Self {
        self.config.tracer.enabled = enabled;
        self
    }

    pub fn trace_out_exchanges(
        mut self,
        enabled: bool,
    ) -> Self {
        self.config.tracer.trace_out_exchanges = enabled;
        self
    }

    /// Endpoint receiving every trace event as JSON.
    pub fn trace_destination(
        mut self,
        uri: impl Into<String>,
    ) -> Self {
        self.config.tracer.destination_uri = Some(uri.into());
        self
    }

    pub fn debugging(
        mut self,
        enabled: bool,
    ) -> Self {
        self.config.debugger.enabled = enabled;
        self
    }

    pub fn stream_caching(
        mut self,
        enabled: bool,
    ) -> Self {
        self.config.stream_caching = enabled;
        self
    }

    /// Register a custom strategy, woven outside the tracer and debugger.
    pub fn intercept_strategy(
        mut self,
        strategy: Arc<dyn InterceptStrategy>,
    ) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn build(self) -> Result<Engine> {
        if self.config.async_worker_thread_number == 0 {
            return Err(crate::RouteError::Config("async_worker_thread_number must be at least 1".to_string()));
        }
        Engine::new(self.config, self.rt, self.strategies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteError;

    #[tokio::test]
    async fn test_builder_applies_config() {
        let engine = EngineBuilder::new().tracing(true).trace_out_exchanges(true).debugging(true).build().unwrap();
        assert!(engine.tracer().is_enabled());
        assert!(engine.tracer().is_trace_out_exchanges());
        assert!(engine.debugger().is_enabled());
        assert!(engine.config().message_history);
    }

    #[test]
    fn test_builder_rejects_zero_threads() {
        assert!(matches!(EngineBuilder::new().async_worker_thread_number(0).build(), Err(RouteError::Config(_))));
    }

    #[test]
    fn test_builder_owns_runtime_outside_tokio() {
        let engine = EngineBuilder::new().async_worker_thread_number(2).build().unwrap();
        assert!(!engine.is_running());
    }
}
