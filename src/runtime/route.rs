use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::{
    Result, RouteError,
    events::ExchangeEvent,
    model::RouteDefinition,
    runtime::{
        Context, EXCEPTION_CAUGHT, Exchange, Processor, ProcessorRef,
        endpoint::{Consumer, Endpoint},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
pub enum RouteStatus {
    Started,
    Stopped,
}

/// A route level `onException` clause.
pub struct OnExceptionClause {
    exceptions: Vec<String>,
    handled: bool,
    processor: ProcessorRef,
}

impl OnExceptionClause {
    pub fn new(
        exceptions: Vec<String>,
        handled: bool,
        processor: ProcessorRef,
    ) -> Self {
        Self {
            exceptions,
            handled,
            processor,
        }
    }

    /// Matches on the error code, the error kind, or a message fragment.
    pub fn matches(
        &self,
        error: &RouteError,
    ) -> bool {
        let message = error.to_string();
        self.exceptions.iter().any(|e| e == error.code() || e == error.as_ref() || message.contains(e.as_str()))
    }
}

/// Entry processor of a route: runs the steps and applies the route's
/// exception clauses.
///
/// The route an exchange enters first owns its lifecycle and reports the
/// `Created`, `Completed` and `Failed` events.
pub struct RouteProcessor {
    route_id: String,
    from_uri: String,
    pipeline: ProcessorRef,
    clauses: Vec<OnExceptionClause>,
    context: Context,
}

impl RouteProcessor {
    pub fn new(
        route_id: &str,
        from_uri: &str,
        pipeline: ProcessorRef,
        clauses: Vec<OnExceptionClause>,
        context: Context,
    ) -> Self {
        Self {
            route_id: route_id.to_string(),
            from_uri: from_uri.to_string(),
            pipeline,
            clauses,
            context,
        }
    }

    async fn handle(
        &self,
        exchange: &mut Exchange,
        error: RouteError,
    ) -> Result<()> {
        let Some(clause) = self.clauses.iter().find(|c| c.matches(&error)) else {
            return Err(error);
        };

        tracing::debug!(route_id = %self.route_id, exchange_id = %exchange.id(), "onException caught: {}", error);
        exchange.take_exception();
        exchange.set_property(EXCEPTION_CAUGHT, error.to_string());
        clause.processor.process(exchange).await?;

        if clause.handled {
            Ok(())
        } else {
            exchange.set_exception(error.clone());
            Err(error)
        }
    }
}

#[async_trait]
impl Processor for RouteProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let first = exchange.from_route_id().is_none();
        if first {
            exchange.set_from(&self.route_id, &self.from_uri);
            if let Err(e) = self.context.notify(exchange, &self.route_id, ExchangeEvent::Created) {
                // the exchange ends here, so listeners still see it finish
                if let Err(failed) = self.context.notify(exchange, &self.route_id, ExchangeEvent::Failed(e.clone())) {
                    tracing::debug!(route_id = %self.route_id, exchange_id = %exchange.id(), "failed event rejected: {}", failed);
                }
                return Err(e);
            }
        }

        let result = match self.pipeline.process(exchange).await {
            Err(e) => self.handle(exchange, e).await,
            ok => ok,
        };

        if !first {
            return result;
        }
        let event = match &result {
            Ok(_) => ExchangeEvent::Completed,
            Err(e) => ExchangeEvent::Failed(e.clone()),
        };
        let notified = self.context.notify(exchange, &self.route_id, event);
        result.and(notified)
    }

    fn describe(&self) -> String {
        format!("Route[{}]", self.route_id)
    }
}

/// A built route: its definition, input endpoint and entry processor.
pub struct Route {
    definition: RouteDefinition,
    endpoint: Arc<dyn Endpoint>,
    processor: ProcessorRef,
    endpoint_uris: Vec<String>,
    consumer: Mutex<Option<Box<dyn Consumer>>>,
    status: RwLock<RouteStatus>,
}

impl Route {
    pub fn new(
        definition: RouteDefinition,
        endpoint: Arc<dyn Endpoint>,
        processor: ProcessorRef,
        endpoint_uris: Vec<String>,
    ) -> Self {
        Self {
            definition,
            endpoint,
            processor,
            endpoint_uris,
            consumer: Mutex::new(None),
            status: RwLock::new(RouteStatus::Stopped),
        }
    }

    pub fn id(&self) -> &str {
        self.definition.route_id()
    }

    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    pub fn endpoint(&self) -> Arc<dyn Endpoint> {
        self.endpoint.clone()
    }

    pub fn processor(&self) -> ProcessorRef {
        self.processor.clone()
    }

    /// Uris of every endpoint the route resolved, input first.
    pub fn endpoint_uris(&self) -> &[String] {
        &self.endpoint_uris
    }

    pub fn status(&self) -> RouteStatus {
        *self.status.read().unwrap()
    }

    /// Start consuming from the input endpoint.
    pub fn start(&self) -> Result<()> {
        let mut consumer = self.consumer.lock().unwrap();
        if consumer.is_some() {
            return Ok(());
        }
        let created = self.endpoint.create_consumer(self.processor.clone())?;
        created.start()?;
        *consumer = Some(created);
        *self.status.write().unwrap() = RouteStatus::Started;
        tracing::info!(route_id = %self.id(), "route started and consuming from: {}", self.endpoint.uri());
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        let consumer = self.consumer.lock().unwrap().take();
        if let Some(consumer) = consumer {
            consumer.stop()?;
            tracing::info!(route_id = %self.id(), "route stopped");
        }
        *self.status.write().unwrap() = RouteStatus::Stopped;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::runtime::Handle;

    use super::*;
    use crate::{
        Config,
        runtime::{ProducerTemplate, processor_fn},
    };

    fn failing(error: RouteError) -> ProcessorRef {
        processor_fn("fail", move |ex| ex.capture("process1", Err(error.clone())))
    }

    fn exception(code: &str) -> RouteError {
        RouteError::Exception {
            ecode: code.to_string(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_clause_matching() {
        let clause = OnExceptionClause::new(vec!["E1".to_string(), "NoConsumer".to_string()], true, processor_fn("noop", |_| Ok(())));
        assert!(clause.matches(&exception("E1")));
        assert!(clause.matches(&RouteError::NoConsumer("direct:x".to_string())));
        assert!(!clause.matches(&exception("E2")));
    }

    #[tokio::test]
    async fn test_handled_exception() {
        let context = Context::new(Config::default(), Handle::current());
        let handler = processor_fn("handler", |ex| {
            ex.set_body("handled");
            Ok(())
        });
        let processor = RouteProcessor::new(
            "r1",
            "direct:start",
            failing(exception("E1")),
            vec![OnExceptionClause::new(vec!["E1".to_string()], true, handler)],
            context,
        );

        let mut exchange = Exchange::with_body("x");
        processor.process(&mut exchange).await.unwrap();
        assert!(!exchange.is_failed());
        assert_eq!(exchange.body_text().as_deref(), Some("handled"));
        assert!(exchange.property(EXCEPTION_CAUGHT).is_some());
        assert_eq!(exchange.from_route_id(), Some("r1"));
    }

    #[tokio::test]
    async fn test_unhandled_exception_is_rethrown() {
        let context = Context::new(Config::default(), Handle::current());
        let processor = RouteProcessor::new(
            "r1",
            "direct:start",
            failing(exception("E1")),
            vec![OnExceptionClause::new(vec!["E1".to_string()], false, processor_fn("noop", |_| Ok(())))],
            context,
        );

        let mut exchange = Exchange::with_body("x");
        assert_eq!(processor.process(&mut exchange).await, Err(exception("E1")));
        assert_eq!(exchange.exception(), Some(&exception("E1")));
    }

    #[tokio::test]
    async fn test_start_and_stop_route() {
        let context = Context::new(Config::default(), Handle::current());
        let endpoint = context.endpoints().resolve("direct:start").unwrap();
        let processor = Arc::new(RouteProcessor::new(
            "r1",
            "direct:start",
            processor_fn("upper", |ex| {
                let body = ex.body_text().unwrap_or_default();
                ex.set_body(body.to_uppercase());
                Ok(())
            }),
            Vec::new(),
            context.clone(),
        ));
        let route = Route::new(RouteDefinition::from_uri("direct:start"), endpoint, processor, vec!["direct:start".to_string()]);
        let template = ProducerTemplate::new(context);

        route.start().unwrap();
        assert_eq!(route.status(), RouteStatus::Started);
        assert_eq!(template.request_body("direct:start", "hi").await.unwrap().as_text().as_deref(), Some("HI"));

        route.stop().unwrap();
        assert_eq!(route.status(), RouteStatus::Stopped);
        assert!(matches!(template.send_body("direct:start", "hi").await, Err(RouteError::NoConsumer(_))));
    }
}
