use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    Result, RouteError,
    model::{Expression, resolve_simple},
    runtime::{Body, Context, Exchange, Processor, ProcessorRef},
};

fn body_from_value(value: Value) -> Body {
    match value {
        Value::Null => Body::Empty,
        Value::String(s) => Body::Text(s),
        other => Body::Json(other),
    }
}

/// Replaces the body with the value of an expression. Used for both
/// `transform` and `setBody`.
pub struct SetBodyProcessor {
    expression: Expression,
}

impl SetBodyProcessor {
    pub fn new(expression: Expression) -> Self {
        Self {
            expression,
        }
    }
}

#[async_trait]
impl Processor for SetBodyProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let value = self.expression.evaluate(exchange)?;
        exchange.set_body(body_from_value(value));
        Ok(())
    }

    fn describe(&self) -> String {
        format!("SetBody[{}]", self.expression)
    }
}

pub struct SetHeaderProcessor {
    name: String,
    expression: Expression,
}

impl SetHeaderProcessor {
    pub fn new(
        name: String,
        expression: Expression,
    ) -> Self {
        Self {
            name,
            expression,
        }
    }
}

#[async_trait]
impl Processor for SetHeaderProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let value = self.expression.evaluate(exchange)?;
        exchange.set_header(self.name.clone(), value);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("SetHeader[{}]", self.name)
    }
}

pub struct RemoveHeaderProcessor {
    name: String,
}

impl RemoveHeaderProcessor {
    pub fn new(name: String) -> Self {
        Self {
            name,
        }
    }
}

#[async_trait]
impl Processor for RemoveHeaderProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        exchange.message_mut().remove_header(&self.name);
        Ok(())
    }
}

pub struct SetPropertyProcessor {
    name: String,
    expression: Expression,
}

impl SetPropertyProcessor {
    pub fn new(
        name: String,
        expression: Expression,
    ) -> Self {
        Self {
            name,
            expression,
        }
    }
}

#[async_trait]
impl Processor for SetPropertyProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let value = self.expression.evaluate(exchange)?;
        exchange.set_property(self.name.clone(), value);
        Ok(())
    }
}

/// Logs a simple template.
pub struct LogProcessor {
    node_id: String,
    message: String,
    context: Context,
}

impl LogProcessor {
    pub fn new(
        node_id: String,
        message: String,
        context: Context,
    ) -> Self {
        Self {
            node_id,
            message,
            context,
        }
    }
}

#[async_trait]
impl Processor for LogProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        let content = resolve_simple(exchange, &self.message)?;
        tracing::info!(route_id = exchange.from_route_id().unwrap_or_default(), node_id = %self.node_id, "{}", content);
        self.context.emit_log(exchange, &self.node_id, content);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Log[{}]", self.message)
    }
}

pub struct DelayProcessor {
    millis: u64,
}

impl DelayProcessor {
    pub fn new(millis: u64) -> Self {
        Self {
            millis,
        }
    }
}

#[async_trait]
impl Processor for DelayProcessor {
    async fn process(
        &self,
        _exchange: &mut Exchange,
    ) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Delay[{}]", self.millis)
    }
}

pub struct ThrowExceptionProcessor {
    ecode: String,
    message: String,
}

impl ThrowExceptionProcessor {
    pub fn new(
        ecode: String,
        message: String,
    ) -> Self {
        Self {
            ecode,
            message,
        }
    }
}

#[async_trait]
impl Processor for ThrowExceptionProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        Err(RouteError::Exception {
            ecode: self.ecode.clone(),
            message: resolve_simple(exchange, &self.message)?,
        })
    }

    fn describe(&self) -> String {
        format!("ThrowException[{}]", self.ecode)
    }
}

/// Marks the exchange to stop routing.
pub struct StopProcessor;

#[async_trait]
impl Processor for StopProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        exchange.set_route_stop(true);
        Ok(())
    }

    fn describe(&self) -> String {
        "Stop".to_string()
    }
}

/// Calls a processor bound on the engine, looked up when the route is built.
pub struct BeanProcessor {
    name: String,
    delegate: ProcessorRef,
}

impl BeanProcessor {
    pub fn new(
        name: String,
        delegate: ProcessorRef,
    ) -> Self {
        Self {
            name,
            delegate,
        }
    }
}

#[async_trait]
impl Processor for BeanProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        self.delegate.process(exchange).await
    }

    fn describe(&self) -> String {
        format!("ref:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_set_body_from_simple() {
        let mut exchange = Exchange::with_body("World");
        SetBodyProcessor::new(Expression::simple("Hello ${body}")).process(&mut exchange).await.unwrap();
        assert_eq!(exchange.body_text().as_deref(), Some("Hello World"));

        SetBodyProcessor::new(Expression::constant(json!({"a": 1}))).process(&mut exchange).await.unwrap();
        assert!(matches!(exchange.body(), Body::Json(_)));
    }

    #[tokio::test]
    async fn test_headers_and_properties() {
        let mut exchange = Exchange::with_body("x");
        SetHeaderProcessor::new("h".to_string(), Expression::constant(1)).process(&mut exchange).await.unwrap();
        SetPropertyProcessor::new("p".to_string(), Expression::header("h")).process(&mut exchange).await.unwrap();
        assert_eq!(exchange.property("p"), Some(&json!(1)));

        RemoveHeaderProcessor::new("h".to_string()).process(&mut exchange).await.unwrap();
        assert!(exchange.header("h").is_none());
    }

    #[tokio::test]
    async fn test_throw_exception() {
        let mut exchange = Exchange::with_body("Camel");
        let err = ThrowExceptionProcessor::new("E1".to_string(), "Damn ${body}".to_string()).process(&mut exchange).await.unwrap_err();
        assert_eq!(
            err,
            RouteError::Exception {
                ecode: "E1".to_string(),
                message: "Damn Camel".to_string()
            }
        );
    }
}
