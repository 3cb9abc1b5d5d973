use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{Result, runtime::Exchange};

/// A step of work applied to an exchange.
///
/// Processors are shared between concurrent exchanges and must be
/// stateless or internally synchronized.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()>;

    /// Short description used in logs and breakpoints.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().rsplit("::").next().unwrap_or_default().to_string()
    }
}

pub type ProcessorRef = Arc<dyn Processor>;

impl fmt::Debug for dyn Processor {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Processor backed by a synchronous closure.
pub struct FnProcessor<F> {
    name: String,
    f: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&mut Exchange) -> Result<()> + Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        f: F,
    ) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Processor for FnProcessor<F>
where
    F: Fn(&mut Exchange) -> Result<()> + Send + Sync + 'static,
{
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        (self.f)(exchange)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Wrap a closure as a shared processor.
pub fn processor_fn<F>(
    name: impl Into<String>,
    f: F,
) -> ProcessorRef
where
    F: Fn(&mut Exchange) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnProcessor::new(name, f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteError;

    #[tokio::test]
    async fn test_fn_processor() {
        let p = processor_fn("upper", |ex| {
            let text = ex.body_text().ok_or_else(|| RouteError::Processing("no body".to_string()))?;
            ex.set_body(text.to_uppercase());
            Ok(())
        });
        let mut exchange = Exchange::with_body("hello");
        p.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.body_text().as_deref(), Some("HELLO"));
        assert_eq!(p.describe(), "upper");

        let mut empty = Exchange::default();
        assert!(p.process(&mut empty).await.is_err());
    }
}
