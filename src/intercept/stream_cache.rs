use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    model::RouteDefinition,
    runtime::{Body, Exchange, Processor, ProcessorRef},
};

/// Caches stream bodies in memory so they can be read more than once.
///
/// Applies to every node when enabled globally. Otherwise a route caches
/// from the point stream caching was enabled in its definition: the
/// top-level output at that index, the outputs after it, and everything
/// nested in them.
pub struct StreamCachingStrategy {
    global: bool,
}

impl StreamCachingStrategy {
    pub fn new(global: bool) -> Self {
        Self {
            global,
        }
    }

    /// Whether nodes under the top-level output at `position` are cached.
    pub fn applies(
        &self,
        route: &RouteDefinition,
        position: usize,
    ) -> bool {
        self.global || route.caches_streams_at(position)
    }

    pub fn wrap(
        &self,
        route: &RouteDefinition,
        position: usize,
        target: ProcessorRef,
    ) -> ProcessorRef {
        if self.applies(route, position) {
            Arc::new(StreamCacheProcessor {
                target,
            })
        } else {
            target
        }
    }
}

pub struct StreamCacheProcessor {
    target: ProcessorRef,
}

#[async_trait]
impl Processor for StreamCacheProcessor {
    async fn process(
        &self,
        exchange: &mut Exchange,
    ) -> Result<()> {
        if let Body::Stream(stream) = exchange.body() {
            let cached = stream.read_all()?;
            exchange.set_body(Body::Bytes(cached));
        }
        self.target.process(exchange).await
    }

    fn describe(&self) -> String {
        self.target.describe()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::runtime::{StreamBody, processor_fn};

    #[tokio::test]
    async fn test_stream_is_cached_before_target() {
        let route = RouteDefinition::from_uri("direct:start");
        let target = processor_fn("read twice", |ex| {
            assert_eq!(ex.body_text().as_deref(), Some("payload"));
            assert_eq!(ex.body_text().as_deref(), Some("payload"));
            Ok(())
        });

        let wrapped = StreamCachingStrategy::new(true).wrap(&route, 0, target);
        let mut exchange = Exchange::with_body(StreamBody::new(Cursor::new(b"payload".to_vec())));
        wrapped.process(&mut exchange).await.unwrap();
        assert!(matches!(exchange.body(), Body::Bytes(_)));
    }

    #[test]
    fn test_disabled_returns_target() {
        let route = RouteDefinition::from_uri("direct:start");
        let target = processor_fn("t", |_| Ok(()));
        let wrapped = StreamCachingStrategy::new(false).wrap(&route, 0, target.clone());
        assert!(Arc::ptr_eq(&wrapped, &target));
    }

    #[test]
    fn test_route_caches_from_enabled_position() {
        let mut route = RouteDefinition::from_uri("direct:start");
        route.enable_stream_caching_from(1);
        let strategy = StreamCachingStrategy::new(false);
        assert!(!strategy.applies(&route, 0));
        assert!(strategy.applies(&route, 1));
        assert!(strategy.applies(&route, 2));

        route.set_stream_caching(true);
        assert!(strategy.applies(&route, 0));
    }
}
