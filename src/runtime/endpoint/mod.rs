//! Endpoints, components, and the endpoint registry.
//!
//! Built-in components:
//! - `direct`: synchronous in-line call of the consuming route
//! - `mock`: records exchanges and asserts expectations
//! - `seda`: bounded in-memory queue consumed by a background task
//! - `log`: logs exchanges through `tracing`

mod direct;
mod log;
mod mock;
mod seda;
mod uri;

use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, RwLock},
};

pub use direct::DirectComponent;
pub use log::LogComponent;
pub use mock::{MockComponent, MockEndpoint};
pub use seda::SedaComponent;
pub use uri::{EndpointUri, matches_endpoint, normalize_uri};

use crate::{Result, RouteError, ShareLock, runtime::ProcessorRef};

/// A consumer feeding exchanges from an endpoint into a route.
pub trait Consumer: Send + Sync {
    fn start(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
}

/// An addressable message source and/or destination.
pub trait Endpoint: Send + Sync {
    fn uri(&self) -> &str;

    /// Processor sending exchanges to this endpoint.
    fn create_producer(&self) -> Result<ProcessorRef>;

    /// Consumer delivering exchanges from this endpoint to `processor`.
    fn create_consumer(
        &self,
        processor: ProcessorRef,
    ) -> Result<Box<dyn Consumer>>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Factory of endpoints for one uri scheme.
pub trait Component: Send + Sync {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
    ) -> Result<Arc<dyn Endpoint>>;
}

/// Components by scheme and the endpoints created so far.
pub struct EndpointRegistry {
    components: ShareLock<HashMap<String, Arc<dyn Component>>>,
    endpoints: ShareLock<HashMap<String, Arc<dyn Endpoint>>>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            endpoints: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn add_component(
        &self,
        scheme: impl Into<String>,
        component: Arc<dyn Component>,
    ) {
        self.components.write().unwrap().insert(scheme.into(), component);
    }

    pub fn has_component(
        &self,
        scheme: &str,
    ) -> bool {
        self.components.read().unwrap().contains_key(scheme)
    }

    /// Get the endpoint for `uri`, creating it through its component.
    pub fn resolve(
        &self,
        uri: &str,
    ) -> Result<Arc<dyn Endpoint>> {
        let parsed = EndpointUri::parse(uri)?;
        let key = parsed.normalized();
        if let Some(endpoint) = self.endpoints.read().unwrap().get(&key) {
            return Ok(endpoint.clone());
        }

        let component = self.components.read().unwrap().get(parsed.scheme()).cloned().ok_or_else(|| RouteError::ResolveEndpointFailed {
            uri: uri.to_string(),
            message: format!("No component found with scheme: {}", parsed.scheme()),
        })?;

        let mut endpoints = self.endpoints.write().unwrap();
        if let Some(endpoint) = endpoints.get(&key) {
            return Ok(endpoint.clone());
        }
        let endpoint = component.create_endpoint(&parsed).map_err(|e| match e {
            e @ RouteError::ResolveEndpointFailed {
                ..
            } => e,
            other => RouteError::ResolveEndpointFailed {
                uri: uri.to_string(),
                message: other.to_string(),
            },
        })?;
        tracing::debug!(uri = %key, "endpoint created");
        endpoints.insert(key, endpoint.clone());
        Ok(endpoint)
    }

    /// Get an existing endpoint without creating it.
    pub fn lookup(
        &self,
        uri: &str,
    ) -> Option<Arc<dyn Endpoint>> {
        self.endpoints.read().unwrap().get(&normalize_uri(uri)).cloned()
    }

    pub fn has_endpoint(
        &self,
        uri: &str,
    ) -> bool {
        self.lookup(uri).is_some()
    }

    pub fn remove(
        &self,
        uri: &str,
    ) -> Option<Arc<dyn Endpoint>> {
        self.endpoints.write().unwrap().remove(&normalize_uri(uri))
    }

    /// Normalized uris of every endpoint created so far.
    pub fn endpoint_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.endpoints.read().unwrap().keys().cloned().collect();
        uris.sort();
        uris
    }

    pub fn mock(
        &self,
        uri: &str,
    ) -> Result<Arc<MockEndpoint>> {
        self.resolve(uri)?.into_any().downcast::<MockEndpoint>().map_err(|_| RouteError::IllegalArgument(format!("{} is not a mock endpoint", uri)))
    }
}
