use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{NodeDefinition, Predicate};
use crate::{Result, RouteError};

/// The input of a route.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FromDefinition {
    pub uri: String,
}

/// Route scoped interception of sends to matching endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct InterceptSendToEndpointDefinition {
    /// Exact uri, wildcard (`mock:*`) or regex.
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Predicate>,
    #[serde(default)]
    pub skip_send_to_original_endpoint: bool,
    /// Endpoint to send to after the original endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_uri: Option<String>,
    #[serde(default)]
    pub outputs: Vec<NodeDefinition>,
}

/// Sends to endpoints matching `pattern` are copied to `mock:<uri>`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MockEndpointsDefinition {
    pub pattern: String,
    /// Skip the send to the original endpoint.
    #[serde(default)]
    pub skip: bool,
}

/// A route: one input endpoint and an ordered chain of nodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RouteDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<String>,
    #[serde(default, rename = "from", skip_serializing_if = "Option::is_none")]
    pub(crate) input: Option<FromDefinition>,
    #[serde(default)]
    pub(crate) outputs: Vec<NodeDefinition>,
    /// Index of the first top-level output with stream caching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) stream_caching_from: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) intercept_send_to_endpoints: Vec<InterceptSendToEndpointDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) mock_endpoints: Vec<MockEndpointsDefinition>,
}

impl RouteDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            input: Some(FromDefinition {
                uri: uri.into(),
            }),
            ..Default::default()
        }
    }

    /// Load a route from JSON, validated against [`RouteDefinition::schema`].
    pub fn from_json(s: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        jsonschema::validate(&Self::schema(), &value)?;
        let mut route = serde_json::from_value::<RouteDefinition>(value)?;
        mark_custom_ids(&mut route.outputs);
        for intercept in &mut route.intercept_send_to_endpoints {
            mark_custom_ids(&mut intercept.outputs);
        }
        Ok(route)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "from": {
                    "type": "object",
                    "properties": {
                        "uri": { "type": "string", "minLength": 1 }
                    },
                    "required": ["uri"]
                },
                "outputs": {
                    "type": "array",
                    "items": { "$ref": "#/$defs/node" }
                },
                "stream_caching_from": { "type": "integer", "minimum": 0 },
                "intercept_send_to_endpoints": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "uri": { "type": "string" },
                            "skip_send_to_original_endpoint": { "type": "boolean" },
                            "after_uri": { "type": "string" },
                            "outputs": {
                                "type": "array",
                                "items": { "$ref": "#/$defs/node" }
                            }
                        },
                        "required": ["uri"]
                    }
                },
                "mock_endpoints": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "pattern": { "type": "string" },
                            "skip": { "type": "boolean" }
                        },
                        "required": ["pattern"]
                    }
                }
            },
            "$defs": {
                "node": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "type": {
                            "type": "string",
                            "enum": [
                                "to", "wireTap", "choice", "when", "otherwise", "multicast", "filter",
                                "pipeline", "transform", "setBody", "setHeader", "removeHeader",
                                "setProperty", "log", "process", "delay", "throwException", "stop",
                                "onException"
                            ]
                        },
                        "children": {
                            "type": "array",
                            "items": { "$ref": "#/$defs/node" }
                        }
                    },
                    "required": ["type"]
                }
            }
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(
        &mut self,
        id: impl Into<String>,
    ) {
        self.id = Some(id.into());
    }

    pub fn route_id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn input(&self) -> Option<&FromDefinition> {
        self.input.as_ref()
    }

    pub fn input_uri(&self) -> Option<&str> {
        self.input.as_ref().map(|i| i.uri.as_str())
    }

    pub fn set_input(
        &mut self,
        uri: impl Into<String>,
    ) {
        self.input = Some(FromDefinition {
            uri: uri.into(),
        });
    }

    pub fn outputs(&self) -> &[NodeDefinition] {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut Vec<NodeDefinition> {
        &mut self.outputs
    }

    pub fn is_stream_caching(&self) -> bool {
        self.stream_caching_from.is_some()
    }

    /// Enable or disable stream caching for the whole route.
    pub fn set_stream_caching(
        &mut self,
        enabled: bool,
    ) {
        self.stream_caching_from = enabled.then_some(0);
    }

    pub fn stream_caching_from(&self) -> Option<usize> {
        self.stream_caching_from
    }

    /// Cache streams from the top-level output at `index` onwards. An
    /// earlier starting point is kept.
    pub fn enable_stream_caching_from(
        &mut self,
        index: usize,
    ) {
        self.stream_caching_from = Some(self.stream_caching_from.map_or(index, |from| from.min(index)));
    }

    /// Whether the top-level output at `index`, and everything nested in
    /// it, caches stream bodies.
    pub fn caches_streams_at(
        &self,
        index: usize,
    ) -> bool {
        self.stream_caching_from.is_some_and(|from| index >= from)
    }

    /// Keep the caching starting point on the same node after `removed`
    /// top-level outputs at `at` were replaced by `inserted` ones. Nodes
    /// inserted right at the starting point are cached.
    pub(crate) fn shift_stream_caching(
        &mut self,
        at: usize,
        removed: usize,
        inserted: usize,
    ) {
        if let Some(from) = self.stream_caching_from.as_mut()
            && *from > at
        {
            *from = (*from + inserted).saturating_sub(removed).max(at);
        }
    }

    pub fn intercept_send_to_endpoints(&self) -> &[InterceptSendToEndpointDefinition] {
        &self.intercept_send_to_endpoints
    }

    pub fn add_intercept_send_to_endpoint(
        &mut self,
        intercept: InterceptSendToEndpointDefinition,
    ) {
        self.intercept_send_to_endpoints.push(intercept);
    }

    pub fn mock_endpoints(&self) -> &[MockEndpointsDefinition] {
        &self.mock_endpoints
    }

    pub fn add_mock_endpoints(
        &mut self,
        mock: MockEndpointsDefinition,
    ) {
        self.mock_endpoints.push(mock);
    }

    /// A route must have exactly one input.
    pub fn validate(&self) -> Result<()> {
        match &self.input {
            Some(input) if !input.uri.trim().is_empty() => Ok(()),
            _ => Err(RouteError::IllegalArgument(format!("Route {} has no inputs", self.route_id()))),
        }
    }

    /// Visit every node of the chain in depth-first pre-order.
    pub fn walk<'a>(
        &'a self,
        mut f: impl FnMut(&'a NodeDefinition),
    ) {
        for node in &self.outputs {
            node.walk(&mut f);
        }
    }
}

impl fmt::Display for RouteDefinition {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let outputs = self.outputs.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ");
        write!(f, "Route({})[From[{}] -> [{}]]", self.route_id(), self.input_uri().unwrap_or(""), outputs)
    }
}

fn mark_custom_ids(nodes: &mut [NodeDefinition]) {
    for node in nodes {
        node.custom_id = node.id.is_some();
        mark_custom_ids(&mut node.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;

    #[test]
    fn test_validate_requires_input() {
        let mut route = RouteDefinition::new();
        route.set_id("r1");
        let err = route.validate().unwrap_err();
        assert_eq!(err, RouteError::IllegalArgument("Route r1 has no inputs".to_string()));

        route.set_input("direct:start");
        assert!(route.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let route = RouteDefinition::from_json(
            r#"{
                "id": "orders",
                "from": { "uri": "direct:orders" },
                "outputs": [
                    { "type": "to", "uri": "mock:foo", "id": "foo" },
                    { "type": "multicast", "children": [
                        { "type": "to", "uri": "mock:a" },
                        { "type": "setHeader", "name": "x", "expression": { "constant": 1 } }
                    ]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(route.id(), Some("orders"));
        assert_eq!(route.input_uri(), Some("direct:orders"));
        assert_eq!(route.outputs().len(), 2);
        assert!(route.outputs()[0].has_custom_id());
        assert!(matches!(route.outputs()[1].kind(), NodeKind::Multicast));
        assert_eq!(route.to_string(), "Route(orders)[From[direct:orders] -> [To[mock:foo], Multicast[[To[mock:a], SetHeader[x, 1]]]]]");
    }

    #[test]
    fn test_from_json_rejects_unknown_type() {
        let err = RouteDefinition::from_json(r#"{"from": {"uri": "direct:a"}, "outputs": [{"type": "teleport"}]}"#).unwrap_err();
        assert!(matches!(err, RouteError::IllegalArgument(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let mut route = RouteDefinition::from_uri("direct:start");
        route.set_id("r");
        route.outputs_mut().push(NodeDefinition::to("mock:result"));
        let parsed = RouteDefinition::from_json(&route.to_json().unwrap()).unwrap();
        assert_eq!(parsed, route);
    }
}
