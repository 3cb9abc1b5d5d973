use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    model::NodeDefinition,
    runtime::{Body, Exchange, Message, TRACE_EVENT},
    utils,
};

pub const STREAM_BODY_PLACEHOLDER: &str = "[Body is stream based]";
pub const NULL_BODY_PLACEHOLDER: &str = "[Body is null]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr, strum::Display)]
pub enum TraceDirection {
    In,
    Out,
    Complete,
}

/// Snapshot of an exchange at one traced node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEventMessage {
    pub uid: String,
    pub timestamp: DateTime<Utc>,
    pub route_id: String,
    pub from_endpoint_uri: String,
    pub previous_node: String,
    pub to_node: String,
    pub to_node_id: String,
    pub exchange_id: String,
    pub exchange_pattern: String,
    pub direction: TraceDirection,
    pub properties: BTreeMap<String, Value>,
    pub headers: BTreeMap<String, Value>,
    pub body: String,
    pub body_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_headers: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_body_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caught_exception: Option<String>,
}

impl TraceEventMessage {
    /// Snapshot the exchange as it is now.
    pub fn new(
        node: &NodeDefinition,
        exchange: &Exchange,
        direction: TraceDirection,
    ) -> Self {
        let node_id = node.id().unwrap_or_default().to_string();
        let message = exchange.message();
        Self {
            uid: utils::shortid(),
            timestamp: utils::time::now(),
            route_id: exchange.from_route_id().unwrap_or_default().to_string(),
            from_endpoint_uri: exchange.from_endpoint().unwrap_or_default().to_string(),
            previous_node: previous_node(exchange, &node_id),
            to_node: node.label(),
            to_node_id: node_id,
            exchange_id: exchange.id().to_string(),
            exchange_pattern: exchange.pattern().as_ref().to_string(),
            direction,
            properties: exchange.properties().iter().filter(|(k, _)| k.as_str() != TRACE_EVENT).map(|(k, v)| (k.clone(), v.clone())).collect(),
            headers: message.headers().clone(),
            body: render_body(message.body()),
            body_type: message.body().type_name().to_string(),
            out_headers: None,
            out_body: None,
            out_body_type: None,
            caught_exception: exchange.exception().map(|e| e.to_string()),
        }
    }

    /// Out event for the same node: the in snapshot plus the message now.
    pub fn out_of(
        incoming: &TraceEventMessage,
        exchange: &Exchange,
    ) -> Self {
        let message: &Message = exchange.message();
        Self {
            uid: utils::shortid(),
            timestamp: utils::time::now(),
            direction: TraceDirection::Out,
            out_headers: Some(message.headers().clone()),
            out_body: Some(render_body(message.body())),
            out_body_type: Some(message.body().type_name().to_string()),
            caught_exception: exchange.exception().map(|e| e.to_string()),
            ..incoming.clone()
        }
    }
}

/// Render a body for tracing without consuming it.
pub fn render_body(body: &Body) -> String {
    match body {
        Body::Empty => NULL_BODY_PLACEHOLDER.to_string(),
        Body::Stream(_) => STREAM_BODY_PLACEHOLDER.to_string(),
        Body::Json(Value::String(s)) => s.clone(),
        Body::Text(s) => s.clone(),
        other => match other.to_json() {
            Value::String(s) => s,
            v => v.to_string(),
        },
    }
}

/// Label of the node visited before `node_id`, or the route input.
fn previous_node(
    exchange: &Exchange,
    node_id: &str,
) -> String {
    let history = exchange.history();
    let current = history.iter().rposition(|h| h.node_id == node_id);
    match current {
        Some(index) if index > 0 => history[index - 1].label.clone(),
        _ => format!("from({})", exchange.from_endpoint().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::runtime::{MessageHistory, StreamBody};

    fn history(
        node_id: &str,
        label: &str,
    ) -> MessageHistory {
        MessageHistory {
            route_id: "route1".to_string(),
            node_id: node_id.to_string(),
            label: label.to_string(),
            timestamp: utils::time::now(),
            elapsed_millis: 0,
        }
    }

    #[test]
    fn test_stream_body_is_not_consumed() {
        let stream = StreamBody::new(Cursor::new(b"payload".to_vec()));
        assert_eq!(render_body(&Body::Stream(stream.clone())), STREAM_BODY_PLACEHOLDER);
        assert!(!stream.is_consumed());
        assert_eq!(render_body(&Body::Bytes(b"hi".to_vec())), "aGk=");
        assert_eq!(render_body(&Body::Empty), NULL_BODY_PLACEHOLDER);
    }

    #[test]
    fn test_previous_node() {
        let mut exchange = Exchange::with_body("Hello");
        exchange.set_from("route1", "direct:start");
        let foo = NodeDefinition::to("mock:foo").with_id("to1");
        let bar = NodeDefinition::to("mock:bar").with_id("to2");

        exchange.push_history(history("to1", "mock:foo"));
        assert_eq!(TraceEventMessage::new(&foo, &exchange, TraceDirection::In).previous_node, "from(direct:start)");

        exchange.push_history(history("to2", "mock:bar"));
        let event = TraceEventMessage::new(&bar, &exchange, TraceDirection::In);
        assert_eq!(event.previous_node, "mock:foo");
        assert_eq!(event.to_node, "mock:bar");
        assert_eq!(event.route_id, "route1");
        assert_eq!(event.body, "Hello");
        assert_eq!(event.body_type, "String");
    }

    #[test]
    fn test_out_event_keeps_in_snapshot() {
        let node = NodeDefinition::to("mock:foo").with_id("to1");
        let mut exchange = Exchange::with_body("in");
        let incoming = TraceEventMessage::new(&node, &exchange, TraceDirection::In);
        exchange.set_body("out");

        let out = TraceEventMessage::out_of(&incoming, &exchange);
        assert_eq!(out.direction, TraceDirection::Out);
        assert_eq!(out.body, "in");
        assert_eq!(out.out_body.as_deref(), Some("out"));
        assert_ne!(out.uid, incoming.uid);
    }
}
