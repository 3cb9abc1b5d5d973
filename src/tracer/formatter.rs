use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TraceEventMessage;
use crate::model::value_text;

/// Renders a trace event as a log line.
pub trait TraceFormatter: Send + Sync {
    fn format(
        &self,
        event: &TraceEventMessage,
    ) -> String;
}

/// Log line formatter with independently toggled fields.
///
/// A line reads
/// `In: <exchange id> >>> (route1) mock:foo --> mock:bar <<< Pattern:InOnly, Headers:{}, BodyType:String, Body:Hello`.
/// Lengths of zero leave the breadcrumb and node columns unpadded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultTraceFormatter {
    pub show_breadcrumb: bool,
    pub breadcrumb_length: usize,
    pub show_node: bool,
    pub node_length: usize,
    pub show_route_id: bool,
    pub show_exchange_pattern: bool,
    pub show_properties: bool,
    pub show_headers: bool,
    pub show_body: bool,
    pub show_body_type: bool,
    pub show_out_headers: bool,
    pub show_out_body: bool,
    pub show_out_body_type: bool,
    pub show_exception: bool,
    /// Bodies longer than this are clipped; zero disables clipping.
    pub max_chars: usize,
    pub multiline: bool,
}

impl Default for DefaultTraceFormatter {
    fn default() -> Self {
        Self {
            show_breadcrumb: true,
            breadcrumb_length: 0,
            show_node: true,
            node_length: 0,
            show_route_id: true,
            show_exchange_pattern: true,
            show_properties: false,
            show_headers: true,
            show_body: true,
            show_body_type: true,
            show_out_headers: false,
            show_out_body: false,
            show_out_body_type: false,
            show_exception: true,
            max_chars: 10000,
            multiline: false,
        }
    }
}

impl DefaultTraceFormatter {
    fn clip_body(
        &self,
        body: &str,
    ) -> String {
        let total = body.chars().count();
        if self.max_chars == 0 || total <= self.max_chars {
            return body.to_string();
        }
        let clipped: String = body.chars().take(self.max_chars).collect();
        format!("{}... [Body clipped after {} chars, total length is {}]", clipped, self.max_chars, total)
    }
}

impl TraceFormatter for DefaultTraceFormatter {
    fn format(
        &self,
        event: &TraceEventMessage,
    ) -> String {
        let mut line = format!("{}: ", event.direction);

        if self.show_breadcrumb {
            line.push_str(&fixed(&event.exchange_id, self.breadcrumb_length));
            line.push_str(" >>> ");
        }
        if self.show_route_id && !event.route_id.is_empty() {
            line.push_str(&format!("({}) ", event.route_id));
        }
        if self.show_node {
            let node = format!("{} --> {}", event.previous_node, event.to_node);
            line.push_str(&fixed(&node, self.node_length));
        }

        let mut fields = Vec::new();
        if self.show_exchange_pattern {
            fields.push(format!("Pattern:{}", event.exchange_pattern));
        }
        if self.show_properties {
            fields.push(format!("Properties:{}", render_map(&event.properties)));
        }
        if self.show_headers {
            fields.push(format!("Headers:{}", render_map(&event.headers)));
        }
        if self.show_body_type {
            fields.push(format!("BodyType:{}", event.body_type));
        }
        if self.show_body {
            fields.push(format!("Body:{}", self.clip_body(&event.body)));
        }
        if self.show_out_headers
            && let Some(headers) = &event.out_headers
        {
            fields.push(format!("OutHeaders:{}", render_map(headers)));
        }
        if self.show_out_body_type
            && let Some(body_type) = &event.out_body_type
        {
            fields.push(format!("OutBodyType:{}", body_type));
        }
        if self.show_out_body
            && let Some(body) = &event.out_body
        {
            fields.push(format!("OutBody:{}", self.clip_body(body)));
        }
        if self.show_exception
            && let Some(exception) = &event.caught_exception
        {
            fields.push(format!("Exception:{}", exception));
        }

        if !fields.is_empty() {
            let sep = if self.multiline { "\n\t" } else { ", " };
            line.push_str(" <<< ");
            if self.multiline {
                line.push_str(sep);
            }
            line.push_str(&fields.join(sep));
        }
        line
    }
}

/// Pad or clip to `len` characters; zero keeps the text as is.
fn fixed(
    text: &str,
    len: usize,
) -> String {
    if len == 0 {
        return text.to_string();
    }
    let clipped: String = text.chars().take(len).collect();
    format!("{:<width$}", clipped, width = len)
}

fn render_map(map: &BTreeMap<String, Value>) -> String {
    let entries = map.iter().map(|(k, v)| format!("{}={}", k, value_text(v))).collect::<Vec<_>>().join(", ");
    format!("{{{}}}", entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::NodeDefinition,
        runtime::Exchange,
        tracer::TraceDirection,
    };

    fn event(body: &str) -> TraceEventMessage {
        let mut exchange = Exchange::with_body(body);
        exchange.set_from("route1", "direct:start");
        exchange.set_header("foo", 123);
        let mut event = TraceEventMessage::new(&NodeDefinition::to("mock:foo").with_id("to1"), &exchange, TraceDirection::Complete);
        event.exchange_id = "ID-1".to_string();
        event
    }

    #[test]
    fn test_default_format() {
        let line = DefaultTraceFormatter::default().format(&event("Hello World"));
        assert_eq!(
            line,
            "Complete: ID-1 >>> (route1) from(direct:start) --> mock:foo <<< Pattern:InOnly, Headers:{foo=123}, BodyType:String, Body:Hello World"
        );
    }

    #[test]
    fn test_toggles() {
        let formatter = DefaultTraceFormatter {
            show_breadcrumb: false,
            show_route_id: false,
            show_headers: false,
            show_body_type: false,
            show_exchange_pattern: false,
            max_chars: 5,
            ..Default::default()
        };
        let line = formatter.format(&event("Hello World"));
        assert_eq!(line, "Complete: from(direct:start) --> mock:foo <<< Body:Hello... [Body clipped after 5 chars, total length is 11]");
    }

    #[test]
    fn test_multiline_and_lengths() {
        let formatter = DefaultTraceFormatter {
            breadcrumb_length: 6,
            show_route_id: false,
            node_length: 10,
            multiline: true,
            show_headers: false,
            show_body_type: false,
            ..Default::default()
        };
        let line = formatter.format(&event("Hi"));
        assert_eq!(line, "Complete: ID-1   >>> from(direc <<< \n\tPattern:InOnly\n\tBody:Hi");
    }
}
