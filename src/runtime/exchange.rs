//! Exchanges and messages flowing through routes.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    io::Read,
    sync::{Arc, Mutex},
};

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, RouteError, utils};

/// exchange id
pub type ExchangeId = String;

/// Property holding the message of an exception handled by `onException`.
pub const EXCEPTION_CAUGHT: &str = "CamelExceptionCaught";
/// Property holding the id of the exchange a copy was correlated from.
pub const CORRELATION_ID: &str = "CamelCorrelationId";
/// Property set on exchanges created by the trace dispatcher.
pub const TRACE_EVENT: &str = "CamelTraceEvent";
/// Property recording whether the last filter matched.
pub const FILTER_MATCHED: &str = "CamelFilterMatched";
/// Header recording the endpoint an intercepted exchange was sent to.
pub const INTERCEPTED_ENDPOINT: &str = "CamelInterceptedEndpoint";

/// Message exchange pattern.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::Display, strum::EnumString)]
pub enum ExchangePattern {
    #[default]
    InOnly,
    InOut,
}

/// A non re-readable body, consumed on first read.
#[derive(Clone, Default)]
pub struct StreamBody {
    reader: Arc<Mutex<Option<Box<dyn Read + Send>>>>,
}

impl StreamBody {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Some(Box::new(reader)))),
        }
    }

    /// Read the whole stream. A second read yields an empty buffer.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut guard = self.reader.lock().unwrap();
        let mut buf = Vec::new();
        if let Some(mut reader) = guard.take() {
            reader.read_to_end(&mut buf)?;
        }
        Ok(buf)
    }

    /// Returns true once the stream has been read.
    pub fn is_consumed(&self) -> bool {
        self.reader.lock().unwrap().is_none()
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("StreamBody").field("consumed", &self.is_consumed()).finish()
    }
}

/// Message body.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
    Stream(StreamBody),
}

impl Body {
    /// Text form of a re-readable body. Streams return `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Body::Empty => None,
            Body::Text(s) => Some(s.clone()),
            Body::Json(Value::String(s)) => Some(s.clone()),
            Body::Json(v) => Some(v.to_string()),
            Body::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Body::Stream(_) => None,
        }
    }

    /// JSON form of a re-readable body. Bytes are base64 encoded.
    pub fn to_json(&self) -> Value {
        match self {
            Body::Empty => Value::Null,
            Body::Text(s) => Value::String(s.clone()),
            Body::Json(v) => v.clone(),
            Body::Bytes(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
            Body::Stream(_) => Value::Null,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Body::Empty => "null",
            Body::Text(_) => "String",
            Body::Json(_) => "Json",
            Body::Bytes(_) => "byte[]",
            Body::Stream(_) => "Stream",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(value)
    }
}

impl From<StreamBody> for Body {
    fn from(value: StreamBody) -> Self {
        Body::Stream(value)
    }
}

/// A message: headers plus body.
#[derive(Debug, Clone, Default)]
pub struct Message {
    message_id: String,
    headers: BTreeMap<String, Value>,
    body: Body,
}

impl Message {
    pub fn new(body: impl Into<Body>) -> Self {
        Self {
            message_id: utils::longid(),
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(
        &mut self,
        body: impl Into<Body>,
    ) {
        self.body = body.into();
    }

    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn header(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.headers.get(name)
    }

    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn remove_header(
        &mut self,
        name: &str,
    ) -> Option<Value> {
        self.headers.remove(name)
    }

    pub fn headers(&self) -> &BTreeMap<String, Value> {
        &self.headers
    }
}

/// One entry of an exchange's message history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageHistory {
    pub route_id: String,
    pub node_id: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub elapsed_millis: i64,
}

/// One in-flight message instance flowing through routes.
#[derive(Debug, Clone)]
pub struct Exchange {
    id: ExchangeId,
    pattern: ExchangePattern,
    message: Message,
    properties: HashMap<String, Value>,
    exception: Option<RouteError>,
    failure_node_id: Option<String>,
    from_endpoint: Option<String>,
    from_route_id: Option<String>,
    route_stop: bool,
    history: Vec<MessageHistory>,
    created: DateTime<Utc>,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new(ExchangePattern::InOnly)
    }
}

impl Exchange {
    pub fn new(pattern: ExchangePattern) -> Self {
        Self {
            id: utils::longid(),
            pattern,
            message: Message::new(Body::Empty),
            properties: HashMap::new(),
            exception: None,
            failure_node_id: None,
            from_endpoint: None,
            from_route_id: None,
            route_stop: false,
            history: Vec::new(),
            created: utils::time::now(),
        }
    }

    /// Create an InOnly exchange carrying `body`.
    pub fn with_body(body: impl Into<Body>) -> Self {
        let mut exchange = Self::new(ExchangePattern::InOnly);
        exchange.message.set_body(body);
        exchange
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pattern(&self) -> ExchangePattern {
        self.pattern
    }

    pub fn set_pattern(
        &mut self,
        pattern: ExchangePattern,
    ) {
        self.pattern = pattern;
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    pub fn set_message(
        &mut self,
        message: Message,
    ) {
        self.message = message;
    }

    pub fn body(&self) -> &Body {
        self.message.body()
    }

    pub fn set_body(
        &mut self,
        body: impl Into<Body>,
    ) {
        self.message.set_body(body);
    }

    /// Body as text. Returns `None` for empty and stream bodies.
    pub fn body_text(&self) -> Option<String> {
        self.message.body().as_text()
    }

    pub fn header(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.message.header(name)
    }

    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.message.set_header(name, value);
    }

    pub fn property(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn remove_property(
        &mut self,
        name: &str,
    ) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }

    pub fn exception(&self) -> Option<&RouteError> {
        self.exception.as_ref()
    }

    pub fn set_exception(
        &mut self,
        exception: RouteError,
    ) {
        self.exception = Some(exception);
    }

    /// Remove the exception, e.g. when an `onException` clause handles it.
    pub fn take_exception(&mut self) -> Option<RouteError> {
        self.failure_node_id = None;
        self.exception.take()
    }

    pub fn is_failed(&self) -> bool {
        self.exception.is_some()
    }

    /// Id of the node the current exception was raised by.
    pub fn failure_node_id(&self) -> Option<&str> {
        self.failure_node_id.as_deref()
    }

    /// Record the error of a node's processing result on the exchange and
    /// return the result unchanged.
    ///
    /// The first node to record an error is kept as the failure node, so
    /// enclosing nodes observing the same error do not overwrite it.
    pub fn capture(
        &mut self,
        node_id: &str,
        result: Result<()>,
    ) -> Result<()> {
        if let Err(e) = &result
            && self.exception.is_none()
        {
            self.exception = Some(e.clone());
            self.failure_node_id = Some(node_id.to_string());
        }
        result
    }

    /// Take over the exception of a failed copy.
    pub(crate) fn adopt_failure(
        &mut self,
        copy: &Exchange,
    ) {
        if self.exception.is_none() {
            self.exception = copy.exception.clone();
            self.failure_node_id = copy.failure_node_id.clone();
        }
    }

    pub fn from_endpoint(&self) -> Option<&str> {
        self.from_endpoint.as_deref()
    }

    pub fn from_route_id(&self) -> Option<&str> {
        self.from_route_id.as_deref()
    }

    pub(crate) fn set_from(
        &mut self,
        route_id: &str,
        endpoint: &str,
    ) {
        self.from_route_id = Some(route_id.to_string());
        self.from_endpoint = Some(endpoint.to_string());
    }

    pub fn is_route_stop(&self) -> bool {
        self.route_stop
    }

    pub fn set_route_stop(
        &mut self,
        stop: bool,
    ) {
        self.route_stop = stop;
    }

    pub fn history(&self) -> &[MessageHistory] {
        &self.history
    }

    pub(crate) fn push_history(
        &mut self,
        entry: MessageHistory,
    ) {
        self.history.push(entry);
    }

    pub(crate) fn set_history_elapsed(
        &mut self,
        index: usize,
        elapsed_millis: i64,
    ) {
        if let Some(entry) = self.history.get_mut(index) {
            entry.elapsed_millis = elapsed_millis;
        }
    }

    /// Copy with a fresh id, correlated to this exchange.
    ///
    /// Used for multicast branches and wire taps. The copy starts without
    /// an exception and without a stop flag.
    pub fn correlated_copy(&self) -> Exchange {
        let mut copy = self.clone();
        copy.id = utils::longid();
        copy.exception = None;
        copy.failure_node_id = None;
        copy.route_stop = false;
        copy.properties.insert(CORRELATION_ID.to_string(), Value::String(self.id.clone()));
        copy
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_body_text() {
        assert_eq!(Body::from("hello").as_text().as_deref(), Some("hello"));
        assert_eq!(Body::from(json!({"a": 1})).as_text().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(Body::from(b"abc".to_vec()).as_text().as_deref(), Some("abc"));
        assert_eq!(Body::Empty.as_text(), None);
    }

    #[test]
    fn test_stream_is_consumed_once() {
        let stream = StreamBody::new(Cursor::new(b"payload".to_vec()));
        let body = Body::from(stream.clone());
        assert!(body.as_text().is_none());
        assert!(!stream.is_consumed());

        assert_eq!(stream.read_all().unwrap(), b"payload".to_vec());
        assert!(stream.is_consumed());
        assert!(stream.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_bytes_to_json_is_base64() {
        assert_eq!(Body::from(b"hi".to_vec()).to_json(), json!("aGk="));
    }

    #[test]
    fn test_capture_records_error() {
        let mut exchange = Exchange::with_body("x");
        let result = exchange.capture("process1", Err(RouteError::Processing("boom".to_string())));
        assert!(result.is_err());
        assert!(exchange.is_failed());
        assert_eq!(exchange.exception().unwrap().to_string(), "boom");

        let _ = exchange.capture("multicast1", Err(RouteError::Processing("boom".to_string())));
        assert_eq!(exchange.failure_node_id(), Some("process1"));

        exchange.take_exception();
        assert!(!exchange.is_failed());
        assert_eq!(exchange.failure_node_id(), None);
    }

    #[test]
    fn test_correlated_copy() {
        let mut exchange = Exchange::with_body("x");
        exchange.set_header("h", "v");
        exchange.set_exception(RouteError::Processing("boom".to_string()));

        let copy = exchange.correlated_copy();
        assert_ne!(copy.id(), exchange.id());
        assert!(!copy.is_failed());
        assert_eq!(copy.header("h"), Some(&json!("v")));
        assert_eq!(copy.property(CORRELATION_ID), Some(&json!(exchange.id())));
    }
}
