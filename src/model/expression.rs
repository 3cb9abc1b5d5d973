//! Expressions and predicates evaluated against an exchange.
//!
//! Simple templates use the `${...}` syntax:
//! - `${body}`
//! - `${header.name}` / `${headers.name}`
//! - `${exchangeProperty.name}`
//! - `${exchangeId}`, `${routeId}`, `${exception.message}`

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, RouteError, runtime::Exchange};

/// Regex pattern for simple template functions
/// Format: `${function}` or `${function.key}`
const SIMPLE_TEMPLATE_PATTERN: &str = r"\$\{([^}]+)\}";

static SIMPLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(SIMPLE_TEMPLATE_PATTERN).expect("valid simple template pattern"));

/// An expression producing a value from an exchange.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Expression {
    Constant(Value),
    Simple(String),
    Header(String),
    ExchangeProperty(String),
    Body,
}

impl Expression {
    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn simple(template: impl Into<String>) -> Self {
        Expression::Simple(template.into())
    }

    pub fn header(name: impl Into<String>) -> Self {
        Expression::Header(name.into())
    }

    pub fn property(name: impl Into<String>) -> Self {
        Expression::ExchangeProperty(name.into())
    }

    pub fn evaluate(
        &self,
        exchange: &Exchange,
    ) -> Result<Value> {
        match self {
            Expression::Constant(v) => Ok(v.clone()),
            Expression::Simple(template) => resolve_simple(exchange, template).map(Value::String),
            Expression::Header(name) => Ok(exchange.header(name).cloned().unwrap_or(Value::Null)),
            Expression::ExchangeProperty(name) => Ok(exchange.property(name).cloned().unwrap_or(Value::Null)),
            Expression::Body => Ok(exchange.body().to_json()),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Expression::Constant(Value::String(s)) => write!(f, "{}", s),
            Expression::Constant(v) => write!(f, "{}", v),
            Expression::Simple(s) => write!(f, "simple{{{}}}", s),
            Expression::Header(name) => write!(f, "header{{{}}}", name),
            Expression::ExchangeProperty(name) => write!(f, "exchangeProperty{{{}}}", name),
            Expression::Body => write!(f, "body"),
        }
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Expression::constant(value)
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Constant(value)
    }
}

/// A boolean condition on an exchange.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    Constant(bool),
    HeaderEquals {
        name: String,
        value: Value,
    },
    HeaderExists(String),
    BodyContains(String),
    BodyEquals(String),
    /// Regex with contains semantics against the body text.
    Regex(String),
    /// Simple template that must resolve to `true`.
    Simple(String),
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn header_equals(
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Predicate::HeaderEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn header_exists(name: impl Into<String>) -> Self {
        Predicate::HeaderExists(name.into())
    }

    pub fn body_contains(text: impl Into<String>) -> Self {
        Predicate::BodyContains(text.into())
    }

    pub fn body_equals(text: impl Into<String>) -> Self {
        Predicate::BodyEquals(text.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Predicate::Regex(pattern.into())
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    pub fn matches(
        &self,
        exchange: &Exchange,
    ) -> Result<bool> {
        let matched = match self {
            Predicate::Constant(b) => *b,
            Predicate::HeaderEquals {
                name,
                value,
            } => match exchange.header(name) {
                Some(actual) => actual == value || value_text(actual) == value_text(value),
                None => false,
            },
            Predicate::HeaderExists(name) => exchange.header(name).is_some(),
            Predicate::BodyContains(text) => exchange.body_text().is_some_and(|b| b.contains(text.as_str())),
            Predicate::BodyEquals(text) => exchange.body_text().as_deref() == Some(text.as_str()),
            Predicate::Regex(pattern) => {
                let re = Regex::new(pattern)?;
                exchange.body_text().is_some_and(|b| re.is_match(&b))
            }
            Predicate::Simple(template) => resolve_simple(exchange, template)?.trim() == "true",
            Predicate::Not(p) => !p.matches(exchange)?,
            Predicate::And(ps) => {
                for p in ps {
                    if !p.matches(exchange)? {
                        return Ok(false);
                    }
                }
                true
            }
            Predicate::Or(ps) => {
                for p in ps {
                    if p.matches(exchange)? {
                        return Ok(true);
                    }
                }
                false
            }
        };
        Ok(matched)
    }
}

impl fmt::Display for Predicate {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Predicate::Constant(b) => write!(f, "{}", b),
            Predicate::HeaderEquals {
                name,
                value,
            } => write!(f, "header{{{}}} == {}", name, value_text(value)),
            Predicate::HeaderExists(name) => write!(f, "header{{{}}} != null", name),
            Predicate::BodyContains(text) => write!(f, "body contains {}", text),
            Predicate::BodyEquals(text) => write!(f, "body == {}", text),
            Predicate::Regex(pattern) => write!(f, "body regex {}", pattern),
            Predicate::Simple(template) => write!(f, "simple{{{}}}", template),
            Predicate::Not(p) => write!(f, "not({})", p),
            Predicate::And(ps) => write!(f, "({})", join(ps, " and ")),
            Predicate::Or(ps) => write!(f, "({})", join(ps, " or ")),
        }
    }
}

fn join(
    predicates: &[Predicate],
    sep: &str,
) -> String {
    predicates.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(sep)
}

/// Render a JSON value as plain text, without quotes for strings.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        v => v.to_string(),
    }
}

/// Resolve `${...}` functions in a simple template.
///
/// Missing headers and properties resolve to an empty string; unknown
/// functions are rejected.
pub fn resolve_simple(
    exchange: &Exchange,
    template: &str,
) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut last = 0;
    let mut errors: Vec<String> = Vec::new();

    for caps in SIMPLE_RE.captures_iter(template) {
        let Some(full_match) = caps.get(0) else {
            continue;
        };
        result.push_str(&template[last..full_match.start()]);
        last = full_match.end();

        match resolve_function(exchange, caps[1].trim()) {
            Some(value) => result.push_str(&value),
            None => errors.push(format!("unknown function '{}'", &caps[1])),
        }
    }
    result.push_str(&template[last..]);

    if !errors.is_empty() {
        return Err(RouteError::IllegalArgument(errors.join(", ")));
    }

    Ok(result)
}

fn resolve_function(
    exchange: &Exchange,
    function: &str,
) -> Option<String> {
    match function {
        "body" | "in.body" => return Some(exchange.body_text().unwrap_or_default()),
        "bodyType" => return Some(exchange.body().type_name().to_string()),
        "exchangeId" => return Some(exchange.id().to_string()),
        "routeId" => return Some(exchange.from_route_id().unwrap_or_default().to_string()),
        "exception.message" => return Some(exchange.exception().map(|e| e.to_string()).unwrap_or_default()),
        _ => {}
    }

    let (scope, key) = function.split_once('.')?;
    match scope {
        "header" | "headers" | "in.header" => Some(exchange.header(key).map(value_text).unwrap_or_default()),
        "exchangeProperty" => Some(exchange.property(key).map(value_text).unwrap_or_default()),
        _ => None,
    }
}
