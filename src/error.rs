//! Error types for Routeweave.
//!
//! All errors in Routeweave are represented by the `RouteError` enum.
//! Errors raised while an exchange is routed are stored on the exchange
//! itself, so the enum is cheap to clone and serializable.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Routeweave operations.
///
/// Configuration errors (`IllegalArgument`, `ResolveEndpointFailed`,
/// `FailedToCreateRoute`) are surfaced synchronously to the caller of the
/// build/advice API. Processing errors (`Exception`, `Processing`, `NoConsumer`)
/// travel with the exchange and can be matched by `onException` clauses
/// through their variant name.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq, strum::AsRefStr)]
pub enum RouteError {
    /// Engine-level errors (startup, shutdown, lifecycle).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML, body conversion).
    #[error("{0}")]
    Convert(String),

    /// A caller supplied an argument that cannot be honoured, such as a weave
    /// selector without matches or a route without inputs.
    #[error("{0}")]
    IllegalArgument(String),

    /// A lookup by identifier found nothing.
    #[error("{0}")]
    NotFound(String),

    /// An endpoint uri could not be resolved to an endpoint.
    #[error("Failed to resolve endpoint: {uri} due to: {message}")]
    ResolveEndpointFailed {
        uri: String,
        message: String,
    },

    /// A route could not be built; `cause` holds the underlying error.
    #[error("Failed to create route {route_id}: {cause}")]
    FailedToCreateRoute {
        route_id: String,
        #[source]
        cause: Box<RouteError>,
    },

    /// A direct endpoint was invoked while no route consumes from it.
    #[error("No consumers available on endpoint: {0}")]
    NoConsumer(String),

    /// Structured exception raised by a route, with an error code.
    #[error("ecode: {ecode}, message: {message}")]
    Exception {
        ecode: String,
        message: String,
    },

    /// Generic processing error raised by a processor.
    #[error("{0}")]
    Processing(String),

    /// A mock endpoint expectation was not met.
    #[error("{0}")]
    Assertion(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl RouteError {
    /// Returns the wrapped cause of a `FailedToCreateRoute` error.
    pub fn cause(&self) -> Option<&RouteError> {
        match self {
            RouteError::FailedToCreateRoute {
                cause, ..
            } => Some(cause.as_ref()),
            _ => None,
        }
    }

    /// Wraps this error as the cause of a failed route build.
    ///
    /// An error that already is a `FailedToCreateRoute` is returned as-is.
    pub fn into_route_failure(
        self,
        route_id: &str,
    ) -> RouteError {
        match self {
            e @ RouteError::FailedToCreateRoute {
                ..
            } => e,
            other => RouteError::FailedToCreateRoute {
                route_id: route_id.to_string(),
                cause: Box::new(other),
            },
        }
    }

    /// The error code of an `Exception`, or the variant name otherwise.
    pub fn code(&self) -> &str {
        match self {
            RouteError::Exception {
                ecode, ..
            } => ecode,
            other => other.as_ref(),
        }
    }
}

impl From<RouteError> for String {
    fn from(val: RouteError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for RouteError {
    fn from(error: std::io::Error) -> Self {
        RouteError::IoError(error.to_string())
    }
}

impl From<RouteError> for std::io::Error {
    fn from(val: RouteError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for RouteError {
    fn from(_: FromUtf8Error) -> Self {
        RouteError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(error: serde_json::Error) -> Self {
        RouteError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for RouteError {
    fn from(error: toml::de::Error) -> Self {
        RouteError::Config(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for RouteError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        RouteError::IllegalArgument(error.to_string())
    }
}

impl From<regex::Error> for RouteError {
    fn from(error: regex::Error) -> Self {
        RouteError::IllegalArgument(format!("invalid pattern: {}", error))
    }
}

impl From<globset::Error> for RouteError {
    fn from(error: globset::Error) -> Self {
        RouteError::IllegalArgument(format!("invalid pattern: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_to_create_route_keeps_cause() {
        let err = RouteError::ResolveEndpointFailed {
            uri: "invalid:scheme".to_string(),
            message: "No component found with scheme: invalid".to_string(),
        }
        .into_route_failure("route1");

        assert!(matches!(err, RouteError::FailedToCreateRoute { .. }));
        assert!(matches!(err.cause(), Some(RouteError::ResolveEndpointFailed { .. })));
        assert!(err.to_string().starts_with("Failed to create route route1"));
    }

    #[test]
    fn test_route_failure_is_not_nested_twice() {
        let err = RouteError::NotFound("x".to_string()).into_route_failure("a").into_route_failure("b");
        match err {
            RouteError::FailedToCreateRoute {
                route_id, ..
            } => assert_eq!(route_id, "a"),
            _ => panic!("expected FailedToCreateRoute"),
        }
    }

    #[test]
    fn test_code() {
        let err = RouteError::Exception {
            ecode: "E42".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.code(), "E42");
        assert_eq!(RouteError::Processing("x".to_string()).code(), "Processing");
    }
}
