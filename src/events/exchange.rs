use std::fmt;

use crate::RouteError;

/// Lifecycle event of an exchange.
#[derive(Debug, Clone, PartialEq, strum::AsRefStr)]
pub enum ExchangeEvent {
    /// The exchange entered its first route.
    Created,
    /// About to send to an endpoint.
    Sending {
        uri: String,
    },
    /// Returned from an endpoint.
    Sent {
        uri: String,
        elapsed_millis: i64,
    },
    /// The exchange left its first route without an exception.
    Completed,
    /// The exchange left its first route with an exception.
    Failed(RouteError),
}

impl ExchangeEvent {
    pub fn str(&self) -> &str {
        self.as_ref()
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ExchangeEvent::Completed | ExchangeEvent::Failed(_))
    }
}

impl fmt::Display for ExchangeEvent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ExchangeEvent::Sending {
                uri,
            } => write!(f, "Sending to {}", uri),
            ExchangeEvent::Sent {
                uri,
                elapsed_millis,
            } => write!(f, "Sent to {} took {}ms", uri, elapsed_millis),
            ExchangeEvent::Failed(e) => write!(f, "Failed: {}", e),
            other => write!(f, "{}", other.str()),
        }
    }
}
