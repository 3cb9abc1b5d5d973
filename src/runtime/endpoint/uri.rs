use std::fmt;

use regex::Regex;

use crate::{Result, RouteError};

/// A parsed endpoint uri: `scheme:path?key=value`.
///
/// `scheme://path` and `scheme:path` denote the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUri {
    raw: String,
    scheme: String,
    path: String,
    params: Vec<(String, String)>,
}

impl EndpointUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let Some((scheme, rest)) = uri.split_once(':') else {
            return Err(RouteError::ResolveEndpointFailed {
                uri: uri.to_string(),
                message: "uri has no scheme".to_string(),
            });
        };
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')) {
            return Err(RouteError::ResolveEndpointFailed {
                uri: uri.to_string(),
                message: format!("invalid scheme: {}", scheme),
            });
        }

        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };
        let mut params: Vec<(String, String)> = serde_urlencoded::from_str(query).map_err(|e| RouteError::ResolveEndpointFailed {
            uri: uri.to_string(),
            message: e.to_string(),
        })?;
        params.sort();

        Ok(Self {
            raw: uri.to_string(),
            scheme: scheme.to_string(),
            path: path.to_string(),
            params,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Canonical form used as the endpoint registry key.
    pub fn normalized(&self) -> String {
        if self.params.is_empty() {
            format!("{}://{}", self.scheme, self.path)
        } else {
            let query = serde_urlencoded::to_string(&self.params).unwrap_or_default();
            format!("{}://{}?{}", self.scheme, self.path, query)
        }
    }
}

impl fmt::Display for EndpointUri {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Normalize a uri, falling back to the input when it cannot be parsed.
pub fn normalize_uri(uri: &str) -> String {
    EndpointUri::parse(uri).map(|u| u.normalized()).unwrap_or_else(|_| uri.to_string())
}

/// Match an endpoint uri against a pattern.
///
/// The pattern matches when it is equal to the uri after normalization,
/// when it is a wildcard (`mock:*`) matching the uri, or when it is a
/// regex found anywhere in the uri.
pub fn matches_endpoint(
    uri: &str,
    pattern: &str,
) -> bool {
    if uri == pattern || normalize_uri(uri) == normalize_uri(pattern) {
        return true;
    }
    if pattern.contains('*') || pattern.contains('?') {
        if let Ok(glob) = globset::Glob::new(pattern) {
            let matcher = glob.compile_matcher();
            if matcher.is_match(uri) || matcher.is_match(normalize_uri(uri)) {
                return true;
            }
        }
    }
    Regex::new(pattern).map(|re| re.is_match(uri)).unwrap_or(false)
}
