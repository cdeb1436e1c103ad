//! Response snapshots with single-consumption bodies.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Response type as exposed by the fetch API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response with CORS headers.
    Cors,
    /// Synthesized locally rather than fetched.
    Default,
    /// Cross-origin response without CORS; status and body are hidden.
    Opaque,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Default => "default",
            ResponseType::Opaque => "opaque",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            "default" => Ok(ResponseType::Default),
            "opaque" => Ok(ResponseType::Opaque),
            other => Err(format!("unknown response type: {other}")),
        }
    }
}

/// A response snapshot.
///
/// Deliberately not `Clone`: the body is consumed once via [`Response::into_body`],
/// and any second consumer (a cache write) must take a [`Response::fork`] first.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    response_type: ResponseType,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, response_type: ResponseType::Basic, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Body length without consuming it.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Only a plain `200 OK` is served in preference to the cache or stored.
    pub fn is_valid(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// Independent copy for a secondary consumer.
    pub fn fork(&self) -> Self {
        Self {
            status: self.status,
            response_type: self.response_type,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    /// Consume the response, yielding its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_requires_exact_200() {
        assert!(Response::new(StatusCode::OK, "x").is_valid());
        assert!(!Response::new(StatusCode::NO_CONTENT, "").is_valid());
        assert!(Response::new(StatusCode::NO_CONTENT, "").ok());
        assert!(!Response::new(StatusCode::NOT_FOUND, "").ok());
    }

    #[test]
    fn test_fork_is_independent() {
        let original = Response::new(StatusCode::OK, "palette").with_type(ResponseType::Cors);
        let copy = original.fork();
        assert_eq!(original.into_body(), Bytes::from_static(b"palette"));
        assert_eq!(copy.response_type(), ResponseType::Cors);
        assert_eq!(copy.into_body(), Bytes::from_static(b"palette"));
    }

    #[test]
    fn test_response_type_parse() {
        for ty in [ResponseType::Basic, ResponseType::Cors, ResponseType::Default, ResponseType::Opaque] {
            assert_eq!(ty.as_str().parse::<ResponseType>().unwrap(), ty);
        }
        assert!("opaqueredirect".parse::<ResponseType>().is_err());
    }
}
