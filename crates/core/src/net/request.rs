//! Request descriptors as seen by the agent.

use http::{HeaderMap, HeaderValue, Method, header::HeaderName};
use url::Url;

use super::url::{UrlError, canonicalize, resolve};
use crate::Error;
use crate::cache::hash::compute_request_key;

/// An intercepted request: method, canonical URL and headers.
///
/// Requests carry no body; the agent only ever stores `GET` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
}

impl Request {
    /// Create a request, canonicalizing the URL.
    pub fn new(method: Method, url: Url) -> Result<Self, Error> {
        let url = canonicalize(url).map_err(invalid_url)?;
        Ok(Self { method, url, headers: HeaderMap::new() })
    }

    /// A `GET` request for an absolute URL.
    pub fn get(url: Url) -> Result<Self, Error> {
        Self::new(Method::GET, url)
    }

    /// A `GET` request for `input` resolved against `base`.
    pub fn get_relative(base: &Url, input: &str) -> Result<Self, Error> {
        let url = resolve(base, input).map_err(invalid_url)?;
        Ok(Self { method: Method::GET, url, headers: HeaderMap::new() })
    }

    /// Add a header, returning the updated request.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Content-addressed key used by cache stores.
    pub fn cache_key(&self) -> String {
        compute_request_key(self.method.as_str(), self.url.as_str())
    }
}

fn invalid_url(err: UrlError) -> Error {
    Error::InvalidUrl(err.to_string())
}
