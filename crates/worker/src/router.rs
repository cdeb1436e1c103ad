//! Request routing: network first, cache as fallback and write-through target.
//!
//! ### Navigational requests
//! The application root and anything ending in `.html`. Always fetched from
//! the network and never written to the cache, so the entry page is never
//! pinned to an old version. A rejected fetch falls back to whatever the
//! current store holds for the request; normally nothing, since nothing here
//! writes these entries, so offline navigation degrades to "best cached match
//! or unavailable".
//!
//! ### Everything else
//! 1. Fetch from the network.
//! 2. Status other than 200: serve the cached match if one exists, otherwise
//!    the real response unchanged.
//! 3. Status 200 on a same-origin `GET` under the application scope: write a
//!    fork of the response to the current store in the background, and return
//!    the original without waiting for the write.
//! 4. Rejected fetch: the cached match, or unavailable.

use std::sync::Arc;

use colorwise_client::Network;
use colorwise_core::{AppConfig, CacheStorage, Error, Request, Response};
use http::Method;
use url::Url;

use crate::events::FetchEvent;

/// How a request is handled. Fixed per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// The HTML entry document; bypasses the cache on the way in.
    Navigational,
    /// Everything else; written through on success.
    StaticAsset,
}

/// Decides and runs the fetch strategy for each intercepted request.
#[derive(Clone)]
pub struct RequestRouter {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    cache_name: String,
    origin: Url,
    scope: String,
}

impl RequestRouter {
    pub fn new(config: &AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { storage, network, cache_name: config.cache_name(), origin, scope: config.scope.clone() })
    }

    pub fn classify(&self, request: &Request) -> RequestKind {
        let path = request.url().path();
        if path == self.scope || path.ends_with(".html") {
            RequestKind::Navigational
        } else {
            RequestKind::StaticAsset
        }
    }

    /// Whether a successful response for `request` may be written through.
    pub fn in_asset_namespace(&self, request: &Request) -> bool {
        let url = request.url();
        url.origin() == self.origin.origin() && url.path().starts_with(&self.scope)
    }

    /// Produce the response for `event`. `None` means unavailable.
    pub async fn respond(&self, event: &FetchEvent) -> Option<Response> {
        let request = event.request();
        match self.classify(request) {
            RequestKind::Navigational => self.network_only(request).await,
            RequestKind::StaticAsset => self.network_first(event).await,
        }
    }

    async fn network_only(&self, request: &Request) -> Option<Response> {
        match self.network.fetch(request).await {
            Ok(response) => Some(response),
            Err(e) => {
                log_rejection(request, &e);
                self.cached(request).await
            }
        }
    }

    async fn network_first(&self, event: &FetchEvent) -> Option<Response> {
        let request = event.request();

        let response = match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                log_rejection(request, &e);
                return self.cached(request).await;
            }
        };

        if !response.is_valid() {
            tracing::debug!(url = %request.url(), status = %response.status(), "invalid response, trying cache");
            return Some(self.cached(request).await.unwrap_or(response));
        }

        if request.method() == Method::GET && self.in_asset_namespace(request) {
            let storage = self.storage.clone();
            let cache_name = self.cache_name.clone();
            let request = request.clone();
            let copy = response.fork();
            event
                .wait_until(async move {
                    write_through(storage.as_ref(), &cache_name, &request, copy).await;
                    Ok(())
                })
                .await;
        }

        Some(response)
    }

    async fn cached(&self, request: &Request) -> Option<Response> {
        match self.storage.match_request(&self.cache_name, request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::debug!(url = %request.url(), error = %e, "cache lookup failed");
                None
            }
        }
    }
}

/// Best-effort store of a fresh response. Failures are logged and dropped.
///
/// Only writes into a store that still exists; a store evicted while the
/// fetch was in flight stays evicted.
async fn write_through(storage: &dyn CacheStorage, cache_name: &str, request: &Request, response: Response) {
    let result = match storage.open_existing(cache_name).await {
        Ok(Some(cache)) => cache.put(request, response).await,
        Ok(None) => {
            tracing::debug!(url = %request.url(), cache = cache_name, "cache gone, skipping write");
            return;
        }
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::debug!(url = %request.url(), cache = cache_name, error = %e, "cache write failed");
    }
}

fn log_rejection(request: &Request, error: &Error) {
    if error.is_network_failure() {
        tracing::debug!(url = %request.url(), error = %error, "fetch rejected, trying cache");
    } else {
        tracing::warn!(url = %request.url(), error = %error, "fetch failed, trying cache");
    }
}
