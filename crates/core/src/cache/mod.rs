//! Named, versioned cache stores for response snapshots.
//!
//! The agent never reaches for a global cache; it is handed a [`CacheStorage`]
//! and opens stores by name. Two backends are provided:
//!
//! - [`MemoryStorage`]: process-local maps, used by tests and ephemeral hosts
//! - [`CacheDb`]: SQLite via tokio-rusqlite, with WAL mode and migrations
//!
//! Writes are last-writer-wins per request key. No locking is exposed.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod stores;

use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use url::Url;

use crate::Error;
use crate::net::{Request, Response};

pub use connection::CacheDb;
pub use entries::SqliteCache;
pub use memory::{MemoryCache, MemoryStorage};

/// The collection of named cache stores.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the store called `name`, creating it if absent.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, Error>;

    /// The store called `name`, only if it already exists.
    async fn open_existing(&self, name: &str) -> Result<Option<Arc<dyn Cache>>, Error>;

    /// Whether a store called `name` exists.
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Delete the store called `name` with all its entries.
    ///
    /// Returns false if no such store existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Names of all stores, in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Look up `request` in the store called `cache_name` without creating it.
    async fn match_request(&self, cache_name: &str, request: &Request) -> Result<Option<Response>, Error>;
}

/// A single named store mapping requests to response snapshots.
#[async_trait]
pub trait Cache: Send + Sync {
    fn name(&self) -> &str;

    /// The stored snapshot for `request`, if any.
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error>;

    /// Store `response` under `request`, replacing any previous entry.
    async fn put(&self, request: &Request, response: Response) -> Result<(), Error>;

    /// Store every entry, or none of them.
    async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<(), Error>;

    /// Remove the entry for `request`. Returns false if there was none.
    async fn delete(&self, request: &Request) -> Result<bool, Error>;

    /// URLs of all stored requests.
    async fn keys(&self) -> Result<Vec<Url>, Error>;
}

/// Reject entries the cache must not hold.
pub fn validate_put(request: &Request, response: &Response) -> Result<(), Error> {
    if request.method() != Method::GET {
        return Err(Error::UnsupportedMethod(format!("{} {}", request.method(), request.url())));
    }
    if response.status() == StatusCode::PARTIAL_CONTENT {
        return Err(Error::PartialResponse(request.url().to_string()));
    }
    Ok(())
}
