//! In-memory cache storage. Nothing survives the process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use url::Url;

use super::{Cache, CacheStorage, validate_put};
use crate::Error;
use crate::net::{Request, Response};

/// Stored request/response pair.
struct Entry {
    url: Url,
    response: Response,
}

/// A single in-memory store.
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    fn new(name: String) -> Self {
        Self { name, entries: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if request.method() != http::Method::GET {
            return Ok(None);
        }
        let entries = self.entries.read().await;
        Ok(entries.get(&request.cache_key()).map(|entry| entry.response.fork()))
    }

    async fn put(&self, request: &Request, response: Response) -> Result<(), Error> {
        validate_put(request, &response)?;
        let mut entries = self.entries.write().await;
        entries.insert(request.cache_key(), Entry { url: request.url().clone(), response });
        Ok(())
    }

    async fn put_all(&self, batch: Vec<(Request, Response)>) -> Result<(), Error> {
        for (request, response) in &batch {
            validate_put(request, response)?;
        }
        let mut entries = self.entries.write().await;
        for (request, response) in batch {
            entries.insert(request.cache_key(), Entry { url: request.url().clone(), response });
        }
        Ok(())
    }

    async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(&request.cache_key()).is_some())
    }

    async fn keys(&self) -> Result<Vec<Url>, Error> {
        let entries = self.entries.read().await;
        let mut urls: Vec<Url> = entries.values().map(|entry| entry.url.clone()).collect();
        urls.sort();
        Ok(urls)
    }
}

/// In-memory collection of named stores.
///
/// Stores are kept in a Vec so `keys()` reports creation order.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    stores: Arc<RwLock<Vec<Arc<MemoryCache>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, Error> {
        {
            let stores = self.stores.read().await;
            if let Some(store) = stores.iter().find(|s| s.name == name) {
                return Ok(store.clone());
            }
        }

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.iter().find(|s| s.name == name) {
            return Ok(store.clone());
        }
        tracing::debug!(cache = name, "creating in-memory cache store");
        let store = Arc::new(MemoryCache::new(name.to_string()));
        stores.push(store.clone());
        Ok(store)
    }

    async fn open_existing(&self, name: &str) -> Result<Option<Arc<dyn Cache>>, Error> {
        let stores = self.stores.read().await;
        Ok(stores.iter().find(|s| s.name == name).map(|store| store.clone() as Arc<dyn Cache>))
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let stores = self.stores.read().await;
        Ok(stores.iter().any(|s| s.name == name))
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|s| s.name != name);
        Ok(stores.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let stores = self.stores.read().await;
        Ok(stores.iter().map(|s| s.name.clone()).collect())
    }

    async fn match_request(&self, cache_name: &str, request: &Request) -> Result<Option<Response>, Error> {
        let store = {
            let stores = self.stores.read().await;
            stores.iter().find(|s| s.name == cache_name).cloned()
        };
        match store {
            Some(store) => store.match_request(request).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};

    fn request(path: &str) -> Request {
        Request::get(Url::parse("https://colorwise.example").unwrap().join(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.open("colorwise-v1").await.unwrap();
        storage.open("colorwise-v1").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["colorwise-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_keys_in_creation_order() {
        let storage = MemoryStorage::new();
        storage.open("colorwise-v2").await.unwrap();
        storage.open("colorwise-v1").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["colorwise-v2", "colorwise-v1"]);
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let storage = MemoryStorage::new();
        let cache = storage.open("colorwise-v1").await.unwrap();
        let req = request("/colorwise-app/manifest.json");
        cache.put(&req, Response::new(StatusCode::OK, "{}")).await.unwrap();

        let hit = cache.match_request(&req).await.unwrap().unwrap();
        assert_eq!(hit.status(), StatusCode::OK);
        assert_eq!(hit.into_body().as_ref(), b"{}");

        let again = storage.match_request("colorwise-v1", &req).await.unwrap();
        assert!(again.is_some());
    }

    #[tokio::test]
    async fn test_open_existing_never_creates() {
        let storage = MemoryStorage::new();
        assert!(storage.open_existing("colorwise-v1").await.unwrap().is_none());
        assert!(!storage.has("colorwise-v1").await.unwrap());

        storage.open("colorwise-v1").await.unwrap();
        assert!(storage.open_existing("colorwise-v1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_match_missing_store_does_not_create() {
        let storage = MemoryStorage::new();
        let result = storage.match_request("colorwise-v9", &request("/colorwise-app/")).await.unwrap();
        assert!(result.is_none());
        assert!(!storage.has("colorwise-v9").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_ignores_non_get() {
        let storage = MemoryStorage::new();
        let cache = storage.open("colorwise-v1").await.unwrap();
        let get = request("/colorwise-app/api");
        cache.put(&get, Response::new(StatusCode::OK, "x")).await.unwrap();

        let head = Request::new(Method::HEAD, get.url().clone()).unwrap();
        assert!(cache.match_request(&head).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_all_is_all_or_nothing() {
        let storage = MemoryStorage::new();
        let cache = storage.open("colorwise-v1").await.unwrap();
        let good = request("/colorwise-app/icon-192.png");
        let bad = Request::new(Method::POST, request("/colorwise-app/api").url().clone()).unwrap();

        let result = cache
            .put_all(vec![(good.clone(), Response::new(StatusCode::OK, "png")), (bad, Response::new(StatusCode::OK, ""))])
            .await;
        assert!(matches!(result, Err(Error::UnsupportedMethod(_))));
        assert!(cache.match_request(&good).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_store() {
        let storage = MemoryStorage::new();
        storage.open("colorwise-v1").await.unwrap();
        assert!(storage.delete("colorwise-v1").await.unwrap());
        assert!(!storage.delete("colorwise-v1").await.unwrap());
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entry_and_keys() {
        let storage = MemoryStorage::new();
        let cache = storage.open("colorwise-v1").await.unwrap();
        let a = request("/colorwise-app/a.png");
        let b = request("/colorwise-app/b.png");
        cache.put(&a, Response::new(StatusCode::OK, "a")).await.unwrap();
        cache.put(&b, Response::new(StatusCode::OK, "b")).await.unwrap();

        assert!(cache.delete(&a).await.unwrap());
        assert_eq!(cache.keys().await.unwrap(), vec![b.url().clone()]);
    }
}
