//! Cache lifecycle: versioned naming, pre-population on install, eviction on activate.
//!
//! Exactly one store is current: `cache_prefix + version`. Install fills it
//! from the pre-cache list all-or-nothing; activate deletes every other store.

use std::sync::Arc;

use colorwise_client::Network;
use colorwise_core::{AppConfig, CacheStorage, Error, Request, Response};
use futures_util::future::try_join_all;
use url::Url;

/// Owns the current store's name and the pre-cache list.
#[derive(Clone)]
pub struct CacheLifecycle {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    cache_name: String,
    origin: Url,
    precache_urls: Vec<String>,
}

impl CacheLifecycle {
    pub fn new(config: &AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            storage,
            network,
            cache_name: config.cache_name(),
            origin,
            precache_urls: config.precache_urls.clone(),
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Open the current store and fill it with every pre-cache URL.
    ///
    /// Fails if any URL is rejected or answers with a non-2xx status; in that
    /// case nothing is written, and a store created by this attempt is removed.
    pub async fn install(&self) -> Result<(), Error> {
        let existed = self.storage.has(&self.cache_name).await?;
        let cache = self.storage.open(&self.cache_name).await?;
        tracing::info!(cache = %self.cache_name, "opened cache");

        let populated = match self.fetch_precache().await {
            Ok(entries) => {
                let count = entries.len();
                cache.put_all(entries).await.map(|()| count)
            }
            Err(e) => Err(e),
        };

        match populated {
            Ok(count) => {
                tracing::info!(cache = %self.cache_name, entries = count, "pre-cache complete");
                Ok(())
            }
            Err(e) => {
                if !existed && let Err(cleanup) = self.storage.delete(&self.cache_name).await {
                    tracing::warn!(cache = %self.cache_name, error = %cleanup, "failed to remove partial cache");
                }
                Err(e)
            }
        }
    }

    async fn fetch_precache(&self) -> Result<Vec<(Request, Response)>, Error> {
        let requests = self
            .precache_urls
            .iter()
            .map(|path| Request::get_relative(&self.origin, path))
            .collect::<Result<Vec<_>, Error>>()?;

        try_join_all(requests.into_iter().map(|request| async move {
            let url = request.url().to_string();
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::PrecacheFailed { url: url.clone(), reason: e.to_string() })?;
            if !response.ok() {
                return Err(Error::PrecacheFailed { url, reason: format!("status {}", response.status().as_u16()) });
            }
            Ok((request, response))
        }))
        .await
    }

    /// Delete every store whose name is not the current one.
    ///
    /// Deletions run concurrently and are all awaited. Returns the names removed.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let stale: Vec<String> =
            self.storage.keys().await?.into_iter().filter(|name| *name != self.cache_name).collect();

        try_join_all(stale.iter().map(|name| async move {
            tracing::info!(cache = %name, "deleting old cache");
            self.storage.delete(name).await
        }))
        .await?;

        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, config, get};
    use colorwise_core::MemoryStorage;
    use http::StatusCode;

    fn lifecycle(version: &str, storage: &MemoryStorage, network: &FakeNetwork) -> CacheLifecycle {
        CacheLifecycle::new(&config(version), Arc::new(storage.clone()), Arc::new(network.clone())).unwrap()
    }

    #[test]
    fn test_cache_name_from_version() {
        let lc = lifecycle("v2", &MemoryStorage::new(), &FakeNetwork::new());
        assert_eq!(lc.cache_name(), "colorwise-v2");
    }

    #[tokio::test]
    async fn test_install_stores_every_precache_url() {
        let storage = MemoryStorage::new();
        let network = FakeNetwork::with_precache();
        lifecycle("v1", &storage, &network).install().await.unwrap();

        let cache = storage.open("colorwise-v1").await.unwrap();
        for path in config("v1").precache_urls {
            let hit = cache.match_request(&get(&path)).await.unwrap();
            assert!(hit.is_some(), "{path} should be cached");
        }
        assert_eq!(cache.keys().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_install_never_stores_entry_page() {
        let storage = MemoryStorage::new();
        let network = FakeNetwork::with_precache();
        network.respond("/colorwise-app/", StatusCode::OK, "<html>");
        lifecycle("v1", &storage, &network).install().await.unwrap();

        assert_eq!(network.calls("/colorwise-app/"), 0);
        assert!(storage.match_request("colorwise-v1", &get("/colorwise-app/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_fails_when_one_fetch_is_rejected() {
        let storage = MemoryStorage::new();
        let network = FakeNetwork::with_precache();
        network.reject("/colorwise-app/icon-512.png");

        let result = lifecycle("v1", &storage, &network).install().await;
        assert!(matches!(result, Err(Error::PrecacheFailed { ref url, .. }) if url.ends_with("icon-512.png")));
        assert!(!storage.has("colorwise-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_fails_on_error_status() {
        let storage = MemoryStorage::new();
        let network = FakeNetwork::with_precache();
        network.respond("/colorwise-app/manifest.json", StatusCode::NOT_FOUND, "");

        let result = lifecycle("v1", &storage, &network).install().await;
        assert!(matches!(result, Err(Error::PrecacheFailed { ref reason, .. }) if reason == "status 404"));
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reinstall_keeps_existing_store() {
        let storage = MemoryStorage::new();
        let network = FakeNetwork::with_precache();
        lifecycle("v1", &storage, &network).install().await.unwrap();

        network.reject("/colorwise-app/icon-192.png");
        assert!(lifecycle("v1", &storage, &network).install().await.is_err());

        let cache = storage.open("colorwise-v1").await.unwrap();
        assert_eq!(cache.keys().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_stores() {
        let storage = MemoryStorage::new();
        storage.open("colorwise-v1").await.unwrap();
        storage.open("colorwise-v2").await.unwrap();

        let removed = lifecycle("v2", &storage, &FakeNetwork::new()).activate().await.unwrap();
        assert_eq!(removed, vec!["colorwise-v1".to_string()]);
        assert_eq!(storage.keys().await.unwrap(), vec!["colorwise-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_leaves_current_entries_untouched() {
        let storage = MemoryStorage::new();
        let network = FakeNetwork::with_precache();
        let lc = lifecycle("v2", &storage, &network);
        lc.install().await.unwrap();
        storage.open("colorwise-v1").await.unwrap();

        lc.activate().await.unwrap();
        let cache = storage.open("colorwise-v2").await.unwrap();
        assert_eq!(cache.keys().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.open("colorwise-v1").await.unwrap();
        storage.open("colorwise-v2").await.unwrap();
        storage.open("other-app").await.unwrap();
        let lc = lifecycle("v2", &storage, &FakeNetwork::new());

        lc.activate().await.unwrap();
        let once = storage.keys().await.unwrap();
        let removed = lc.activate().await.unwrap();

        assert!(removed.is_empty());
        assert_eq!(storage.keys().await.unwrap(), once);
        assert_eq!(once, vec!["colorwise-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_with_no_stores() {
        let storage = MemoryStorage::new();
        let removed = lifecycle("v1", &storage, &FakeNetwork::new()).activate().await.unwrap();
        assert!(removed.is_empty());
    }
}
