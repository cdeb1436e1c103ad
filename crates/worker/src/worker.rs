//! One installed instance of the agent, bound to a single application version.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use colorwise_client::Network;
use colorwise_core::{AppConfig, CacheStorage, Error, Response};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::events::{ExtendableEvent, FetchEvent};
use crate::lifecycle::CacheLifecycle;
use crate::messages::handle_message;
use crate::router::RequestRouter;
use crate::scope::WorkerScope;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The agent's event handlers for one version.
pub struct ServiceWorker {
    id: u64,
    version: String,
    lifecycle: CacheLifecycle,
    router: RequestRouter,
    scope: Arc<WorkerScope>,
    state: RwLock<WorkerState>,
}

impl ServiceWorker {
    pub fn new(config: &AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Result<Self, Error> {
        let lifecycle = CacheLifecycle::new(config, storage.clone(), network.clone())?;
        let router = RequestRouter::new(config, storage, network)?;
        Ok(Self {
            id: NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed),
            version: config.version.clone(),
            lifecycle,
            router,
            scope: Arc::new(WorkerScope::new()),
            state: RwLock::new(WorkerState::Installing),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn cache_name(&self) -> &str {
        self.lifecycle.cache_name()
    }

    pub fn scope(&self) -> &WorkerScope {
        &self.scope
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub(crate) async fn set_state(&self, state: WorkerState) {
        let mut current = self.state.write().await;
        if *current != state {
            tracing::debug!(worker = self.id, version = %self.version, from = %*current, to = %state, "worker state");
            *current = state;
        }
    }

    /// Pre-populate the current store, then ask to skip the waiting phase.
    ///
    /// The skip request is raised only after population succeeds; a worker
    /// whose install failed never reaches the point of waiting.
    pub async fn on_install(&self, event: &ExtendableEvent) {
        let lifecycle = self.lifecycle.clone();
        let scope = self.scope.clone();
        event
            .wait_until(async move {
                lifecycle.install().await?;
                scope.skip_waiting();
                Ok(())
            })
            .await;
    }

    /// Evict stale stores, then ask to control every open page.
    pub async fn on_activate(&self, event: &ExtendableEvent) {
        let lifecycle = self.lifecycle.clone();
        let scope = self.scope.clone();
        event
            .wait_until(async move {
                let removed = lifecycle.activate().await?;
                tracing::info!(removed = removed.len(), "stale caches evicted");
                scope.claim_clients();
                Ok(())
            })
            .await;
    }

    pub async fn on_fetch(&self, event: &FetchEvent) -> Option<Response> {
        self.router.respond(event).await
    }

    pub fn on_message(&self, data: &Value) -> bool {
        handle_message(&self.scope, data)
    }
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("cache_name", &self.cache_name())
            .finish_non_exhaustive()
    }
}
