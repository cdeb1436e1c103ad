//! Hosting side of the agent: installs versions, promotes them and routes page traffic.
//!
//! At most one worker is *active* (answering fetches for the pages it
//! controls) and at most one is *waiting* (installed, not yet active). A
//! waiting worker is promoted when there is no active worker, when it asked to
//! skip waiting, or when no open page is controlled by the active worker.
//!
//! Transitions are serialized. Outstanding fetch extensions are joined before
//! any promotion. A fetch still in flight at that point writes through only
//! into a store that exists, so it cannot bring back an evicted one. Finished
//! extensions are reaped on every fetch.

use std::collections::BTreeMap;
use std::sync::Arc;

use colorwise_client::Network;
use colorwise_core::{AppConfig, CacheStorage, Error, Request, Response};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::events::{ClientId, ExtendableEvent, FetchEvent};
use crate::worker::{ServiceWorker, WorkerState};

#[derive(Default)]
struct Inner {
    active: Option<Arc<ServiceWorker>>,
    waiting: Option<Arc<ServiceWorker>>,
    /// Open pages and the id of the worker controlling each, if any.
    clients: BTreeMap<ClientId, Option<u64>>,
    next_client: ClientId,
}

pub struct Registration {
    config: AppConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    transition: Mutex<()>,
    inner: Mutex<Inner>,
    extensions: Mutex<JoinSet<()>>,
}

impl Registration {
    pub fn new(config: AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            storage,
            network,
            transition: Mutex::new(()),
            inner: Mutex::new(Inner { next_client: 1, ..Default::default() }),
            extensions: Mutex::new(JoinSet::new()),
        }
    }

    /// Install `version` and promote it if nothing holds it back.
    ///
    /// A failed install leaves the worker redundant and the active one in place.
    pub async fn register(&self, version: &str) -> Result<Arc<ServiceWorker>, Error> {
        let _transition = self.transition.lock().await;

        let config = self.config.with_version(version);
        let worker = Arc::new(ServiceWorker::new(&config, self.storage.clone(), self.network.clone())?);
        tracing::info!(worker = worker.id(), version, "installing");

        let event = ExtendableEvent::new();
        worker.on_install(&event).await;
        if let Err(e) = event.settled().await {
            tracing::warn!(worker = worker.id(), version, error = %e, "install failed");
            worker.set_state(WorkerState::Redundant).await;
            return Err(e);
        }
        worker.set_state(WorkerState::Installed).await;

        let replaced = self.inner.lock().await.waiting.replace(worker.clone());
        if let Some(old) = replaced {
            old.set_state(WorkerState::Redundant).await;
        }

        self.promote_if_ready().await;
        Ok(worker)
    }

    /// Open a page. It is controlled by the active worker, if there is one.
    pub async fn connect_client(&self) -> ClientId {
        let mut inner = self.inner.lock().await;
        let id = inner.next_client;
        inner.next_client += 1;
        let controller = inner.active.as_ref().map(|w| w.id());
        inner.clients.insert(id, controller);
        tracing::debug!(client = id, ?controller, "client connected");
        id
    }

    /// Close a page. Returns whether it was open.
    pub async fn close_client(&self, client: ClientId) -> bool {
        let _transition = self.transition.lock().await;
        let removed = self.inner.lock().await.clients.remove(&client).is_some();
        if removed {
            tracing::debug!(client, "client closed");
            self.promote_if_ready().await;
        }
        removed
    }

    /// Deliver a page message to the waiting worker, or the active one.
    ///
    /// Returns whether the message was recognized.
    pub async fn post_message(&self, data: &Value) -> bool {
        let _transition = self.transition.lock().await;
        let target = {
            let inner = self.inner.lock().await;
            inner.waiting.clone().or_else(|| inner.active.clone())
        };
        let Some(worker) = target else {
            tracing::debug!("no worker to receive message");
            return false;
        };
        let recognized = worker.on_message(data);
        self.promote_if_ready().await;
        recognized
    }

    /// Answer a page's request. `None` means unavailable.
    ///
    /// Pages without a controller bypass the agent entirely.
    pub async fn fetch(&self, client: ClientId, request: Request) -> Option<Response> {
        let controller = {
            let inner = self.inner.lock().await;
            let id = inner.clients.get(&client).copied().flatten();
            inner.active.clone().filter(|w| Some(w.id()) == id)
        };

        let Some(worker) = controller else {
            return match self.network.fetch(&request).await {
                Ok(response) => Some(response),
                Err(e) => {
                    tracing::debug!(client, url = %request.url(), error = %e, "uncontrolled fetch failed");
                    None
                }
            };
        };

        let event = FetchEvent::new(request, Some(client));
        let response = worker.on_fetch(&event).await;
        let extension = event.into_extension();
        let mut extensions = self.extensions.lock().await;
        while extensions.try_join_next().is_some() {}
        extensions.spawn(async move {
            if let Err(e) = extension.settled().await {
                tracing::debug!(client, error = %e, "fetch extension failed");
            }
        });
        response
    }

    /// Join every outstanding fetch extension.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.extensions.lock().await);
        while pending.join_next().await.is_some() {}
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.inner.lock().await.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        self.inner.lock().await.waiting.clone()
    }

    /// Id of the worker controlling `client`, if any.
    pub async fn controller_of(&self, client: ClientId) -> Option<u64> {
        self.inner.lock().await.clients.get(&client).copied().flatten()
    }

    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.storage.keys().await
    }

    async fn promote_if_ready(&self) {
        let ready = {
            let inner = self.inner.lock().await;
            let Some(waiting) = inner.waiting.clone() else {
                return;
            };
            let ready = match &inner.active {
                None => true,
                Some(active) => {
                    waiting.scope().skip_waiting_requested()
                        || !inner.clients.values().any(|c| *c == Some(active.id()))
                }
            };
            ready.then_some(waiting)
        };

        if let Some(worker) = ready {
            self.activate(worker).await;
        }
    }

    async fn activate(&self, worker: Arc<ServiceWorker>) {
        self.settle().await;

        let previous = {
            let mut inner = self.inner.lock().await;
            inner.waiting = None;
            let previous = inner.active.replace(worker.clone());
            if let Some(prev) = &previous {
                for controller in inner.clients.values_mut() {
                    if *controller == Some(prev.id()) {
                        *controller = Some(worker.id());
                    }
                }
            }
            previous
        };
        if let Some(prev) = previous {
            prev.set_state(WorkerState::Redundant).await;
        }

        worker.set_state(WorkerState::Activating).await;
        let event = ExtendableEvent::new();
        worker.on_activate(&event).await;
        if let Err(e) = event.settled().await {
            tracing::warn!(worker = worker.id(), error = %e, "activation cleanup failed");
        }
        worker.set_state(WorkerState::Activated).await;
        tracing::info!(worker = worker.id(), version = worker.version(), "activated");

        if worker.scope().take_claim() {
            let mut inner = self.inner.lock().await;
            let mut claimed = 0;
            for controller in inner.clients.values_mut() {
                if controller.is_none() {
                    *controller = Some(worker.id());
                    claimed += 1;
                }
            }
            tracing::debug!(worker = worker.id(), claimed, "clients claimed");
        }
    }
}
