//! Scripted collaborators for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colorwise_client::Network;
use colorwise_core::{AppConfig, Error, Request, Response};
use http::StatusCode;
use tokio::sync::Notify;
use url::Url;

pub const ORIGIN: &str = "https://colorwise.example";

pub fn config(version: &str) -> AppConfig {
    AppConfig { version: version.into(), origin: ORIGIN.into(), ..Default::default() }
}

pub fn get(path: &str) -> Request {
    Request::get_relative(&Url::parse(ORIGIN).unwrap(), path).unwrap()
}

#[derive(Clone)]
enum Route {
    Respond(StatusCode, &'static str),
    Held(StatusCode, &'static str, Arc<Notify>),
    Reject,
}

/// Network whose answers are set per URL. Unknown URLs are rejected.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    offline: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve every default pre-cache URL with a 200.
    pub fn with_precache() -> Self {
        let network = Self::new();
        for path in AppConfig::default().precache_urls {
            network.respond(&path, StatusCode::OK, "asset");
        }
        network
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: &'static str) {
        self.routes.lock().unwrap().insert(get(path).url().to_string(), Route::Respond(status, body));
    }

    /// Answer `path` only once the returned gate is notified.
    pub fn hold(&self, path: &str, status: StatusCode, body: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.routes.lock().unwrap().insert(get(path).url().to_string(), Route::Held(status, body, gate.clone()));
        gate
    }

    pub fn reject(&self, path: &str) {
        self.routes.lock().unwrap().insert(get(path).url().to_string(), Route::Reject);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn calls(&self, path: &str) -> usize {
        let url = get(path).url().to_string();
        self.calls.lock().unwrap().iter().filter(|u| **u == url).count()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url().to_string();
        self.calls.lock().unwrap().push(url.clone());

        if *self.offline.lock().unwrap() {
            return Err(Error::Network(format!("{url}: offline")));
        }

        let route = self.routes.lock().unwrap().get(&url).cloned();
        match route {
            Some(Route::Respond(status, body)) => Ok(Response::new(status, body)),
            Some(Route::Held(status, body, gate)) => {
                gate.notified().await;
                Ok(Response::new(status, body))
            }
            Some(Route::Reject) | None => Err(Error::Network(format!("{url}: connection refused"))),
        }
    }
}
