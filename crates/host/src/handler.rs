//! Dispatches protocol events to the registration.

use std::collections::BTreeMap;

use colorwise_core::Request;
use colorwise_worker::Registration;
use http::header::{HeaderName, HeaderValue};
use http::Method;
use url::Url;

use crate::error::HostError;
use crate::protocol::{HostEvent, Reply};

pub struct Host {
    registration: Registration,
    origin: Url,
}

impl Host {
    pub fn new(registration: Registration, origin: Url) -> Self {
        Self { registration, origin }
    }

    /// Handle one input line, always producing a reply.
    pub async fn handle_line(&self, line: &str) -> Reply {
        let event = match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => event,
            Err(e) => return Reply::error(HostError::invalid(e.to_string())),
        };

        match self.dispatch(event).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "event failed");
                Reply::error(e)
            }
        }
    }

    async fn dispatch(&self, event: HostEvent) -> Result<Reply, HostError> {
        let reply = match event {
            HostEvent::Connect => Reply::Client { client: self.registration.connect_client().await },
            HostEvent::Close { client } => Reply::Closed { closed: self.registration.close_client(client).await },
            HostEvent::Fetch { client, url, method, headers } => {
                let request = self.request(&url, &method, &headers)?;
                match self.registration.fetch(client, request).await {
                    Some(response) => Reply::Response {
                        status: response.status().as_u16(),
                        response_type: response.response_type().to_string(),
                        bytes: response.content_length(),
                    },
                    None => Reply::unavailable(),
                }
            }
            HostEvent::Message { data } => Reply::Message { recognized: self.registration.post_message(&data).await },
            HostEvent::Register { version } => {
                let worker = self.registration.register(&version).await?;
                Reply::Worker {
                    worker: worker.id(),
                    version: worker.version().to_string(),
                    state: worker.state().await.to_string(),
                }
            }
            HostEvent::Caches => {
                self.registration.settle().await;
                Reply::Caches { caches: self.registration.cache_names().await? }
            }
        };
        Ok(reply)
    }

    fn request(&self, url: &str, method: &str, headers: &BTreeMap<String, String>) -> Result<Request, HostError> {
        let method = Method::from_bytes(method.as_bytes()).map_err(|e| HostError::invalid(format!("{method}: {e}")))?;
        let url = self.origin.join(url.trim()).map_err(|e| HostError::invalid(format!("{url}: {e}")))?;

        let mut request = Request::new(method, url)?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| HostError::invalid(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| HostError::invalid(format!("{name}: {e}")))?;
            request = request.with_header(name, value);
        }
        Ok(request)
    }

    /// Let pending background writes finish.
    pub async fn shutdown(&self) {
        self.registration.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use colorwise_client::Network;
    use colorwise_core::{AppConfig, Error, MemoryStorage, Response};
    use http::StatusCode;
    use serde_json::{Value, json};

    const ORIGIN: &str = "https://colorwise.example";

    /// Answers every request with a 200 and its own path, unless offline.
    #[derive(Default)]
    struct EchoNetwork {
        offline: AtomicBool,
    }

    #[async_trait]
    impl Network for EchoNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            Ok(Response::new(StatusCode::OK, request.url().path().to_string()))
        }
    }

    fn host(network: Arc<EchoNetwork>) -> Host {
        let config = AppConfig { version: "v1".into(), origin: ORIGIN.into(), ..Default::default() };
        let registration = Registration::new(config, Arc::new(MemoryStorage::new()), network);
        Host::new(registration, Url::parse(ORIGIN).unwrap())
    }

    async fn send(host: &Host, event: Value) -> Value {
        serde_json::to_value(host.handle_line(&event.to_string()).await).unwrap()
    }

    #[tokio::test]
    async fn test_session() {
        let network = Arc::new(EchoNetwork::default());
        let host = host(network.clone());

        let registered = send(&host, json!({ "event": "register", "version": "v1" })).await;
        assert_eq!(registered["version"], "v1");
        assert_eq!(registered["state"], "activated");

        let page = send(&host, json!({ "event": "connect" })).await;
        let client = page["client"].as_u64().unwrap();

        let fetched = send(&host, json!({ "event": "fetch", "client": client, "url": "/colorwise-app/icon-192.png" })).await;
        assert_eq!(fetched, json!({ "status": 200, "type": "basic", "bytes": "/colorwise-app/icon-192.png".len() }));

        network.offline.store(true, Ordering::SeqCst);
        let offline = send(&host, json!({ "event": "fetch", "client": client, "url": "/colorwise-app/icon-192.png" })).await;
        assert_eq!(offline["status"], 200);
        let entry = send(&host, json!({ "event": "fetch", "client": client, "url": "/colorwise-app/" })).await;
        assert_eq!(entry, json!({ "unavailable": true }));

        let caches = send(&host, json!({ "event": "caches" })).await;
        assert_eq!(caches, json!({ "caches": ["colorwise-v1"] }));
    }

    #[tokio::test]
    async fn test_update_and_message() {
        let host = host(Arc::new(EchoNetwork::default()));
        send(&host, json!({ "event": "register", "version": "v1" })).await;
        send(&host, json!({ "event": "connect" })).await;
        send(&host, json!({ "event": "register", "version": "v2" })).await;

        let caches = send(&host, json!({ "event": "caches" })).await;
        assert_eq!(caches, json!({ "caches": ["colorwise-v2"] }));

        let ack = send(&host, json!({ "event": "message", "data": { "type": "SKIP_WAITING" } })).await;
        assert_eq!(ack, json!({ "recognized": true }));
    }

    #[tokio::test]
    async fn test_failed_install_reported() {
        let network = Arc::new(EchoNetwork::default());
        network.offline.store(true, Ordering::SeqCst);
        let host = host(network);

        let reply = send(&host, json!({ "event": "register", "version": "v1" })).await;
        assert!(reply["error"].as_str().unwrap().starts_with("PRECACHE_FAILED"));
    }

    #[tokio::test]
    async fn test_fetch_headers_forwarded() {
        let host = host(Arc::new(EchoNetwork::default()));
        let headers = BTreeMap::from([("accept".to_string(), "image/png".to_string())]);
        let request = host.request("/colorwise-app/icon-192.png", "GET", &headers).unwrap();
        assert_eq!(request.headers().get(http::header::ACCEPT).unwrap(), "image/png");

        let bad = BTreeMap::from([("bad header".to_string(), "x".to_string())]);
        assert!(matches!(host.request("/colorwise-app/", "GET", &bad), Err(HostError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_malformed_input() {
        let host = host(Arc::new(EchoNetwork::default()));
        let reply = serde_json::to_value(host.handle_line("not json").await).unwrap();
        assert!(reply["error"].as_str().unwrap().starts_with("INVALID_INPUT"));

        let reply = send(&host, json!({ "event": "fetch", "client": 1, "url": "/x", "method": "BAD METHOD" })).await;
        assert!(reply["error"].as_str().unwrap().starts_with("INVALID_INPUT"));
    }
}
