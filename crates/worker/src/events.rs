//! Lifecycle events and their lifetime extensions.
//!
//! An [`ExtendableEvent`] owns every future handed to [`ExtendableEvent::wait_until`].
//! The host joins them with [`ExtendableEvent::settled`] before it considers the
//! event finished. Dropping an unsettled event aborts whatever is still running.

use std::future::Future;

use colorwise_core::{Error, Request};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Handle that keeps an event alive until its enclosed work settles.
#[derive(Default)]
pub struct ExtendableEvent {
    pending: Mutex<JoinSet<Result<(), Error>>>,
}

impl ExtendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the event's lifetime until `work` completes.
    ///
    /// The work starts immediately; the caller is not made to wait for it.
    pub async fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.pending.lock().await.spawn(work);
    }

    /// Number of extensions that have not been joined yet.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Join every extension. Returns the first failure, after all have settled.
    pub async fn settled(self) -> Result<(), Error> {
        let mut pending = self.pending.into_inner();
        let mut first_error = None;

        while let Some(joined) = pending.join_next().await {
            let outcome = joined.map_err(|e| Error::ExtensionAborted(e.to_string())).and_then(|result| result);
            if let Err(e) = outcome
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Opaque identifier of an open page.
pub type ClientId = u64;

/// An intercepted request together with its lifetime extension.
pub struct FetchEvent {
    request: Request,
    client_id: Option<ClientId>,
    extension: ExtendableEvent,
}

impl FetchEvent {
    pub fn new(request: Request, client_id: Option<ClientId>) -> Self {
        Self { request, client_id, extension: ExtendableEvent::new() }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    /// See [`ExtendableEvent::wait_until`].
    pub async fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.extension.wait_until(work).await;
    }

    /// Give up the request, keeping only the work still to be joined.
    pub fn into_extension(self) -> ExtendableEvent {
        self.extension
    }
}
