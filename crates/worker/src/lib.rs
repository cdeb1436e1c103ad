//! The colorwise offline cache agent.
//!
//! A [`ServiceWorker`] bundles the handlers for one application version:
//! install pre-populates a versioned store, activate evicts older stores, and
//! fetch routes each request network-first with the store as fallback. A
//! [`Registration`] hosts successive versions and delivers page events.

pub mod events;
pub mod lifecycle;
pub mod messages;
pub mod registration;
pub mod router;
pub mod scope;
pub mod worker;

#[cfg(test)]
mod testing;

pub use events::{ClientId, ExtendableEvent, FetchEvent};
pub use lifecycle::CacheLifecycle;
pub use messages::{ControlMessage, handle_message};
pub use registration::Registration;
pub use router::{RequestKind, RequestRouter};
pub use scope::WorkerScope;
pub use worker::{ServiceWorker, WorkerState};
