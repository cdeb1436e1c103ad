//! Client code for colorwise-sw.
//!
//! This crate provides the network seam used by the request router and its
//! reqwest-backed implementation.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network};
