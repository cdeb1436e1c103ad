//! Core types and shared functionality for colorwise-sw.
//!
//! This crate provides:
//! - Request/response model with single-consumption response bodies
//! - Named cache stores (in-memory and SQLite backends)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod net;

pub use cache::{Cache, CacheDb, CacheStorage, MemoryStorage};
pub use config::{AppConfig, ConfigError, StorageBackend};
pub use error::Error;
pub use net::{Request, Response, ResponseType};
