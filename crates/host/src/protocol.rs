//! Line protocol spoken on stdin/stdout: one JSON object per line each way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Page-side event delivered to the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A page opened.
    Connect,

    /// A page closed.
    Close { client: u64 },

    /// A page issued a request.
    Fetch {
        client: u64,
        /// Absolute, or relative to the configured origin.
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },

    /// A page posted a message to the agent.
    Message { data: Value },

    /// A new application version was deployed.
    Register { version: String },

    /// List current cache store names.
    Caches,
}

fn default_method() -> String {
    "GET".into()
}

/// Host reply, one per event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Client { client: u64 },
    Closed { closed: bool },
    Response {
        status: u16,
        #[serde(rename = "type")]
        response_type: String,
        bytes: usize,
    },
    Unavailable { unavailable: bool },
    Message { recognized: bool },
    Worker { worker: u64, version: String, state: String },
    Caches { caches: Vec<String> },
    Error { error: String },
}

impl Reply {
    pub fn unavailable() -> Self {
        Self::Unavailable { unavailable: true }
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::Error { error: err.to_string() }
    }
}
