//! Control messages posted by the hosting page.

use serde::Deserialize;
use serde_json::Value;

use crate::scope::WorkerScope;

/// Directives the agent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// `{ "type": "SKIP_WAITING" }`: activate this instance now.
    SkipWaiting,
}

impl ControlMessage {
    /// Recognize a message payload. Anything unrecognized yields `None`.
    pub fn parse(data: &Value) -> Option<Self> {
        Self::deserialize(data).ok()
    }
}

/// React to a posted message. Returns whether it was recognized.
pub fn handle_message(scope: &WorkerScope, data: &Value) -> bool {
    match ControlMessage::parse(data) {
        Some(ControlMessage::SkipWaiting) => {
            scope.skip_waiting();
            true
        }
        None => {
            tracing::trace!(%data, "ignoring unrecognized message");
            false
        }
    }
}
