//! Structured errors reported back over the host protocol.

/// Failures surfaced to the page driving the host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Line is not a recognized event object.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The agent rejected the operation.
    #[error(transparent)]
    Agent(#[from] colorwise_core::Error),
}

impl HostError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
