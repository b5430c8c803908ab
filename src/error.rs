//! Error taxonomy for the node core.
//!
//! Every variant is handled where it occurs: the node logs it, bumps a counter and
//! carries on. Only startup (configuration, a required status LED) is allowed to
//! abort the process, and that path goes through `anyhow` in the binary.

use crate::mesh::MeshError;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Socket or peripheral not ready; the feature that needs it is disabled.
    #[error("resource unavailable: {what}: {source}")]
    ResourceUnavailable {
        what: &'static str,
        #[source]
        source: MeshError,
    },

    /// No destination could be resolved yet (network not formed, no border router).
    #[error("network not ready: {0}")]
    NetworkNotReady(&'static str),

    /// Inbound payload could not be interpreted.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The stack refused or failed the send. Dropped, never retried.
    #[error("transmit failure to {dest}: {source}")]
    TransmitFailure {
        dest: std::net::SocketAddrV6,
        #[source]
        source: MeshError,
    },

    /// A required peripheral could not be acquired at boot.
    #[error("hardware init failed: {0}")]
    HardwareInit(String),
}

impl NodeError {
    /// Short machine-friendly label, used in log lines and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::ResourceUnavailable { .. } => "resource_unavailable",
            NodeError::NetworkNotReady(_) => "network_not_ready",
            NodeError::MalformedInput(_) => "malformed_input",
            NodeError::TransmitFailure { .. } => "transmit_failure",
            NodeError::HardwareInit(_) => "hardware_init",
        }
    }
}
