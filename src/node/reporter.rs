//! Hello reporter: builds the telemetry payload and sends it fire-and-forget.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::net::SocketAddrV6;

use super::identity::{NodeIdentity, SuffixCase};
use super::resolver::{resolve, DestinationPolicy};
use crate::error::NodeError;
use crate::logutil::escape_payload;
use crate::mesh::MeshStack;

/// Upper bound for any hello payload.
pub const HELLO_MAX_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HelloFormat {
    /// `hello-ABCD`
    #[default]
    Dashed,
    /// `hello world ABCD`
    Spaced,
}

impl HelloFormat {
    pub fn prefix(self) -> &'static str {
        match self {
            HelloFormat::Dashed => "hello-",
            HelloFormat::Spaced => "hello world ",
        }
    }
}

/// Build the hello payload, cut to [`HELLO_MAX_LEN`] bytes on a char boundary.
pub fn hello_payload(format: HelloFormat, suffix: &str) -> String {
    let mut s = String::with_capacity(HELLO_MAX_LEN);
    s.push_str(format.prefix());
    for ch in suffix.chars() {
        if s.len() + ch.len_utf8() > HELLO_MAX_LEN {
            break;
        }
        s.push(ch);
    }
    s
}

/// Open an ephemeral socket, send one datagram, close it. The socket is closed even
/// when the send fails.
pub fn transmit<M: MeshStack + ?Sized>(
    mesh: &mut M,
    dest: SocketAddrV6,
    payload: &[u8],
) -> Result<(), NodeError> {
    let socket = mesh
        .udp_open()
        .map_err(|source| NodeError::TransmitFailure { dest, source })?;
    let result = mesh.udp_send(socket, &dest, payload);
    mesh.udp_close(socket);
    result.map_err(|source| NodeError::TransmitFailure { dest, source })?;
    trace!("-> [{}]:{} '{}'", dest.ip(), dest.port(), escape_payload(payload));
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Reporter {
    format: HelloFormat,
    policy: DestinationPolicy,
    case: SuffixCase,
    port: u16,
}

impl Reporter {
    pub fn new(format: HelloFormat, policy: DestinationPolicy, case: SuffixCase, port: u16) -> Self {
        Self {
            format,
            policy,
            case,
            port,
        }
    }

    pub fn payload(&self, identity: &NodeIdentity) -> String {
        hello_payload(self.format, &identity.suffix(self.case))
    }

    /// Resolve a destination and send one hello.
    ///
    /// Returns `NetworkNotReady` while detached or when nothing resolves; the caller
    /// skips this cycle and tries again on the next trigger.
    pub fn send_hello<M: MeshStack + ?Sized>(
        &self,
        mesh: &mut M,
        identity: &NodeIdentity,
    ) -> Result<SocketAddrV6, NodeError> {
        let role = mesh.role();
        if !role.is_attached() {
            return Err(NodeError::NetworkNotReady("not attached"));
        }
        let addr = resolve(self.policy, &*mesh).ok_or(NodeError::NetworkNotReady(
            "no destination for hello",
        ))?;
        let dest = SocketAddrV6::new(addr, self.port, 0, 0);
        let payload = self.payload(identity);
        transmit(mesh, dest, payload.as_bytes())?;
        debug!("Sent '{}' to [{}]:{}", payload, addr, self.port);
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::sim::SimMesh;
    use crate::mesh::{MeshRole, OnMeshPrefix, HELLO_PORT};

    fn identity() -> NodeIdentity {
        NodeIdentity::new([0, 0x12, 0x4b, 0, 0, 0, 0xab, 0xcd])
    }

    #[test]
    fn payload_formats() {
        assert_eq!(hello_payload(HelloFormat::Dashed, "ABCD"), "hello-ABCD");
        assert_eq!(hello_payload(HelloFormat::Spaced, "ABCD"), "hello world ABCD");
        let long = "X".repeat(64);
        assert_eq!(hello_payload(HelloFormat::Spaced, &long).len(), HELLO_MAX_LEN);
    }

    #[test]
    fn send_skips_when_detached_or_unresolved() {
        let reporter = Reporter::new(
            HelloFormat::Dashed,
            DestinationPolicy::DefaultRoute,
            SuffixCase::Upper,
            HELLO_PORT,
        );
        let mut mesh = SimMesh::formed("fd00::".parse().unwrap(), MeshRole::Detached);
        mesh.push_prefix(OnMeshPrefix::border_router("fd11:22::".parse().unwrap(), 64, 0x4000));
        let err = reporter.send_hello(&mut mesh, &identity()).unwrap_err();
        assert_eq!(err.kind(), "network_not_ready");

        mesh.set_role(MeshRole::Child);
        mesh.network_data.clear();
        let err = reporter.send_hello(&mut mesh, &identity()).unwrap_err();
        assert_eq!(err.kind(), "network_not_ready");
        assert!(mesh.sent().is_empty());
        assert_eq!(mesh.open_socket_count(), 0);
    }

    #[test]
    fn send_failure_closes_socket() {
        let reporter = Reporter::new(
            HelloFormat::Dashed,
            DestinationPolicy::Multicast,
            SuffixCase::Lower,
            HELLO_PORT,
        );
        let mut mesh = SimMesh::formed("fd00::".parse().unwrap(), MeshRole::Router);
        mesh.fail_send = true;
        let err = reporter.send_hello(&mut mesh, &identity()).unwrap_err();
        assert_eq!(err.kind(), "transmit_failure");
        assert_eq!(mesh.open_socket_count(), 0);
        assert_eq!(mesh.closed_sockets().len(), 1);
    }
}
