//! # Mesh Stack Collaborator Interface
//!
//! The Thread stack itself is not part of this crate. This module describes the call
//! contracts the node core relies on and the handful of addressing primitives that
//! must stay bit-exact with the Thread addressing scheme.
//!
//! ## Implementations
//!
//! - [`sim::SimMesh`] - in-memory stack used by tests and the `simulate` command
//! - [`host::HostMesh`] - real UDP over the host IPv6 stack, with the mesh view
//!   (role, network data, mesh-local prefix) supplied by configuration
//!
//! ## Contracts
//!
//! All calls are synchronous and expected to be fast relative to the event cadence.
//! Sockets are identified by an opaque [`SocketId`]. A socket opened with
//! [`MeshStack::udp_open`] may be bound once to a local port; inbound datagrams on
//! bound sockets are delivered to the node as events by whatever drives it.
//!
//! ## Addressing
//!
//! ```rust
//! use std::net::Ipv6Addr;
//! use threadnode::mesh::rloc_address;
//!
//! let prefix = [0xfd, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc];
//! let addr = rloc_address(prefix, 0x4000);
//! assert_eq!(addr, "fd00:1234:5678:9abc:0:ff:fe00:4000".parse::<Ipv6Addr>().unwrap());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv6Addr, SocketAddrV6};
use std::str::FromStr;

pub mod host;
pub mod sim;

/// UDP port for start/stop commands.
pub const COMMAND_PORT: u16 = 1236;
/// UDP port the leader/border router listens on for hello telemetry.
pub const HELLO_PORT: u16 = 1235;
/// UDP port for light toggle commands.
pub const LIGHT_PORT: u16 = 1234;

/// Realm-local all-nodes multicast (`ff03::1`).
pub const REALM_LOCAL_ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff03, 0, 0, 0, 0, 0, 0, 1);

/// Fixed interface identifier bytes of an RLOC address, before the RLOC16.
const RLOC_IID_PREFIX: [u8; 6] = [0x00, 0x00, 0x00, 0xff, 0xfe, 0x00];

/// Length in bytes of the mesh-local prefix.
pub const MESH_LOCAL_PREFIX_LEN: usize = 8;

pub type MeshLocalPrefix = [u8; MESH_LOCAL_PREFIX_LEN];

/// Build the routing-locator address of a node from the mesh-local prefix and its RLOC16.
pub fn rloc_address(prefix: MeshLocalPrefix, rloc16: u16) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets[..MESH_LOCAL_PREFIX_LEN].copy_from_slice(&prefix);
    octets[8..14].copy_from_slice(&RLOC_IID_PREFIX);
    octets[14..].copy_from_slice(&rloc16.to_be_bytes());
    Ipv6Addr::from(octets)
}

/// Take the first 8 bytes of an address as a mesh-local prefix.
pub fn prefix_of(addr: &Ipv6Addr) -> MeshLocalPrefix {
    let mut prefix = [0u8; MESH_LOCAL_PREFIX_LEN];
    prefix.copy_from_slice(&addr.octets()[..MESH_LOCAL_PREFIX_LEN]);
    prefix
}

/// Device role within the mesh, as reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeshRole {
    #[default]
    Disabled,
    Detached,
    Child,
    Router,
    Leader,
}

impl MeshRole {
    /// Router and Leader may host the telemetry listener.
    pub fn is_router_capable(self) -> bool {
        matches!(self, MeshRole::Router | MeshRole::Leader)
    }

    /// Attached to a partition and able to route traffic.
    pub fn is_attached(self) -> bool {
        matches!(self, MeshRole::Child | MeshRole::Router | MeshRole::Leader)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeshRole::Disabled => "disabled",
            MeshRole::Detached => "detached",
            MeshRole::Child => "child",
            MeshRole::Router => "router",
            MeshRole::Leader => "leader",
        }
    }
}

impl fmt::Display for MeshRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeshRole {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Ok(MeshRole::Disabled),
            "detached" => Ok(MeshRole::Detached),
            "child" => Ok(MeshRole::Child),
            "router" => Ok(MeshRole::Router),
            "leader" => Ok(MeshRole::Leader),
            _ => Err(MeshError::NotFound),
        }
    }
}

/// One on-mesh prefix entry of the distributed network data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnMeshPrefix {
    pub prefix: Ipv6Addr,
    #[serde(default = "default_prefix_length")]
    pub length: u8,
    #[serde(default)]
    pub preferred: bool,
    #[serde(default)]
    pub slaac: bool,
    #[serde(default)]
    pub on_mesh: bool,
    #[serde(default)]
    pub stable: bool,
    #[serde(default)]
    pub default_route: bool,
    /// Short address of the advertising node.
    #[serde(default)]
    pub rloc16: u16,
}

fn default_prefix_length() -> u8 {
    64
}

impl OnMeshPrefix {
    /// A fully-flagged border-router prefix (preferred, SLAAC, on-mesh, stable, default route).
    pub fn border_router(prefix: Ipv6Addr, length: u8, rloc16: u16) -> Self {
        Self {
            prefix,
            length,
            preferred: true,
            slaac: true,
            on_mesh: true,
            stable: true,
            default_route: true,
            rloc16,
        }
    }
}

/// Operational dataset pushed to a stack that has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub network_name: String,
    pub pan_id: u16,
    pub channel: u8,
    pub network_key: [u8; 16],
}

/// Opaque handle of a UDP socket owned by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub u32);

/// Errors reported by the mesh stack.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("no message buffers available")]
    NoBufs,
    #[error("invalid state")]
    InvalidState,
    #[error("already bound or present")]
    Already,
    #[error("not found")]
    NotFound,
    #[error("unknown socket {0:?}")]
    UnknownSocket(SocketId),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The slice of the Thread stack API the node core consumes.
pub trait MeshStack {
    /// Current device role.
    fn role(&self) -> MeshRole;

    /// Mesh-local prefix, `None` while no network is formed.
    fn mesh_local_prefix(&self) -> Option<MeshLocalPrefix>;

    /// Snapshot of on-mesh prefix entries in stack enumeration order.
    fn on_mesh_prefixes(&self) -> Vec<OnMeshPrefix>;

    /// RLOC address of the current leader.
    fn leader_rloc(&self) -> Result<Ipv6Addr, MeshError>;

    fn udp_open(&mut self) -> Result<SocketId, MeshError>;

    fn udp_bind(&mut self, socket: SocketId, port: u16) -> Result<(), MeshError>;

    fn udp_send(
        &mut self,
        socket: SocketId,
        dest: &SocketAddrV6,
        payload: &[u8],
    ) -> Result<(), MeshError>;

    fn udp_close(&mut self, socket: SocketId);

    fn has_active_dataset(&self) -> bool;

    fn set_active_dataset(&mut self, dataset: &Dataset) -> Result<(), MeshError>;

    /// Publish an on-mesh prefix from this node (border router).
    fn add_on_mesh_prefix(&mut self, prefix: &OnMeshPrefix) -> Result<(), MeshError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rloc_address_layout() {
        let prefix = prefix_of(&"fd00:1234:5678:9abc::".parse().unwrap());
        let addr = rloc_address(prefix, 0x4000);
        let octets = addr.octets();
        assert_eq!(&octets[..8], &[0xfd, 0x00, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc]);
        assert_eq!(&octets[8..], &[0x00, 0x00, 0x00, 0xff, 0xfe, 0x00, 0x40, 0x00]);
    }

    #[test]
    fn rloc16_byte_order() {
        let addr = rloc_address([0; 8], 0x1c02);
        assert_eq!(addr.octets()[14], 0x1c);
        assert_eq!(addr.octets()[15], 0x02);
    }

    #[test]
    fn role_classes() {
        assert!(MeshRole::Leader.is_router_capable());
        assert!(MeshRole::Router.is_router_capable());
        assert!(!MeshRole::Child.is_router_capable());
        assert!(MeshRole::Child.is_attached());
        assert!(!MeshRole::Detached.is_attached());
        assert!(!MeshRole::Disabled.is_attached());
    }

    #[test]
    fn role_parse() {
        assert_eq!("Router".parse::<MeshRole>().unwrap(), MeshRole::Router);
        assert_eq!(" leader ".parse::<MeshRole>().unwrap(), MeshRole::Leader);
        assert!("border".parse::<MeshRole>().is_err());
    }
}
