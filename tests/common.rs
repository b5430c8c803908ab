//! Test utilities & fixtures.
//! Builds nodes on the in-memory mesh with recording collaborators.
#![allow(dead_code)] // Each test binary uses a different subset.

use std::net::{Ipv6Addr, SocketAddrV6};

use threadnode::hw::{ManualTimer, RecordingIndicator};
use threadnode::mesh::sim::SimMesh;
use threadnode::mesh::{MeshRole, OnMeshPrefix};
use threadnode::node::{Node, NodeIdentity, NodeSettings};

pub type TestNode = Node<SimMesh, RecordingIndicator, ManualTimer>;

pub const MESH_LOCAL: &str = "fd00:1234:5678:9abc::";
pub const BR_RLOC16: u16 = 0x4000;

pub fn identity() -> NodeIdentity {
    NodeIdentity::new([0x00, 0x12, 0x4b, 0x00, 0x01, 0x02, 0xab, 0xcd])
}

pub fn br_prefix(rloc16: u16) -> OnMeshPrefix {
    OnMeshPrefix::border_router("fd11:22::".parse().unwrap(), 64, rloc16)
}

/// RLOC address of `rloc16` in the test partition.
pub fn rloc(rloc16: u16) -> Ipv6Addr {
    format!("fd00:1234:5678:9abc:0:ff:fe00:{:x}", rloc16).parse().unwrap()
}

/// Formed mesh with one border router advertising a default route.
pub fn formed_mesh(role: MeshRole) -> SimMesh {
    let mut mesh = SimMesh::formed(MESH_LOCAL.parse().unwrap(), role);
    mesh.push_prefix(br_prefix(BR_RLOC16));
    mesh
}

pub fn node_with(mesh: SimMesh, settings: NodeSettings) -> TestNode {
    let mut node = Node::new(
        mesh,
        RecordingIndicator::new(),
        ManualTimer::new(),
        identity(),
        settings,
    );
    node.bootstrap();
    node
}

/// Bootstrapped sensor node attached as a Child.
pub fn sensor() -> TestNode {
    node_with(formed_mesh(MeshRole::Child), NodeSettings::default())
}

pub fn peer() -> SocketAddrV6 {
    SocketAddrV6::new(rloc(0x0401), 49152, 0, 0)
}
