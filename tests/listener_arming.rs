mod common;

use common::*;
use threadnode::mesh::sim::SimMesh;
use threadnode::mesh::{MeshRole, HELLO_PORT};
use threadnode::node::{NodeEvent, NodeSettings};

fn collector_settings() -> NodeSettings {
    NodeSettings {
        command_listener: false,
        hello_listener: true,
        periodic: false,
        ..Default::default()
    }
}

#[test]
fn router_promotion_binds_hello_port_once() {
    let mut node = node_with(formed_mesh(MeshRole::Detached), collector_settings());
    assert!(!node.is_listener_armed());

    for role in [
        MeshRole::Child,
        MeshRole::Router,
        MeshRole::Router,
        MeshRole::Leader,
        MeshRole::Router,
    ] {
        node.handle(NodeEvent::RoleChanged(role));
    }
    assert!(node.is_listener_armed());
    assert_eq!(node.mesh().bind_count(HELLO_PORT), 1);
    assert_eq!(node.metrics().listener_arms, 1);
}

#[test]
fn already_leader_at_boot_arms_during_bootstrap() {
    let node = node_with(formed_mesh(MeshRole::Leader), collector_settings());
    assert!(node.is_listener_armed());
    assert!(node.mesh().is_port_bound(HELLO_PORT));
}

#[test]
fn demotion_closes_and_promotion_rearms() {
    let mut node = node_with(formed_mesh(MeshRole::Router), collector_settings());
    node.handle(NodeEvent::RoleChanged(MeshRole::Child));
    assert!(!node.is_listener_armed());
    assert!(!node.mesh().is_port_bound(HELLO_PORT));

    node.handle(NodeEvent::RoleChanged(MeshRole::Detached));
    node.handle(NodeEvent::RoleChanged(MeshRole::Router));
    assert!(node.is_listener_armed());
    assert_eq!(node.mesh().bind_count(HELLO_PORT), 2);
    let m = node.metrics();
    assert_eq!(m.listener_arms, 2);
    assert_eq!(m.listener_disarms, 1);
}

#[test]
fn bind_failure_leaves_node_unarmed_and_socket_closed() {
    let mut mesh = formed_mesh(MeshRole::Child);
    mesh.fail_bind = true;
    let mut node = node_with(mesh, collector_settings());
    node.handle(NodeEvent::RoleChanged(MeshRole::Router));
    assert!(!node.is_listener_armed());
    assert_eq!(node.mesh().open_socket_count(), 0);
    assert_eq!(node.metrics().listener_arm_failures, 1);

    // Staying router-capable does not retry.
    node.mesh_mut().fail_bind = false;
    node.handle(NodeEvent::RoleChanged(MeshRole::Leader));
    assert!(!node.is_listener_armed());
    assert_eq!(node.mesh().bind_count(HELLO_PORT), 1);

    // A non-qualifying role in between allows one more attempt.
    node.handle(NodeEvent::RoleChanged(MeshRole::Child));
    node.handle(NodeEvent::RoleChanged(MeshRole::Leader));
    assert!(node.is_listener_armed());
    assert_eq!(node.mesh().bind_count(HELLO_PORT), 2);
}

#[test]
fn repeated_router_events_after_failure_bind_once() {
    let mut mesh = formed_mesh(MeshRole::Child);
    mesh.fail_bind = true;
    let mut node = node_with(mesh, collector_settings());
    for role in [MeshRole::Router, MeshRole::Router, MeshRole::Leader] {
        node.handle(NodeEvent::RoleChanged(role));
    }
    assert_eq!(node.mesh().bind_count(HELLO_PORT), 1);
    assert_eq!(node.metrics().listener_arm_failures, 1);
}

#[test]
fn armed_listener_collects_hellos() {
    let mut node = node_with(formed_mesh(MeshRole::Leader), collector_settings());
    let sender = peer();
    for payload in [&b"hello-ABCD"[..], b"hello-abcd", b"hello-1234", b"garbage"] {
        node.handle(NodeEvent::DatagramReceived {
            port: HELLO_PORT,
            payload: payload.to_vec(),
            sender,
        });
    }
    let telemetry = node.telemetry();
    assert_eq!(telemetry.device_count(), 2);
    assert_eq!(telemetry.device("ABCD").map(|d| d.packets), Some(2));
    assert_eq!(telemetry.snapshot().unrecognized, 1);
    assert_eq!(node.metrics().hellos_received, 4);
}

#[test]
fn hellos_ignored_while_unarmed() {
    let mut node = node_with(formed_mesh(MeshRole::Child), collector_settings());
    node.handle(NodeEvent::datagram(HELLO_PORT, b"hello-ABCD"));
    assert_eq!(node.telemetry().device_count(), 0);
    assert_eq!(node.metrics().hellos_received, 0);
}

#[test]
fn activation_disabled_never_binds() {
    let mut node = node_with(SimMesh::formed(MESH_LOCAL.parse().unwrap(), MeshRole::Leader), NodeSettings::default());
    node.handle(NodeEvent::RoleChanged(MeshRole::Router));
    assert!(!node.is_listener_armed());
    assert_eq!(node.mesh().bind_count(HELLO_PORT), 0);
}
