mod common;

use std::net::SocketAddrV6;

use common::*;
use threadnode::mesh::{MeshRole, OnMeshPrefix, COMMAND_PORT, HELLO_PORT, REALM_LOCAL_ALL_NODES};
use threadnode::node::resolver::{resolve, resolve_default_route};
use threadnode::node::{DestinationPolicy, NodeEvent, NodeSettings};

fn reporting_sensor() -> TestNode {
    let mut node = sensor();
    node.handle(NodeEvent::datagram(COMMAND_PORT, b"start"));
    node
}

#[test]
fn hello_goes_to_border_router_rloc() {
    let mut node = reporting_sensor();
    node.handle(NodeEvent::TimerTick);
    let sent = node.mesh().sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].dest, SocketAddrV6::new(rloc(BR_RLOC16), HELLO_PORT, 0, 0));
    assert_eq!(sent[0].payload_str(), "hello-ABCD");
    // Ephemeral socket is released after every send.
    assert_eq!(node.mesh().open_socket_count(), 1);
}

#[test]
fn destination_follows_border_router_change() {
    let mut node = reporting_sensor();
    node.handle(NodeEvent::TimerTick);

    node.mesh_mut().network_data = vec![br_prefix(0x5800)];
    node.handle(NodeEvent::TimerTick);

    let sent = node.mesh().sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(*sent[0].dest.ip(), rloc(BR_RLOC16));
    assert_eq!(*sent[1].dest.ip(), rloc(0x5800));
}

#[test]
fn first_default_route_entry_wins() {
    let mut mesh = formed_mesh(MeshRole::Child);
    let mut no_route = br_prefix(0x1000);
    no_route.default_route = false;
    mesh.network_data.insert(0, no_route);
    mesh.push_prefix(br_prefix(0x2000));
    assert_eq!(resolve_default_route(&mesh), Some(rloc(BR_RLOC16)));
}

#[test]
fn no_default_route_skips_cycle_then_recovers() {
    let mut node = reporting_sensor();
    node.mesh_mut().network_data.clear();
    node.handle(NodeEvent::TimerTick);
    assert!(node.mesh().sent().is_empty());
    assert_eq!(node.metrics().hellos_skipped, 1);

    node.mesh_mut().push_prefix(br_prefix(0x6c00));
    node.handle(NodeEvent::TimerTick);
    assert_eq!(node.mesh().sent().len(), 1);
    assert_eq!(*node.mesh().sent()[0].dest.ip(), rloc(0x6c00));
}

#[test]
fn detached_node_sends_nothing() {
    let mut node = reporting_sensor();
    node.mesh_mut().set_role(MeshRole::Detached);
    node.handle(NodeEvent::TimerTick);
    assert!(node.mesh().sent().is_empty());
    assert_eq!(node.metrics().hellos_skipped, 1);
}

#[test]
fn send_failure_is_counted_not_fatal() {
    let mut node = reporting_sensor();
    node.mesh_mut().fail_send = true;
    node.handle(NodeEvent::TimerTick);
    node.mesh_mut().fail_send = false;
    node.handle(NodeEvent::TimerTick);
    let m = node.metrics();
    assert_eq!(m.hellos_failed, 1);
    assert_eq!(m.hellos_sent, 1);
}

#[test]
fn alternate_policies() {
    let mut mesh = formed_mesh(MeshRole::Child);
    assert_eq!(resolve(DestinationPolicy::LeaderRloc, &mesh), None);
    mesh.leader_rloc16 = Some(0xfc00);
    assert_eq!(resolve(DestinationPolicy::LeaderRloc, &mesh), Some(rloc(0xfc00)));
    assert_eq!(
        resolve(DestinationPolicy::Multicast, &mesh),
        Some(REALM_LOCAL_ALL_NODES)
    );

    let settings = NodeSettings {
        destination: DestinationPolicy::LeaderRloc,
        ..Default::default()
    };
    let mut node = node_with(mesh, settings);
    node.handle(NodeEvent::datagram(COMMAND_PORT, b"start"));
    node.handle(NodeEvent::TimerTick);
    assert_eq!(*node.mesh().sent()[0].dest.ip(), rloc(0xfc00));
}

#[test]
fn unknown_mesh_local_prefix_resolves_nothing() {
    let mut mesh = threadnode::mesh::sim::SimMesh::new();
    mesh.push_prefix(OnMeshPrefix::border_router(
        "fd11:22::".parse().unwrap(),
        64,
        BR_RLOC16,
    ));
    assert_eq!(resolve_default_route(&mesh), None);
}
