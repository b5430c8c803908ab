mod common;

use std::net::{Ipv6Addr, SocketAddrV6};
use std::time::Duration;

use common::*;
use threadnode::hw::{RecordingIndicator, WatchTimer};
use threadnode::mesh::host::InboundDatagram;
use threadnode::mesh::{MeshRole, COMMAND_PORT, HELLO_PORT};
use threadnode::node::{runtime, Node, NodeSettings, ReportingState};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn command(payload: &[u8]) -> InboundDatagram {
    InboundDatagram {
        local_port: COMMAND_PORT,
        payload: payload.to_vec(),
        sender: SocketAddrV6::new(Ipv6Addr::LOCALHOST, 40000, 0, 0),
    }
}

#[tokio::test]
async fn start_command_drives_periodic_hellos() {
    let (timer, timer_rx) = WatchTimer::new();
    let settings = NodeSettings {
        interval: Duration::from_millis(20),
        ..Default::default()
    };
    let mut node = Node::new(formed_mesh(MeshRole::Child), RecordingIndicator::new(), timer, identity(), settings);
    node.bootstrap();

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (_console_tx, console_rx) = mpsc::unbounded_channel::<String>();
    inbound_tx.send(command(b"start")).unwrap();

    let shutdown = tokio::time::sleep(Duration::from_millis(250));
    let node = timeout(
        Duration::from_secs(5),
        runtime::run(node, timer_rx, inbound_rx, console_rx, shutdown),
    )
    .await
    .expect("runtime did not stop");

    assert_eq!(node.reporting_state(), ReportingState::Reporting);
    let sent = node.mesh().sent();
    assert!(sent.len() >= 3, "only {} hello(s) sent", sent.len());
    assert!(sent.iter().all(|d| d.dest.port() == HELLO_PORT));
}

#[tokio::test]
async fn stop_command_halts_ticks() {
    let (timer, timer_rx) = WatchTimer::new();
    let settings = NodeSettings {
        interval: Duration::from_millis(20),
        ..Default::default()
    };
    let mut node = Node::new(formed_mesh(MeshRole::Child), RecordingIndicator::new(), timer, identity(), settings);
    node.bootstrap();

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (_console_tx, console_rx) = mpsc::unbounded_channel::<String>();
    inbound_tx.send(command(b"start")).unwrap();
    inbound_tx.send(command(b"stop")).unwrap();

    let shutdown = tokio::time::sleep(Duration::from_millis(150));
    let node = timeout(
        Duration::from_secs(5),
        runtime::run(node, timer_rx, inbound_rx, console_rx, shutdown),
    )
    .await
    .expect("runtime did not stop");

    assert_eq!(node.reporting_state(), ReportingState::Idle);
    assert!(node.mesh().sent().is_empty());
}

#[tokio::test]
async fn console_role_change_arms_listener_and_quit_stops() {
    let (timer, timer_rx) = WatchTimer::new();
    let settings = NodeSettings {
        hello_listener: true,
        ..Default::default()
    };
    let mut node = Node::new(formed_mesh(MeshRole::Child), RecordingIndicator::new(), timer, identity(), settings);
    node.bootstrap();
    assert!(!node.is_listener_armed());

    let (_inbound_tx, inbound_rx) = mpsc::unbounded_channel::<InboundDatagram>();
    let (console_tx, console_rx) = mpsc::unbounded_channel();
    for line in ["status", "bogus", "role router", "quit"] {
        console_tx.send(line.to_string()).unwrap();
    }

    let node = timeout(
        Duration::from_secs(5),
        runtime::run(node, timer_rx, inbound_rx, console_rx, std::future::pending::<()>()),
    )
    .await
    .expect("quit was not honoured");

    assert_eq!(node.role(), MeshRole::Router);
    assert!(node.is_listener_armed());
    assert!(node.mesh().is_port_bound(HELLO_PORT));
}
