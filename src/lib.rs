//! # threadnode - Command and Telemetry Core for Thread Mesh Nodes
//!
//! threadnode is the protocol and role-coordination core of small Thread mesh nodes:
//! buttons, LEDs, sensor nodes and a leader/border router. It decides how a button
//! press becomes a network-wide command, when a node reports telemetry, when a
//! telemetry listener may be armed, and where telemetry goes.
//!
//! ## Features
//!
//! - **Start/Stop Reporting**: Exact-match `start` / `stop` commands on UDP 1236 drive an Idle/Reporting state machine.
//! - **Hello Telemetry**: `hello-XXXX` datagrams to the current default-route provider on UDP 1235, resolved fresh on every send.
//! - **Role-Gated Listener**: The hello listener is armed once the node is Router or Leader and closed again on demotion.
//! - **Light Toggle**: `toggle` on UDP 1234 flips the local indicator.
//! - **Border Router Bootstrap**: Dataset applied when absent, on-mesh prefix published at boot.
//! - **Host Runtime**: Tokio event loop with real UDP sockets, console and Ctrl-C handling.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use threadnode::config::Config;
//! use threadnode::hw::{LogIndicator, WatchTimer};
//! use threadnode::mesh::host::HostMesh;
//! use threadnode::node::{runtime, Node};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let (inbound_tx, inbound_rx) = tokio::sync::mpsc::unbounded_channel();
//!     let (_console_tx, console_rx) = tokio::sync::mpsc::unbounded_channel();
//!     let (timer, timer_rx) = WatchTimer::new();
//!     let mesh = HostMesh::new(config.mesh_view(0), inbound_tx);
//!     let mut node = Node::new(mesh, LogIndicator::new(), timer, config.identity()?, config.node_settings()?);
//!     node.bootstrap();
//!     let shutdown = async { let _ = tokio::signal::ctrl_c().await; };
//!     runtime::run(node, timer_rx, inbound_rx, console_rx, shutdown).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`node`] - node context, command dispatcher, resolver, reporter, listener activator, runtime
//! - [`mesh`] - mesh stack trait, addressing, simulated and host implementations
//! - [`hw`] - indicator and periodic timer collaborators
//! - [`config`] - configuration management and validation
//! - [`validation`] - value checks and hex parsing
//! - [`metrics`] - per-node counters
//! - [`simulate`] - in-memory sensor/leader scenario
//! - [`error`] - error taxonomy
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Host Runtime   │ ← timer ticks, sockets, console, Ctrl-C
//! └─────────────────┘
//!          │ NodeEvent
//! ┌─────────────────┐
//! │   Node Core     │ ← dispatcher, activator, reporter, resolver
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  Mesh / HW      │ ← MeshStack, Indicator, PeriodicTimer
//! └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod hw;
pub mod logutil;
pub mod mesh;
pub mod metrics;
pub mod node;
pub mod simulate;
pub mod validation;
