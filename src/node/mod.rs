//! # Node Core
//!
//! One [`Node`] holds every piece of mutable per-node state: reporting state, listener
//! sockets, the armed flag, counters and collected telemetry. It is driven through a
//! single entry point, [`Node::handle`], one [`NodeEvent`] at a time. Whatever owns the
//! node (the Tokio runtime, a test, the `simulate` command) guarantees events are
//! delivered serially, so nothing here is locked.
//!
//! ## Flow
//!
//! ```text
//! RoleChanged ──► activator ──► hello listener armed (Router/Leader)
//! Datagram(command port) ──► dispatcher ──► indicator + periodic timer
//! TimerTick (Reporting) ──► reporter ──► resolver ──► udp send
//! Datagram(hello port, armed) ──► telemetry tracker
//! ```
//!
//! ## Example
//!
//! ```rust
//! use threadnode::hw::{ManualTimer, RecordingIndicator};
//! use threadnode::mesh::sim::SimMesh;
//! use threadnode::mesh::{MeshRole, OnMeshPrefix, COMMAND_PORT};
//! use threadnode::node::{Node, NodeEvent, NodeIdentity, NodeSettings};
//!
//! let mut mesh = SimMesh::formed("fd00:1234:5678:9abc::".parse().unwrap(), MeshRole::Child);
//! mesh.push_prefix(OnMeshPrefix::border_router("fd11:22::".parse().unwrap(), 64, 0x4000));
//! let identity = NodeIdentity::new([0, 0, 0, 0, 0, 0, 0xab, 0xcd]);
//! let mut node = Node::new(mesh, RecordingIndicator::new(), ManualTimer::new(), identity, NodeSettings::default());
//! node.bootstrap();
//! node.handle(NodeEvent::datagram(COMMAND_PORT, b"start"));
//! node.handle(NodeEvent::TimerTick);
//! assert_eq!(node.mesh().sent()[0].payload_str(), "hello-ABCD");
//! ```

pub mod activator;
pub mod button;
pub mod command;
pub mod identity;
pub mod reporter;
pub mod resolver;
pub mod runtime;
pub mod telemetry;

use chrono::Utc;
use log::{debug, error, info, warn};
use std::net::{Ipv6Addr, SocketAddrV6};
use std::time::Duration;

use crate::error::NodeError;
use crate::hw::{Indicator, PeriodicTimer};
use crate::logutil::escape_payload;
use crate::mesh::{
    Dataset, MeshError, MeshRole, MeshStack, OnMeshPrefix, SocketId, COMMAND_PORT, HELLO_PORT,
    LIGHT_PORT,
};
use crate::metrics::{NodeMetrics, Snapshot};

pub use activator::{ArmOutcome, ListenerActivator};
pub use button::ButtonAction;
pub use command::{CommandDispatcher, CommandParser, NodeCommand, ReportingState, Transition};
pub use identity::{NodeIdentity, SuffixCase};
pub use reporter::{HelloFormat, Reporter};
pub use resolver::DestinationPolicy;
pub use telemetry::{HelloTracker, TelemetrySnapshot};

/// Receive buffer bound for light and hello datagrams.
pub const SMALL_BUFFER_LEN: usize = 32;

macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}

/// Everything that reaches the node from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    RoleChanged(MeshRole),
    DatagramReceived {
        port: u16,
        payload: Vec<u8>,
        sender: SocketAddrV6,
    },
    ButtonEdge,
    TimerTick,
}

impl NodeEvent {
    /// Datagram from an unspecified sender, mostly for tests.
    pub fn datagram(port: u16, payload: &[u8]) -> Self {
        NodeEvent::DatagramReceived {
            port,
            payload: payload.to_vec(),
            sender: SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub command: u16,
    pub hello: u16,
    pub light: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            command: COMMAND_PORT,
            hello: HELLO_PORT,
            light: LIGHT_PORT,
        }
    }
}

/// Resolved node behaviour, built from configuration.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub ports: Ports,
    pub command_listener: bool,
    pub light_listener: bool,
    pub hello_listener: bool,
    pub periodic: bool,
    pub interval: Duration,
    pub format: HelloFormat,
    pub destination: DestinationPolicy,
    pub suffix_case: SuffixCase,
    pub button: ButtonAction,
    pub dataset: Option<Dataset>,
    pub border_router: Option<OnMeshPrefix>,
}

impl Default for NodeSettings {
    /// A sensor node: listens for commands, reports every second to the default route.
    fn default() -> Self {
        Self {
            ports: Ports::default(),
            command_listener: true,
            light_listener: false,
            hello_listener: false,
            periodic: true,
            interval: Duration::from_millis(1000),
            format: HelloFormat::Dashed,
            destination: DestinationPolicy::DefaultRoute,
            suffix_case: SuffixCase::Upper,
            button: ButtonAction::None,
            dataset: None,
            border_router: None,
        }
    }
}

pub struct Node<M, L, T> {
    mesh: M,
    indicator: L,
    timer: T,
    identity: NodeIdentity,
    settings: NodeSettings,
    parser: CommandParser,
    dispatcher: CommandDispatcher,
    activator: ListenerActivator,
    reporter: Reporter,
    command_socket: Option<SocketId>,
    light_socket: Option<SocketId>,
    telemetry: HelloTracker,
    metrics: NodeMetrics,
    role: MeshRole,
}

impl<M, L, T> Node<M, L, T>
where
    M: MeshStack,
    L: Indicator,
    T: PeriodicTimer,
{
    pub fn new(mesh: M, indicator: L, timer: T, identity: NodeIdentity, settings: NodeSettings) -> Self {
        let reporter = Reporter::new(
            settings.format,
            settings.destination,
            settings.suffix_case,
            settings.ports.hello,
        );
        Self {
            activator: ListenerActivator::new(settings.ports.hello, settings.hello_listener),
            telemetry: HelloTracker::new(settings.interval),
            reporter,
            mesh,
            indicator,
            timer,
            identity,
            settings,
            parser: CommandParser::new(),
            dispatcher: CommandDispatcher::new(),
            command_socket: None,
            light_socket: None,
            metrics: NodeMetrics::new(),
            role: MeshRole::Disabled,
        }
    }

    /// Apply the dataset and border-router prefix, open the boot-time listeners and
    /// process the current role so a node that is already attached arms right away.
    pub fn bootstrap(&mut self) {
        info!(
            "Node {} bootstrapping (suffix {})",
            self.identity,
            self.identity.suffix(self.settings.suffix_case)
        );

        if let Some(dataset) = self.settings.dataset.clone() {
            if self.mesh.has_active_dataset() {
                debug!("Active dataset present; leaving it alone");
            } else {
                match self.mesh.set_active_dataset(&dataset) {
                    Ok(()) => info!(
                        "Applied dataset '{}' (pan 0x{:04x}, channel {})",
                        dataset.network_name, dataset.pan_id, dataset.channel
                    ),
                    Err(e) => error!("Failed to apply dataset: {}", e),
                }
            }
        }

        if let Some(prefix) = self.settings.border_router.clone() {
            match self.mesh.add_on_mesh_prefix(&prefix) {
                Ok(()) => info!("Published on-mesh prefix {}/{}", prefix.prefix, prefix.length),
                Err(MeshError::Already) => debug!("On-mesh prefix {} already published", prefix.prefix),
                Err(e) => error!("Failed to publish on-mesh prefix {}: {}", prefix.prefix, e),
            }
        }

        if self.settings.command_listener && self.command_socket.is_none() {
            self.command_socket = self.open_boot_listener(self.settings.ports.command, "command listener");
        }
        if self.settings.light_listener && self.light_socket.is_none() {
            self.light_socket = self.open_boot_listener(self.settings.ports.light, "light listener");
        }

        let role = self.mesh.role();
        self.handle(NodeEvent::RoleChanged(role));
    }

    fn open_boot_listener(&mut self, port: u16, what: &'static str) -> Option<SocketId> {
        match activator::open_listener(&mut self.mesh, port, what) {
            Ok(socket) => {
                info!("{} bound on port {}", what, port);
                Some(socket)
            }
            Err(e) => {
                error!("{} unavailable, continuing without it: {}", what, e);
                None
            }
        }
    }

    /// Process one event to completion.
    pub fn handle(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::RoleChanged(role) => self.on_role_changed(role),
            NodeEvent::DatagramReceived {
                port,
                payload,
                sender,
            } => self.on_datagram(port, &payload, sender),
            NodeEvent::ButtonEdge => self.on_button(),
            NodeEvent::TimerTick => self.on_timer_tick(),
        }
    }

    fn on_role_changed(&mut self, role: MeshRole) {
        if role != self.role {
            info!("Role changed: {} -> {}", self.role, role);
        }
        self.role = role;
        match self.activator.on_role_changed(&mut self.mesh, role) {
            Ok(ArmOutcome::Armed) => self.metrics.inc_listener_arm(),
            Ok(ArmOutcome::Disarmed) => self.metrics.inc_listener_disarm(),
            Ok(_) => {}
            Err(_) => self.metrics.inc_listener_arm_failure(),
        }
    }

    fn on_datagram(&mut self, port: u16, payload: &[u8], sender: SocketAddrV6) {
        let mut handled = false;
        if port == self.settings.ports.command && self.command_socket.is_some() {
            self.on_command_payload(payload);
            handled = true;
        }
        if port == self.settings.ports.light && self.light_socket.is_some() {
            self.on_light_payload(payload);
            handled = true;
        }
        if port == self.activator.port() && self.activator.is_armed() {
            self.on_hello_payload(payload, sender);
            handled = true;
        }
        if !handled {
            debug!("No listener for datagram on port {} from {}", port, sender);
        }
    }

    /// Feed one command-port payload through the dispatcher.
    pub fn on_command_payload(&mut self, payload: &[u8]) -> Transition {
        let decoded = match command::decode_command(&self.parser, payload) {
            Ok(d) => d,
            Err(e) => {
                debug!("Ignoring command datagram: {}", e);
                self.metrics.inc_command_ignored();
                return Transition::Unchanged;
            }
        };
        if decoded.truncated {
            self.metrics.inc_command_truncated();
            sec_log!(
                "Oversize command datagram ({} bytes) truncated: '{}'",
                payload.len(),
                escape_payload(payload)
            );
        }
        if matches!(decoded.command, NodeCommand::Unknown | NodeCommand::Toggle) {
            debug!("Unrecognised command '{}'", escape_payload(payload));
            self.metrics.inc_command_ignored();
            return Transition::Unchanged;
        }
        self.metrics.inc_command_accepted();
        self.apply_command(decoded.command)
    }

    fn apply_command(&mut self, command: NodeCommand) -> Transition {
        let period = self.settings.periodic.then_some(self.settings.interval);
        self.dispatcher
            .apply(command, &mut self.indicator, &mut self.timer, period)
    }

    fn on_light_payload(&mut self, payload: &[u8]) {
        let (kept, truncated) = command::bound_payload(payload, SMALL_BUFFER_LEN);
        if truncated {
            sec_log!("Oversize light datagram ({} bytes) truncated", payload.len());
        }
        if kept == b"toggle" {
            self.indicator.toggle();
            self.metrics.inc_light_toggle();
            info!("Light {}", if self.indicator.is_on() { "ON" } else { "OFF" });
        } else {
            debug!("Ignoring light datagram '{}'", escape_payload(kept));
        }
    }

    fn on_hello_payload(&mut self, payload: &[u8], sender: SocketAddrV6) {
        let (kept, _) = command::bound_payload(payload, SMALL_BUFFER_LEN);
        self.metrics.inc_hello_received();
        info!("Hello from [{}]: '{}'", sender.ip(), escape_payload(kept));
        if let Some(stats) = self.telemetry.record(kept, *sender.ip(), Utc::now()) {
            debug!("  packets={} missed={}", stats.packets, stats.missed);
        }
    }

    fn on_timer_tick(&mut self) {
        if self.dispatcher.state() != ReportingState::Reporting {
            debug!("Timer tick while idle; ignored");
            return;
        }
        self.send_hello();
    }

    fn on_button(&mut self) {
        match self.settings.button {
            ButtonAction::BroadcastCommand => {
                let command = button::next_command(self.dispatcher.state());
                let transition = self.apply_command(command);
                if let Some(cmd) = button::announce(transition) {
                    let dest = button::multicast_dest(self.settings.ports.command);
                    self.multicast(dest, cmd.as_str());
                }
            }
            ButtonAction::LightToggle => {
                let dest = button::multicast_dest(self.settings.ports.light);
                self.multicast(dest, NodeCommand::Toggle.as_str());
            }
            ButtonAction::Hello => self.send_hello(),
            ButtonAction::None => debug!("Button edge ignored"),
        }
    }

    fn multicast(&mut self, dest: SocketAddrV6, word: &str) {
        match reporter::transmit(&mut self.mesh, dest, word.as_bytes()) {
            Ok(()) => info!("Multicast '{}' to [{}]:{}", word, dest.ip(), dest.port()),
            Err(e) => warn!("Multicast '{}' failed ({}): {}", word, e.kind(), e),
        }
    }

    fn send_hello(&mut self) {
        match self.reporter.send_hello(&mut self.mesh, &self.identity) {
            Ok(_) => self.metrics.inc_hello_sent(),
            Err(e @ NodeError::NetworkNotReady(_)) => {
                debug!("Hello skipped: {}", e);
                self.metrics.inc_hello_skipped();
            }
            Err(e) => {
                warn!("Hello dropped ({}): {}", e.kind(), e);
                self.metrics.inc_hello_failed();
            }
        }
    }

    pub fn reporting_state(&self) -> ReportingState {
        self.dispatcher.state()
    }

    pub fn role(&self) -> MeshRole {
        self.role
    }

    pub fn is_listener_armed(&self) -> bool {
        self.activator.is_armed()
    }

    pub fn command_listener_open(&self) -> bool {
        self.command_socket.is_some()
    }

    pub fn light_listener_open(&self) -> bool {
        self.light_socket.is_some()
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn metrics(&self) -> Snapshot {
        self.metrics.snapshot()
    }

    pub fn telemetry(&self) -> &HelloTracker {
        &self.telemetry
    }

    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut M {
        &mut self.mesh
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}
