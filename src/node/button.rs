//! What a local button press does.

use serde::{Deserialize, Serialize};
use std::net::SocketAddrV6;

use super::command::{NodeCommand, ReportingState, Transition};
use crate::mesh::REALM_LOCAL_ALL_NODES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    /// Flip the local reporting state and multicast the matching start/stop.
    BroadcastCommand,
    /// Multicast `toggle` to the light port.
    LightToggle,
    /// Send one hello right away.
    Hello,
    #[default]
    None,
}

/// Realm-local all-nodes destination on `port`.
pub fn multicast_dest(port: u16) -> SocketAddrV6 {
    SocketAddrV6::new(REALM_LOCAL_ALL_NODES, port, 0, 0)
}

/// Command a broadcast-command press applies given the current state.
pub fn next_command(state: ReportingState) -> NodeCommand {
    match state {
        ReportingState::Idle => NodeCommand::Start,
        ReportingState::Reporting => NodeCommand::Stop,
    }
}

/// Command word announcing a completed transition, if any.
pub fn announce(transition: Transition) -> Option<NodeCommand> {
    match transition {
        Transition::Started => Some(NodeCommand::Start),
        Transition::Stopped => Some(NodeCommand::Stop),
        Transition::Unchanged => None,
    }
}
