//! Command dispatcher: the two-state Idle/Reporting machine driven by datagrams on the
//! command port.
//!
//! Payloads are first bounded to the receive buffer ([`COMMAND_BUFFER_LEN`], one byte
//! reserved for the terminator) and then matched exactly against the known commands.
//! Substring or prefix matches are never accepted: `"restart"` and `"stopper"` are
//! unknown. Because the bounded length is still longer than every command, a
//! truncated payload can never match either.
//!
//! The dispatcher owns only the reporting state. Side effects go to the indicator and
//! periodic timer passed in by the node, and only on an actual transition; a repeated
//! `start` or `stop` leaves both untouched.

use log::{debug, info, trace};
use serde::Serialize;
use std::time::Duration;

use crate::error::NodeError;
use crate::hw::{Indicator, PeriodicTimer};

/// Receive buffer size for command datagrams, terminator included.
pub const COMMAND_BUFFER_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    Start,
    Stop,
    Toggle,
    Unknown,
}

impl NodeCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeCommand::Start => "start",
            NodeCommand::Stop => "stop",
            NodeCommand::Toggle => "toggle",
            NodeCommand::Unknown => "unknown",
        }
    }
}

/// Exact-match command parser
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandParser;

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &str) -> NodeCommand {
        let cmd = match raw {
            "start" => NodeCommand::Start,
            "stop" => NodeCommand::Stop,
            "toggle" => NodeCommand::Toggle,
            _ => NodeCommand::Unknown,
        };
        trace!("Parsed {:?} from '{}'", cmd, raw.escape_debug());
        cmd
    }
}

/// Command payload after bounding to the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub command: NodeCommand,
    pub truncated: bool,
}

/// Bound `payload` to `buffer_len - 1` bytes. Returns the kept bytes and whether
/// anything was cut off.
pub fn bound_payload(payload: &[u8], buffer_len: usize) -> (&[u8], bool) {
    let cap = buffer_len.saturating_sub(1);
    if payload.len() > cap {
        (&payload[..cap], true)
    } else {
        (payload, false)
    }
}

/// Bound and parse a raw command datagram. Non-UTF-8 input is `MalformedInput`.
pub fn decode_command(parser: &CommandParser, payload: &[u8]) -> Result<Decoded, NodeError> {
    let (kept, truncated) = bound_payload(payload, COMMAND_BUFFER_LEN);
    let text = std::str::from_utf8(kept)
        .map_err(|e| NodeError::MalformedInput(format!("command payload is not UTF-8: {}", e)))?;
    Ok(Decoded {
        command: parser.parse(text),
        truncated,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportingState {
    #[default]
    Idle,
    Reporting,
}

/// Effect of one command on the reporting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Stopped,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct CommandDispatcher {
    state: ReportingState,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReportingState {
        self.state
    }

    /// Apply a parsed command. `period` is the reporting interval when periodic
    /// reporting is enabled; `None` leaves the timer alone on start.
    pub fn apply<L, T>(
        &mut self,
        command: NodeCommand,
        indicator: &mut L,
        timer: &mut T,
        period: Option<Duration>,
    ) -> Transition
    where
        L: Indicator + ?Sized,
        T: PeriodicTimer + ?Sized,
    {
        match (self.state, command) {
            (ReportingState::Idle, NodeCommand::Start) => {
                self.state = ReportingState::Reporting;
                if let Some(p) = period {
                    timer.start(p);
                }
                indicator.set(true);
                info!("Reporting started");
                Transition::Started
            }
            (ReportingState::Reporting, NodeCommand::Stop) => {
                self.state = ReportingState::Idle;
                timer.stop();
                indicator.set(false);
                info!("Reporting stopped");
                Transition::Stopped
            }
            (state, NodeCommand::Start | NodeCommand::Stop) => {
                debug!("{} while {:?}: no-op", command.as_str(), state);
                Transition::Unchanged
            }
            (_, other) => {
                debug!("Ignoring {:?} on command port", other);
                Transition::Unchanged
            }
        }
    }
}
