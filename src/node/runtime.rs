//! Tokio event loop for a node on a host.
//!
//! The loop owns the [`Node`] and turns everything asynchronous into [`NodeEvent`]s:
//!
//! - periodic ticks, from an `Interval` that exists only while the node's
//!   [`WatchTimer`](crate::hw::WatchTimer) publishes a period
//! - inbound datagrams, forwarded by the per-socket reader tasks of the mesh
//! - console lines (`button`, `role <name>`, `status`, `quit`)
//! - the shutdown future (Ctrl-C in the binary)
//!
//! Each event is handled to completion before the next `select!`, which keeps the
//! node's single serial context intact.

use log::{debug, info, warn};
use std::future::Future;
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::{Node, NodeEvent};
use crate::hw::{Indicator, PeriodicTimer};
use crate::mesh::host::{HostMesh, InboundDatagram};
use crate::mesh::sim::SimMesh;
use crate::mesh::{MeshRole, MeshStack};

/// Mesh implementations whose role is driven from outside the stack.
pub trait RoleControl {
    fn override_role(&mut self, role: MeshRole);
}

impl RoleControl for HostMesh {
    fn override_role(&mut self, role: MeshRole) {
        self.set_role(role);
    }
}

impl RoleControl for SimMesh {
    fn override_role(&mut self, role: MeshRole) {
        self.set_role(role);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Button,
    Role(MeshRole),
    Status,
    Quit,
}

/// Parse one console line. Unknown input yields `None`.
pub fn parse_console_line(line: &str) -> Option<ConsoleCommand> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?.to_ascii_lowercase();
    let cmd = match head.as_str() {
        "button" | "b" => ConsoleCommand::Button,
        "role" => ConsoleCommand::Role(parts.next()?.parse().ok()?),
        "status" => ConsoleCommand::Status,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(cmd)
}

/// Forward lines from `reader` to the console channel on a plain thread, so a blocked
/// read never holds up runtime shutdown. Stops at EOF, on a read error or once the
/// receiver is gone.
pub fn spawn_console_reader<R>(
    reader: R,
    tx: mpsc::UnboundedSender<String>,
) -> std::thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}

fn make_ticker(period: Duration) -> Interval {
    let mut iv = interval_at(Instant::now() + period, period);
    iv.set_missed_tick_behavior(MissedTickBehavior::Skip);
    iv
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(iv) => {
            iv.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Run until `shutdown` resolves or the console asks to quit. Returns the node so the
/// caller can report on it.
pub async fn run<M, L, T, F>(
    mut node: Node<M, L, T>,
    mut timer_rx: watch::Receiver<Option<Duration>>,
    mut inbound: mpsc::UnboundedReceiver<InboundDatagram>,
    mut console: mpsc::UnboundedReceiver<String>,
    shutdown: F,
) -> Node<M, L, T>
where
    M: MeshStack + RoleControl,
    L: Indicator,
    T: PeriodicTimer,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let initial = *timer_rx.borrow_and_update();
    let mut ticker: Option<Interval> = initial.map(make_ticker);
    let mut timer_open = true;
    let mut inbound_open = true;
    let mut console_open = true;

    info!("Node runtime started");
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            changed = timer_rx.changed(), if timer_open => {
                if changed.is_err() {
                    timer_open = false;
                    ticker = None;
                    continue;
                }
                let period = *timer_rx.borrow_and_update();
                debug!("Timer period now {:?}", period);
                ticker = period.map(make_ticker);
            }
            _ = next_tick(&mut ticker) => {
                node.handle(NodeEvent::TimerTick);
            }
            datagram = inbound.recv(), if inbound_open => match datagram {
                Some(d) => node.handle(NodeEvent::DatagramReceived {
                    port: d.local_port,
                    payload: d.payload,
                    sender: d.sender,
                }),
                None => {
                    debug!("Inbound datagram channel closed");
                    inbound_open = false;
                }
            },
            line = console.recv(), if console_open => match line {
                Some(line) => match parse_console_line(&line) {
                    Some(ConsoleCommand::Button) => node.handle(NodeEvent::ButtonEdge),
                    Some(ConsoleCommand::Role(role)) => {
                        node.mesh_mut().override_role(role);
                        node.handle(NodeEvent::RoleChanged(role));
                    }
                    Some(ConsoleCommand::Status) => log_status(&node),
                    Some(ConsoleCommand::Quit) => {
                        info!("Quit from console");
                        break;
                    }
                    None => {
                        if !line.trim().is_empty() {
                            warn!("Unknown console input '{}' (try: button, role <name>, status, quit)", line.trim());
                        }
                    }
                },
                None => {
                    debug!("Console closed");
                    console_open = false;
                }
            },
        }
    }
    log_status(&node);
    node
}

fn log_status<M, L, T>(node: &Node<M, L, T>)
where
    M: MeshStack,
    L: Indicator,
    T: PeriodicTimer,
{
    let m = node.metrics();
    info!(
        "role={} state={:?} armed={} sent={} skipped={} failed={} received={} devices={}",
        node.role(),
        node.reporting_state(),
        node.is_listener_armed(),
        m.hellos_sent,
        m.hellos_skipped,
        m.hellos_failed,
        m.hellos_received,
        node.telemetry().device_count()
    );
}
