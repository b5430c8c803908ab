//! In-memory end-to-end scenario.
//!
//! A sensor node and a leader run on two [`SimMesh`] instances. The sensor is started
//! with a `start` command, reports for a number of timer ticks, is stopped, and then
//! gets one more tick that must not send anything. Every hello the sensor puts on the
//! air is delivered to the leader's hello port. The report is what the `simulate`
//! command prints as JSON.

use log::info;
use serde::Serialize;
use std::net::{Ipv6Addr, SocketAddrV6};

use crate::config::{Config, Profile};
use crate::hw::{Indicator, ManualTimer, RecordingIndicator};
use crate::mesh::sim::SimMesh;
use crate::mesh::{prefix_of, rloc_address, MeshRole, MeshStack, OnMeshPrefix};
use crate::metrics::Snapshot;
use crate::node::{Node, NodeEvent, NodeIdentity, ReportingState, TelemetrySnapshot};
use crate::validation::ValidationError;

/// Mesh-local prefix of the simulated partition.
pub const SIM_MESH_LOCAL_PREFIX: Ipv6Addr = Ipv6Addr::new(0xfd00, 0x1234, 0x5678, 0x9abc, 0, 0, 0, 0);
/// RLOC16 of the simulated leader / border router.
pub const SIM_LEADER_RLOC16: u16 = 0xfc00;
/// RLOC16 the leader sees the sensor's hellos coming from.
pub const SIM_SENSOR_RLOC16: u16 = 0x0401;

#[derive(Debug, Clone, Serialize)]
pub struct SentRecord {
    pub dest: String,
    pub payload: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorReport {
    pub identity: String,
    pub final_state: ReportingState,
    pub indicator_on: bool,
    pub metrics: Snapshot,
    pub sent: Vec<SentRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderReport {
    pub listener_armed: bool,
    pub metrics: Snapshot,
    pub telemetry: TelemetrySnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub ticks: u32,
    pub sensor: SensorReport,
    pub leader: LeaderReport,
}

/// Run the scenario with `sensor_config` for the reporting node.
pub fn run_scenario(sensor_config: &Config, ticks: u32) -> Result<SimulationReport, ValidationError> {
    let leader_config = Config::for_profile(Profile::Leader);

    let mut leader_mesh = SimMesh::formed(SIM_MESH_LOCAL_PREFIX, MeshRole::Leader);
    leader_mesh.own_rloc16 = SIM_LEADER_RLOC16;
    leader_mesh.leader_rloc16 = Some(SIM_LEADER_RLOC16);
    let mut leader = Node::new(
        leader_mesh,
        RecordingIndicator::new(),
        ManualTimer::new(),
        NodeIdentity::new([0, 0, 0, 0, 0, 0, 0xfc, 0x00]),
        leader_config.node_settings()?,
    );
    leader.bootstrap();

    // The sensor sees the leader's network data.
    let mut sensor_mesh = SimMesh::formed(SIM_MESH_LOCAL_PREFIX, MeshRole::Child);
    sensor_mesh.leader_rloc16 = Some(SIM_LEADER_RLOC16);
    for entry in leader.mesh().on_mesh_prefixes() {
        sensor_mesh.push_prefix(entry);
    }
    if sensor_mesh.network_data.is_empty() {
        sensor_mesh.push_prefix(OnMeshPrefix::border_router(
            Ipv6Addr::new(0xfd11, 0x22, 0, 0, 0, 0, 0, 0),
            64,
            SIM_LEADER_RLOC16,
        ));
    }
    let mut sensor = Node::new(
        sensor_mesh,
        RecordingIndicator::new(),
        ManualTimer::new(),
        sensor_config.identity()?,
        sensor_config.node_settings()?,
    );
    sensor.bootstrap();

    let command_port = sensor.settings().ports.command;
    let sensor_addr = rloc_address(prefix_of(&SIM_MESH_LOCAL_PREFIX), SIM_SENSOR_RLOC16);

    sensor.handle(NodeEvent::datagram(command_port, b"start"));
    for _ in 0..ticks {
        sensor.handle(NodeEvent::TimerTick);
    }
    sensor.handle(NodeEvent::datagram(command_port, b"stop"));
    sensor.handle(NodeEvent::TimerTick);

    let sent = sensor.mesh_mut().take_sent();
    for datagram in &sent {
        leader.handle(NodeEvent::DatagramReceived {
            port: datagram.dest.port(),
            payload: datagram.payload.clone(),
            sender: SocketAddrV6::new(sensor_addr, datagram.dest.port(), 0, 0),
        });
    }
    info!("Simulation finished: {} datagram(s) sent", sent.len());

    Ok(SimulationReport {
        ticks,
        sensor: SensorReport {
            identity: sensor.identity().to_string(),
            final_state: sensor.reporting_state(),
            indicator_on: sensor.indicator().is_on(),
            metrics: sensor.metrics(),
            sent: sent
                .iter()
                .map(|d| SentRecord {
                    dest: d.dest.to_string(),
                    payload: d.payload_str().to_string(),
                })
                .collect(),
        },
        leader: LeaderReport {
            listener_armed: leader.is_listener_armed(),
            metrics: leader.metrics(),
            telemetry: leader.telemetry().snapshot(),
        },
    })
}
