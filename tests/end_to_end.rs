mod common;

use common::*;
use threadnode::config::{Config, Profile};
use threadnode::hw::{Indicator, PeriodicTimer};
use threadnode::mesh::{COMMAND_PORT, HELLO_PORT};
use threadnode::node::{NodeEvent, ReportingState};
use threadnode::simulate::{self, SIM_LEADER_RLOC16};

#[test]
fn start_tick_stop_ghost_tick() {
    let mut node = sensor();
    node.handle(NodeEvent::datagram(COMMAND_PORT, b"start"));
    node.handle(NodeEvent::TimerTick);
    node.handle(NodeEvent::TimerTick);
    node.handle(NodeEvent::datagram(COMMAND_PORT, b"stop"));
    // A tick already queued when stop arrives must not send.
    node.handle(NodeEvent::TimerTick);

    let payloads: Vec<_> = node
        .mesh()
        .sent()
        .iter()
        .map(|d| d.payload_str().to_string())
        .collect();
    assert_eq!(payloads, vec!["hello-ABCD", "hello-ABCD"]);
    assert_eq!(node.reporting_state(), ReportingState::Idle);
    assert!(!node.indicator().is_on());
    assert!(!node.timer().is_running());
    assert_eq!(node.metrics().hellos_sent, 2);
}

#[test]
fn ticks_before_start_are_ignored() {
    let mut node = sensor();
    node.handle(NodeEvent::TimerTick);
    assert!(node.mesh().sent().is_empty());
    assert_eq!(node.metrics().hellos_skipped, 0);
}

#[test]
fn simulated_sensor_reports_to_leader() {
    let mut config = Config::default();
    config.node.hardware_address = Some("00:12:4b:00:01:02:ab:cd".to_string());
    let report = simulate::run_scenario(&config, 3).unwrap();

    assert_eq!(report.ticks, 3);
    assert_eq!(report.sensor.final_state, ReportingState::Idle);
    assert!(!report.sensor.indicator_on);
    assert_eq!(report.sensor.sent.len(), 3);
    let expected_dest = format!("[fd00:1234:5678:9abc:0:ff:fe00:{:x}]:{}", SIM_LEADER_RLOC16, HELLO_PORT);
    for record in &report.sensor.sent {
        assert_eq!(record.payload, "hello-ABCD");
        assert_eq!(record.dest, expected_dest);
    }

    assert!(report.leader.listener_armed);
    assert_eq!(report.leader.metrics.hellos_received, 3);
    let device = &report.leader.telemetry.devices["ABCD"];
    assert_eq!(device.packets, 3);
}

#[test]
fn simulation_report_serializes() {
    let report = simulate::run_scenario(&Config::for_profile(Profile::Sensor), 1).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sensor"]["final_state"], "idle");
    assert_eq!(json["sensor"]["sent"][0]["payload"], "hello-0000");
    assert_eq!(json["leader"]["listener_armed"], true);
}

#[test]
fn simulation_rejects_bad_address() {
    let mut config = Config::default();
    config.node.hardware_address = Some("not-hex".to_string());
    assert!(simulate::run_scenario(&config, 1).is_err());
}
