//! Hello collection on the leader / border router.
//!
//! Every datagram received on the armed hello listener is attributed to a device by
//! its suffix. Per device we keep the packet count, first and last arrival and an
//! estimate of packets lost in between, based on the expected reporting interval.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::time::Duration;

use super::reporter::HelloFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub packets: u64,
    pub missed: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_sender: Ipv6Addr,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetrySnapshot {
    pub devices: BTreeMap<String, DeviceStats>,
    pub unrecognized: u64,
}

/// Extract the device suffix from `hello-XXXX` or `hello world XXXX`.
pub fn parse_device_id(payload: &str) -> Option<&str> {
    let id = [HelloFormat::Spaced, HelloFormat::Dashed]
        .iter()
        .find_map(|f| payload.strip_prefix(f.prefix()))?;
    if id.len() == 4 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(id)
    } else {
        None
    }
}

#[derive(Debug)]
pub struct HelloTracker {
    expected_interval: Duration,
    devices: BTreeMap<String, DeviceStats>,
    unrecognized: u64,
}

impl HelloTracker {
    pub fn new(expected_interval: Duration) -> Self {
        Self {
            expected_interval,
            devices: BTreeMap::new(),
            unrecognized: 0,
        }
    }

    /// Record one hello. Returns the updated stats when the payload was recognised.
    pub fn record(
        &mut self,
        payload: &[u8],
        sender: Ipv6Addr,
        now: DateTime<Utc>,
    ) -> Option<&DeviceStats> {
        let id = match std::str::from_utf8(payload).ok().and_then(parse_device_id) {
            Some(id) => id.to_ascii_uppercase(),
            None => {
                self.unrecognized += 1;
                return None;
            }
        };
        let interval_ms = self.expected_interval.as_millis().max(1) as i64;
        let stats = self
            .devices
            .entry(id)
            .and_modify(|s| {
                let elapsed = (now - s.last_seen).num_milliseconds();
                let periods = elapsed / interval_ms;
                if periods > 1 {
                    s.missed += (periods - 1) as u64;
                }
                s.packets += 1;
                s.last_seen = now;
                s.last_sender = sender;
            })
            .or_insert(DeviceStats {
                packets: 1,
                missed: 0,
                first_seen: now,
                last_seen: now,
                last_sender: sender,
            });
        Some(stats)
    }

    pub fn device(&self, id: &str) -> Option<&DeviceStats> {
        self.devices.get(&id.to_ascii_uppercase())
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            devices: self.devices.clone(),
            unrecognized: self.unrecognized,
        }
    }
}
