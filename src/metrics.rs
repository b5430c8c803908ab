//! Per-node counters.
//! Owned by the node context and only touched from its serial event path, so plain
//! integers are enough. `snapshot()` hands out a copy for status output and reports.
use serde::Serialize;

#[derive(Debug, Default, Clone)]
pub struct NodeMetrics {
    commands_accepted: u64,
    commands_ignored: u64,
    commands_truncated: u64,
    hellos_sent: u64,
    hellos_failed: u64,
    hellos_skipped: u64,
    hellos_received: u64,
    light_toggles: u64,
    listener_arms: u64,
    listener_disarms: u64,
    listener_arm_failures: u64,
}

impl NodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_command_accepted(&mut self) {
        self.commands_accepted = self.commands_accepted.saturating_add(1);
    }
    pub fn inc_command_ignored(&mut self) {
        self.commands_ignored = self.commands_ignored.saturating_add(1);
    }
    pub fn inc_command_truncated(&mut self) {
        self.commands_truncated = self.commands_truncated.saturating_add(1);
    }
    pub fn inc_hello_sent(&mut self) {
        self.hellos_sent = self.hellos_sent.saturating_add(1);
    }
    pub fn inc_hello_failed(&mut self) {
        self.hellos_failed = self.hellos_failed.saturating_add(1);
    }
    /// Send skipped because no destination was available.
    pub fn inc_hello_skipped(&mut self) {
        self.hellos_skipped = self.hellos_skipped.saturating_add(1);
    }
    pub fn inc_hello_received(&mut self) {
        self.hellos_received = self.hellos_received.saturating_add(1);
    }
    pub fn inc_light_toggle(&mut self) {
        self.light_toggles = self.light_toggles.saturating_add(1);
    }
    pub fn inc_listener_arm(&mut self) {
        self.listener_arms = self.listener_arms.saturating_add(1);
    }
    pub fn inc_listener_disarm(&mut self) {
        self.listener_disarms = self.listener_disarms.saturating_add(1);
    }
    pub fn inc_listener_arm_failure(&mut self) {
        self.listener_arm_failures = self.listener_arm_failures.saturating_add(1);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            commands_accepted: self.commands_accepted,
            commands_ignored: self.commands_ignored,
            commands_truncated: self.commands_truncated,
            hellos_sent: self.hellos_sent,
            hellos_failed: self.hellos_failed,
            hellos_skipped: self.hellos_skipped,
            hellos_received: self.hellos_received,
            light_toggles: self.light_toggles,
            listener_arms: self.listener_arms,
            listener_disarms: self.listener_disarms,
            listener_arm_failures: self.listener_arm_failures,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub commands_accepted: u64,
    pub commands_ignored: u64,
    pub commands_truncated: u64,
    pub hellos_sent: u64,
    pub hellos_failed: u64,
    pub hellos_skipped: u64,
    pub hellos_received: u64,
    pub light_toggles: u64,
    pub listener_arms: u64,
    pub listener_disarms: u64,
    pub listener_arm_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_a_copy() {
        let mut m = NodeMetrics::new();
        m.inc_hello_sent();
        m.inc_hello_sent();
        m.inc_listener_arm();
        let snap = m.snapshot();
        m.inc_hello_sent();
        assert_eq!(snap.hellos_sent, 2);
        assert_eq!(snap.listener_arms, 1);
        assert_eq!(m.snapshot().hellos_sent, 3);
    }
}
