//! Local peripherals the node drives: a status indicator and the periodic timer.
//!
//! Both are traits so the node core never touches a driver. The host binary uses
//! [`LogIndicator`] or [`SysfsLed`] plus [`WatchTimer`]; tests use the recording
//! variants.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::error::NodeError;

/// Single on/off actuator (status LED, light relay).
pub trait Indicator {
    fn set(&mut self, on: bool);

    fn toggle(&mut self) {
        let next = !self.is_on();
        self.set(next);
    }

    fn is_on(&self) -> bool;
}

impl<I: Indicator + ?Sized> Indicator for Box<I> {
    fn set(&mut self, on: bool) {
        (**self).set(on)
    }

    fn toggle(&mut self) {
        (**self).toggle()
    }

    fn is_on(&self) -> bool {
        (**self).is_on()
    }
}

/// Repeating timer whose expiries reach the node as `TimerTick` events.
pub trait PeriodicTimer {
    /// Start (or restart) with the given period.
    fn start(&mut self, interval: Duration);
    /// After `stop` returns no further ticks are produced.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

/// Indicator that only logs its state changes.
#[derive(Debug, Default)]
pub struct LogIndicator {
    on: bool,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if self.on != on {
            info!("Indicator {}", if on { "ON" } else { "OFF" });
        }
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// LED driven through a Linux sysfs brightness file,
/// e.g. `/sys/class/leds/led0/brightness`.
#[derive(Debug)]
pub struct SysfsLed {
    path: PathBuf,
    on: bool,
}

impl SysfsLed {
    /// Acquire the LED and switch it off. Fails when the brightness file is not writable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref().to_path_buf();
        write_brightness(&path, false)
            .map_err(|e| NodeError::HardwareInit(format!("{}: {}", path.display(), e)))?;
        debug!("Acquired LED at {}", path.display());
        Ok(Self { path, on: false })
    }
}

fn write_brightness(path: &Path, on: bool) -> std::io::Result<()> {
    let mut f = OpenOptions::new().write(true).truncate(true).open(path)?;
    f.write_all(if on { b"1" } else { b"0" })
}

impl Indicator for SysfsLed {
    fn set(&mut self, on: bool) {
        match write_brightness(&self.path, on) {
            Ok(()) => self.on = on,
            Err(e) => warn!("LED write to {} failed: {}", self.path.display(), e),
        }
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// Indicator that remembers every `set` call.
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    on: bool,
    history: Vec<bool>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values passed to `set`, oldest first.
    pub fn history(&self) -> &[bool] {
        &self.history
    }

    pub fn calls(&self) -> usize {
        self.history.len()
    }
}

impl Indicator for RecordingIndicator {
    fn set(&mut self, on: bool) {
        self.on = on;
        self.history.push(on);
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// Timer for tests: records calls, ticks are injected by hand.
#[derive(Debug, Default)]
pub struct ManualTimer {
    interval: Option<Duration>,
    starts: usize,
    stops: usize,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn start_calls(&self) -> usize {
        self.starts
    }

    pub fn stop_calls(&self) -> usize {
        self.stops
    }
}

impl PeriodicTimer for ManualTimer {
    fn start(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.interval = None;
        self.stops += 1;
    }

    fn is_running(&self) -> bool {
        self.interval.is_some()
    }
}

/// Timer for the Tokio runtime. The node side publishes the wanted period on a
/// watch channel; the event loop owns the `Interval` and rebuilds or drops it
/// whenever the value changes.
#[derive(Debug)]
pub struct WatchTimer {
    tx: watch::Sender<Option<Duration>>,
}

impl WatchTimer {
    pub fn new() -> (Self, watch::Receiver<Option<Duration>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl PeriodicTimer for WatchTimer {
    fn start(&mut self, interval: Duration) {
        self.tx.send_replace(Some(interval));
    }

    fn stop(&mut self) {
        self.tx.send_replace(None);
    }

    fn is_running(&self) -> bool {
        self.tx.borrow().is_some()
    }
}
