//! Safe-state supervision.
//!
//! The [`SafetyMonitor`] decides when every actuator must be forced off and
//! keeps the inactivity timer. The forcing itself is done by the
//! [`RoomController`](crate::controller::RoomController); the monitor only
//! reports [`Trip`]s and logs each one once.
//!
//! # Trip Conditions
//!
//! - WiFi went from connected to disconnected
//! - Broker session lost
//! - No command for `inactivity_timeout_ms` while the broker is connected
//!   (fires once, then stays latched until the next command)
//! - Explicit `STOP`

use core::fmt;

use log::error;

use crate::config::SafetyConfig;

/// Reason all actuators were forced off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trip {
    /// WiFi link dropped.
    WifiLost,
    /// Broker session dropped.
    BrokerLost,
    /// No command within the inactivity timeout.
    Inactivity,
    /// `STOP` received.
    EmergencyStop,
    /// Unrecoverable network failure, restart follows.
    Fatal,
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trip::WifiLost => "WiFi lost",
            Trip::BrokerLost => "MQTT broker lost",
            Trip::Inactivity => "no command received within timeout",
            Trip::EmergencyStop => "emergency stop",
            Trip::Fatal => "fatal network failure",
        })
    }
}

/// Inactivity timer and trip log.
///
/// # Example
///
/// ```rust
/// use room_fx::safety::{SafetyMonitor, Trip};
/// use room_fx::config::SafetyConfig;
///
/// let mut safety = SafetyMonitor::new(&SafetyConfig::default().with_inactivity_timeout_ms(1_000), 0);
///
/// assert_eq!(safety.check_inactivity(999, true), None);
/// assert_eq!(safety.check_inactivity(1_000, true), Some(Trip::Inactivity));
/// // Latched until the next command
/// assert_eq!(safety.check_inactivity(5_000, true), None);
///
/// safety.note_command(5_000);
/// assert_eq!(safety.check_inactivity(6_000, true), Some(Trip::Inactivity));
/// ```
#[derive(Clone, Debug)]
pub struct SafetyMonitor {
    inactivity_timeout_ms: u32,
    last_command_ms: u64,
    inactivity_latched: bool,
    last_trip: Option<Trip>,
    trip_count: u32,
}

impl SafetyMonitor {
    /// Create a monitor whose inactivity timer starts at `now_ms`.
    pub fn new(config: &SafetyConfig, now_ms: u64) -> Self {
        Self {
            inactivity_timeout_ms: config.inactivity_timeout_ms,
            last_command_ms: now_ms,
            inactivity_latched: false,
            last_trip: None,
            trip_count: 0,
        }
    }

    /// A valid command arrived: restart the timer and re-arm the trip.
    pub fn note_command(&mut self, now_ms: u64) {
        self.last_command_ms = now_ms;
        self.inactivity_latched = false;
    }

    /// The broker (re)connected: restart the timer.
    pub fn on_broker_connected(&mut self, now_ms: u64) {
        self.last_command_ms = now_ms;
        self.inactivity_latched = false;
    }

    /// Returns `Some(Trip::Inactivity)` exactly once per quiet period.
    ///
    /// Never trips while the broker is disconnected or when the timeout is 0.
    pub fn check_inactivity(&mut self, now_ms: u64, broker_connected: bool) -> Option<Trip> {
        if self.inactivity_timeout_ms == 0 || !broker_connected || self.inactivity_latched {
            return None;
        }
        if now_ms.saturating_sub(self.last_command_ms) < u64::from(self.inactivity_timeout_ms) {
            return None;
        }
        self.inactivity_latched = true;
        Some(self.trip(Trip::Inactivity))
    }

    /// Record and log a trip.
    pub fn trip(&mut self, reason: Trip) -> Trip {
        error!("safety stop: {}, all outputs off", reason);
        self.last_trip = Some(reason);
        self.trip_count = self.trip_count.saturating_add(1);
        reason
    }

    /// Most recent trip, if any.
    pub fn last_trip(&self) -> Option<Trip> {
        self.last_trip
    }

    /// Number of trips since start.
    pub fn trip_count(&self) -> u32 {
        self.trip_count
    }

    /// Time of the last command (or broker connect).
    pub fn last_command_ms(&self) -> u64 {
        self.last_command_ms
    }
}
