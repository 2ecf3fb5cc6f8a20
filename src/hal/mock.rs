//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and network traits,
//! enabling development and testing on desktop without a board or broker.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockSink`] | [`OutputSink`] | Records every channel write |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockWifi`] | [`WifiLink`] | Scriptable association |
//! | [`MockMqtt`] | [`MqttTransport`] | Captures pub/sub, queued inbound |
//! | [`MockWatchdog`] | [`Watchdog`] | Counts feeds |
//! | [`MockSystem`] | [`SystemControl`] | Counts restarts |
//!
//! # Example
//!
//! ```rust
//! use room_fx::{Config, RoomController};
//! use room_fx::hal::MockSink;
//!
//! let mut controller = RoomController::new(&Config::default(), MockSink::new(), 0);
//!
//! let reply = controller.handle_message("room1/motor1", b"ON:30:R", 0).unwrap();
//! assert_eq!(reply.payload().as_str(), "OK");
//!
//! controller.update(20, true);
//! assert_eq!(controller.sink().last_output(0), Some((5, room_fx::Direction::Right)));
//! ```
//!
//! [`OutputSink`]: crate::traits::OutputSink
//! [`Clock`]: crate::traits::Clock
//! [`WifiLink`]: crate::traits::WifiLink
//! [`MqttTransport`]: crate::traits::MqttTransport
//! [`Watchdog`]: crate::traits::Watchdog
//! [`SystemControl`]: crate::traits::SystemControl

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;

use crate::traits::{
    ChannelId, Clock, Direction, LastWill, MqttMessage, MqttTransport, OutputSink, SystemControl,
    Watchdog, WifiLink,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// One recorded call on a [`MockSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkWrite {
    /// `enable_channel(channel, enabled)`
    Enable(ChannelId, bool),
    /// `set_output(channel, duty, direction)`
    Output(ChannelId, u8, Direction),
}

/// Error returned by a [`MockSink`] with `fail` set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockSinkError;

/// Mock output sink.
///
/// Records every successful write in order. Set `fail` to make every
/// write return an error without being recorded.
///
/// # Example
///
/// ```rust
/// use room_fx::hal::{MockSink, SinkWrite};
/// use room_fx::traits::{Direction, OutputSink};
///
/// let mut sink = MockSink::new();
/// sink.set_output(1, 60, Direction::Left).unwrap();
///
/// assert_eq!(sink.writes, [SinkWrite::Output(1, 60, Direction::Left)]);
/// assert!(!sink.is_enabled(1));
/// ```
#[derive(Debug, Default)]
pub struct MockSink {
    /// Every successful write, oldest first.
    pub writes: Vec<SinkWrite>,
    /// When true, all writes fail.
    pub fail: bool,
}

impl MockSink {
    /// Creates a new mock sink with no recorded writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last enable level written to `channel` (false if never written).
    pub fn is_enabled(&self, channel: ChannelId) -> bool {
        self.writes
            .iter()
            .rev()
            .find_map(|w| match *w {
                SinkWrite::Enable(ch, on) if ch == channel => Some(on),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Last duty and direction written to `channel`.
    pub fn last_output(&self, channel: ChannelId) -> Option<(u8, Direction)> {
        self.writes.iter().rev().find_map(|w| match *w {
            SinkWrite::Output(ch, duty, dir) if ch == channel => Some((duty, dir)),
            _ => None,
        })
    }

    /// All duty values written to `channel`, oldest first.
    pub fn duty_history(&self, channel: ChannelId) -> Vec<u8> {
        self.writes
            .iter()
            .filter_map(|w| match *w {
                SinkWrite::Output(ch, duty, _) if ch == channel => Some(duty),
                _ => None,
            })
            .collect()
    }

    /// All (duty, direction) pairs written to `channel`, oldest first.
    pub fn output_history(&self, channel: ChannelId) -> Vec<(u8, Direction)> {
        self.writes
            .iter()
            .filter_map(|w| match *w {
                SinkWrite::Output(ch, duty, dir) if ch == channel => Some((duty, dir)),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for MockSink {
    type Error = MockSinkError;

    fn set_output(
        &mut self,
        channel: ChannelId,
        duty: u8,
        direction: Direction,
    ) -> Result<(), MockSinkError> {
        if self.fail {
            return Err(MockSinkError);
        }
        self.writes
            .push(SinkWrite::Output(channel, duty.min(100), direction));
        Ok(())
    }

    fn enable_channel(&mut self, channel: ChannelId, enabled: bool) -> Result<(), MockSinkError> {
        if self.fail {
            return Err(MockSinkError);
        }
        self.writes.push(SinkWrite::Enable(channel, enabled));
        Ok(())
    }
}

/// Mock clock for testing.
///
/// Uses interior mutability so [`Clock::now_ms`] can stay `&self`.
///
/// # Example
///
/// ```rust
/// use room_fx::hal::MockClock;
/// use room_fx::traits::Clock;
///
/// let clock = MockClock::new();
/// clock.set(500);
/// clock.advance(20);
/// assert_eq!(clock.now_ms(), 520);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    time_ms: Cell<u64>,
}

impl MockClock {
    /// Creates a new mock clock starting at time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current time
    pub fn set(&self, ms: u64) {
        self.time_ms.set(ms);
    }

    /// Advance time by the given amount
    pub fn advance(&self, ms: u64) {
        self.time_ms.set(self.time_ms.get() + ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.time_ms.get()
    }
}

/// Mock watchdog that counts feeds.
#[derive(Debug, Default)]
pub struct MockWatchdog {
    /// Number of `feed` calls.
    pub feeds: usize,
}

impl MockWatchdog {
    /// Creates a new mock watchdog.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Watchdog for MockWatchdog {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

/// Mock system control that counts restarts instead of rebooting.
#[derive(Debug, Default)]
pub struct MockSystem {
    /// Number of `restart` calls.
    pub restarts: usize,
}

impl MockSystem {
    /// Creates a new mock system.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SystemControl for MockSystem {
    fn restart(&mut self) {
        self.restarts += 1;
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Error returned by the network mocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockNetError {
    /// Scripted connect failure.
    ConnectRefused,
    /// Operation needs a connection.
    NotConnected,
    /// Scripted publish failure.
    PublishRefused,
    /// Scripted poll failure.
    PollFailed,
}

/// Mock WiFi link.
///
/// Starts disconnected. `connect` succeeds unless `fail_connects` is set.
#[derive(Debug, Default)]
pub struct MockWifi {
    /// Whether the station is associated.
    pub connected: bool,
    /// When true, `connect` fails.
    pub fail_connects: bool,
    /// Number of `connect` calls.
    pub connect_calls: usize,
    /// Timeout passed to the last `connect`.
    pub last_timeout_ms: Option<u32>,
}

impl MockWifi {
    /// Creates a new, disconnected mock link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the access point going away.
    pub fn drop_link(&mut self) {
        self.connected = false;
    }
}

impl WifiLink for MockWifi {
    type Error = MockNetError;

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self, timeout_ms: u32) -> Result<(), MockNetError> {
        self.connect_calls += 1;
        self.last_timeout_ms = Some(timeout_ms);
        if self.fail_connects {
            return Err(MockNetError::ConnectRefused);
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// A message captured by [`MockMqtt::publish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    /// Topic published to.
    pub topic: String,
    /// Payload bytes.
    pub payload: Vec<u8>,
    /// Retain flag.
    pub retain: bool,
}

/// Last will captured by [`MockMqtt::connect`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedWill {
    /// Will topic.
    pub topic: String,
    /// Will payload.
    pub payload: Vec<u8>,
    /// Retain flag.
    pub retain: bool,
}

/// Mock MQTT transport for testing.
///
/// Starts disconnected. Queued inbound messages are only delivered while
/// connected, mirroring a real session.
///
/// # Example
///
/// ```rust
/// use room_fx::hal::MockMqtt;
/// use room_fx::traits::{LastWill, MqttTransport};
///
/// let mut mqtt = MockMqtt::new();
/// let will = LastWill { topic: "devices/d/status", payload: b"offline", retain: true };
/// mqtt.connect("d", &will).unwrap();
///
/// mqtt.queue_message("room1/motor1", b"ON".to_vec());
/// mqtt.poll().unwrap();
/// assert_eq!(mqtt.try_recv().unwrap().topic, "room1/motor1");
/// assert!(mqtt.try_recv().is_none());
/// ```
#[derive(Debug, Default)]
pub struct MockMqtt {
    /// Whether the session is up.
    pub connected: bool,
    /// When true, `connect` fails.
    pub fail_connects: bool,
    /// When true, `publish` fails.
    pub fail_publishes: bool,
    /// When true, `poll` fails while connected.
    pub fail_polls: bool,
    /// Number of `connect` calls.
    pub connect_calls: usize,
    /// Number of `poll` calls.
    pub polls: usize,
    /// Client id from the last successful connect.
    pub client_id: Option<String>,
    /// Will from the last successful connect.
    pub will: Option<RecordedWill>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Messages that have been published.
    pub published: Vec<Published>,
    /// Inbound messages waiting for `try_recv`.
    pub incoming: VecDeque<MqttMessage>,
}

impl MockMqtt {
    /// Creates a new, disconnected mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound message
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push_back(MqttMessage::new(topic, payload));
    }

    /// Check if a topic was subscribed to
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Get published messages for a topic
    pub fn published_to(&self, topic: &str) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }

    /// Payloads published to a topic, as strings
    pub fn payloads_to(&self, topic: &str) -> Vec<String> {
        self.published_to(topic)
            .into_iter()
            .map(|p| String::from_utf8_lossy(&p.payload).into_owned())
            .collect()
    }

    /// Simulate the broker dropping the session.
    pub fn drop_connection(&mut self) {
        self.connected = false;
    }
}

impl MqttTransport for MockMqtt {
    type Error = MockNetError;

    fn connect(&mut self, client_id: &str, will: &LastWill<'_>) -> Result<(), MockNetError> {
        self.connect_calls += 1;
        if self.fail_connects {
            return Err(MockNetError::ConnectRefused);
        }
        self.connected = true;
        self.client_id = Some(client_id.into());
        self.will = Some(RecordedWill {
            topic: will.topic.into(),
            payload: will.payload.to_vec(),
            retain: will.retain,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), MockNetError> {
        if !self.connected {
            return Err(MockNetError::NotConnected);
        }
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), MockNetError> {
        if !self.connected {
            return Err(MockNetError::NotConnected);
        }
        if self.fail_publishes {
            return Err(MockNetError::PublishRefused);
        }
        self.published.push(Published {
            topic: topic.into(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    fn poll(&mut self) -> Result<(), MockNetError> {
        self.polls += 1;
        if !self.connected {
            Err(MockNetError::NotConnected)
        } else if self.fail_polls {
            Err(MockNetError::PollFailed)
        } else {
            Ok(())
        }
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        if !self.connected {
            return None;
        }
        self.incoming.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
