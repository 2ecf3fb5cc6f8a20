//! Network abstraction traits for the WiFi link and the MQTT transport.
//!
//! The control core never talks to a network stack directly. The
//! [`ConnectivitySupervisor`](crate::supervisor::ConnectivitySupervisor)
//! drives these two collaborators from the run loop.
//!
//! # Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`WifiLink`] | Station-mode association with a bounded connect |
//! | [`MqttTransport`] | Broker session, pub/sub and inbound buffering |
//!
//! # Topic Layout
//!
//! ```text
//! room1/motor1            - actuator command (ON:80:L, OFF, SPEED:40, DIR:R)
//! room1/motor1/feedback   - OK | ERROR: <reason>
//! room1/STOP              - emergency stop, all actuators
//! devices/<id>/status     - online (retained) / offline (last will)
//! ```

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

// ============================================================================
// WiFi Link
// ============================================================================

/// Station-mode WiFi link.
///
/// # Implementation Notes
///
/// - `connect` may block, but never longer than `timeout_ms`
/// - `is_connected` must be cheap; it is called every loop pass
pub trait WifiLink {
    /// Error type for association failures.
    type Error: core::fmt::Debug;

    /// Returns true while the station has an IP link.
    fn is_connected(&self) -> bool;

    /// Attempt to associate, giving up after `timeout_ms`.
    fn connect(&mut self, timeout_ms: u32) -> Result<(), Self::Error>;

    /// Drop the current association (used before a fresh attempt).
    fn disconnect(&mut self);
}

// ============================================================================
// MQTT Transport (Sync-First Design)
// ============================================================================

/// Last-will message registered with the broker at connect time.
///
/// The broker publishes it on the device's behalf if the session ends
/// without a clean disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LastWill<'a> {
    /// Topic the will is published to.
    pub topic: &'a str,
    /// Will payload.
    pub payload: &'a [u8],
    /// Whether the broker retains the will message.
    pub retain: bool,
}

/// MQTT transport trait.
///
/// This trait uses a **sync-first design** that works on both ESP32
/// (blocking I/O) and desktop. Inbound messages are buffered by the
/// transport during [`poll`](Self::poll) and drained in delivery order with
/// [`try_recv`](Self::try_recv) within the same loop pass, which keeps
/// dispatch single-threaded and lets the dispatcher publish feedback
/// through the same transport.
///
/// # Example
///
/// ```rust
/// use room_fx::traits::{LastWill, MqttTransport};
/// use room_fx::hal::MockMqtt;
///
/// let mut mqtt = MockMqtt::new();
/// let will = LastWill { topic: "devices/dev1/status", payload: b"offline", retain: true };
/// mqtt.connect("dev1", &will).unwrap();
/// mqtt.publish("devices/dev1/status", b"online", true).unwrap();
///
/// assert!(mqtt.is_connected());
/// assert_eq!(mqtt.published_to("devices/dev1/status").len(), 1);
/// ```
pub trait MqttTransport {
    /// Error type for MQTT operations.
    type Error: core::fmt::Debug;

    /// Open a broker session with the given client id and last will.
    fn connect(&mut self, client_id: &str, will: &LastWill<'_>) -> Result<(), Self::Error>;

    /// Subscribe to a topic.
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Publish a message to a topic.
    ///
    /// # Arguments
    /// - `topic`: MQTT topic path
    /// - `payload`: Message bytes
    /// - `retain`: If true, broker keeps message for new subscribers
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Service the connection and buffer any inbound messages.
    ///
    /// Must be called every loop pass while connected. Never blocks for
    /// longer than one network read.
    fn poll(&mut self) -> Result<(), Self::Error>;

    /// Take the next buffered inbound message (non-blocking).
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Check if the broker session is up.
    fn is_connected(&self) -> bool;
}

/// An MQTT message received from a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}
