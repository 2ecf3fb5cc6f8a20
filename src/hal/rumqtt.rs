//! Desktop MQTT transport over `rumqttc`'s blocking client.
//!
//! Lets the full [`Runtime`](crate::Runtime) run against a real broker from a
//! workstation, with [`HostWifi`] standing in for the station link.
//!
//! The client is recreated on every [`MqttTransport::connect`] so the last
//! will and credentials always come from the current configuration. Inbound
//! publishes are buffered by [`MqttTransport::poll`] and drained with
//! [`MqttTransport::try_recv`].
//!
//! # Example
//!
//! ```ignore
//! use room_fx::hal::rumqtt::{HostWifi, RumqttTransport};
//!
//! let mqtt = RumqttTransport::new(&config.mqtt);
//! let mut rt = Runtime::new(&config, sink, HostWifi, mqtt, watchdog, system, 0);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rumqttc::{
    Client, Connection, Event, LastWill as RumqttWill, MqttOptions, Packet, QoS, RecvTimeoutError,
    TryRecvError,
};

use crate::config::MqttConfig;
use crate::traits::{LastWill, MqttMessage, MqttTransport, WifiLink};

/// Request queue depth for the rumqttc client.
const REQUEST_CAPACITY: usize = 16;

/// Longest wait for a CONNACK.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for desktop MQTT operations.
#[derive(Debug)]
pub struct RumqttError(pub String);

impl fmt::Display for RumqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MQTT error: {}", self.0)
    }
}

impl std::error::Error for RumqttError {}

/// [`MqttTransport`] backed by `rumqttc::Client`.
pub struct RumqttTransport {
    host: String,
    port: u16,
    keep_alive: Duration,
    credentials: Option<(String, String)>,
    session: Option<(Client, Connection)>,
    inbox: VecDeque<MqttMessage>,
    connected: bool,
}

impl RumqttTransport {
    /// Transport for the broker in `config`. Nothing is opened until `connect`.
    pub fn new(config: &MqttConfig) -> Self {
        let credentials = config.has_auth().then(|| {
            (
                config.username.as_str().to_string(),
                config.password.as_str().to_string(),
            )
        });
        Self {
            host: config.host.as_str().to_string(),
            port: config.port,
            keep_alive: Duration::from_secs(config.keep_alive_secs as u64),
            credentials,
            session: None,
            inbox: VecDeque::new(),
            connected: false,
        }
    }

    fn client(&mut self) -> Result<&mut Client, RumqttError> {
        match (&mut self.session, self.connected) {
            (Some((client, _)), true) => Ok(client),
            _ => Err(RumqttError("not connected".into())),
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::Publish(p)) => {
                self.inbox
                    .push_back(MqttMessage::new(p.topic, p.payload.to_vec()));
            }
            Event::Incoming(Packet::Disconnect) => {
                info!("broker sent DISCONNECT");
                self.connected = false;
            }
            Event::Incoming(packet) => debug!("mqtt <- {:?}", packet),
            Event::Outgoing(_) => {}
        }
    }
}

impl MqttTransport for RumqttTransport {
    type Error = RumqttError;

    fn connect(&mut self, client_id: &str, will: &LastWill<'_>) -> Result<(), RumqttError> {
        self.session = None;
        self.connected = false;

        let mut options = MqttOptions::new(client_id, self.host.as_str(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options.set_last_will(RumqttWill::new(
            will.topic,
            will.payload.to_vec(),
            QoS::AtLeastOnce,
            will.retain,
        ));
        if let Some((user, pass)) = &self.credentials {
            options.set_credentials(user.as_str(), pass.as_str());
        }

        let (client, mut connection) = Client::new(options, REQUEST_CAPACITY);
        let deadline = Instant::now() + CONNECT_TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match connection.recv_timeout(left) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    debug!("CONNACK {:?}", ack.code);
                    break;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(RumqttError(e.to_string())),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(RumqttError("timed out waiting for CONNACK".into()))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RumqttError("event loop closed".into()))
                }
            }
        }

        self.session = Some((client, connection));
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), RumqttError> {
        self.client()?
            .subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| RumqttError(e.to_string()))
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), RumqttError> {
        let qos = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        self.client()?
            .try_publish(topic, qos, retain, payload.to_vec())
            .map_err(|e| RumqttError(e.to_string()))
    }

    fn poll(&mut self) -> Result<(), RumqttError> {
        loop {
            let Some((_, connection)) = self.session.as_mut() else {
                return Err(RumqttError("not connected".into()));
            };
            match connection.try_recv() {
                Ok(Ok(event)) => self.handle_event(event),
                Ok(Err(e)) => {
                    warn!("MQTT connection error: {}", e);
                    self.connected = false;
                    self.session = None;
                    return Err(RumqttError(e.to_string()));
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    self.connected = false;
                    self.session = None;
                    return Err(RumqttError("event loop closed".into()));
                }
            }
        }
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        self.inbox.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ============================================================================
// Host Network
// ============================================================================

/// Station link for hosts whose network is managed by the OS.
///
/// Always reports connected; `connect` and `disconnect` do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostWifi;

impl WifiLink for HostWifi {
    type Error = core::convert::Infallible;

    fn is_connected(&self) -> bool {
        true
    }

    fn connect(&mut self, _timeout_ms: u32) -> Result<(), Self::Error> {
        Ok(())
    }

    fn disconnect(&mut self) {}
}
