//! MQTT transport for ESP32 over `esp-idf-svc`.
//!
//! A receiver thread drains the `EspMqttConnection` event stream, tracks
//! the session state and forwards complete publishes through a channel;
//! [`MqttTransport::try_recv`] reads from it. Each [`MqttTransport::connect`]
//! builds a fresh client with the device's last will.
//!
//! # Example
//!
//! ```ignore
//! use room_fx::hal::esp32::Esp32Mqtt;
//!
//! let mqtt = Esp32Mqtt::new(&config.mqtt);
//! let mut rt = Runtime::new(&config, bank, wifi, mqtt, watchdog, Esp32System, now);
//! ```

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, LwtConfiguration,
    MqttClientConfiguration, QoS,
};
use log::{debug, info, warn};

use crate::config::MqttConfig;
use crate::traits::{LastWill, MqttMessage, MqttTransport};

/// Longest wait for the broker to accept a session.
const CONNECT_TIMEOUT_MS: u32 = 5_000;

/// Session state poll step while connecting.
const CONNECT_POLL_MS: u32 = 100;

/// Error type for ESP32 MQTT operations.
#[derive(Debug)]
pub struct Esp32MqttError(pub String);

impl fmt::Display for Esp32MqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MQTT error: {}", self.0)
    }
}

/// Broker session on the ESP-IDF MQTT client.
pub struct Esp32Mqtt {
    url: String,
    username: Option<String>,
    password: Option<String>,
    keep_alive: Duration,
    client: Option<EspMqttClient<'static>>,
    message_rx: Option<Receiver<MqttMessage>>,
    connected: Arc<AtomicBool>,
}

impl Esp32Mqtt {
    /// Transport for the broker in `config`. Nothing is opened until `connect`.
    pub fn new(config: &MqttConfig) -> Self {
        let (username, password) = if config.has_auth() {
            (
                Some(config.username.as_str().to_string()),
                Some(config.password.as_str().to_string()),
            )
        } else {
            (None, None)
        };
        Self {
            url: format!("mqtt://{}:{}", config.host.as_str(), config.port),
            username,
            password,
            keep_alive: Duration::from_secs(config.keep_alive_secs as u64),
            client: None,
            message_rx: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn client(&mut self) -> Result<&mut EspMqttClient<'static>, Esp32MqttError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(Esp32MqttError("not connected".into()));
        }
        self.client
            .as_mut()
            .ok_or_else(|| Esp32MqttError("not connected".into()))
    }
}

impl MqttTransport for Esp32Mqtt {
    type Error = Esp32MqttError;

    fn connect(&mut self, client_id: &str, will: &LastWill<'_>) -> Result<(), Esp32MqttError> {
        // Dropping the old client ends its receiver thread.
        self.client = None;
        self.message_rx = None;
        self.connected = Arc::new(AtomicBool::new(false));

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: self.username.as_deref(),
            password: self.password.as_deref(),
            keep_alive_interval: Some(self.keep_alive),
            lwt: Some(LwtConfiguration {
                topic: will.topic,
                payload: will.payload,
                qos: QoS::AtLeastOnce,
                retain: will.retain,
            }),
            ..Default::default()
        };

        let (client, connection) = EspMqttClient::new(&self.url, &conf)
            .map_err(|e| Esp32MqttError(format!("{:?}", e)))?;

        let (message_tx, message_rx) = channel::<MqttMessage>();
        let connected = Arc::clone(&self.connected);
        thread::Builder::new()
            .name("mqtt-rx".into())
            .stack_size(8 * 1024)
            .spawn(move || handle_mqtt_events(connection, message_tx, connected))
            .map_err(|e| Esp32MqttError(e.to_string()))?;

        self.client = Some(client);
        self.message_rx = Some(message_rx);

        let mut waited = 0;
        while waited < CONNECT_TIMEOUT_MS {
            if self.connected.load(Ordering::Relaxed) {
                info!("MQTT connected to {}", self.url);
                return Ok(());
            }
            thread::sleep(Duration::from_millis(CONNECT_POLL_MS as u64));
            waited += CONNECT_POLL_MS;
        }

        self.client = None;
        self.message_rx = None;
        Err(Esp32MqttError(format!("no CONNACK from {}", self.url)))
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Esp32MqttError> {
        self.client()?
            .subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| Esp32MqttError(format!("{:?}", e)))?;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Esp32MqttError> {
        let qos = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        self.client()?
            .publish(topic, qos, retain, payload)
            .map_err(|e| Esp32MqttError(format!("{:?}", e)))?;
        Ok(())
    }

    fn poll(&mut self) -> Result<(), Esp32MqttError> {
        // Events arrive on the receiver thread.
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        let rx = self.message_rx.as_ref()?;
        match rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.connected.store(false, Ordering::Relaxed);
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::Relaxed)
    }
}

fn handle_mqtt_events(
    mut connection: EspMqttConnection,
    message_tx: Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match connection.next() {
            Err(e) => {
                debug!("MQTT event stream closed: {:?}", e);
                connected.store(false, Ordering::Relaxed);
                return;
            }
            Ok(event) => match event.payload() {
                EventPayload::Connected(_) => connected.store(true, Ordering::Relaxed),
                EventPayload::Disconnected => {
                    warn!("MQTT session lost");
                    connected.store(false, Ordering::Relaxed);
                }
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    details: Details::Complete,
                    ..
                } => {
                    let msg = MqttMessage::new(topic, data.to_vec());
                    if message_tx.send(msg).is_err() {
                        return;
                    }
                }
                _ => {}
            },
        }
    }
}
