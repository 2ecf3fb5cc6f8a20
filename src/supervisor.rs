//! WiFi and broker connectivity supervision.
//!
//! The [`ConnectivitySupervisor`] is ticked once per loop pass. It notices
//! link loss, retries each link with its own exponential [`Backoff`], and
//! performs the broker session setup (last will, subscriptions, retained
//! `online`). Running out of attempts on either link is fatal.
//!
//! # Link Lifecycle
//!
//! ```text
//!            connect ok
//! Disconnected ──────────► Connected
//!     ▲   │ retry due          │ link lost
//!     │   ▼                    │
//!     └─ Connecting ◄──────────┘
//!        (fail: interval x2, attempts+1, budget spent -> fatal)
//! ```
//!
//! # Example
//!
//! ```rust
//! use room_fx::supervisor::ConnectivitySupervisor;
//! use room_fx::config::Config;
//! use room_fx::hal::{MockMqtt, MockWifi};
//!
//! let config = Config::default();
//! let topics = ["room1/motor1", "room1/STOP"];
//! let mut supervisor = ConnectivitySupervisor::new(&config, &topics);
//! let mut wifi = MockWifi::new();
//! let mut mqtt = MockMqtt::new();
//!
//! let report = supervisor.tick(0, &mut wifi, &mut mqtt).unwrap();
//! assert!(report.wifi_up && report.broker_up);
//! assert_eq!(mqtt.subscriptions, ["room1/motor1", "room1/STOP"]);
//! assert_eq!(mqtt.published_to("devices/esp32_wifi_controller/status")[0].payload, b"online");
//! ```

extern crate alloc;
use alloc::vec::Vec;

use log::{info, warn};

use crate::backoff::Backoff;
use crate::config::{Config, LongString, ShortString};
use crate::error::NetError;
use crate::traits::{LastWill, MqttTransport, WifiLink};

/// Retained payload announcing the device is up.
pub const ONLINE: &[u8] = b"online";

/// Last-will payload published by the broker when the device drops.
pub const OFFLINE: &[u8] = b"offline";

/// Connection state of one link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkState {
    /// No link.
    #[default]
    Disconnected,
    /// Attempt in progress.
    Connecting,
    /// Link up.
    Connected,
}

impl LinkState {
    fn label(self) -> &'static str {
        match self {
            LinkState::Connected => "OK",
            LinkState::Connecting => "CONNECTING",
            LinkState::Disconnected => "FAIL",
        }
    }
}

/// What happened to the links during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// WiFi is up at the end of the tick.
    pub wifi_up: bool,
    /// Broker session is up at the end of the tick.
    pub broker_up: bool,
    /// WiFi was connected and dropped.
    pub wifi_lost: bool,
    /// Broker was connected and dropped while WiFi stayed up.
    pub broker_lost: bool,
    /// Broker session was (re)established this tick.
    pub broker_connected: bool,
}

/// Owns both link state machines and their backoff timers.
pub struct ConnectivitySupervisor {
    wifi_state: LinkState,
    broker_state: LinkState,
    wifi_backoff: Backoff,
    broker_backoff: Backoff,
    wifi_timeout_ms: u32,
    client_id: ShortString,
    status_topic: LongString,
    subscriptions: Vec<LongString>,
    status_interval_ms: u32,
    last_status_ms: u64,
    check_interval_ms: u32,
    last_check_ms: Option<u64>,
}

impl ConnectivitySupervisor {
    /// Create a supervisor that subscribes to `topics` on every broker connect.
    pub fn new<T: AsRef<str>>(config: &Config, topics: &[T]) -> Self {
        let conn = &config.connection;
        Self {
            wifi_state: LinkState::Disconnected,
            broker_state: LinkState::Disconnected,
            wifi_backoff: Backoff::new(conn.retry_base_ms, conn.retry_cap_ms, conn.max_wifi_attempts),
            broker_backoff: Backoff::new(
                conn.retry_base_ms,
                conn.retry_cap_ms,
                conn.max_mqtt_attempts,
            ),
            wifi_timeout_ms: config.wifi.connect_timeout_ms,
            client_id: config.mqtt.client_id.clone(),
            status_topic: config.mqtt.status_topic(),
            subscriptions: topics
                .iter()
                .map(|t| crate::config::long_string(t.as_ref()))
                .collect(),
            status_interval_ms: config.mqtt.status_interval_ms,
            last_status_ms: 0,
            check_interval_ms: conn.check_interval_ms,
            last_check_ms: None,
        }
    }

    /// Evaluate both links and retry whichever is down and due.
    ///
    /// Returns `Err` only when a link has used up its attempt budget.
    pub fn tick<W: WifiLink, M: MqttTransport>(
        &mut self,
        now_ms: u64,
        wifi: &mut W,
        mqtt: &mut M,
    ) -> Result<LinkReport, NetError> {
        let mut report = LinkReport::default();

        self.tick_wifi(now_ms, wifi, &mut report)?;
        if self.wifi_state == LinkState::Connected {
            self.tick_broker(now_ms, mqtt, &mut report)?;
        } else {
            self.broker_state = LinkState::Disconnected;
        }

        if self.broker_state == LinkState::Connected
            && now_ms.saturating_sub(self.last_status_ms) >= u64::from(self.status_interval_ms)
        {
            self.publish_online(now_ms, mqtt);
        }

        report.wifi_up = self.wifi_state == LinkState::Connected;
        report.broker_up = self.broker_state == LinkState::Connected;

        let check_due = self.last_check_ms.map_or(true, |last| {
            now_ms.saturating_sub(last) >= u64::from(self.check_interval_ms)
        });
        if check_due {
            self.last_check_ms = Some(now_ms);
            info!(
                "link status: wifi={} mqtt={}",
                self.wifi_state.label(),
                self.broker_state.label()
            );
        }

        Ok(report)
    }

    fn tick_wifi<W: WifiLink>(
        &mut self,
        now_ms: u64,
        wifi: &mut W,
        report: &mut LinkReport,
    ) -> Result<(), NetError> {
        if wifi.is_connected() {
            if self.wifi_state != LinkState::Connected {
                info!("WiFi connected");
                self.wifi_state = LinkState::Connected;
                self.wifi_backoff.on_success();
            }
            return Ok(());
        }

        if self.wifi_state == LinkState::Connected {
            warn!("WiFi connection lost");
            report.wifi_lost = true;
            self.wifi_state = LinkState::Disconnected;
            self.broker_state = LinkState::Disconnected;
        }

        if !self.wifi_backoff.is_due(now_ms) {
            return Ok(());
        }

        self.wifi_state = LinkState::Connecting;
        self.wifi_backoff.record_attempt(now_ms);
        info!(
            "connecting to WiFi (attempt {})",
            u32::from(self.wifi_backoff.attempts()) + 1
        );
        wifi.disconnect();
        match wifi.connect(self.wifi_timeout_ms) {
            Ok(()) => {
                info!("WiFi connected");
                self.wifi_state = LinkState::Connected;
                self.wifi_backoff.on_success();
                Ok(())
            }
            Err(e) => {
                self.wifi_state = LinkState::Disconnected;
                self.wifi_backoff.on_failure();
                warn!(
                    "WiFi connect failed: {:?}, next retry in {} ms",
                    e,
                    self.wifi_backoff.interval_ms()
                );
                if self.wifi_backoff.is_exhausted() {
                    return Err(NetError::WifiExhausted {
                        attempts: self.wifi_backoff.attempts(),
                    });
                }
                Ok(())
            }
        }
    }

    fn tick_broker<M: MqttTransport>(
        &mut self,
        now_ms: u64,
        mqtt: &mut M,
        report: &mut LinkReport,
    ) -> Result<(), NetError> {
        if mqtt.is_connected() {
            if self.broker_state != LinkState::Connected {
                // Transport reconnected on its own; redo the session setup.
                self.on_broker_up(now_ms, mqtt, report);
            }
            return Ok(());
        }

        if self.broker_state == LinkState::Connected {
            warn!("MQTT connection lost");
            report.broker_lost = true;
            self.broker_state = LinkState::Disconnected;
        }

        if !self.broker_backoff.is_due(now_ms) {
            return Ok(());
        }

        self.broker_state = LinkState::Connecting;
        self.broker_backoff.record_attempt(now_ms);
        info!(
            "connecting to MQTT broker as {} (attempt {})",
            self.client_id,
            u32::from(self.broker_backoff.attempts()) + 1
        );

        let will = LastWill {
            topic: self.status_topic.as_str(),
            payload: OFFLINE,
            retain: true,
        };
        match mqtt.connect(self.client_id.as_str(), &will) {
            Ok(()) => {
                self.on_broker_up(now_ms, mqtt, report);
                Ok(())
            }
            Err(e) => {
                self.broker_state = LinkState::Disconnected;
                self.broker_backoff.on_failure();
                warn!(
                    "MQTT connect failed: {:?}, next retry in {} ms",
                    e,
                    self.broker_backoff.interval_ms()
                );
                if self.broker_backoff.is_exhausted() {
                    return Err(NetError::BrokerExhausted {
                        attempts: self.broker_backoff.attempts(),
                    });
                }
                Ok(())
            }
        }
    }

    fn on_broker_up<M: MqttTransport>(&mut self, now_ms: u64, mqtt: &mut M, report: &mut LinkReport) {
        info!("MQTT connected");
        self.broker_state = LinkState::Connected;
        self.broker_backoff.on_success();
        report.broker_connected = true;

        for topic in self.subscriptions.iter() {
            match mqtt.subscribe(topic.as_str()) {
                Ok(()) => info!("subscribed to {}", topic),
                Err(e) => warn!("subscribe to {} failed: {:?}", topic, e),
            }
        }
        self.publish_online(now_ms, mqtt);
    }

    fn publish_online<M: MqttTransport>(&mut self, now_ms: u64, mqtt: &mut M) {
        self.last_status_ms = now_ms;
        if let Err(e) = mqtt.publish(self.status_topic.as_str(), ONLINE, true) {
            warn!("status publish failed: {:?}", e);
        }
    }

    /// WiFi link state.
    pub fn wifi_state(&self) -> LinkState {
        self.wifi_state
    }

    /// Broker link state.
    pub fn broker_state(&self) -> LinkState {
        self.broker_state
    }

    /// WiFi retry timer.
    pub fn wifi_backoff(&self) -> &Backoff {
        &self.wifi_backoff
    }

    /// Broker retry timer.
    pub fn broker_backoff(&self) -> &Backoff {
        &self.broker_backoff
    }

    /// Liveness topic (`devices/<clientId>/status`).
    pub fn status_topic(&self) -> &str {
        self.status_topic.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::hal::{MockMqtt, MockWifi};

    const STATUS: &str = "devices/esp32_wifi_controller/status";

    fn supervisor(config: &Config) -> ConnectivitySupervisor {
        ConnectivitySupervisor::new(config, &["room1/motor1", "room1/STOP"])
    }

    #[test]
    fn first_tick_connects_both_links() {
        let config = Config::default();
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        let mut mqtt = MockMqtt::new();

        let report = sup.tick(0, &mut wifi, &mut mqtt).unwrap();
        assert!(report.wifi_up);
        assert!(report.broker_up);
        assert!(report.broker_connected);
        assert_eq!(wifi.connect_calls, 1);
        assert_eq!(sup.wifi_state(), LinkState::Connected);
    }

    #[test]
    fn connect_registers_retained_offline_will() {
        let config = Config::default();
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        let mut mqtt = MockMqtt::new();
        sup.tick(0, &mut wifi, &mut mqtt).unwrap();

        let will = mqtt.will.clone().unwrap();
        assert_eq!(will.topic, STATUS);
        assert_eq!(will.payload, b"offline");
        assert!(will.retain);
        assert_eq!(mqtt.client_id.as_deref(), Some("esp32_wifi_controller"));
    }

    #[test]
    fn online_is_published_retained_after_subscribing() {
        let config = Config::default();
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        let mut mqtt = MockMqtt::new();
        sup.tick(0, &mut wifi, &mut mqtt).unwrap();

        let online = mqtt.published_to(STATUS);
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].payload, b"online");
        assert!(online[0].retain);
        assert_eq!(mqtt.subscriptions, ["room1/motor1", "room1/STOP"]);
    }

    #[test]
    fn online_is_republished_periodically() {
        let config = Config::default();
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        let mut mqtt = MockMqtt::new();
        sup.tick(0, &mut wifi, &mut mqtt).unwrap();
        sup.tick(29_999, &mut wifi, &mut mqtt).unwrap();
        assert_eq!(mqtt.published_to(STATUS).len(), 1);
        sup.tick(30_000, &mut wifi, &mut mqtt).unwrap();
        assert_eq!(mqtt.published_to(STATUS).len(), 2);
    }

    #[test]
    fn wifi_failure_backs_off_then_restart_budget_runs_out() {
        let config = Config::default()
            .with_connection(ConnectionConfig::default().with_max_attempts(3, 5));
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        wifi.fail_connects = true;
        let mut mqtt = MockMqtt::new();

        assert!(sup.tick(0, &mut wifi, &mut mqtt).is_ok());
        assert_eq!(sup.wifi_backoff().interval_ms(), 10_000);

        // Not due yet
        sup.tick(9_999, &mut wifi, &mut mqtt).unwrap();
        assert_eq!(wifi.connect_calls, 1);

        assert!(sup.tick(10_000, &mut wifi, &mut mqtt).is_ok());
        assert_eq!(sup.wifi_backoff().interval_ms(), 20_000);

        let err = sup.tick(30_000, &mut wifi, &mut mqtt).unwrap_err();
        assert_eq!(err, NetError::WifiExhausted { attempts: 3 });
        assert_eq!(mqtt.connect_calls, 0);
    }

    #[test]
    fn wifi_success_resets_backoff() {
        let config = Config::default();
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        wifi.fail_connects = true;
        let mut mqtt = MockMqtt::new();

        sup.tick(0, &mut wifi, &mut mqtt).unwrap();
        sup.tick(10_000, &mut wifi, &mut mqtt).unwrap();
        assert_eq!(sup.wifi_backoff().attempts(), 2);

        wifi.fail_connects = false;
        sup.tick(30_000, &mut wifi, &mut mqtt).unwrap();
        assert_eq!(sup.wifi_backoff().attempts(), 0);
        assert_eq!(sup.wifi_backoff().interval_ms(), 5_000);
    }

    #[test]
    fn broker_failures_are_fatal_at_budget() {
        let config = Config::default()
            .with_connection(ConnectionConfig::default().with_max_attempts(5, 2));
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        let mut mqtt = MockMqtt::new();
        mqtt.fail_connects = true;

        sup.tick(0, &mut wifi, &mut mqtt).unwrap();
        assert_eq!(sup.broker_state(), LinkState::Disconnected);
        let err = sup.tick(10_000, &mut wifi, &mut mqtt).unwrap_err();
        assert_eq!(err, NetError::BrokerExhausted { attempts: 2 });
    }

    #[test]
    fn wifi_loss_is_reported_and_drops_broker() {
        let config = Config::default();
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        let mut mqtt = MockMqtt::new();
        sup.tick(0, &mut wifi, &mut mqtt).unwrap();

        wifi.drop_link();
        wifi.fail_connects = true;
        let report = sup.tick(20, &mut wifi, &mut mqtt).unwrap();
        assert!(report.wifi_lost);
        assert!(!report.broker_lost);
        assert!(!report.broker_up);
        assert_eq!(sup.broker_state(), LinkState::Disconnected);
    }

    #[test]
    fn broker_loss_is_reported_and_retried() {
        let config = Config::default();
        let mut sup = supervisor(&config);
        let mut wifi = MockWifi::new();
        let mut mqtt = MockMqtt::new();
        sup.tick(0, &mut wifi, &mut mqtt).unwrap();

        mqtt.drop_connection();
        mqtt.fail_connects = true;
        let report = sup.tick(6_000, &mut wifi, &mut mqtt).unwrap();
        assert!(report.broker_lost);
        assert!(report.wifi_up);
        assert_eq!(mqtt.connect_calls, 2);

        mqtt.fail_connects = false;
        let report = sup.tick(16_000, &mut wifi, &mut mqtt).unwrap();
        assert!(report.broker_connected);
        assert_eq!(mqtt.subscriptions.len(), 4);
    }
}
