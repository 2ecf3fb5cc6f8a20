//! Cooperative run loop.
//!
//! [`Runtime`] owns every piece of device state and the platform handles.
//! The binary calls [`Runtime::run_once`] every `tick_ms`; each pass runs:
//!
//! 1. Supervisor tick (link checks, bounded reconnect attempts)
//! 2. Safe-state on link loss
//! 3. Poll the broker and drain inbound messages in delivery order,
//!    publishing one feedback per handled command
//! 4. Actuator update and inactivity check
//! 5. Watchdog feed
//!
//! A fatal network error forces all outputs off, logs, and restarts the
//! device through [`SystemControl`]. This is the only restart path.
//!
//! # Example
//!
//! ```rust
//! use room_fx::{Config, Runtime};
//! use room_fx::hal::{MockMqtt, MockSink, MockSystem, MockWatchdog, MockWifi};
//!
//! let mut rt = Runtime::new(
//!     &Config::default(),
//!     MockSink::new(),
//!     MockWifi::new(),
//!     MockMqtt::new(),
//!     MockWatchdog::new(),
//!     MockSystem::new(),
//!     0,
//! );
//!
//! rt.run_once(0).unwrap();
//! rt.mqtt_mut().queue_message("room1/motor1", b"ON:50:R".to_vec());
//! rt.run_once(20).unwrap();
//!
//! assert_eq!(rt.mqtt().payloads_to("room1/motor1/feedback"), ["OK"]);
//! assert_eq!(rt.watchdog().feeds, 2);
//! ```

use log::{error, warn};

use crate::config::Config;
use crate::controller::RoomController;
use crate::error::{Error, NetError};
use crate::safety::Trip;
use crate::supervisor::{ConnectivitySupervisor, LinkReport};
use crate::traits::{MqttTransport, OutputSink, SystemControl, Watchdog, WifiLink};

/// Owns the device core and its platform handles.
pub struct Runtime<S, W, M, D, Y>
where
    S: OutputSink,
    W: WifiLink,
    M: MqttTransport,
    D: Watchdog,
    Y: SystemControl,
{
    supervisor: ConnectivitySupervisor,
    controller: RoomController<S>,
    wifi: W,
    mqtt: M,
    watchdog: D,
    system: Y,
    last_report: LinkReport,
    last_error: Option<Error>,
}

impl<S, W, M, D, Y> Runtime<S, W, M, D, Y>
where
    S: OutputSink,
    W: WifiLink,
    M: MqttTransport,
    D: Watchdog,
    Y: SystemControl,
{
    /// Assemble a runtime. Outputs are driven off immediately.
    pub fn new(config: &Config, sink: S, wifi: W, mqtt: M, watchdog: D, system: Y, now_ms: u64) -> Self {
        let controller = RoomController::new(config, sink, now_ms);
        let supervisor = ConnectivitySupervisor::new(config, &controller.subscriptions());
        Self {
            supervisor,
            controller,
            wifi,
            mqtt,
            watchdog,
            system,
            last_report: LinkReport::default(),
            last_error: None,
        }
    }

    /// Run one loop pass at `now_ms`.
    ///
    /// Returns `Err` only for fatal errors, after the restart was requested.
    pub fn run_once(&mut self, now_ms: u64) -> Result<(), Error> {
        let report = match self.supervisor.tick(now_ms, &mut self.wifi, &mut self.mqtt) {
            Ok(report) => report,
            Err(e) => {
                error!("{}, restarting", e);
                self.controller.safe_state(Trip::Fatal);
                self.system.restart();
                return Err(e.into());
            }
        };
        self.controller.on_link_report(&report, now_ms);

        if report.broker_up {
            if let Err(e) = self.mqtt.poll() {
                self.note_transient(NetError::PollFailed, &e);
            }
            while let Some(msg) = self.mqtt.try_recv() {
                let Some(reply) = self.controller.handle_message(&msg.topic, &msg.payload, now_ms)
                else {
                    continue;
                };
                if let Err(e) = self
                    .mqtt
                    .publish(reply.topic.as_str(), reply.payload().as_bytes(), false)
                {
                    warn!("feedback to {} not sent", reply.topic);
                    self.note_transient(NetError::PublishFailed, &e);
                }
            }
        }

        self.controller.update(now_ms, report.broker_up);
        self.watchdog.feed();
        self.last_report = report;
        Ok(())
    }

    fn note_transient(&mut self, kind: NetError, cause: &M::Error) {
        let err = Error::from(kind);
        warn!("{} ({:?}): {:?}", err, err.kind(), cause);
        self.last_error = Some(err);
    }

    /// Most recent non-fatal error, if any pass has seen one.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    /// Link report from the most recent pass.
    pub fn last_report(&self) -> &LinkReport {
        &self.last_report
    }

    /// Device core.
    pub fn controller(&self) -> &RoomController<S> {
        &self.controller
    }

    /// Device core (mutable).
    pub fn controller_mut(&mut self) -> &mut RoomController<S> {
        &mut self.controller
    }

    /// Link supervisor.
    pub fn supervisor(&self) -> &ConnectivitySupervisor {
        &self.supervisor
    }

    /// WiFi handle.
    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    /// WiFi handle (mutable).
    pub fn wifi_mut(&mut self) -> &mut W {
        &mut self.wifi
    }

    /// MQTT handle.
    pub fn mqtt(&self) -> &M {
        &self.mqtt
    }

    /// MQTT handle (mutable).
    pub fn mqtt_mut(&mut self) -> &mut M {
        &mut self.mqtt
    }

    /// Watchdog handle.
    pub fn watchdog(&self) -> &D {
        &self.watchdog
    }

    /// System control handle.
    pub fn system(&self) -> &Y {
        &self.system
    }
}
