//! Device core that ties dispatch, actuators, and safety together.
//!
//! This module provides [`RoomController`], one control core parameterised
//! by a [`DeviceProfile`](crate::config::DeviceProfile). The same type runs
//! the dual-motor driver, a relay board or an I2C expander module; only the
//! profile and the [`OutputSink`] differ.
//!
//! # Overview
//!
//! The controller:
//! - Routes inbound messages through the [`Dispatcher`]
//! - Applies commands to the addressed [`Actuator`]
//! - Advances every actuator once per tick
//! - Forces everything off on safety trips
//!
//! # Example
//!
//! ```rust
//! use room_fx::{Config, Direction, RoomController};
//! use room_fx::hal::MockSink;
//!
//! let mut controller = RoomController::new(&Config::default(), MockSink::new(), 0);
//!
//! controller.handle_message("room1/motor1", b"ON:80:L", 0);
//! for tick in 1..=16 {
//!     controller.update(tick * 20, true);
//! }
//! assert_eq!(controller.actuator("motor1").unwrap().current_speed(), 80);
//!
//! // STOP is immediate, no slew
//! let reply = controller.handle_message("room1/STOP", b"", 400).unwrap();
//! assert!(reply.feedback.is_ok());
//! assert_eq!(controller.sink().last_output(0), Some((0, Direction::Stopped)));
//! ```

extern crate alloc;
use alloc::vec::Vec;

use heapless::String as HString;
use log::{info, warn};

use crate::actuator::{Actuator, Outcome};
use crate::commands::{Command, CommandError, Feedback, MAX_FEEDBACK_LEN};
use crate::config::{Config, LongString};
use crate::dispatch::{feedback_topic, Dispatch, Dispatcher, Target};
use crate::error::Error;
use crate::safety::{SafetyMonitor, Trip};
use crate::supervisor::LinkReport;
use crate::traits::OutputSink;

/// Feedback to publish for one handled message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// `<commandTopic>/feedback`
    pub topic: LongString,
    /// Result of the command.
    pub feedback: Feedback,
}

impl Reply {
    /// Wire payload of the feedback.
    pub fn payload(&self) -> HString<MAX_FEEDBACK_LEN> {
        self.feedback.payload()
    }
}

/// Main device controller.
///
/// # Type Parameter
///
/// - `S`: Output hardware ([`OutputSink`] trait), shared by all actuators
///
/// # Thread Safety
///
/// Not thread-safe. It is owned by the [`Runtime`](crate::runtime::Runtime)
/// and driven from a single cooperative loop.
pub struct RoomController<S: OutputSink> {
    sink: S,
    actuators: Vec<Actuator>,
    dispatcher: Dispatcher,
    safety: SafetyMonitor,
}

impl<S: OutputSink> RoomController<S> {
    /// Create a controller for `config.device` and drive every output to off.
    pub fn new(config: &Config, sink: S, now_ms: u64) -> Self {
        let actuators = config
            .device
            .actuators
            .iter()
            .map(|p| Actuator::new(p.name.as_str(), p.channel, config.motion.step))
            .collect();
        let mut controller = Self {
            sink,
            actuators,
            dispatcher: Dispatcher::new(
                config.mqtt.base_prefix.as_str(),
                &config.device,
                config.motion.default_speed,
            ),
            safety: SafetyMonitor::new(&config.safety, now_ms),
        };
        for actuator in controller.actuators.iter_mut() {
            actuator.force_off(&mut controller.sink);
        }
        controller
    }

    /// Handle one inbound message.
    ///
    /// Returns the feedback to publish, or `None` when the message is not
    /// addressed to this device.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8], now_ms: u64) -> Option<Reply> {
        let feedback = match self.dispatcher.dispatch(topic, payload) {
            Dispatch::Ignore => return None,
            Dispatch::Reject(e) => {
                let err = Error::from(e);
                warn!("{}: {} ({:?})", topic, err, err.kind());
                Feedback::Error(e)
            }
            Dispatch::Route { target, command } => {
                self.safety.note_command(now_ms);
                self.apply(target, command, now_ms)
            }
        };

        let Some(topic) = feedback_topic(topic) else {
            warn!("{}: topic too long for feedback", topic);
            return None;
        };
        Some(Reply { topic, feedback })
    }

    /// Apply a command directly (local triggers, tests).
    pub fn apply(&mut self, target: Target, command: Command, now_ms: u64) -> Feedback {
        match (target, command) {
            (_, Command::EmergencyStop) => {
                self.safe_state(Trip::EmergencyStop);
                Feedback::Ok
            }
            (Target::All, command) => {
                let mut any = false;
                for actuator in self.actuators.iter_mut() {
                    any |= actuator.apply(command, now_ms, &mut self.sink) != Outcome::Ignored;
                }
                if any || self.actuators.is_empty() {
                    Feedback::Ok
                } else {
                    Feedback::NotEnabled
                }
            }
            (Target::Actuator(index), command) => match self.actuators.get_mut(index) {
                None => Feedback::Error(CommandError::UnknownActuator),
                Some(actuator) => match actuator.apply(command, now_ms, &mut self.sink) {
                    Outcome::Ignored => Feedback::NotEnabled,
                    Outcome::Applied | Outcome::Deferred => Feedback::Ok,
                },
            },
        }
    }

    /// Advance every actuator one tick, then check the inactivity timer.
    pub fn update(&mut self, now_ms: u64, broker_connected: bool) {
        for actuator in self.actuators.iter_mut() {
            actuator.update(now_ms, &mut self.sink);
        }
        if self.safety.check_inactivity(now_ms, broker_connected).is_some() {
            self.force_all_off();
        }
    }

    /// React to the supervisor's view of the links.
    pub fn on_link_report(&mut self, report: &LinkReport, now_ms: u64) {
        if report.wifi_lost {
            self.safe_state(Trip::WifiLost);
        } else if report.broker_lost {
            self.safe_state(Trip::BrokerLost);
        }
        if report.broker_connected {
            info!("accepting commands under {}", self.dispatcher.prefix());
            self.safety.on_broker_connected(now_ms);
        }
    }

    /// Log `reason` and hard-stop every actuator.
    pub fn safe_state(&mut self, reason: Trip) {
        self.safety.trip(reason);
        self.force_all_off();
    }

    fn force_all_off(&mut self) {
        for actuator in self.actuators.iter_mut() {
            actuator.force_off(&mut self.sink);
        }
    }

    /// Command topics plus `STOP`, for the supervisor's subscriptions.
    pub fn subscriptions(&self) -> Vec<LongString> {
        self.dispatcher.subscriptions().into_iter().collect()
    }

    /// All actuators in profile order.
    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    /// Look up an actuator by name.
    pub fn actuator(&self, name: &str) -> Option<&Actuator> {
        self.actuators.iter().find(|a| a.name() == name)
    }

    /// True when every actuator is at rest and disabled.
    pub fn all_off(&self) -> bool {
        self.actuators
            .iter()
            .all(|a| a.is_idle() && a.current_speed() == 0 && !a.is_enabled())
    }

    /// Safety monitor state.
    pub fn safety(&self) -> &SafetyMonitor {
        &self.safety
    }

    /// Get a reference to the output sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Get a mutable reference to the output sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActuatorProfile, ChannelKind, DeviceProfile, SafetyConfig};
    use crate::hal::MockSink;
    use crate::traits::Direction;

    fn controller() -> RoomController<MockSink> {
        RoomController::new(&Config::default(), MockSink::new(), 0)
    }

    fn run(c: &mut RoomController<MockSink>, from_ms: u64, ticks: u64) -> u64 {
        let mut now = from_ms;
        for _ in 0..ticks {
            now += 20;
            c.update(now, true);
        }
        now
    }

    #[test]
    fn construction_drives_outputs_off() {
        let c = controller();
        assert_eq!(c.sink().last_output(0), Some((0, Direction::Stopped)));
        assert_eq!(c.sink().last_output(1), Some((0, Direction::Stopped)));
        assert!(c.all_off());
    }

    #[test]
    fn on_command_replies_ok_and_moves() {
        let mut c = controller();
        let reply = c.handle_message("room1/motor1", b"ON:50:R", 0).unwrap();
        assert_eq!(reply.topic.as_str(), "room1/motor1/feedback");
        assert_eq!(reply.payload().as_str(), "OK");

        c.update(20, true);
        let (duty, dir) = c.sink().last_output(0).unwrap();
        assert!(duty > 0);
        assert_eq!(dir, Direction::Right);
    }

    #[test]
    fn ignored_topics_produce_no_reply() {
        let mut c = controller();
        assert!(c.handle_message("room1/motor1/feedback", b"OK", 0).is_none());
        assert!(c.handle_message("other/motor1", b"ON", 0).is_none());
    }

    #[test]
    fn malformed_command_replies_error_without_state_change() {
        let mut c = controller();
        let writes = c.sink().writes.len();
        let reply = c.handle_message("room1/motor1", b"ON:500", 0).unwrap();
        assert_eq!(reply.payload().as_str(), "ERROR: invalid speed");
        assert_eq!(c.sink().writes.len(), writes);
        assert!(c.all_off());
    }

    #[test]
    fn unknown_actuator_replies_error() {
        let mut c = controller();
        let reply = c.handle_message("room1/motor3", b"ON", 0).unwrap();
        assert_eq!(reply.topic.as_str(), "room1/motor3/feedback");
        assert_eq!(reply.payload().as_str(), "ERROR: unknown actuator");
    }

    #[test]
    fn speed_on_disabled_actuator_reports_not_enabled() {
        let mut c = controller();
        let reply = c.handle_message("room1/motor2", b"SPEED:40", 0).unwrap();
        assert_eq!(reply.feedback, Feedback::NotEnabled);
        assert!(c.all_off());
    }

    #[test]
    fn stop_turns_everything_off_immediately() {
        let mut c = controller();
        c.handle_message("room1/motor1", b"ON:80:L", 0);
        c.handle_message("room1/motor2", b"ON:60:R", 0);
        let now = run(&mut c, 0, 20);

        let reply = c.handle_message("room1/STOP", b"anything", now).unwrap();
        assert_eq!(reply.topic.as_str(), "room1/STOP/feedback");
        assert!(reply.feedback.is_ok());
        assert!(c.all_off());
        for ch in 0..2 {
            assert!(!c.sink().is_enabled(ch));
            assert_eq!(c.sink().last_output(ch), Some((0, Direction::Stopped)));
        }
        assert_eq!(c.safety().last_trip(), Some(Trip::EmergencyStop));
    }

    #[test]
    fn link_loss_forces_safe_state() {
        let mut c = controller();
        c.handle_message("room1/motor1", b"ON:40", 0);
        run(&mut c, 0, 10);

        let report = LinkReport {
            wifi_lost: true,
            ..LinkReport::default()
        };
        c.on_link_report(&report, 200);
        assert!(c.all_off());
        assert_eq!(c.safety().last_trip(), Some(Trip::WifiLost));
    }

    #[test]
    fn inactivity_forces_safe_state_once() {
        let config =
            Config::default().with_safety(SafetyConfig::default().with_inactivity_timeout_ms(1_000));
        let mut c = RoomController::new(&config, MockSink::new(), 0);
        c.handle_message("room1/motor1", b"ON:10", 0);
        run(&mut c, 0, 10);
        assert_eq!(c.actuator("motor1").unwrap().current_speed(), 10);

        run(&mut c, 200, 50);
        assert!(c.all_off());
        assert_eq!(c.safety().trip_count(), 1);
    }

    #[test]
    fn ignored_command_still_resets_inactivity() {
        let config =
            Config::default().with_safety(SafetyConfig::default().with_inactivity_timeout_ms(1_000));
        let mut c = RoomController::new(&config, MockSink::new(), 0);
        c.handle_message("room1/motor1", b"DIR:R", 900);
        c.update(1_500, true);
        assert_eq!(c.safety().trip_count(), 0);
        c.update(1_900, true);
        assert_eq!(c.safety().trip_count(), 1);
    }

    #[test]
    fn relay_profile_uses_same_core() {
        let profile = DeviceProfile::empty()
            .with_actuator(ActuatorProfile::new("light", 4, ChannelKind::DirectGpio));
        let config = Config::default().with_device(profile);
        let mut c = RoomController::new(&config, MockSink::new(), 0);

        let reply = c.handle_message("room1/light", b"1", 0).unwrap();
        assert!(reply.feedback.is_ok());
        assert!(c.sink().is_enabled(4));
        assert_eq!(c.subscriptions().len(), 2);
    }

    #[test]
    fn apply_to_all() {
        let mut c = controller();
        let fb = c.apply(
            Target::All,
            Command::TurnOn {
                speed: 20,
                direction: Direction::Left,
                ramp_ms: 0,
            },
            0,
        );
        assert!(fb.is_ok());
        run(&mut c, 0, 4);
        assert!(c.actuators().iter().all(|a| a.current_speed() == 20));
    }
}
