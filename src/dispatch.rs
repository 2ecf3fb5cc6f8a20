//! Topic routing and payload parsing for inbound MQTT messages.
//!
//! The [`Dispatcher`] decides, for each `(topic, payload)` pair, whether the
//! message is ignored, routed to an actuator (or to all of them for `STOP`),
//! or rejected with an error that is reported as feedback.
//!
//! # Routing Rules
//!
//! 1. Topics ending in `/feedback` or `/status` are ignored (loop guard)
//! 2. Topics outside the base prefix are ignored
//! 3. `<prefix>STOP` with any payload is an emergency stop
//! 4. `<prefix><name>` routes to the named actuator; unknown names are rejected
//!
//! # Example
//!
//! ```rust
//! use room_fx::dispatch::{Dispatch, Dispatcher, Target};
//! use room_fx::config::DeviceProfile;
//! use room_fx::Command;
//!
//! let dispatcher = Dispatcher::new("room1/", &DeviceProfile::default(), 50);
//!
//! assert_eq!(dispatcher.dispatch("room1/motor1/feedback", b"OK"), Dispatch::Ignore);
//! assert_eq!(
//!     dispatcher.dispatch("room1/STOP", b""),
//!     Dispatch::Route { target: Target::All, command: Command::EmergencyStop }
//! );
//! assert_eq!(
//!     dispatcher.dispatch("room1/motor2", b"OFF"),
//!     Dispatch::Route { target: Target::Actuator(1), command: Command::TurnOff }
//! );
//! ```

use heapless::Vec as HVec;
use log::debug;

use crate::commands::{Command, CommandError};
use crate::config::{short_string, DeviceProfile, LongString, ShortString, MAX_ACTUATORS};

/// Suffix appended to a command topic for its feedback.
pub const FEEDBACK_SUFFIX: &str = "/feedback";

/// Suffix of liveness topics.
pub const STATUS_SUFFIX: &str = "/status";

/// Name of the emergency-stop topic under the base prefix.
pub const STOP_TOPIC: &str = "STOP";

/// Which actuators a routed command applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Every actuator on the device.
    All,
    /// One actuator, by index in the device profile.
    Actuator(usize),
}

/// Routing decision for one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Not for this device (or a feedback/status echo); no feedback.
    Ignore,
    /// A valid command for `target`.
    Route {
        /// Actuator(s) the command applies to.
        target: Target,
        /// Parsed command.
        command: Command,
    },
    /// Addressed to this device but invalid; reported as `ERROR` feedback.
    Reject(CommandError),
}

/// Maps topics and payloads to commands.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    prefix: ShortString,
    names: HVec<ShortString, MAX_ACTUATORS>,
    default_speed: u8,
}

impl Dispatcher {
    /// Create a dispatcher for the actuators in `profile`.
    pub fn new(prefix: &str, profile: &DeviceProfile, default_speed: u8) -> Self {
        let mut names = HVec::new();
        for actuator in profile.actuators.iter() {
            let _ = names.push(actuator.name.clone());
        }
        Self {
            prefix: short_string(prefix),
            names,
            default_speed,
        }
    }

    /// Classify one inbound message.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Dispatch {
        if topic.ends_with(FEEDBACK_SUFFIX) || topic.ends_with(STATUS_SUFFIX) {
            debug!("ignoring echo topic {}", topic);
            return Dispatch::Ignore;
        }

        let Some(name) = topic.strip_prefix(self.prefix.as_str()) else {
            debug!("ignoring foreign topic {}", topic);
            return Dispatch::Ignore;
        };

        if name == STOP_TOPIC {
            return Dispatch::Route {
                target: Target::All,
                command: Command::EmergencyStop,
            };
        }

        let Some(index) = self.names.iter().position(|n| n.as_str() == name) else {
            return Dispatch::Reject(CommandError::UnknownActuator);
        };

        match Command::parse_bytes(payload, self.default_speed) {
            Ok(command) => Dispatch::Route {
                target: Target::Actuator(index),
                command,
            },
            Err(e) => Dispatch::Reject(e),
        }
    }

    /// Topics to subscribe to: every actuator command topic, then `STOP`.
    pub fn subscriptions(&self) -> HVec<LongString, { MAX_ACTUATORS + 1 }> {
        let mut topics = HVec::new();
        for name in self.names.iter().map(|n| n.as_str()).chain([STOP_TOPIC]) {
            let mut topic = LongString::new();
            let _ = topic.push_str(self.prefix.as_str());
            let _ = topic.push_str(name);
            let _ = topics.push(topic);
        }
        topics
    }

    /// Base topic prefix.
    pub fn prefix(&self) -> &str {
        self.prefix.as_str()
    }
}

/// Feedback topic for a command topic: `<topic>/feedback`.
///
/// `None` if the result does not fit in a [`LongString`].
pub fn feedback_topic(topic: &str) -> Option<LongString> {
    let mut out = LongString::new();
    out.push_str(topic).ok()?;
    out.push_str(FEEDBACK_SUFFIX).ok()?;
    Some(out)
}
