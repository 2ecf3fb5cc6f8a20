//! Command types, payload grammar, and feedback for actuator control.
//!
//! Payloads arrive on `<basePrefix><actuator>` and are parsed into a
//! [`Command`]. Every routed or rejected command produces exactly one
//! [`Feedback`] published on `<commandTopic>/feedback`.
//!
//! # Payload Grammar
//!
//! ```text
//! ON[:<speed 0-100>[:<L|R>[:<rampMs>]]]   turn on (defaults: speed 50, L, no ramp)
//! OFF                                     turn off with the standard slew
//! SPEED:<0-100>                           change speed of an enabled actuator
//! DIR:<L|R>                               change direction of an enabled actuator
//! 1 / 0                                   aliases for ON / OFF
//! ```
//!
//! Verbs and direction letters are case-insensitive and trimmed. An empty
//! positional field takes its default, so `ON::R` is speed 50, right.
//!
//! # Example
//!
//! ```rust
//! use room_fx::{Command, Direction};
//!
//! let cmd = Command::parse("on:80:r:1500", 50).unwrap();
//! assert_eq!(cmd, Command::TurnOn { speed: 80, direction: Direction::Right, ramp_ms: 1500 });
//!
//! assert_eq!(Command::parse("OFF", 50), Ok(Command::TurnOff));
//! assert!(Command::parse("SPEED:150", 50).is_err());
//! ```

use core::fmt;

use heapless::String as HString;

use crate::traits::Direction;

/// Maximum length of a rendered feedback payload.
pub const MAX_FEEDBACK_LEN: usize = 64;

/// A parsed actuator command.
///
/// Produced by the [`Dispatcher`](crate::dispatch::Dispatcher) and consumed
/// exactly once by an [`Actuator`](crate::actuator::Actuator) (or by the
/// controller for [`EmergencyStop`](Self::EmergencyStop)).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Command {
    /// Enable and run at `speed` in `direction`, optionally over a timed ramp.
    TurnOn {
        /// Target speed (0-100).
        speed: u8,
        /// Requested direction of travel.
        direction: Direction,
        /// Ramp duration; 0 uses the standard slew.
        ramp_ms: u32,
    },
    /// Disable and decelerate to 0 with the standard slew.
    TurnOff,
    /// New target speed for an enabled actuator.
    SetSpeed(u8),
    /// New direction for an enabled actuator.
    SetDirection(Direction),
    /// Hard stop of every actuator.
    EmergencyStop,
}

impl Command {
    /// Parse a command payload.
    ///
    /// `default_speed` is used for `ON` without (or with an empty) speed field.
    pub fn parse(payload: &str, default_speed: u8) -> Result<Self, CommandError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(CommandError::Empty);
        }

        let mut fields = payload.split(':').map(str::trim);
        let verb = fields.next().unwrap_or("");

        if verb.eq_ignore_ascii_case("ON") || verb == "1" {
            let speed = match fields.next() {
                Some(s) if !s.is_empty() => parse_speed(s)?,
                _ => default_speed.min(100),
            };
            let direction = match fields.next() {
                Some(d) if !d.is_empty() => {
                    Direction::from_code(d).ok_or(CommandError::InvalidDirection)?
                }
                _ => Direction::Left,
            };
            let ramp_ms = match fields.next() {
                Some(r) if !r.is_empty() => r.parse().map_err(|_| CommandError::InvalidRamp)?,
                _ => 0,
            };
            if fields.next().is_some() {
                return Err(CommandError::TooManyParams);
            }
            Ok(Command::TurnOn {
                speed,
                direction,
                ramp_ms,
            })
        } else if verb.eq_ignore_ascii_case("OFF") || verb == "0" {
            if fields.any(|f| !f.is_empty()) {
                return Err(CommandError::TooManyParams);
            }
            Ok(Command::TurnOff)
        } else if verb.eq_ignore_ascii_case("SPEED") {
            let speed = match fields.next() {
                Some(s) if !s.is_empty() => parse_speed(s)?,
                _ => return Err(CommandError::MissingSpeed),
            };
            if fields.next().is_some() {
                return Err(CommandError::TooManyParams);
            }
            Ok(Command::SetSpeed(speed))
        } else if verb.eq_ignore_ascii_case("DIR") {
            let direction = match fields.next() {
                Some(d) if !d.is_empty() => {
                    Direction::from_code(d).ok_or(CommandError::InvalidDirection)?
                }
                _ => return Err(CommandError::MissingDirection),
            };
            if fields.next().is_some() {
                return Err(CommandError::TooManyParams);
            }
            Ok(Command::SetDirection(direction))
        } else {
            Err(CommandError::UnknownVerb)
        }
    }

    /// Parse a raw MQTT payload, rejecting non-UTF-8 bytes.
    pub fn parse_bytes(payload: &[u8], default_speed: u8) -> Result<Self, CommandError> {
        let text = core::str::from_utf8(payload).map_err(|_| CommandError::NotUtf8)?;
        Self::parse(text, default_speed)
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::TurnOn { .. } => "ON",
            Command::TurnOff => "OFF",
            Command::SetSpeed(_) => "SPEED",
            Command::SetDirection(_) => "DIR",
            Command::EmergencyStop => "STOP",
        }
    }
}

fn parse_speed(s: &str) -> Result<u8, CommandError> {
    match s.parse::<u32>() {
        Ok(v) if v <= 100 => Ok(v as u8),
        _ => Err(CommandError::InvalidSpeed),
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why a command was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// Payload was empty or whitespace.
    Empty,
    /// Payload bytes were not valid UTF-8.
    NotUtf8,
    /// Verb is not one of ON, OFF, SPEED, DIR, 1, 0.
    UnknownVerb,
    /// `SPEED` without a value.
    MissingSpeed,
    /// Speed is not an integer in 0..=100.
    InvalidSpeed,
    /// `DIR` without a value.
    MissingDirection,
    /// Direction is not `L` or `R`.
    InvalidDirection,
    /// Ramp is not a non-negative integer of milliseconds.
    InvalidRamp,
    /// More fields than the verb accepts.
    TooManyParams,
    /// Topic names an actuator this device does not have.
    UnknownActuator,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CommandError::Empty => "empty payload",
            CommandError::NotUtf8 => "payload is not UTF-8",
            CommandError::UnknownVerb => "unknown command",
            CommandError::MissingSpeed => "missing speed",
            CommandError::InvalidSpeed => "invalid speed",
            CommandError::MissingDirection => "missing direction",
            CommandError::InvalidDirection => "invalid direction",
            CommandError::InvalidRamp => "invalid ramp",
            CommandError::TooManyParams => "too many parameters",
            CommandError::UnknownActuator => "unknown actuator",
        };
        f.write_str(reason)
    }
}

// ============================================================================
// Feedback
// ============================================================================

/// Result reported back on `<commandTopic>/feedback`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feedback {
    /// Command accepted (applied now or deferred behind a reversal).
    Ok,
    /// Command parsed but had no effect because the actuator is disabled.
    NotEnabled,
    /// Command rejected.
    Error(CommandError),
}

impl Feedback {
    /// Wire payload: `OK` or `ERROR: <reason>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use room_fx::{CommandError, Feedback};
    ///
    /// assert_eq!(Feedback::Ok.payload().as_str(), "OK");
    /// assert_eq!(
    ///     Feedback::Error(CommandError::InvalidSpeed).payload().as_str(),
    ///     "ERROR: invalid speed"
    /// );
    /// ```
    pub fn payload(&self) -> HString<MAX_FEEDBACK_LEN> {
        use core::fmt::Write;

        let mut out = HString::new();
        let _ = match self {
            Feedback::Ok => out.push_str("OK").map_err(|_| fmt::Error),
            Feedback::NotEnabled => out
                .push_str("ERROR: ignored, actuator not enabled")
                .map_err(|_| fmt::Error),
            Feedback::Error(e) => write!(out, "ERROR: {}", e),
        };
        out
    }

    /// True for [`Feedback::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Feedback::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // ON
    // =========================================================================

    #[test]
    fn bare_on_uses_defaults() {
        assert_eq!(
            Command::parse("ON", 50),
            Ok(Command::TurnOn {
                speed: 50,
                direction: Direction::Left,
                ramp_ms: 0
            })
        );
    }

    #[test]
    fn on_with_all_fields() {
        assert_eq!(
            Command::parse("ON:80:R:2000", 50),
            Ok(Command::TurnOn {
                speed: 80,
                direction: Direction::Right,
                ramp_ms: 2000
            })
        );
    }

    #[test]
    fn on_empty_fields_take_defaults() {
        assert_eq!(
            Command::parse("ON::R", 40),
            Ok(Command::TurnOn {
                speed: 40,
                direction: Direction::Right,
                ramp_ms: 0
            })
        );
        assert_eq!(
            Command::parse("ON:70::500", 40),
            Ok(Command::TurnOn {
                speed: 70,
                direction: Direction::Left,
                ramp_ms: 500
            })
        );
    }

    #[test]
    fn verbs_are_case_insensitive_and_trimmed() {
        assert_eq!(
            Command::parse("  on : 30 : r ", 50),
            Ok(Command::TurnOn {
                speed: 30,
                direction: Direction::Right,
                ramp_ms: 0
            })
        );
        assert_eq!(Command::parse("Off\n", 50), Ok(Command::TurnOff));
        assert_eq!(Command::parse("speed:10", 50), Ok(Command::SetSpeed(10)));
        assert_eq!(
            Command::parse("dir:l", 50),
            Ok(Command::SetDirection(Direction::Left))
        );
    }

    #[test]
    fn relay_aliases() {
        assert!(matches!(
            Command::parse("1", 50),
            Ok(Command::TurnOn { speed: 50, .. })
        ));
        assert_eq!(Command::parse("0", 50), Ok(Command::TurnOff));
    }

    #[test]
    fn on_speed_out_of_range() {
        assert_eq!(Command::parse("ON:101", 50), Err(CommandError::InvalidSpeed));
        assert_eq!(Command::parse("ON:-5", 50), Err(CommandError::InvalidSpeed));
        assert_eq!(Command::parse("ON:fast", 50), Err(CommandError::InvalidSpeed));
    }

    #[test]
    fn on_bad_direction_and_ramp() {
        assert_eq!(
            Command::parse("ON:50:X", 50),
            Err(CommandError::InvalidDirection)
        );
        assert_eq!(
            Command::parse("ON:50:L:soon", 50),
            Err(CommandError::InvalidRamp)
        );
    }

    #[test]
    fn on_too_many_fields() {
        assert_eq!(
            Command::parse("ON:50:L:100:9", 50),
            Err(CommandError::TooManyParams)
        );
    }

    // =========================================================================
    // OFF / SPEED / DIR
    // =========================================================================

    #[test]
    fn off_rejects_parameters() {
        assert_eq!(Command::parse("OFF:50", 50), Err(CommandError::TooManyParams));
        assert_eq!(Command::parse("OFF:", 50), Ok(Command::TurnOff));
    }

    #[test]
    fn speed_requires_value() {
        assert_eq!(Command::parse("SPEED", 50), Err(CommandError::MissingSpeed));
        assert_eq!(Command::parse("SPEED:", 50), Err(CommandError::MissingSpeed));
        assert_eq!(Command::parse("SPEED:100", 50), Ok(Command::SetSpeed(100)));
        assert_eq!(
            Command::parse("SPEED:5:5", 50),
            Err(CommandError::TooManyParams)
        );
    }

    #[test]
    fn dir_requires_value() {
        assert_eq!(Command::parse("DIR", 50), Err(CommandError::MissingDirection));
        assert_eq!(Command::parse("DIR:S", 50), Err(CommandError::InvalidDirection));
    }

    #[test]
    fn empty_and_unknown() {
        assert_eq!(Command::parse("", 50), Err(CommandError::Empty));
        assert_eq!(Command::parse("   ", 50), Err(CommandError::Empty));
        assert_eq!(Command::parse("BLINK", 50), Err(CommandError::UnknownVerb));
    }

    #[test]
    fn non_utf8_bytes() {
        assert_eq!(
            Command::parse_bytes(&[0x4f, 0xff], 50),
            Err(CommandError::NotUtf8)
        );
        assert_eq!(Command::parse_bytes(b"OFF", 50), Ok(Command::TurnOff));
    }

    // =========================================================================
    // Feedback
    // =========================================================================

    #[test]
    fn feedback_payloads() {
        assert_eq!(Feedback::Ok.payload().as_str(), "OK");
        assert_eq!(
            Feedback::Error(CommandError::UnknownActuator).payload().as_str(),
            "ERROR: unknown actuator"
        );
        assert!(Feedback::NotEnabled.payload().starts_with("ERROR"));
        assert!(!Feedback::NotEnabled.is_ok());
    }

    #[test]
    fn command_names() {
        assert_eq!(Command::TurnOff.name(), "OFF");
        assert_eq!(Command::EmergencyStop.name(), "STOP");
    }
}
