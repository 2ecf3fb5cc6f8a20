//! Per-actuator motion state machine.
//!
//! An [`Actuator`] separates *intent* (what the last command asked for) from
//! *realisation* (what the output is driven to right now). Commands only
//! change intent; [`Actuator::update`] moves the realised speed one step per
//! tick toward the target, either with the bounded slew or along a timed
//! [`Ramp`].
//!
//! # Invariants
//!
//! - Without a ramp, `current_speed` changes by at most `step` per update
//! - With a ramp, `current_speed` follows the ramp's linear interpolation
//! - Direction only changes while `current_speed == 0`; a direction change
//!   requested while moving decelerates to 0, flips, and re-accelerates to
//!   the saved speed
//!
//! # Example
//!
//! ```rust
//! use room_fx::{Actuator, Command, Direction};
//! use room_fx::hal::MockSink;
//!
//! let mut sink = MockSink::new();
//! let mut motor = Actuator::new("motor1", 0, 5);
//!
//! motor.apply(Command::TurnOn { speed: 20, direction: Direction::Right, ramp_ms: 0 }, 0, &mut sink);
//! for tick in 1..=4 {
//!     motor.update(tick * 20, &mut sink);
//! }
//!
//! assert_eq!(motor.current_speed(), 20);
//! assert_eq!(sink.last_output(0), Some((20, Direction::Right)));
//! ```

use log::{debug, info, warn};

use crate::commands::Command;
use crate::config::{short_string, ShortString};
use crate::error::Error;
use crate::ramp::Ramp;
use crate::traits::{ChannelId, Direction, OutputSink};

/// What an actuator did with a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Intent updated; the output follows on the next updates.
    Applied,
    /// Accepted, but waits for a deceleration to 0 before the new direction applies.
    Deferred,
    /// Dropped because the actuator is disabled.
    Ignored,
}

/// Observable motion phase, derived from the actuator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// At rest with the given direction latched (`Stopped` once disabled).
    Stopped(Direction),
    /// Moving (or slewing) with the realised speed.
    Running(Direction, u8),
    /// Decelerating toward 0 before switching to `pending`.
    Reversing {
        /// Direction that applies once speed reaches 0.
        pending: Direction,
        /// Speed restored after the flip.
        saved_speed: u8,
    },
    /// Following a timed ramp.
    Ramping {
        /// Ramp end speed.
        target: u8,
        /// Speed when the ramp started.
        start_speed: u8,
        /// Ramp start timestamp.
        start_ms: u64,
        /// Ramp length.
        duration_ms: u32,
    },
}

/// Levels last written to the output sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Output {
    /// Enable line.
    pub enabled: bool,
    /// Duty cycle in percent.
    pub duty: u8,
    /// Driven leg.
    pub direction: Direction,
}

/// One named actuator bound to an output channel.
#[derive(Clone, Debug)]
pub struct Actuator {
    name: ShortString,
    channel: ChannelId,
    step: u8,
    enabled: bool,
    direction: Direction,
    current_speed: u8,
    target_speed: u8,
    pending_direction: Option<Direction>,
    saved_speed: u8,
    ramp: Option<Ramp>,
    rendered: Option<Output>,
}

impl Actuator {
    /// Create a disabled, stopped actuator.
    ///
    /// `step` is the slew limit per update (at least 1).
    pub fn new(name: &str, channel: ChannelId, step: u8) -> Self {
        Self {
            name: short_string(name),
            channel,
            step: step.max(1),
            enabled: false,
            direction: Direction::Stopped,
            current_speed: 0,
            target_speed: 0,
            pending_direction: None,
            saved_speed: 0,
            ramp: None,
            rendered: None,
        }
    }

    /// Apply a command to the actuator's intent and re-render the output.
    pub fn apply<S: OutputSink>(&mut self, cmd: Command, now_ms: u64, sink: &mut S) -> Outcome {
        let outcome = match cmd {
            Command::TurnOn {
                speed,
                direction,
                ramp_ms,
            } => self.turn_on(speed.min(100), direction, ramp_ms, now_ms),
            Command::TurnOff => self.turn_off(),
            Command::SetSpeed(speed) => self.set_speed(speed.min(100)),
            Command::SetDirection(direction) => self.set_direction(direction),
            Command::EmergencyStop => {
                self.force_off(sink);
                return Outcome::Applied;
            }
        };

        match outcome {
            Outcome::Ignored => debug!("{}: {} ignored, not enabled", self.name, cmd.name()),
            _ => info!(
                "{}: {} -> target {}% {}",
                self.name,
                cmd.name(),
                self.target_speed,
                self.pending_direction.unwrap_or(self.direction).code()
            ),
        }
        self.render(sink, false);
        outcome
    }

    fn turn_on(&mut self, speed: u8, direction: Direction, ramp_ms: u32, now_ms: u64) -> Outcome {
        self.enabled = true;

        if self.current_speed > 0 && direction != self.direction {
            // Ramp is dropped; the flip always uses the standard slew.
            self.pending_direction = Some(direction);
            self.saved_speed = speed;
            self.target_speed = 0;
            self.ramp = None;
            return Outcome::Deferred;
        }

        self.pending_direction = None;
        self.direction = direction;
        self.target_speed = speed;
        self.ramp = (ramp_ms > 0).then(|| Ramp::new(now_ms, ramp_ms, self.current_speed, speed));
        Outcome::Applied
    }

    fn turn_off(&mut self) -> Outcome {
        self.enabled = false;
        self.target_speed = 0;
        self.ramp = None;
        self.pending_direction = None;
        if self.current_speed == 0 {
            self.direction = Direction::Stopped;
        }
        Outcome::Applied
    }

    fn set_speed(&mut self, speed: u8) -> Outcome {
        if !self.enabled {
            return Outcome::Ignored;
        }
        if self.pending_direction.is_some() {
            self.saved_speed = speed;
            return Outcome::Deferred;
        }
        self.target_speed = speed;
        self.ramp = None;
        Outcome::Applied
    }

    fn set_direction(&mut self, direction: Direction) -> Outcome {
        if !self.enabled {
            return Outcome::Ignored;
        }

        if self.pending_direction.is_some() {
            if direction == self.direction {
                self.pending_direction = None;
                self.target_speed = self.saved_speed;
                return Outcome::Applied;
            }
            self.pending_direction = Some(direction);
            return Outcome::Deferred;
        }

        if self.current_speed == 0 {
            self.direction = direction;
            return Outcome::Applied;
        }
        if direction == self.direction {
            return Outcome::Applied;
        }

        self.saved_speed = self.ramp.map_or(self.target_speed, |r| r.target);
        self.pending_direction = Some(direction);
        self.target_speed = 0;
        self.ramp = None;
        Outcome::Deferred
    }

    /// Advance one tick: ramp or slew toward the target, then complete a
    /// pending reversal once speed is 0.
    pub fn update<S: OutputSink>(&mut self, now_ms: u64, sink: &mut S) {
        if let Some(ramp) = self.ramp {
            let (speed, done) = ramp.value_at(now_ms);
            self.current_speed = speed;
            if done {
                self.ramp = None;
            }
        } else if self.current_speed < self.target_speed {
            self.current_speed = self
                .current_speed
                .saturating_add(self.step)
                .min(self.target_speed);
        } else if self.current_speed > self.target_speed {
            self.current_speed = self
                .current_speed
                .saturating_sub(self.step)
                .max(self.target_speed);
        }

        if self.current_speed == 0 {
            if let Some(direction) = self.pending_direction.take() {
                info!("{}: direction now {}", self.name, direction.code());
                self.direction = direction;
                self.target_speed = self.saved_speed;
            } else if !self.enabled {
                self.direction = Direction::Stopped;
            }
        }

        self.render(sink, false);
    }

    /// Immediate hard stop: speed 0, disabled, direction `Stopped`.
    ///
    /// Always writes the output, even if the last render already matched.
    pub fn force_off<S: OutputSink>(&mut self, sink: &mut S) {
        self.enabled = false;
        self.current_speed = 0;
        self.target_speed = 0;
        self.saved_speed = 0;
        self.pending_direction = None;
        self.ramp = None;
        self.direction = Direction::Stopped;
        self.render(sink, true);
    }

    /// Levels the output should be at right now.
    pub fn output(&self) -> Output {
        Output {
            enabled: self.enabled || self.current_speed > 0,
            duty: self.current_speed,
            direction: self.direction,
        }
    }

    fn render<S: OutputSink>(&mut self, sink: &mut S, force: bool) {
        let out = self.output();
        if !force && self.rendered == Some(out) {
            return;
        }
        if let Err(e) = self.write(sink, out) {
            warn!("{}: {}", self.name, e);
        }
        // State is kept even if the write failed; the next change retries.
        self.rendered = Some(out);
    }

    fn write<S: OutputSink>(&self, sink: &mut S, out: Output) -> Result<(), Error> {
        let fault = |_| Error::Hardware {
            channel: self.channel,
        };
        if out.enabled {
            sink.enable_channel(self.channel, true).map_err(fault)?;
            sink.set_output(self.channel, out.duty, out.direction)
                .map_err(fault)
        } else {
            sink.set_output(self.channel, out.duty, out.direction)
                .map_err(fault)?;
            sink.enable_channel(self.channel, false).map_err(fault)
        }
    }

    /// Current motion phase.
    pub fn phase(&self) -> Phase {
        if let Some(pending) = self.pending_direction {
            Phase::Reversing {
                pending,
                saved_speed: self.saved_speed,
            }
        } else if let Some(r) = self.ramp {
            Phase::Ramping {
                target: r.target,
                start_speed: r.start_speed,
                start_ms: r.start_ms,
                duration_ms: r.duration_ms,
            }
        } else if self.current_speed == 0 && self.target_speed == 0 {
            Phase::Stopped(self.direction)
        } else {
            Phase::Running(self.direction, self.current_speed)
        }
    }

    /// Actuator name (topic suffix).
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Output channel this actuator drives.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Whether the last command left the actuator enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current (latched) direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Realised speed.
    pub fn current_speed(&self) -> u8 {
        self.current_speed
    }

    /// Speed the actuator is heading for.
    pub fn target_speed(&self) -> u8 {
        self.target_speed
    }

    /// Direction waiting for the deceleration to finish, if any.
    pub fn pending_direction(&self) -> Option<Direction> {
        self.pending_direction
    }

    /// True when nothing is moving and nothing is about to.
    pub fn is_idle(&self) -> bool {
        self.current_speed == 0 && self.target_speed == 0 && self.pending_direction.is_none()
    }
}
