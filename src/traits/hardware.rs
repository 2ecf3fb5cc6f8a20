//! Hardware abstraction traits for actuator outputs, time, and supervision.
//!
//! This module defines the hardware interfaces that let room-fx drive the
//! same control core on different boards (ESP32, desktop mocks, etc.).
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`OutputSink`] | Render duty/direction and the enable line of a channel |
//! | [`Clock`] | Monotonic millisecond time source |
//! | [`Watchdog`] | Hardware watchdog that must be fed every loop pass |
//! | [`SystemControl`] | Full device restart |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. Concrete output drivers built on
//! `embedded-hal` live in [`crate::hal::channel`].
//!
//! # Example
//!
//! ```rust
//! use room_fx::traits::{Direction, OutputSink};
//! use room_fx::hal::MockSink;
//!
//! let mut sink = MockSink::new();
//! sink.enable_channel(0, true).unwrap();
//! sink.set_output(0, 40, Direction::Right).unwrap();
//!
//! assert!(sink.is_enabled(0));
//! assert_eq!(sink.last_output(0), Some((40, Direction::Right)));
//! ```

/// Identifier of a physical output channel (motor bridge, relay, expander bit).
pub type ChannelId = u8;

/// Direction of actuator travel.
///
/// For H-bridge motors this selects which PWM leg is driven. Relay-style
/// outputs ignore it.
///
/// # Default
///
/// Defaults to [`Stopped`](Self::Stopped) for safety.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Left leg driven.
    Left,
    /// Right leg driven.
    Right,
    /// Neither leg driven.
    #[default]
    Stopped,
}

impl Direction {
    /// Returns the single-letter wire code (`L`, `R` or `S`).
    ///
    /// # Examples
    ///
    /// ```
    /// use room_fx::Direction;
    ///
    /// assert_eq!(Direction::Left.code(), "L");
    /// assert_eq!(Direction::Right.code(), "R");
    /// assert_eq!(Direction::Stopped.code(), "S");
    /// ```
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Direction::Left => "L",
            Direction::Right => "R",
            Direction::Stopped => "S",
        }
    }

    /// Parse a direction from its command-payload letter.
    ///
    /// Only `L` and `R` are valid in commands; input is trimmed and
    /// case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use room_fx::Direction;
    ///
    /// assert_eq!(Direction::from_code("L"), Some(Direction::Left));
    /// assert_eq!(Direction::from_code(" r "), Some(Direction::Right));
    /// assert_eq!(Direction::from_code("S"), None);
    /// assert_eq!(Direction::from_code("left"), None);
    /// ```
    pub fn from_code(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("L") {
            Some(Direction::Left)
        } else if s.eq_ignore_ascii_case("R") {
            Some(Direction::Right)
        } else {
            None
        }
    }

    /// Returns true for `Left` and `Right`.
    #[inline]
    pub const fn is_moving(&self) -> bool {
        !matches!(self, Direction::Stopped)
    }
}

/// Output sink - abstracts PWM, GPIO and I2C-expander outputs.
///
/// Implement this trait for your output hardware. The control core only
/// ever talks to channels through these two calls, so the same state
/// machine drives an H-bridge, a relay pin or one bit of a port expander.
///
/// # Implementation Notes
///
/// - `duty` is a percentage (0-100); values above 100 should be clamped
/// - A duty of 0 or [`Direction::Stopped`] must leave both legs idle
/// - Errors are logged by the caller and otherwise ignored, so a failing
///   write must not leave the output in an unsafe state
///
/// # Example Implementation
///
/// ```rust,ignore
/// use room_fx::traits::{ChannelId, Direction, OutputSink};
///
/// struct Relays { /* gpio handles */ }
///
/// impl OutputSink for Relays {
///     type Error = ();
///
///     fn set_output(&mut self, ch: ChannelId, duty: u8, dir: Direction) -> Result<(), ()> {
///         // Drive relay `ch` on when duty > 0...
///         Ok(())
///     }
///
///     fn enable_channel(&mut self, ch: ChannelId, enabled: bool) -> Result<(), ()> {
///         Ok(())
///     }
/// }
/// ```
pub trait OutputSink {
    /// Error type for output writes.
    type Error: core::fmt::Debug;

    /// Render a duty cycle (0-100 %) in the given direction on a channel.
    fn set_output(
        &mut self,
        channel: ChannelId,
        duty: u8,
        direction: Direction,
    ) -> Result<(), Self::Error>;

    /// Drive the enable line of a channel.
    fn enable_channel(&mut self, channel: ChannelId, enabled: bool) -> Result<(), Self::Error>;

    /// Convenience method to cut a channel completely.
    ///
    /// Drops the enable line and zeroes both legs.
    fn cut(&mut self, channel: ChannelId) -> Result<(), Self::Error> {
        self.enable_channel(channel, false)?;
        self.set_output(channel, 0, Direction::Stopped)
    }
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for every timer comparison in
/// the crate. On desktop, this can wrap `std::time::Instant`. On embedded,
/// use a hardware timer.
///
/// # Example
///
/// ```rust
/// use room_fx::traits::Clock;
/// use room_fx::hal::MockClock;
///
/// let clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

/// Hardware watchdog.
///
/// The run loop feeds it once per pass. If a pass blocks for longer than
/// the configured timeout the hardware resets the device.
pub trait Watchdog {
    /// Acknowledge the watchdog.
    fn feed(&mut self);
}

/// Device-level control used for the fatal recovery path.
pub trait SystemControl {
    /// Restart the device.
    ///
    /// On hardware this does not return. Test doubles record the call.
    fn restart(&mut self);
}
