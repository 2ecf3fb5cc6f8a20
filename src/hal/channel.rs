//! Output channel drivers built on `embedded-hal` 1.0.
//!
//! Each physical output is a [`Channel`]; a [`ChannelBank`] routes
//! [`ChannelId`]s to channels and implements [`OutputSink`] for the
//! controller. [`ChannelBank::from_profile`] picks each actuator's driver
//! from a [`DriverPool`] by the kind in its device profile entry:
//!
//! | Driver | Profile kind | Hardware |
//! |--------|--------------|----------|
//! | [`PwmBridge`] | `PwmChannel` | Two PWM legs + enable pin (L298N, BTS7960) |
//! | [`GpioChannel`] | `DirectGpio` | Relay, solenoid, smoke machine trigger |
//! | [`ExpanderBit`] | `I2cExpanderBit` | One bit of a PCF8574-style port expander |
//!
//! # Example
//!
//! ```rust,ignore
//! use room_fx::hal::channel::{ChannelBank, DriverPool, PwmBridge};
//!
//! let pool = DriverPool::new()
//!     .with_bridge(PwmBridge::new(left_pwm, right_pwm, enable_pin))
//!     .with_bridge(PwmBridge::new(left2, right2, enable2));
//! let bank = ChannelBank::from_profile(&config.device, pool)?;
//!
//! let controller = RoomController::new(&config, bank, clock.now_ms());
//! ```

extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use embedded_hal::pwm::SetDutyCycle;

use log::warn;

use crate::config::{ChannelKind, DeviceProfile};
use crate::traits::{ChannelId, Direction, OutputSink};

/// Failure of a channel write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// No channel registered under this id.
    UnknownChannel(ChannelId),
    /// GPIO write failed.
    Pin,
    /// PWM duty update failed.
    Pwm,
    /// I2C transfer failed.
    Bus,
    /// Shared expander port was already borrowed.
    Busy,
    /// The profile names a channel kind with no driver left to back it.
    NoDriver {
        /// Channel the profile entry asked for.
        channel: ChannelId,
        /// Wiring the profile entry asked for.
        kind: ChannelKind,
    },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::UnknownChannel(ch) => write!(f, "no channel {}", ch),
            ChannelError::Pin => write!(f, "GPIO write failed"),
            ChannelError::Pwm => write!(f, "PWM update failed"),
            ChannelError::Bus => write!(f, "I2C write failed"),
            ChannelError::Busy => write!(f, "expander port busy"),
            ChannelError::NoDriver { channel, kind } => {
                write!(f, "no {:?} driver for channel {}", kind, channel)
            }
        }
    }
}

/// One physical output.
pub trait Channel {
    /// Drive duty (percent) in a direction. Single-ended outputs treat any
    /// non-zero duty as on.
    fn set_output(&mut self, duty: u8, direction: Direction) -> Result<(), ChannelError>;

    /// Drive the enable line.
    fn set_enabled(&mut self, enabled: bool) -> Result<(), ChannelError>;
}

// ============================================================================
// PWM H-Bridge
// ============================================================================

/// H-bridge with a PWM leg per direction and an enable pin.
///
/// - Left: left leg = duty, right leg off
/// - Right: left leg off, right leg = duty
/// - Stopped or duty 0: both legs off
pub struct PwmBridge<L, R, E> {
    left: L,
    right: R,
    enable: E,
}

impl<L, R, E> PwmBridge<L, R, E>
where
    L: SetDutyCycle,
    R: SetDutyCycle,
    E: OutputPin,
{
    /// Wrap two PWM legs and an enable pin.
    pub fn new(left: L, right: R, enable: E) -> Self {
        Self {
            left,
            right,
            enable,
        }
    }

    /// Give the pins back.
    pub fn release(self) -> (L, R, E) {
        (self.left, self.right, self.enable)
    }
}

impl<L, R, E> Channel for PwmBridge<L, R, E>
where
    L: SetDutyCycle,
    R: SetDutyCycle,
    E: OutputPin,
{
    fn set_output(&mut self, duty: u8, direction: Direction) -> Result<(), ChannelError> {
        let duty = duty.min(100);
        // Drop the inactive leg first so both are never driven together.
        match direction {
            Direction::Left if duty > 0 => {
                self.right
                    .set_duty_cycle_fully_off()
                    .map_err(|_| ChannelError::Pwm)?;
                self.left
                    .set_duty_cycle_percent(duty)
                    .map_err(|_| ChannelError::Pwm)
            }
            Direction::Right if duty > 0 => {
                self.left
                    .set_duty_cycle_fully_off()
                    .map_err(|_| ChannelError::Pwm)?;
                self.right
                    .set_duty_cycle_percent(duty)
                    .map_err(|_| ChannelError::Pwm)
            }
            _ => {
                self.left
                    .set_duty_cycle_fully_off()
                    .map_err(|_| ChannelError::Pwm)?;
                self.right
                    .set_duty_cycle_fully_off()
                    .map_err(|_| ChannelError::Pwm)
            }
        }
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), ChannelError> {
        let res = if enabled {
            self.enable.set_high()
        } else {
            self.enable.set_low()
        };
        res.map_err(|_| ChannelError::Pin)
    }
}

// ============================================================================
// Single GPIO
// ============================================================================

/// On/off output on one GPIO.
///
/// The pin is on while the channel is enabled and the duty is non-zero.
pub struct GpioChannel<P> {
    pin: P,
    active_low: bool,
    enabled: bool,
    on: bool,
}

impl<P: OutputPin> GpioChannel<P> {
    /// Active-high output.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            active_low: false,
            enabled: false,
            on: false,
        }
    }

    /// Active-low output (most relay boards).
    pub fn active_low(pin: P) -> Self {
        Self {
            active_low: true,
            ..Self::new(pin)
        }
    }

    fn apply(&mut self) -> Result<(), ChannelError> {
        let level = (self.enabled && self.on) != self.active_low;
        let res = if level {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        res.map_err(|_| ChannelError::Pin)
    }
}

impl<P: OutputPin> Channel for GpioChannel<P> {
    fn set_output(&mut self, duty: u8, _direction: Direction) -> Result<(), ChannelError> {
        self.on = duty > 0;
        self.apply()
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), ChannelError> {
        self.enabled = enabled;
        self.apply()
    }
}

// ============================================================================
// I2C Port Expander
// ============================================================================

/// Eight-bit quasi-bidirectional port expander (PCF8574 family).
///
/// Keeps a shadow of the port and writes the whole byte on every change.
pub struct ExpanderPort<I> {
    i2c: I,
    address: u8,
    active_low: bool,
    state: u8,
}

impl<I: I2c> ExpanderPort<I> {
    /// Port at a 7-bit `address`, all outputs off.
    pub fn new(i2c: I, address: u8, active_low: bool) -> Self {
        Self {
            i2c,
            address,
            active_low,
            state: 0,
        }
    }

    /// Drive every bit to its off level.
    pub fn reset(&mut self) -> Result<(), ChannelError> {
        self.state = 0;
        self.flush()
    }

    /// Set one bit and push the port.
    pub fn write_bit(&mut self, bit: u8, on: bool) -> Result<(), ChannelError> {
        let mask = 1u8 << (bit & 7);
        if on {
            self.state |= mask;
        } else {
            self.state &= !mask;
        }
        self.flush()
    }

    /// Logical (active-high) port state.
    pub fn state(&self) -> u8 {
        self.state
    }

    fn flush(&mut self) -> Result<(), ChannelError> {
        let byte = if self.active_low {
            !self.state
        } else {
            self.state
        };
        self.i2c
            .write(self.address, &[byte])
            .map_err(|_| ChannelError::Bus)
    }
}

/// One bit of a shared [`ExpanderPort`].
pub struct ExpanderBit<'a, I> {
    port: &'a RefCell<ExpanderPort<I>>,
    bit: u8,
    enabled: bool,
    on: bool,
}

impl<'a, I: I2c> ExpanderBit<'a, I> {
    /// Bit `bit` (0-7) of `port`.
    pub fn new(port: &'a RefCell<ExpanderPort<I>>, bit: u8) -> Self {
        Self {
            port,
            bit: bit & 7,
            enabled: false,
            on: false,
        }
    }

    fn apply(&mut self) -> Result<(), ChannelError> {
        let mut port = self.port.try_borrow_mut().map_err(|_| ChannelError::Busy)?;
        port.write_bit(self.bit, self.enabled && self.on)
    }
}

impl<I: I2c> Channel for ExpanderBit<'_, I> {
    fn set_output(&mut self, duty: u8, _direction: Direction) -> Result<(), ChannelError> {
        self.on = duty > 0;
        self.apply()
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), ChannelError> {
        self.enabled = enabled;
        self.apply()
    }
}

// ============================================================================
// Driver Pool
// ============================================================================

/// Drivers available to a [`ChannelBank`], grouped by [`ChannelKind`].
///
/// Drivers of one kind are handed out in the order they were added.
#[derive(Default)]
pub struct DriverPool<'a> {
    bridges: Vec<Box<dyn Channel + 'a>>,
    pins: Vec<Box<dyn Channel + 'a>>,
    expander_bits: Vec<Box<dyn Channel + 'a>>,
}

impl<'a> DriverPool<'a> {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an H-bridge for a `PwmChannel` entry.
    pub fn with_bridge<L, R, E>(mut self, bridge: PwmBridge<L, R, E>) -> Self
    where
        L: SetDutyCycle + 'a,
        R: SetDutyCycle + 'a,
        E: OutputPin + 'a,
    {
        self.bridges.push(Box::new(bridge));
        self
    }

    /// Add a GPIO output for a `DirectGpio` entry.
    pub fn with_pin<P: OutputPin + 'a>(mut self, pin: GpioChannel<P>) -> Self {
        self.pins.push(Box::new(pin));
        self
    }

    /// Add an expander bit for an `I2cExpanderBit` entry.
    pub fn with_expander_bit<I: I2c + 'a>(mut self, bit: ExpanderBit<'a, I>) -> Self {
        self.expander_bits.push(Box::new(bit));
        self
    }

    /// Next unused driver of `kind`.
    pub fn take(&mut self, kind: ChannelKind) -> Option<Box<dyn Channel + 'a>> {
        let drivers = match kind {
            ChannelKind::PwmChannel => &mut self.bridges,
            ChannelKind::DirectGpio => &mut self.pins,
            ChannelKind::I2cExpanderBit => &mut self.expander_bits,
        };
        if drivers.is_empty() {
            None
        } else {
            Some(drivers.remove(0))
        }
    }

    /// Drivers not yet handed out.
    pub fn len(&self) -> usize {
        self.bridges.len() + self.pins.len() + self.expander_bits.len()
    }

    /// True when every driver has been handed out.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Channel Bank
// ============================================================================

/// Routes channel ids to drivers; the [`OutputSink`] handed to the controller.
#[derive(Default)]
pub struct ChannelBank<'a> {
    channels: Vec<(ChannelId, Box<dyn Channel + 'a>)>,
}

impl<'a> ChannelBank<'a> {
    /// Empty bank.
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Build a bank for `profile`, taking each entry's driver from `pool`
    /// by its [`ChannelKind`].
    ///
    /// Fails on the first entry whose kind has no driver left.
    pub fn from_profile(
        profile: &DeviceProfile,
        mut pool: DriverPool<'a>,
    ) -> Result<Self, ChannelError> {
        let mut bank = Self::new();
        for entry in profile.actuators.iter() {
            let driver = pool.take(entry.kind).ok_or(ChannelError::NoDriver {
                channel: entry.channel,
                kind: entry.kind,
            })?;
            bank.channels.retain(|(existing, _)| *existing != entry.channel);
            bank.channels.push((entry.channel, driver));
        }
        if !pool.is_empty() {
            warn!("{} output drivers not used by the device profile", pool.len());
        }
        Ok(bank)
    }

    /// Register a driver under `id`, replacing any previous one.
    pub fn with_channel(mut self, id: ChannelId, channel: impl Channel + 'a) -> Self {
        self.channels.retain(|(existing, _)| *existing != id);
        self.channels.push((id, Box::new(channel)));
        self
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn get(&mut self, id: ChannelId) -> Result<&mut (dyn Channel + 'a), ChannelError> {
        self.channels
            .iter_mut()
            .find(|(existing, _)| *existing == id)
            .map(|(_, ch)| ch.as_mut())
            .ok_or(ChannelError::UnknownChannel(id))
    }
}

impl OutputSink for ChannelBank<'_> {
    type Error = ChannelError;

    fn set_output(
        &mut self,
        channel: ChannelId,
        duty: u8,
        direction: Direction,
    ) -> Result<(), ChannelError> {
        self.get(channel)?.set_output(duty, direction)
    }

    fn enable_channel(&mut self, channel: ChannelId, enabled: bool) -> Result<(), ChannelError> {
        self.get(channel)?.set_enabled(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::rc::Rc;
    use std::cell::Cell;

    // =========================================================================
    // Test doubles for embedded-hal traits
    // =========================================================================

    #[derive(Clone, Default)]
    struct Pwm {
        duty: Rc<Cell<u16>>,
    }

    impl embedded_hal::pwm::ErrorType for Pwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for Pwm {
        fn max_duty_cycle(&self) -> u16 {
            255
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            self.duty.set(duty);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Pin {
        high: Rc<Cell<bool>>,
    }

    impl embedded_hal::digital::ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high.set(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Bus {
        writes: Vec<(u8, u8)>,
    }

    impl embedded_hal::i2c::ErrorType for Bus {
        type Error = Infallible;
    }

    impl I2c for Bus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [embedded_hal::i2c::Operation<'_>],
        ) -> Result<(), Infallible> {
            for op in operations.iter() {
                if let embedded_hal::i2c::Operation::Write(bytes) = op {
                    self.writes.push((address, bytes[0]));
                }
            }
            Ok(())
        }
    }

    // =========================================================================
    // PwmBridge
    // =========================================================================

    #[test]
    fn bridge_drives_one_leg_per_direction() {
        let (l, r, en) = (Pwm::default(), Pwm::default(), Pin::default());
        let mut bridge = PwmBridge::new(l.clone(), r.clone(), en.clone());

        bridge.set_enabled(true).unwrap();
        bridge.set_output(100, Direction::Left).unwrap();
        assert!(en.high.get());
        assert_eq!(l.duty.get(), 255);
        assert_eq!(r.duty.get(), 0);

        bridge.set_output(50, Direction::Right).unwrap();
        assert_eq!(l.duty.get(), 0);
        assert_eq!(r.duty.get(), 127);
    }

    #[test]
    fn bridge_stopped_or_zero_duty_turns_both_off() {
        let (l, r, en) = (Pwm::default(), Pwm::default(), Pin::default());
        let mut bridge = PwmBridge::new(l.clone(), r.clone(), en);

        bridge.set_output(80, Direction::Left).unwrap();
        bridge.set_output(80, Direction::Stopped).unwrap();
        assert_eq!((l.duty.get(), r.duty.get()), (0, 0));

        bridge.set_output(80, Direction::Right).unwrap();
        bridge.set_output(0, Direction::Right).unwrap();
        assert_eq!((l.duty.get(), r.duty.get()), (0, 0));
    }

    // =========================================================================
    // GpioChannel
    // =========================================================================

    #[test]
    fn gpio_needs_enable_and_duty() {
        let pin = Pin::default();
        let mut ch = GpioChannel::new(pin.clone());
        ch.set_output(50, Direction::Left).unwrap();
        assert!(!pin.high.get());
        ch.set_enabled(true).unwrap();
        assert!(pin.high.get());
        ch.set_output(0, Direction::Stopped).unwrap();
        assert!(!pin.high.get());
    }

    #[test]
    fn gpio_active_low_inverts() {
        let pin = Pin::default();
        let mut ch = GpioChannel::active_low(pin.clone());
        ch.set_enabled(false).unwrap();
        assert!(pin.high.get());
        ch.set_enabled(true).unwrap();
        ch.set_output(100, Direction::Left).unwrap();
        assert!(!pin.high.get());
    }

    // =========================================================================
    // Expander
    // =========================================================================

    #[test]
    fn expander_bits_share_one_port() {
        let port = RefCell::new(ExpanderPort::new(Bus::default(), 0x20, false));
        let mut a = ExpanderBit::new(&port, 0);
        let mut b = ExpanderBit::new(&port, 3);

        a.set_enabled(true).unwrap();
        a.set_output(100, Direction::Left).unwrap();
        b.set_enabled(true).unwrap();
        b.set_output(100, Direction::Left).unwrap();
        assert_eq!(port.borrow().state(), 0b0000_1001);

        a.set_enabled(false).unwrap();
        assert_eq!(port.borrow().state(), 0b0000_1000);

        let port = port.into_inner();
        assert_eq!(port.i2c.writes.last(), Some(&(0x20, 0b0000_1000)));
    }

    #[test]
    fn expander_active_low_writes_inverted_byte() {
        let mut port = ExpanderPort::new(Bus::default(), 0x27, true);
        port.write_bit(1, true).unwrap();
        assert_eq!(port.i2c.writes.last(), Some(&(0x27, 0b1111_1101)));
        port.reset().unwrap();
        assert_eq!(port.i2c.writes.last(), Some(&(0x27, 0xff)));
    }

    // =========================================================================
    // ChannelBank
    // =========================================================================

    #[test]
    fn bank_routes_by_id() {
        let (p0, p1) = (Pin::default(), Pin::default());
        let mut bank = ChannelBank::new()
            .with_channel(0, GpioChannel::new(p0.clone()))
            .with_channel(5, GpioChannel::new(p1.clone()));

        bank.enable_channel(5, true).unwrap();
        bank.set_output(5, 10, Direction::Left).unwrap();
        assert!(p1.high.get());
        assert!(!p0.high.get());
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn bank_unknown_channel() {
        let mut bank = ChannelBank::new();
        assert_eq!(
            bank.set_output(9, 10, Direction::Left),
            Err(ChannelError::UnknownChannel(9))
        );
        assert!(bank.is_empty());
    }

    #[test]
    fn bank_from_mixed_profile_picks_driver_by_kind() {
        use crate::config::ActuatorProfile;

        let (l, r, en) = (Pwm::default(), Pwm::default(), Pin::default());
        let relay = Pin::default();
        let port = RefCell::new(ExpanderPort::new(Bus::default(), 0x20, false));
        let profile = DeviceProfile::empty()
            .with_actuator(ActuatorProfile::new("fog", 4, ChannelKind::I2cExpanderBit))
            .with_actuator(ActuatorProfile::new("motor1", 0, ChannelKind::PwmChannel))
            .with_actuator(ActuatorProfile::new("strobe", 2, ChannelKind::DirectGpio));
        let pool = DriverPool::new()
            .with_pin(GpioChannel::new(relay.clone()))
            .with_expander_bit(ExpanderBit::new(&port, 6))
            .with_bridge(PwmBridge::new(l.clone(), r.clone(), en.clone()));

        let mut bank = ChannelBank::from_profile(&profile, pool).unwrap();
        assert_eq!(bank.len(), 3);

        bank.enable_channel(0, true).unwrap();
        bank.set_output(0, 100, Direction::Left).unwrap();
        assert!(en.high.get());
        assert_eq!(l.duty.get(), 255);

        bank.enable_channel(2, true).unwrap();
        bank.set_output(2, 100, Direction::Left).unwrap();
        assert!(relay.high.get());

        bank.enable_channel(4, true).unwrap();
        bank.set_output(4, 100, Direction::Left).unwrap();
        assert_eq!(port.borrow().state(), 0b0100_0000);
    }

    #[test]
    fn bank_from_profile_fails_without_matching_driver() {
        use crate::config::ActuatorProfile;

        let profile = DeviceProfile::empty()
            .with_actuator(ActuatorProfile::new("motor1", 0, ChannelKind::PwmChannel))
            .with_actuator(ActuatorProfile::new("relay", 3, ChannelKind::DirectGpio));
        // A bridge is available but the relay entry needs a GPIO.
        let pool = DriverPool::new()
            .with_bridge(PwmBridge::new(Pwm::default(), Pwm::default(), Pin::default()))
            .with_bridge(PwmBridge::new(Pwm::default(), Pwm::default(), Pin::default()));

        let err = ChannelBank::from_profile(&profile, pool).err();
        assert_eq!(
            err,
            Some(ChannelError::NoDriver {
                channel: 3,
                kind: ChannelKind::DirectGpio
            })
        );
    }

    #[test]
    fn bank_drives_controller() {
        use crate::{Config, RoomController};

        let (l, r, en) = (Pwm::default(), Pwm::default(), Pin::default());
        let (l2, r2, en2) = (Pwm::default(), Pwm::default(), Pin::default());
        let config = Config::default();
        let pool = DriverPool::new()
            .with_bridge(PwmBridge::new(l.clone(), r.clone(), en.clone()))
            .with_bridge(PwmBridge::new(l2, r2, en2));
        let bank = ChannelBank::from_profile(&config.device, pool).unwrap();
        let mut controller = RoomController::new(&config, bank, 0);

        controller.handle_message("room1/motor1", b"ON:100:R", 0);
        for t in 1..=20 {
            controller.update(t * 20, true);
        }
        assert!(en.high.get());
        assert_eq!(r.duty.get(), 255);
        assert_eq!(l.duty.get(), 0);
    }
}
