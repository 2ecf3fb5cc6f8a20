//! LEDC-driven H-bridge outputs for the two motor channels.
//!
//! Each bridge uses two LEDC channels (one per direction leg) sharing a
//! single LEDC timer, plus a GPIO for the enable line. Duty writes go
//! through [`PwmBridge`], which only needs the `embedded-hal` traits that
//! `LedcDriver` and `PinDriver` already implement.
//!
//! | Leg | Left | Right | Stopped |
//! |-----|------|-------|---------|
//! | L PWM | duty | 0 | 0 |
//! | R PWM | 0 | duty | 0 |

use esp_idf_hal::gpio::{Output, OutputPin, PinDriver};
use esp_idf_hal::ledc::{
    config::TimerConfig, LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution,
};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_hal::sys::EspError;

use crate::config::MotionConfig;
use crate::hal::channel::PwmBridge;

/// H-bridge built from LEDC channels and an enable pin.
pub type Esp32Bridge<'d, EN> = PwmBridge<LedcDriver<'d>, LedcDriver<'d>, PinDriver<'d, EN, Output>>;

/// Map configured resolution bits to an LEDC resolution.
///
/// Unsupported widths fall back to 8 bits.
pub fn resolution(bits: u8) -> Resolution {
    match bits {
        9 => Resolution::Bits9,
        10 => Resolution::Bits10,
        11 => Resolution::Bits11,
        12 => Resolution::Bits12,
        13 => Resolution::Bits13,
        14 => Resolution::Bits14,
        _ => Resolution::Bits8,
    }
}

/// Configure an LEDC timer from the motion settings.
///
/// The returned driver must outlive every bridge built on it.
pub fn pwm_timer<'d, T, TI>(
    timer: T,
    motion: &MotionConfig,
) -> Result<LedcTimerDriver<'d, TI::SpeedMode>, EspError>
where
    TI: LedcTimer + 'd,
    T: Peripheral<P = TI> + 'd,
{
    let config = TimerConfig::default()
        .frequency(motion.pwm_frequency_hz.Hz())
        .resolution(resolution(motion.pwm_resolution_bits));
    LedcTimerDriver::new(timer, &config)
}

/// Build one bridge and leave it disabled with both legs off.
pub fn bridge<'d, S, LC, LCI, RC, RCI, LP, LPI, RP, RPI, EN>(
    timer: &LedcTimerDriver<'d, S>,
    left_channel: LC,
    left_pin: LP,
    right_channel: RC,
    right_pin: RP,
    enable_pin: impl Peripheral<P = EN> + 'd,
) -> Result<Esp32Bridge<'d, EN>, EspError>
where
    S: esp_idf_hal::ledc::SpeedMode,
    LCI: LedcChannel<SpeedMode = S> + 'd,
    LC: Peripheral<P = LCI> + 'd,
    RCI: LedcChannel<SpeedMode = S> + 'd,
    RC: Peripheral<P = RCI> + 'd,
    LPI: OutputPin + 'd,
    LP: Peripheral<P = LPI> + 'd,
    RPI: OutputPin + 'd,
    RP: Peripheral<P = RPI> + 'd,
    EN: OutputPin + 'd,
{
    let mut left = LedcDriver::new(left_channel, timer, left_pin)?;
    let mut right = LedcDriver::new(right_channel, timer, right_pin)?;
    left.set_duty(0)?;
    right.set_duty(0)?;

    let mut enable = PinDriver::output(enable_pin)?;
    enable.set_low()?;

    Ok(PwmBridge::new(left, right, enable))
}

