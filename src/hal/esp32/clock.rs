//! Monotonic millisecond clock from the ESP-IDF high-resolution timer.

use crate::traits::Clock;

/// Milliseconds since boot, read from `esp_timer_get_time()`.
///
/// The timer is 64-bit and never wraps in practice, so it is safe to use
/// for the backoff and inactivity deadlines.
///
/// # Example
///
/// ```ignore
/// use room_fx::hal::esp32::Esp32Clock;
/// use room_fx::traits::Clock;
///
/// let clock = Esp32Clock::new();
/// runtime.run_once(clock.now_ms())?;
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Create a clock handle.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        // Plain read of the system timer.
        let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
        micros.max(0) as u64 / 1000
    }
}
