//! Timed linear speed ramp.
//!
//! A [`Ramp`] interpolates from the speed an actuator had when the ramp
//! started to a target over a fixed duration, in integer arithmetic:
//!
//! ```text
//! speed(t) = start + (target - start) * elapsed / duration
//! ```
//!
//! Once `elapsed >= duration` the ramp reports the exact target and is
//! complete.
//!
//! # Example
//!
//! ```rust
//! use room_fx::ramp::Ramp;
//!
//! let ramp = Ramp::new(1_000, 2_000, 0, 80);
//!
//! assert_eq!(ramp.value_at(1_000), (0, false));
//! assert_eq!(ramp.value_at(2_000), (40, false));
//! assert_eq!(ramp.value_at(3_000), (80, true));
//! assert_eq!(ramp.value_at(9_000), (80, true));
//! ```

/// An in-progress timed ramp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ramp {
    /// Timestamp the ramp started at.
    pub start_ms: u64,
    /// Total ramp time.
    pub duration_ms: u32,
    /// Speed at `start_ms`.
    pub start_speed: u8,
    /// Speed reached at `start_ms + duration_ms`.
    pub target: u8,
}

impl Ramp {
    /// Start a ramp at `start_ms` from `start_speed` to `target`.
    pub fn new(start_ms: u64, duration_ms: u32, start_speed: u8, target: u8) -> Self {
        Self {
            start_ms,
            duration_ms,
            start_speed: start_speed.min(100),
            target: target.min(100),
        }
    }

    /// Interpolated speed at `now_ms` and whether the ramp has finished.
    pub fn value_at(&self, now_ms: u64) -> (u8, bool) {
        let elapsed = now_ms.saturating_sub(self.start_ms);
        let duration = u64::from(self.duration_ms);
        if elapsed >= duration {
            return (self.target, true);
        }

        let start = i64::from(self.start_speed);
        let delta = i64::from(self.target) - start;
        // elapsed < duration, so the quotient magnitude stays below |delta|
        let value = start + delta * elapsed as i64 / duration as i64;
        (value.clamp(0, 100) as u8, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_up_is_linear() {
        let ramp = Ramp::new(0, 1_000, 0, 100);
        assert_eq!(ramp.value_at(0), (0, false));
        assert_eq!(ramp.value_at(250), (25, false));
        assert_eq!(ramp.value_at(500), (50, false));
        assert_eq!(ramp.value_at(999), (99, false));
        assert_eq!(ramp.value_at(1_000), (100, true));
    }

    #[test]
    fn ramp_down_is_linear() {
        let ramp = Ramp::new(100, 400, 80, 20);
        assert_eq!(ramp.value_at(100), (80, false));
        assert_eq!(ramp.value_at(300), (50, false));
        assert_eq!(ramp.value_at(500), (20, true));
    }

    #[test]
    fn ramp_reaches_target_exactly_and_monotonically() {
        let ramp = Ramp::new(0, 1_333, 7, 93);
        let mut last = 0u8;
        let mut t = 0u64;
        loop {
            let (v, done) = ramp.value_at(t);
            assert!(v >= last, "went backwards at {} ms", t);
            last = v;
            if done {
                assert_eq!(v, 93);
                break;
            }
            t += 20;
        }
    }

    #[test]
    fn zero_duration_completes_immediately() {
        let ramp = Ramp::new(50, 0, 10, 60);
        assert_eq!(ramp.value_at(50), (60, true));
    }

    #[test]
    fn time_before_start_reads_start_speed() {
        let ramp = Ramp::new(1_000, 500, 30, 90);
        assert_eq!(ramp.value_at(0), (30, false));
    }

    #[test]
    fn inputs_above_100_are_clamped() {
        let ramp = Ramp::new(0, 100, 200, 250);
        assert_eq!(ramp.start_speed, 100);
        assert_eq!(ramp.value_at(100), (100, true));
    }
}
