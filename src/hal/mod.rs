//! Hardware Abstraction Layer implementations.
//!
//! Concrete implementations of the traits in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Test doubles for desktop development
//! - `channel`: Output drivers over `embedded-hal` 1.0 (PWM bridge, GPIO, I2C expander)
//! - `rumqtt`: Desktop MQTT transport (requires `mqtt` feature)
//! - `esp32`: ESP32 WiFi, MQTT, LEDC bridges and task watchdog (requires `esp32` feature)

pub mod channel;
pub mod mock;

#[cfg(feature = "mqtt")]
pub mod rumqtt;

#[cfg(feature = "esp32")]
pub mod esp32;

pub use mock::*;
