//! Trait definitions for hardware abstraction and networking.
//!
//! This module defines the core abstractions that allow room-fx to:
//! - Drive different output hardware (H-bridge PWM, relay GPIO, I2C expander)
//! - Run against different network stacks (esp-idf, rumqttc, mocks)
//!
//! # Submodules
//!
//! - `hardware`: Output sink, clock, watchdog, system restart
//! - `network`: WiFi link and MQTT transport

pub mod hardware;
pub mod network;

pub use hardware::*;
pub use network::*;
