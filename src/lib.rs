//! # room-fx
//!
//! Firmware core for MQTT-driven museum room-effect controllers: motors,
//! relays and other actuators that a show controller drives over a broker.
//!
//! ## Features
//!
//! - **Connectivity supervision**: WiFi and broker links with exponential
//!   backoff, a retained `online`/`offline` status and a bounded restart path
//! - **Text command protocol**: `ON:80:L`, `OFF`, `SPEED:40`, `DIR:R`, plus a
//!   room-wide `STOP`, each answered on a `/feedback` topic
//! - **Slewed outputs**: speed moves at most one step per tick, reversals
//!   decelerate to zero first, optional timed ramps
//! - **Safe state**: link loss, inactivity, fatal errors and `STOP` all force
//!   every output off; a task watchdog is fed every loop pass
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and network abstractions
//! - `commands` - Payload grammar and feedback
//! - `dispatch` - Topic routing
//! - `actuator` - Per-actuator ramp/slew/reversal state machine
//! - `safety` - Inactivity timeout and trip bookkeeping
//! - `supervisor` - WiFi/broker connection management
//! - `controller` - Ties dispatch, actuators and safety together
//! - `runtime` - The cooperative loop that owns everything
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use room_fx::{Config, Direction, RoomController};
//! use room_fx::hal::MockSink;
//!
//! let mut controller = RoomController::new(&Config::default(), MockSink::new(), 0);
//!
//! // Command arrives from the broker
//! let reply = controller.handle_message("room1/motor1", b"ON:20:R", 0).unwrap();
//! assert_eq!(reply.topic.as_str(), "room1/motor1/feedback");
//! assert_eq!(reply.payload().as_str(), "OK");
//!
//! // Update in your main loop (20ms tick, step 5)
//! for tick in 1..=4 {
//!     controller.update(tick * 20, true);
//! }
//! let motor = controller.actuator("motor1").unwrap();
//! assert_eq!(motor.current_speed(), 20);
//! assert_eq!(motor.direction(), Direction::Right);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Per-actuator speed, direction and reversal state machine.
pub mod actuator;
/// Exponential reconnect backoff.
pub mod backoff;
/// Command payload grammar, parse errors and feedback payloads.
pub mod commands;
/// Configuration for the network, motion, safety and device profile.
pub mod config;
/// Device core: dispatch, actuators and safety behind one API.
pub mod controller;
/// Topic routing for inbound messages.
pub mod dispatch;
/// Error taxonomy.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Timed linear ramps.
pub mod ramp;
/// Cooperative run loop.
pub mod runtime;
/// Inactivity timeout and safe-state bookkeeping.
pub mod safety;
/// WiFi and broker connection supervision.
pub mod supervisor;
/// Core traits for hardware and network abstraction.
pub mod traits;

// Re-exports for convenience
pub use actuator::{Actuator, Outcome, Phase};
pub use backoff::Backoff;
pub use commands::{Command, CommandError, Feedback};
pub use controller::{Reply, RoomController};
pub use dispatch::{Dispatch, Dispatcher, Target};
pub use error::{Error, ErrorKind, NetError};
pub use ramp::Ramp;
pub use runtime::Runtime;
pub use safety::{SafetyMonitor, Trip};
pub use supervisor::{ConnectivitySupervisor, LinkReport, LinkState};
pub use traits::{
    // Hardware
    ChannelId,
    Clock,
    Direction,
    // Network
    LastWill,
    MqttMessage,
    MqttTransport,
    OutputSink,
    SystemControl,
    Watchdog,
    WifiLink,
};

// Config re-exports
pub use config::{
    ActuatorProfile, ChannelKind, Config, ConnectionConfig, DeviceProfile, MotionConfig,
    MqttConfig, SafetyConfig, WifiConfig,
};
