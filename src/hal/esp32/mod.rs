//! ESP32 platform layer for the room-effect controller.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32 DevKit (dual core, WiFi)
//! - **Drivers**: two L298N-style H-bridges (`motor1`, `motor2`)
//! - **PWM**: LEDC, one timer shared by all four legs
//!
//! # Pin Assignments
//!
//! | Actuator | Channel | Left PWM | Right PWM | Enable |
//! |----------|---------|----------|-----------|--------|
//! | `motor1` | 0 | GPIO27 | GPIO26 | GPIO25 |
//! | `motor2` | 1 | GPIO33 | GPIO32 | GPIO14 |

mod bridge;
mod clock;
mod mqtt;
mod system;
mod wifi;

pub use bridge::{bridge, pwm_timer, resolution, Esp32Bridge};
pub use clock::Esp32Clock;
pub use mqtt::{Esp32Mqtt, Esp32MqttError};
pub use system::{Esp32System, Esp32Watchdog};
pub use wifi::{Esp32Wifi, Esp32WifiError};
