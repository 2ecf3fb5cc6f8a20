//! Shared configuration for desktop and ESP32 builds.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`. Defaults carry the constants the
//! room devices ship with (`room1/` prefix, 5 s retry doubling to 60 s,
//! 20 ms slew tick, 10 minute inactivity stop).
//!
//! # Example
//!
//! ```rust
//! use room_fx::config::{Config, MqttConfig, SafetyConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.mqtt.base_prefix.as_str(), "room1/");
//!
//! // Or customize
//! let config = Config::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100").with_base_prefix("room2/"))
//!     .with_safety(SafetyConfig::default().with_inactivity_timeout_ms(0));
//! assert_eq!(config.mqtt.base_prefix.as_str(), "room2/");
//! ```

use heapless::String as HString;
use heapless::Vec as HVec;

use crate::traits::ChannelId;

/// Maximum length for short config strings (hostnames, client IDs)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (topics)
pub const MAX_LONG_STRING: usize = 128;

/// Longest SSID an 802.11 network can advertise, in bytes.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum number of actuators a single device profile can carry.
pub const MAX_ACTUATORS: usize = 8;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helpers for creating heapless strings
// ============================================================================

fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= N)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    truncated(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete device configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// WiFi connection configuration
    pub wifi: WifiConfig,
    /// MQTT client configuration
    pub mqtt: MqttConfig,
    /// Retry and backoff policy
    pub connection: ConnectionConfig,
    /// Actuator motion tuning
    pub motion: MotionConfig,
    /// Inactivity and watchdog settings
    pub safety: SafetyConfig,
    /// Actuators present on this device
    pub device: DeviceProfile,
}

impl Config {
    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set connection retry configuration
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Set motion configuration
    pub fn with_motion(mut self, motion: MotionConfig) -> Self {
        self.motion = motion;
        self
    }

    /// Set safety configuration
    pub fn with_safety(mut self, safety: SafetyConfig) -> Self {
        self.safety = safety;
        self
    }

    /// Set the device profile
    pub fn with_device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi connection configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WifiConfig {
    /// WiFi network SSID
    pub ssid: ShortString,
    /// WiFi password
    pub password: ShortString,
    /// Upper bound on a single association attempt in milliseconds
    pub connect_timeout_ms: u32,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: ShortString::new(),
            // 20 polls of 500 ms
            connect_timeout_ms: 10_000,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Set the association timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Check if WiFi credentials are configured
    ///
    /// An SSID longer than [`MAX_SSID_LEN`] bytes can never match a network
    /// and counts as not configured.
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty() && self.ssid.len() <= MAX_SSID_LEN
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Client ID, also used in the liveness topic
    pub client_id: ShortString,
    /// Prefix prepended to every command topic, including its trailing `/`
    pub base_prefix: ShortString,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Interval between retained `online` republishes in milliseconds
    pub status_interval_ms: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: short_string("localhost"),
            port: 1883,
            client_id: short_string("esp32_wifi_controller"),
            base_prefix: short_string("room1/"),
            username: ShortString::new(),
            password: ShortString::new(),
            keep_alive_secs: 15,
            status_interval_ms: 30_000,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set the command topic prefix (e.g. `"room1/"`)
    pub fn with_base_prefix(mut self, prefix: &str) -> Self {
        self.base_prefix = short_string(prefix);
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the keep-alive interval
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Set the status republish interval
    pub fn with_status_interval_ms(mut self, ms: u32) -> Self {
        self.status_interval_ms = ms;
        self
    }

    /// Liveness topic: `devices/<client_id>/status`
    pub fn status_topic(&self) -> LongString {
        let mut topic = LongString::new();
        let _ = topic.push_str("devices/");
        let _ = topic.push_str(self.client_id.as_str());
        let _ = topic.push_str("/status");
        topic
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }
}

// ============================================================================
// Connection Config
// ============================================================================

/// Reconnect policy shared by the WiFi and broker links
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionConfig {
    /// Initial retry interval in milliseconds
    pub retry_base_ms: u32,
    /// Upper bound for the doubled retry interval
    pub retry_cap_ms: u32,
    /// Consecutive WiFi failures before the device restarts
    pub max_wifi_attempts: u8,
    /// Consecutive broker failures before the device restarts
    pub max_mqtt_attempts: u8,
    /// Interval between link summary log lines
    pub check_interval_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_base_ms: 5_000,
            retry_cap_ms: 60_000,
            max_wifi_attempts: 5,
            max_mqtt_attempts: 5,
            check_interval_ms: 10_000,
        }
    }
}

impl ConnectionConfig {
    /// Set the base retry interval and its cap
    pub fn with_retry(mut self, base_ms: u32, cap_ms: u32) -> Self {
        self.retry_base_ms = base_ms;
        self.retry_cap_ms = cap_ms.max(base_ms);
        self
    }

    /// Set the attempt caps for WiFi and broker
    pub fn with_max_attempts(mut self, wifi: u8, mqtt: u8) -> Self {
        self.max_wifi_attempts = wifi;
        self.max_mqtt_attempts = mqtt;
        self
    }

    /// Set the link summary interval
    pub fn with_check_interval_ms(mut self, ms: u32) -> Self {
        self.check_interval_ms = ms;
        self
    }
}

// ============================================================================
// Motion Config
// ============================================================================

/// Actuator motion tuning
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionConfig {
    /// Maximum speed change per tick without a ramp (percentage points)
    pub step: u8,
    /// Loop tick in milliseconds
    pub tick_ms: u32,
    /// Speed used by a bare `ON`
    pub default_speed: u8,
    /// PWM carrier frequency for bridge outputs
    pub pwm_frequency_hz: u32,
    /// PWM resolution in bits
    pub pwm_resolution_bits: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step: 5,
            tick_ms: 20,
            default_speed: 50,
            pwm_frequency_hz: 20_000,
            pwm_resolution_bits: 8,
        }
    }
}

impl MotionConfig {
    /// Set the slew step, clamped to 1..=100
    pub fn with_step(mut self, step: u8) -> Self {
        self.step = step.clamp(1, 100);
        self
    }

    /// Set the loop tick
    pub fn with_tick_ms(mut self, ms: u32) -> Self {
        self.tick_ms = ms;
        self
    }

    /// Set the default `ON` speed, clamped to 100
    pub fn with_default_speed(mut self, speed: u8) -> Self {
        self.default_speed = speed.min(100);
        self
    }

    /// Set the PWM carrier frequency and resolution
    pub fn with_pwm(mut self, frequency_hz: u32, resolution_bits: u8) -> Self {
        self.pwm_frequency_hz = frequency_hz;
        self.pwm_resolution_bits = resolution_bits;
        self
    }
}

// ============================================================================
// Safety Config
// ============================================================================

/// Inactivity stop and watchdog settings
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SafetyConfig {
    /// Stop everything after this long without a command (0 disables)
    pub inactivity_timeout_ms: u32,
    /// Hardware watchdog timeout in seconds
    pub watchdog_timeout_secs: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: 600_000,
            watchdog_timeout_secs: 120,
        }
    }
}

impl SafetyConfig {
    /// Set the inactivity timeout
    pub fn with_inactivity_timeout_ms(mut self, ms: u32) -> Self {
        self.inactivity_timeout_ms = ms;
        self
    }

    /// Set the watchdog timeout
    pub fn with_watchdog_timeout_secs(mut self, secs: u32) -> Self {
        self.watchdog_timeout_secs = secs;
        self
    }
}

// ============================================================================
// Device Profile
// ============================================================================

/// How an actuator's channel is wired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChannelKind {
    /// Single on/off GPIO (relay, solenoid)
    DirectGpio,
    /// H-bridge with two PWM legs and an enable pin
    PwmChannel,
    /// One output bit of an I2C port expander
    I2cExpanderBit,
}

/// One named actuator on the device.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorProfile {
    /// Topic suffix and log name (e.g. `motor1`)
    pub name: ShortString,
    /// Output channel the actuator drives
    pub channel: ChannelId,
    /// Wiring of that channel
    pub kind: ChannelKind,
}

impl ActuatorProfile {
    /// Create a profile entry
    pub fn new(name: &str, channel: ChannelId, kind: ChannelKind) -> Self {
        Self {
            name: short_string(name),
            channel,
            kind,
        }
    }
}

/// Set of actuators one device drives.
///
/// The default is the dual-motor driver: `motor1` on channel 0 and
/// `motor2` on channel 1, both PWM bridges.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceProfile {
    /// Configured actuators, in subscription order
    pub actuators: HVec<ActuatorProfile, MAX_ACTUATORS>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::empty()
            .with_actuator(ActuatorProfile::new("motor1", 0, ChannelKind::PwmChannel))
            .with_actuator(ActuatorProfile::new("motor2", 1, ChannelKind::PwmChannel))
    }
}

impl DeviceProfile {
    /// A profile with no actuators
    pub fn empty() -> Self {
        Self {
            actuators: HVec::new(),
        }
    }

    /// Add an actuator; entries past [`MAX_ACTUATORS`] or with a name that
    /// is already taken are dropped.
    pub fn with_actuator(mut self, actuator: ActuatorProfile) -> Self {
        if self.find(actuator.name.as_str()).is_none() {
            let _ = self.actuators.push(actuator);
        }
        self
    }

    /// Look up an actuator index by name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.actuators.iter().position(|a| a.name.as_str() == name)
    }

    /// Number of configured actuators
    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    /// True when the profile has no actuators
    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.keep_alive_secs, 15);
        assert_eq!(config.connection.retry_base_ms, 5_000);
        assert_eq!(config.connection.retry_cap_ms, 60_000);
        assert_eq!(config.motion.step, 5);
        assert_eq!(config.motion.tick_ms, 20);
        assert_eq!(config.safety.inactivity_timeout_ms, 600_000);
        assert_eq!(config.device.len(), 2);
    }

    #[test]
    fn mqtt_status_topic() {
        let mqtt = MqttConfig::default().with_client_id("dev7");
        assert_eq!(mqtt.status_topic().as_str(), "devices/dev7/status");
    }

    #[test]
    fn mqtt_auth_detection() {
        let no_auth = MqttConfig::default();
        assert!(!no_auth.has_auth());

        let with_auth = MqttConfig::default().with_auth("user", "pass");
        assert!(with_auth.has_auth());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_mqtt(
                MqttConfig::default()
                    .with_host("broker.local")
                    .with_port(8883),
            )
            .with_wifi(WifiConfig::default().with_ssid("Museum"))
            .with_motion(MotionConfig::default().with_step(10));

        assert_eq!(config.mqtt.host.as_str(), "broker.local");
        assert_eq!(config.mqtt.port, 8883);
        assert!(config.wifi.is_configured());
        assert_eq!(config.motion.step, 10);
    }

    #[test]
    fn overlong_ssid_is_not_configured() {
        let fits = "a".repeat(MAX_SSID_LEN);
        assert!(WifiConfig::default().with_ssid(&fits).is_configured());

        let too_long = "a".repeat(MAX_SSID_LEN + 1);
        let wifi = WifiConfig::default().with_ssid(&too_long);
        assert_eq!(wifi.ssid.len(), MAX_SSID_LEN + 1);
        assert!(!wifi.is_configured());
    }

    #[test]
    fn retry_cap_never_below_base() {
        let conn = ConnectionConfig::default().with_retry(8_000, 1_000);
        assert_eq!(conn.retry_base_ms, 8_000);
        assert_eq!(conn.retry_cap_ms, 8_000);
    }

    #[test]
    fn motion_step_clamped() {
        assert_eq!(MotionConfig::default().with_step(0).step, 1);
        assert_eq!(MotionConfig::default().with_step(200).step, 100);
        assert_eq!(MotionConfig::default().with_default_speed(150).default_speed, 100);
    }

    // =========================================================================
    // DeviceProfile Tests
    // =========================================================================

    #[test]
    fn default_profile_is_dual_motor() {
        let profile = DeviceProfile::default();
        assert_eq!(profile.find("motor1"), Some(0));
        assert_eq!(profile.find("motor2"), Some(1));
        assert_eq!(profile.actuators[1].channel, 1);
        assert_eq!(profile.actuators[0].kind, ChannelKind::PwmChannel);
    }

    #[test]
    fn profile_rejects_duplicate_names() {
        let profile = DeviceProfile::empty()
            .with_actuator(ActuatorProfile::new("relay", 0, ChannelKind::DirectGpio))
            .with_actuator(ActuatorProfile::new("relay", 3, ChannelKind::DirectGpio));
        assert_eq!(profile.len(), 1);
        assert_eq!(profile.actuators[0].channel, 0);
    }

    #[test]
    fn profile_capacity_is_bounded() {
        let mut profile = DeviceProfile::empty();
        for i in 0..12u8 {
            let mut name = ShortString::new();
            let _ = name.push_str("bit");
            let _ = name.push((b'a' + i) as char);
            profile = profile.with_actuator(ActuatorProfile::new(
                name.as_str(),
                i,
                ChannelKind::I2cExpanderBit,
            ));
        }
        assert_eq!(profile.len(), MAX_ACTUATORS);
    }

    #[test]
    fn empty_profile() {
        let profile = DeviceProfile::empty();
        assert!(profile.is_empty());
        assert_eq!(profile.find("motor1"), None);
    }

    // =========================================================================
    // String Helper Tests
    // =========================================================================

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn long_string_truncation() {
        let long_input = "b".repeat(200);
        let s = long_string(&long_input);
        assert_eq!(s.len(), MAX_LONG_STRING);
    }

    #[test]
    fn string_helpers_utf8_boundary() {
        // 4-byte characters, 17 of them do not fit in 64 bytes
        let input = "\u{1F682}".repeat(17);
        let s = short_string(&input);
        assert_eq!(s.len(), 64);
        assert!(core::str::from_utf8(s.as_bytes()).is_ok());
    }
}
