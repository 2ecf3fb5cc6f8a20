//! ESP32 room-effect controller.
//!
//! Entry point for the two-motor board. It runs the cooperative loop at the
//! configured tick (20 ms by default):
//! - Supervises WiFi and the broker session, with backoff
//! - Drains inbound commands and publishes feedback
//! - Slews both H-bridge outputs toward their targets
//! - Feeds the task watchdog
//!
//! # Build
//!
//! ```bash
//! WIFI_SSID=Exhibit WIFI_PASSWORD=secret MQTT_HOST=192.168.1.10 \
//!     cargo build --release --features esp32 --bin esp32_main
//! ```
//!
//! Optional: `MQTT_PORT`, `MQTT_USER`, `MQTT_PASSWORD`, `MQTT_CLIENT_ID`,
//! `ROOM_PREFIX` (defaults to `room1/`).

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info};

use room_fx::hal::channel::{ChannelBank, DriverPool};
use room_fx::hal::esp32::{
    bridge, pwm_timer, Esp32Clock, Esp32Mqtt, Esp32System, Esp32Watchdog, Esp32Wifi,
};
use room_fx::traits::Clock;
use room_fx::{Config, MqttConfig, Runtime, WifiConfig};

fn main() -> anyhow::Result<()> {
    esp_idf_hal::sys::link_patches();
    EspLogger::initialize_default();

    info!("room-fx controller starting");

    // =========================================================================
    // Configuration
    // =========================================================================
    let mut mqtt = MqttConfig::default()
        .with_host(option_env!("MQTT_HOST").unwrap_or("localhost"))
        .with_port(
            option_env!("MQTT_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(1883),
        );
    if let Some(id) = option_env!("MQTT_CLIENT_ID") {
        mqtt = mqtt.with_client_id(id);
    }
    if let Some(prefix) = option_env!("ROOM_PREFIX") {
        mqtt = mqtt.with_base_prefix(prefix);
    }
    if let Some(user) = option_env!("MQTT_USER") {
        mqtt = mqtt.with_auth(user, option_env!("MQTT_PASSWORD").unwrap_or(""));
    }

    let config = Config::default()
        .with_wifi(
            WifiConfig::default()
                .with_ssid(option_env!("WIFI_SSID").unwrap_or(""))
                .with_password(option_env!("WIFI_PASSWORD").unwrap_or("")),
        )
        .with_mqtt(mqtt);

    if !config.wifi.is_configured() {
        error!("WiFi not configured (set WIFI_SSID/WIFI_PASSWORD at build time)");
    }

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Outputs (outputs are driven off before anything else)
    // =========================================================================
    let timer = pwm_timer(peripherals.ledc.timer0, &config.motion)?;
    let motor1 = bridge(
        &timer,
        peripherals.ledc.channel0,
        peripherals.pins.gpio27,
        peripherals.ledc.channel1,
        peripherals.pins.gpio26,
        peripherals.pins.gpio25,
    )?;
    let motor2 = bridge(
        &timer,
        peripherals.ledc.channel2,
        peripherals.pins.gpio33,
        peripherals.ledc.channel3,
        peripherals.pins.gpio32,
        peripherals.pins.gpio14,
    )?;
    let pool = DriverPool::new().with_bridge(motor1).with_bridge(motor2);
    let bank = ChannelBank::from_profile(&config.device, pool)
        .map_err(|e| anyhow::anyhow!("device profile: {}", e))?;
    info!(
        "outputs ready: {} Hz, {}-bit",
        config.motion.pwm_frequency_hz, config.motion.pwm_resolution_bits
    );

    // =========================================================================
    // Network
    // =========================================================================
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = Esp32Wifi::new(peripherals.modem, sysloop, Some(nvs), &config.wifi)?;
    let mqtt = Esp32Mqtt::new(&config.mqtt);

    // =========================================================================
    // Watchdog and Runtime
    // =========================================================================
    let watchdog = Esp32Watchdog::new(config.safety.watchdog_timeout_secs)?;
    let clock = Esp32Clock::new();
    let mut runtime = Runtime::new(
        &config,
        bank,
        wifi,
        mqtt,
        watchdog,
        Esp32System,
        clock.now_ms(),
    );

    info!("entering control loop ({} ms tick)", config.motion.tick_ms);

    // =========================================================================
    // Main Control Loop
    // =========================================================================
    loop {
        if let Err(e) = runtime.run_once(clock.now_ms()) {
            // Restart was already requested; only reached if it returns.
            error!("run loop failed: {}", e);
        }
        FreeRtos::delay_ms(config.motion.tick_ms);
    }
}
