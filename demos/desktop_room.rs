//! Desktop room controller against a real broker, with simulated outputs.
//!
//! Runs the same [`Runtime`] as the firmware, but with the OS network
//! ([`HostWifi`]), the `rumqttc` transport and a recording sink. Output
//! levels are logged once a second; set `RUST_LOG=debug` for topic routing.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example desktop_room --features mqtt -- 127.0.0.1 1883
//! ```
//!
//! Then, from another shell:
//!
//! ```sh
//! mosquitto_pub -t room1/motor1 -m ON:80:L
//! mosquitto_pub -t room1/motor1 -m DIR:R
//! mosquitto_pub -t room1/STOP -m 1
//! mosquitto_sub -t 'room1/#' -t 'devices/#' -v
//! ```

use std::thread;
use std::time::{Duration, Instant};

use log::{error, info};

use room_fx::hal::rumqtt::{HostWifi, RumqttTransport};
use room_fx::hal::{MockSink, MockSystem, MockWatchdog};
use room_fx::{Config, MqttConfig, Runtime};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = args.next().and_then(|p| p.parse().ok()).unwrap_or(1883);

    let config = Config::default().with_mqtt(
        MqttConfig::default()
            .with_host(&host)
            .with_port(port)
            .with_client_id("room_fx_desktop"),
    );

    let start = Instant::now();
    let now = || start.elapsed().as_millis() as u64;

    let mut runtime = Runtime::new(
        &config,
        MockSink::new(),
        HostWifi,
        RumqttTransport::new(&config.mqtt),
        MockWatchdog::new(),
        MockSystem::new(),
        now(),
    );

    info!("room-fx desktop controller, broker {}:{}", host, port);
    info!(
        "Commands: {}<actuator> ON[:speed[:L|R[:ramp_ms]]] | OFF | SPEED:n | DIR:L|R",
        config.mqtt.base_prefix
    );

    let tick = Duration::from_millis(config.motion.tick_ms as u64);
    let mut last_print = 0;
    loop {
        if let Err(e) = runtime.run_once(now()) {
            error!("stopping: {}", e);
            return;
        }

        if now() - last_print >= 1000 {
            last_print = now();
            let report = runtime.last_report();
            let mut line = format!(
                "wifi={} mqtt={} |",
                if report.wifi_up { "OK" } else { "FAIL" },
                if report.broker_up { "OK" } else { "FAIL" }
            );
            for actuator in runtime.controller().actuators() {
                line.push_str(&format!(
                    " {}={}{}",
                    actuator.name(),
                    actuator.current_speed(),
                    actuator.direction().code()
                ));
            }
            info!("{}", line);
        }

        thread::sleep(tick);
    }
}
