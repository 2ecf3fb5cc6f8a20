//! Station-mode WiFi for ESP32 with a bounded connect.
//!
//! The driver is started once at construction; association happens in
//! [`WifiLink::connect`], which polls for an IP link every 500 ms and gives
//! up after the configured timeout. The supervisor owns the retry policy.
//!
//! # Example
//!
//! ```ignore
//! use room_fx::hal::esp32::Esp32Wifi;
//! use room_fx::config::WifiConfig;
//!
//! let config = WifiConfig::default()
//!     .with_ssid("Exhibit")
//!     .with_password("secret123");
//!
//! let wifi = Esp32Wifi::new(modem, sysloop, Some(nvs), &config)?;
//! // Not associated yet; the runtime calls connect()
//! ```

use core::fmt;
use std::net::Ipv4Addr;

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use log::{debug, info, warn};

use crate::config::{WifiConfig, MAX_SSID_LEN};
use crate::traits::WifiLink;

/// Link poll interval while associating.
const POLL_MS: u32 = 500;

/// Error type for ESP32 WiFi operations.
#[derive(Debug)]
pub struct Esp32WifiError(pub String);

impl fmt::Display for Esp32WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WiFi error: {}", self.0)
    }
}

/// Station-mode WiFi link.
pub struct Esp32Wifi<'a> {
    wifi: EspWifi<'a>,
}

impl<'a> Esp32Wifi<'a> {
    /// Initialize the driver in station mode and start it.
    ///
    /// # Errors
    ///
    /// Returns an error if the SSID is too long, or if the driver
    /// cannot be created, configured or started.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &WifiConfig,
    ) -> anyhow::Result<Self> {
        let mut wifi = EspWifi::new(modem, sysloop, nvs)?;

        let ssid: heapless::String<MAX_SSID_LEN> =
            config.ssid.as_str().try_into().map_err(|_| {
                anyhow::anyhow!(
                    "SSID is {} bytes, at most {} allowed",
                    config.ssid.len(),
                    MAX_SSID_LEN
                )
            })?;
        let password: heapless::String<64> = config
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow::anyhow!("WiFi password longer than 64 bytes"))?;

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid,
            password,
            auth_method,
            ..Default::default()
        }))?;
        wifi.start()?;
        info!("WiFi started, SSID '{}'", config.ssid);

        Ok(Self { wifi })
    }

    /// Current station address, if associated.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.wifi.sta_netif().get_ip_info().ok().map(|info| info.ip)
    }
}

impl WifiLink for Esp32Wifi<'_> {
    type Error = Esp32WifiError;

    fn is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn connect(&mut self, timeout_ms: u32) -> Result<(), Esp32WifiError> {
        self.wifi
            .connect()
            .map_err(|e| Esp32WifiError(format!("{:?}", e)))?;

        let mut waited = 0;
        while waited < timeout_ms {
            if self.is_connected() {
                if let Some(ip) = self.ip_addr() {
                    info!("WiFi connected, IP {}", ip);
                }
                return Ok(());
            }
            FreeRtos::delay_ms(POLL_MS);
            waited += POLL_MS;
            debug!("WiFi waiting ({} ms)", waited);
        }

        self.disconnect();
        Err(Esp32WifiError(format!("no link after {} ms", timeout_ms)))
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.wifi.disconnect() {
            warn!("WiFi disconnect failed: {:?}", e);
        }
    }
}
