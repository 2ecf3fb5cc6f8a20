//! Task watchdog and restart control on ESP-IDF.

use esp_idf_hal::sys::{
    esp_restart, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_delete, esp_task_wdt_init,
    esp_task_wdt_reconfigure, esp_task_wdt_reset, ESP_ERR_INVALID_STATE, ESP_OK,
};
use log::warn;

use crate::traits::{SystemControl, Watchdog};

/// Task watchdog subscription for the calling (main loop) task.
///
/// If [`Watchdog::feed`] is not called within the timeout the chip panics
/// and reboots. Dropping the handle unsubscribes the task.
pub struct Esp32Watchdog {
    _private: (),
}

impl Esp32Watchdog {
    /// Configure the task watchdog and subscribe the current task.
    pub fn new(timeout_secs: u32) -> anyhow::Result<Self> {
        let config = esp_task_wdt_config_t {
            timeout_ms: timeout_secs.saturating_mul(1000),
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // The IDF may already have started the watchdog; reconfigure it then.
        let rc = unsafe { esp_task_wdt_init(&config) };
        let rc = if rc == ESP_ERR_INVALID_STATE {
            unsafe { esp_task_wdt_reconfigure(&config) }
        } else {
            rc
        };
        if rc != ESP_OK {
            anyhow::bail!("esp_task_wdt_init failed with code {}", rc);
        }

        let rc = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
        if rc != ESP_OK && rc != ESP_ERR_INVALID_STATE {
            anyhow::bail!("esp_task_wdt_add failed with code {}", rc);
        }
        Ok(Self { _private: () })
    }
}

impl Watchdog for Esp32Watchdog {
    fn feed(&mut self) {
        let rc = unsafe { esp_task_wdt_reset() };
        if rc != ESP_OK {
            warn!("esp_task_wdt_reset failed with code {}", rc);
        }
    }
}

impl Drop for Esp32Watchdog {
    fn drop(&mut self) {
        let rc = unsafe { esp_task_wdt_delete(core::ptr::null_mut()) };
        if rc != ESP_OK {
            warn!("esp_task_wdt_delete failed with code {}", rc);
        }
    }
}

/// Software restart through `esp_restart()`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32System;

impl SystemControl for Esp32System {
    fn restart(&mut self) {
        warn!("restarting");
        unsafe { esp_restart() };
    }
}
