//! Station configuration.
//!
//! [`StationConfig`] groups every tunable of the firmware. Each section falls
//! back to the defaults in [`crate::constants`], so a configuration file only
//! needs to name the values it changes:
//!
//! ```
//! use dock_core::StationConfig;
//!
//! let config = StationConfig::from_json_str(r#"{
//!     "device_id": "a4cf12b3c9d0",
//!     "telemetry": { "capacity": 25 }
//! }"#).unwrap();
//!
//! assert_eq!(config.telemetry.capacity, 25);
//! assert_eq!(config.telemetry.flush_interval_ms, 5_000);
//! ```

use crate::constants::*;
use crate::error::{Error, Result};
use crate::types::{DeviceId, Millis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`StationConfig::device_id`].
pub const ENV_DEVICE_ID: &str = "DOCK_DEVICE_ID";
/// Environment variable overriding [`StorageConfig::database_path`].
pub const ENV_DATABASE_PATH: &str = "DOCK_DATABASE_PATH";
/// Environment variable overriding [`StationConfig::topic_prefix`].
pub const ENV_TOPIC_PREFIX: &str = "DOCK_TOPIC_PREFIX";

/// Top-level configuration of one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Hardware identifier appended to every per-device topic.
    pub device_id: String,
    /// Root of every topic.
    pub topic_prefix: String,
    /// Sleep between scheduler iterations.
    pub loop_period_ms: Millis,
    pub lifecycle: LifecycleConfig,
    pub connectivity: ConnectivityConfig,
    pub nfc: NfcConfig,
    pub tap: TapConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            device_id: "dock-sim".to_string(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            loop_period_ms: LOOP_PERIOD_MS,
            lifecycle: LifecycleConfig::default(),
            connectivity: ConnectivityConfig::default(),
            nfc: NfcConfig::default(),
            tap: TapConfig::default(),
            telemetry: TelemetryConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub stabilization_window_ms: Millis,
    pub heartbeat_interval_ms: Millis,
    pub boot_retry_interval_ms: Millis,
    pub history_size: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stabilization_window_ms: STABILIZATION_WINDOW_MS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            boot_retry_interval_ms: BOOT_RETRY_INTERVAL_MS,
            history_size: MAX_TRANSITION_HISTORY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub recovery_interval_ms: Millis,
    pub max_wifi_retries: u32,
    pub transport_retry_interval_ms: Millis,
    pub max_transport_retries: u32,
    pub boot_link_timeout_ms: Millis,
    pub boot_link_poll_ms: Millis,
    pub inbound_queue_capacity: usize,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            recovery_interval_ms: RECOVERY_INTERVAL_MS,
            max_wifi_retries: MAX_WIFI_RETRIES,
            transport_retry_interval_ms: TRANSPORT_RETRY_INTERVAL_MS,
            max_transport_retries: MAX_TRANSPORT_RETRIES,
            boot_link_timeout_ms: BOOT_LINK_TIMEOUT_MS,
            boot_link_poll_ms: BOOT_LINK_POLL_MS,
            inbound_queue_capacity: INBOUND_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfcConfig {
    pub backoff_initial_ms: Millis,
    pub backoff_max_ms: Millis,
    pub health_check_interval_ms: Millis,
    pub bus_restart_delay_ms: Millis,
    pub reset_low_ms: Millis,
    pub reset_stabilize_ms: Millis,
    pub bus_clock_hz: u32,
    pub bus_timeout_ms: u16,
}

impl Default for NfcConfig {
    fn default() -> Self {
        Self {
            backoff_initial_ms: NFC_BACKOFF_INITIAL_MS,
            backoff_max_ms: NFC_BACKOFF_MAX_MS,
            health_check_interval_ms: NFC_HEALTH_CHECK_INTERVAL_MS,
            bus_restart_delay_ms: NFC_BUS_RESTART_DELAY_MS,
            reset_low_ms: NFC_RESET_LOW_MS,
            reset_stabilize_ms: NFC_RESET_STABILIZE_MS,
            bus_clock_hz: NFC_BUS_CLOCK_HZ,
            bus_timeout_ms: NFC_BUS_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    pub poll_interval_ms: Millis,
    pub debounce_window_ms: Millis,
    pub max_misses: u8,
    pub scan_timeout_ms: Millis,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: TAP_POLL_INTERVAL_MS,
            debounce_window_ms: TAP_DEBOUNCE_WINDOW_MS,
            max_misses: TAP_MAX_MISSES,
            scan_timeout_ms: TAP_SCAN_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub capacity: usize,
    pub flush_interval_ms: Millis,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            capacity: TELEMETRY_CAPACITY,
            flush_interval_ms: TELEMETRY_FLUSH_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub state_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            state_key: STATE_STORE_KEY.to_string(),
        }
    }
}

impl StationConfig {
    /// Parse a JSON document. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns `Error::Json` on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read and `Error::Json` if it
    /// cannot be parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Apply `DOCK_*` overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed by the `DOCK_*` names.
    ///
    /// Empty values are ignored.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(device_id) = lookup(ENV_DEVICE_ID) {
            self.device_id = device_id;
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(prefix) = lookup(ENV_TOPIC_PREFIX) {
            self.topic_prefix = prefix;
        }
        self
    }

    /// Validated device identifier.
    ///
    /// # Errors
    /// Returns `Error::Config` if the identifier is not usable as a topic level.
    pub fn device_id(&self) -> Result<DeviceId> {
        DeviceId::new(&self.device_id)
    }

    /// Check the configuration for values the firmware cannot run with.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.device_id()?;

        let prefix = self.topic_prefix.trim_matches('/');
        if prefix.is_empty() || prefix.contains(['+', '#']) {
            return Err(Error::Config(format!(
                "Invalid topic prefix: {:?}",
                self.topic_prefix
            )));
        }

        if self.telemetry.capacity == 0 {
            return Err(Error::Config(
                "Telemetry capacity must be at least 1".to_string(),
            ));
        }

        if self.nfc.backoff_initial_ms > self.nfc.backoff_max_ms {
            return Err(Error::Config(format!(
                "NFC backoff initial ({}ms) exceeds maximum ({}ms)",
                self.nfc.backoff_initial_ms, self.nfc.backoff_max_ms
            )));
        }

        if self.connectivity.max_transport_retries == 0 {
            return Err(Error::Config(
                "Transport retry budget must be at least 1".to_string(),
            ));
        }

        if self.connectivity.inbound_queue_capacity == 0 {
            return Err(Error::Config(
                "Inbound queue capacity must be at least 1".to_string(),
            ));
        }

        if self.storage.state_key.is_empty() {
            return Err(Error::MissingConfig("storage.state_key".to_string()));
        }

        let intervals = [
            ("lifecycle.heartbeat_interval_ms", self.lifecycle.heartbeat_interval_ms),
            ("lifecycle.boot_retry_interval_ms", self.lifecycle.boot_retry_interval_ms),
            ("connectivity.recovery_interval_ms", self.connectivity.recovery_interval_ms),
            (
                "connectivity.transport_retry_interval_ms",
                self.connectivity.transport_retry_interval_ms,
            ),
            ("connectivity.boot_link_poll_ms", self.connectivity.boot_link_poll_ms),
            ("nfc.backoff_initial_ms", self.nfc.backoff_initial_ms),
            ("nfc.health_check_interval_ms", self.nfc.health_check_interval_ms),
            ("tap.poll_interval_ms", self.tap.poll_interval_ms),
            ("telemetry.flush_interval_ms", self.telemetry.flush_interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("{name} must be non-zero")));
        }

        Ok(())
    }
}
