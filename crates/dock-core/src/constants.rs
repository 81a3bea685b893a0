//! Timing and sizing constants for the dock station firmware.
//!
//! Every value here is a default. The running station reads its effective
//! values from [`StationConfig`](crate::config::StationConfig), whose
//! `Default` implementation is built from these constants.
//!
//! All durations are expressed in milliseconds of monotonic time, matching the
//! [`Millis`](crate::types::Millis) type used throughout the workspace.
//!
//! # Usage
//!
//! ```
//! use dock_core::constants::*;
//!
//! // Heartbeats are much slower than the card-tap poll rate
//! assert!(HEARTBEAT_INTERVAL_MS > TAP_POLL_INTERVAL_MS);
//!
//! // NFC backoff starts below its cap
//! assert!(NFC_BACKOFF_INITIAL_MS < NFC_BACKOFF_MAX_MS);
//! ```

// ============================================================================
// Lifecycle
// ============================================================================

/// Time spent in `Connected` before auto-promoting to `Available`.
pub const STABILIZATION_WINDOW_MS: u64 = 2_000;

/// Interval between retained status republishes while a state is held.
pub const HEARTBEAT_INTERVAL_MS: u64 = 10_000;

/// Interval between wireless reconnect attempts while `ConnectingWifi`.
pub const BOOT_RETRY_INTERVAL_MS: u64 = 3_000;

/// Number of transitions kept in the lifecycle history.
pub const MAX_TRANSITION_HISTORY: usize = 32;

// ============================================================================
// Connectivity
// ============================================================================

/// Minimum spacing between recovery attempts while in `Error`.
pub const RECOVERY_INTERVAL_MS: u64 = 5_000;

/// Wireless retry count after which recovery stops calling reconnect.
///
/// The counter is informational: recovery keeps checking the link and logging
/// every interval, it only stops actively reconnecting.
pub const MAX_WIFI_RETRIES: u32 = 5;

/// Minimum spacing between transport reconnect attempts.
pub const TRANSPORT_RETRY_INTERVAL_MS: u64 = 5_000;

/// Consecutive transport reconnect failures that escalate the device to `Error`.
pub const MAX_TRANSPORT_RETRIES: u32 = 3;

/// Upper bound on the blocking link acquisition performed once at boot.
pub const BOOT_LINK_TIMEOUT_MS: u64 = 10_000;

/// Poll period used while waiting for the link at boot.
pub const BOOT_LINK_POLL_MS: u64 = 500;

/// Capacity of the inbound command channel fed by the transport.
pub const INBOUND_QUEUE_CAPACITY: usize = 16;

// ============================================================================
// NFC health and recovery
// ============================================================================

/// Backoff applied before the first recovery attempt after a failure.
pub const NFC_BACKOFF_INITIAL_MS: u64 = 1_000;

/// Upper bound for the doubling recovery backoff.
pub const NFC_BACKOFF_MAX_MS: u64 = 15_000;

/// Interval between firmware-version probes while the reader is healthy.
pub const NFC_HEALTH_CHECK_INTERVAL_MS: u64 = 5_000;

/// Delay after stopping and after restarting the reader bus.
pub const NFC_BUS_RESTART_DELAY_MS: u64 = 10;

/// Time the reset line is held low.
pub const NFC_RESET_LOW_MS: u64 = 30;

/// Settling time after releasing the reset line.
pub const NFC_RESET_STABILIZE_MS: u64 = 150;

/// Bus clock used when the reader bus is (re)started.
pub const NFC_BUS_CLOCK_HZ: u32 = 100_000;

/// Per-transaction bus timeout used when the reader bus is (re)started.
pub const NFC_BUS_TIMEOUT_MS: u16 = 50;

// ============================================================================
// Card taps
// ============================================================================

/// Minimum spacing between two scans of the reader.
pub const TAP_POLL_INTERVAL_MS: u64 = 80;

/// Window during which a re-read of the same card is suppressed.
pub const TAP_DEBOUNCE_WINDOW_MS: u64 = 600;

/// Consecutive scan misses tolerated before the card counts as removed.
pub const TAP_MAX_MISSES: u8 = 3;

/// Timeout passed to each scan; the longest blocking call inside a tick.
pub const TAP_SCAN_TIMEOUT_MS: u64 = 50;

// ============================================================================
// Telemetry
// ============================================================================

/// Default number of buffered telemetry entries.
pub const TELEMETRY_CAPACITY: usize = 10;

/// Default interval between telemetry flushes.
pub const TELEMETRY_FLUSH_INTERVAL_MS: u64 = 5_000;

// ============================================================================
// Storage, topics and scheduling
// ============================================================================

/// Key under which the device state snapshot is persisted.
pub const STATE_STORE_KEY: &str = "device_state";

/// Default SQLite database file for the state snapshot.
pub const DEFAULT_DATABASE_PATH: &str = "dock.db";

/// Default root of every topic used by the station.
pub const DEFAULT_TOPIC_PREFIX: &str = "esp";

/// Command category names. A device named after one would make its
/// `<prefix>/commands/<device>` alias shadow a shared category topic.
pub const RESERVED_DEVICE_IDS: [&str; 5] =
    ["state", "booking", "reservation", "maintenance", "status"];

/// Sleep between two scheduler iterations.
pub const LOOP_PERIOD_MS: u64 = 10;
