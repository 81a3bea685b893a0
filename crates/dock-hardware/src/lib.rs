//! Collaborator abstractions for the dock station firmware.
//!
//! This crate defines the boundary between the firmware core and everything it
//! talks to: the monotonic [`Clock`], the [`WirelessLink`], the publish/subscribe
//! [`Transport`] and the [`NfcHardware`] reader. Real boards implement these
//! traits; the [`mock`] module provides controllable stand-ins.
//!
//! # Design Philosophy
//!
//! - **Async I/O**: operations that touch a device are `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Sync status**: `is_connected` and the clock are plain getters.
//! - **Thread-safe**: all traits require `Send + Sync`.
//! - **Error-aware**: operations return [`Result<T>`][error::Result] with a
//!   [`HardwareError`] describing the failure.
//!
//! # Mock devices
//!
//! Each mock comes as a `(device, handle)` pair. The device is moved into the
//! firmware; the handle stays with the test and scripts the device's behaviour:
//!
//! ```
//! use dock_hardware::mock::MockWireless;
//! use dock_hardware::traits::WirelessLink;
//!
//! let (link, handle) = MockWireless::new();
//! assert!(!link.is_connected());
//!
//! handle.set_connected(true);
//! assert!(link.is_connected());
//! ```

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{Clock, NfcHardware, SystemClock, Transport, WirelessLink};
pub use types::{
    BusSettings, CardUid, FirmwareVersion, MAX_DECIMAL_UID_LENGTH, MAX_UID_LENGTH, MIN_UID_LENGTH,
};
