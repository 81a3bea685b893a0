//! Dock station firmware core.
//!
//! This crate assembles the station from the supervisor crates:
//!
//! - [`DeviceLifecycle`] - authoritative device state and transition history
//! - [`StatusDriver`] - per-state behaviour: bootstrap, status announcements,
//!   heartbeats
//! - [`CommandAuthority`] - validation of inbound remote commands
//! - [`Station`] - the cooperative scheduler that ticks everything in order
//!
//! All collaborators are injected through the `dock_hardware` traits and
//! [`dock_storage::StateStore`], so the same code runs on a board and against
//! the mocks.
//!
//! # Example
//!
//! ```
//! use dock_core::StationConfig;
//! use dock_firmware::{Peripherals, Station};
//! use dock_hardware::mock::{MockClock, MockNfc, MockTransport, MockWireless};
//! use dock_storage::MemoryStateStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (wifi, _) = MockWireless::connected();
//!     let (transport, _) = MockTransport::new();
//!     let (nfc, _) = MockNfc::new();
//!     let clock = MockClock::new();
//!
//!     let mut station = Station::new(
//!         StationConfig::default(),
//!         Peripherals { clock: clock.clone(), wifi, transport, nfc },
//!         MemoryStateStore::new(),
//!     )
//!     .unwrap();
//!
//!     let boot = station.boot().await;
//!     assert!(boot.link_up);
//!
//!     station.run_once().await;
//!     clock.advance(10);
//!     station.run_once().await;
//!     assert_eq!(station.state(), dock_core::DeviceState::Connected);
//! }
//! ```

pub mod commands;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod scheduler;

pub use commands::{CommandAuthority, CommandOutcome, CommandStats};
pub use driver::{Announcement, DriverContext, DriverReport, StatusDriver};
pub use error::{FirmwareError, Result};
pub use lifecycle::{DeviceLifecycle, StateTransition, TransitionCause};
pub use scheduler::{BootReport, IterationReport, Peripherals, Station};
