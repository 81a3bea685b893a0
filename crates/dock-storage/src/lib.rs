//! Persistence for the dock station.
//!
//! The station keeps very little on disk: the last device state, written on
//! every change and read back at boot as a restart hint. [`StateStore`] is the
//! seam the firmware talks to, with two implementations:
//!
//! - [`SqliteStateStore`] - the `station_state` key/value table in an SQLite
//!   file opened through [`Database`]
//! - [`MemoryStateStore`] - a shared in-process map for tests and diskless runs
//!
//! # Example
//!
//! ```no_run
//! use dock_storage::{Database, DatabaseConfig, SqliteStateStore, StateStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("dock.db")).await?;
//! let mut store = SqliteStateStore::new(db.pool().clone());
//!
//! store.store("device_state", 5).await?;
//! assert_eq!(store.load("device_state").await?, Some(5));
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod state;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use state::{MemoryStateStore, SqliteStateStore, StateStore};
