//! Mock collaborator implementations for testing and simulation.
//!
//! Every mock is split into the device, which implements the collaborator
//! trait and is handed to the firmware, and a cloneable handle that shares its
//! state. Tests keep the handle to script failures and inspect what the
//! firmware did.

pub mod clock;
pub mod nfc;
pub mod transport;
pub mod wireless;

pub use clock::MockClock;
pub use nfc::{MockNfc, MockNfcHandle, NfcCall};
pub use transport::{MockTransport, MockTransportHandle, Published};
pub use wireless::{MockWireless, MockWirelessHandle};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock shared mock state, recovering from a poisoned lock.
///
/// A panicking test thread must not cascade into unrelated assertions.
pub(crate) fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
