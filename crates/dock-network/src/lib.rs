//! Connectivity supervision for the dock station.
//!
//! [`ConnectivitySupervisor`] watches the wireless link and the
//! publish/subscribe transport, paces every reconnect and reports
//! lifecycle-relevant outcomes as [`ConnectivityEvent`]s. Applying those
//! outcomes to the device state is left to the caller.

pub mod supervisor;

pub use supervisor::{
    BootLink, ConnectivityEvent, ConnectivityStatus, ConnectivitySupervisor, TransportHealth,
};
