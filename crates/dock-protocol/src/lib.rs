//! Topic layout and command vocabulary of the dock station.
//!
//! [`TopicSet`] builds every topic a station publishes to or subscribes to and
//! routes inbound topics to a [`CommandCategory`]. [`Command::parse`] turns a
//! category and a payload into a typed [`Command`] that knows its target
//! state, its preconditions and its confirmation payload.

pub mod commands;
pub mod error;
pub mod topics;

pub use commands::{BookingAction, Command, CommandCategory, MaintenanceAction, ReservationAction};
pub use error::{ProtocolError, Result};
pub use topics::TopicSet;
