//! Command vocabulary of the dock station.
//!
//! Inbound commands arrive as plain-text payloads on one of five topic
//! categories. Each category accepts a small, fixed vocabulary:
//!
//! | category | payloads |
//! |---|---|
//! | state | `available`, `reserved`, `booked`, `broken`, `maintained`, `unavailable` |
//! | booking | `book`, `claim`, `release` |
//! | reservation | `reserve`, `cancel` |
//! | maintenance | `start`, `complete` |
//! | status | `request` |
//!
//! Payloads are matched exactly: no trimming and no case folding.
//!
//! # Examples
//!
//! ```
//! use dock_core::DeviceState;
//! use dock_protocol::{Command, CommandCategory};
//!
//! let command = Command::parse(CommandCategory::Booking, "book").unwrap();
//! assert_eq!(command.target(), Some(DeviceState::Booked));
//! assert!(command.permits(DeviceState::Reserved));
//! assert!(!command.permits(DeviceState::Broken));
//! assert_eq!(command.confirmation(), Some("booked"));
//!
//! assert!(Command::parse(CommandCategory::Booking, "Book").is_err());
//! ```

use crate::error::{ProtocolError, Result};
use dock_core::DeviceState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic category a command arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    State,
    Booking,
    Reservation,
    Maintenance,
    Status,
}

impl CommandCategory {
    pub const ALL: [CommandCategory; 5] = [
        CommandCategory::State,
        CommandCategory::Booking,
        CommandCategory::Reservation,
        CommandCategory::Maintenance,
        CommandCategory::Status,
    ];

    /// Topic level naming the category.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandCategory::State => "state",
            CommandCategory::Booking => "booking",
            CommandCategory::Reservation => "reservation",
            CommandCategory::Maintenance => "maintenance",
            CommandCategory::Status => "status",
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Book,
    Claim,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationAction {
    Reserve,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAction {
    Start,
    Complete,
}

/// A recognised inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Direct state request, validated against the transition table.
    SetState(DeviceState),
    Booking(BookingAction),
    Reservation(ReservationAction),
    Maintenance(MaintenanceAction),
    /// Report the current state without changing it.
    StatusRequest,
}

impl Command {
    /// Map a payload received on `category` to a command.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::UnknownPayload` when the payload is not part of
    /// the category's vocabulary.
    pub fn parse(category: CommandCategory, payload: &str) -> Result<Self> {
        let command = match (category, payload) {
            (CommandCategory::State, name) => DeviceState::OPERATIONAL
                .into_iter()
                .find(|state| state.as_str() == name)
                .map(Command::SetState),
            (CommandCategory::Booking, "book") => Some(Command::Booking(BookingAction::Book)),
            (CommandCategory::Booking, "claim") => Some(Command::Booking(BookingAction::Claim)),
            (CommandCategory::Booking, "release") => {
                Some(Command::Booking(BookingAction::Release))
            }
            (CommandCategory::Reservation, "reserve") => {
                Some(Command::Reservation(ReservationAction::Reserve))
            }
            (CommandCategory::Reservation, "cancel") => {
                Some(Command::Reservation(ReservationAction::Cancel))
            }
            (CommandCategory::Maintenance, "start") => {
                Some(Command::Maintenance(MaintenanceAction::Start))
            }
            (CommandCategory::Maintenance, "complete") => {
                Some(Command::Maintenance(MaintenanceAction::Complete))
            }
            (CommandCategory::Status, "request") => Some(Command::StatusRequest),
            _ => None,
        };

        command.ok_or_else(|| ProtocolError::UnknownPayload {
            category,
            payload: payload.to_string(),
        })
    }

    pub fn category(&self) -> CommandCategory {
        match self {
            Command::SetState(_) => CommandCategory::State,
            Command::Booking(_) => CommandCategory::Booking,
            Command::Reservation(_) => CommandCategory::Reservation,
            Command::Maintenance(_) => CommandCategory::Maintenance,
            Command::StatusRequest => CommandCategory::Status,
        }
    }

    /// State the command moves the device into, if any.
    pub fn target(&self) -> Option<DeviceState> {
        use DeviceState::*;
        match self {
            Command::SetState(state) => Some(*state),
            Command::Booking(BookingAction::Book | BookingAction::Claim) => Some(Booked),
            Command::Booking(BookingAction::Release) => Some(Available),
            Command::Reservation(ReservationAction::Reserve) => Some(Reserved),
            Command::Reservation(ReservationAction::Cancel) => Some(Available),
            Command::Maintenance(MaintenanceAction::Start) => Some(Maintained),
            Command::Maintenance(MaintenanceAction::Complete) => Some(Available),
            Command::StatusRequest => None,
        }
    }

    /// States a named action may be issued from.
    ///
    /// Direct state requests have no extra precondition beyond the transition
    /// table and return `None`.
    pub fn allowed_from(&self) -> Option<&'static [DeviceState]> {
        use DeviceState::*;
        match self {
            Command::SetState(_) | Command::StatusRequest => None,
            Command::Booking(BookingAction::Book) => Some(&[Available, Reserved]),
            Command::Booking(BookingAction::Claim) => Some(&[Reserved]),
            Command::Booking(BookingAction::Release) => Some(&[Booked]),
            Command::Reservation(ReservationAction::Reserve) => Some(&[Available]),
            Command::Reservation(ReservationAction::Cancel) => Some(&[Reserved]),
            Command::Maintenance(MaintenanceAction::Start) => {
                Some(&[Available, Unavailable, Broken, Booked])
            }
            Command::Maintenance(MaintenanceAction::Complete) => Some(&[Maintained]),
        }
    }

    /// Whether the command may run while the device is in `current`.
    ///
    /// A command with a target needs both its own precondition and the
    /// transition table to agree. A status request is always permitted.
    pub fn permits(&self, current: DeviceState) -> bool {
        let Some(target) = self.target() else {
            return true;
        };
        let precondition = self
            .allowed_from()
            .is_none_or(|states| states.contains(&current));
        precondition && current.can_transition_to(target)
    }

    /// Payload published on the category's outbound topic after success.
    ///
    /// A status request has no confirmation; it republishes the status itself.
    pub fn confirmation(&self) -> Option<&'static str> {
        match self {
            Command::SetState(state) => Some(state.as_str()),
            Command::Booking(BookingAction::Book) => Some("booked"),
            Command::Booking(BookingAction::Claim) => Some("claimed"),
            Command::Booking(BookingAction::Release) => Some("available"),
            Command::Reservation(ReservationAction::Reserve) => Some("reserved"),
            Command::Reservation(ReservationAction::Cancel) => Some("available"),
            Command::Maintenance(MaintenanceAction::Start) => Some("in_progress"),
            Command::Maintenance(MaintenanceAction::Complete) => Some("completed"),
            Command::StatusRequest => None,
        }
    }

    /// Payload word the command was parsed from.
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::SetState(state) => state.as_str(),
            Command::Booking(BookingAction::Book) => "book",
            Command::Booking(BookingAction::Claim) => "claim",
            Command::Booking(BookingAction::Release) => "release",
            Command::Reservation(ReservationAction::Reserve) => "reserve",
            Command::Reservation(ReservationAction::Cancel) => "cancel",
            Command::Maintenance(MaintenanceAction::Start) => "start",
            Command::Maintenance(MaintenanceAction::Complete) => "complete",
            Command::StatusRequest => "request",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.category(), self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DeviceState::*;
    use rstest::rstest;

    #[rstest]
    #[case(CommandCategory::State, "broken", Command::SetState(Broken))]
    #[case(CommandCategory::State, "available", Command::SetState(Available))]
    #[case(CommandCategory::Booking, "claim", Command::Booking(BookingAction::Claim))]
    #[case(CommandCategory::Reservation, "cancel", Command::Reservation(ReservationAction::Cancel))]
    #[case(CommandCategory::Maintenance, "start", Command::Maintenance(MaintenanceAction::Start))]
    #[case(CommandCategory::Status, "request", Command::StatusRequest)]
    fn test_parse(
        #[case] category: CommandCategory,
        #[case] payload: &str,
        #[case] expected: Command,
    ) {
        let command = Command::parse(category, payload).unwrap();
        assert_eq!(command, expected);
        assert_eq!(command.category(), category);
        assert_eq!(command.keyword(), payload);
    }

    #[rstest]
    #[case(CommandCategory::State, "connected")]
    #[case(CommandCategory::State, "error")]
    #[case(CommandCategory::State, "init")]
    #[case(CommandCategory::State, "Available")]
    #[case(CommandCategory::Booking, "book ")]
    #[case(CommandCategory::Booking, "reserve")]
    #[case(CommandCategory::Status, "")]
    #[case(CommandCategory::Maintenance, "finish")]
    fn test_unknown_payload(#[case] category: CommandCategory, #[case] payload: &str) {
        let error = Command::parse(category, payload).unwrap_err();
        assert_eq!(
            error,
            ProtocolError::UnknownPayload {
                category,
                payload: payload.to_string(),
            }
        );
    }

    #[rstest]
    #[case(Command::Booking(BookingAction::Book), Available, true)]
    #[case(Command::Booking(BookingAction::Book), Reserved, true)]
    #[case(Command::Booking(BookingAction::Book), Booked, false)]
    #[case(Command::Booking(BookingAction::Claim), Available, false)]
    #[case(Command::Booking(BookingAction::Release), Booked, true)]
    #[case(Command::Reservation(ReservationAction::Reserve), Reserved, false)]
    #[case(Command::Reservation(ReservationAction::Cancel), Reserved, true)]
    #[case(Command::Maintenance(MaintenanceAction::Start), Booked, true)]
    #[case(Command::Maintenance(MaintenanceAction::Start), Maintained, false)]
    #[case(Command::Maintenance(MaintenanceAction::Start), Connected, false)]
    #[case(Command::Maintenance(MaintenanceAction::Complete), Maintained, true)]
    #[case(Command::SetState(Maintained), Connected, true)]
    #[case(Command::SetState(Booked), Connected, false)]
    #[case(Command::SetState(Available), ConnectingWifi, false)]
    #[case(Command::StatusRequest, Init, true)]
    fn test_permits(
        #[case] command: Command,
        #[case] current: DeviceState,
        #[case] expected: bool,
    ) {
        assert_eq!(command.permits(current), expected);
    }

    #[rstest]
    #[case(Command::Booking(BookingAction::Claim), "claimed")]
    #[case(Command::Booking(BookingAction::Release), "available")]
    #[case(Command::Reservation(ReservationAction::Reserve), "reserved")]
    #[case(Command::Maintenance(MaintenanceAction::Complete), "completed")]
    #[case(Command::SetState(Unavailable), "unavailable")]
    fn test_confirmation(#[case] command: Command, #[case] expected: &str) {
        assert_eq!(command.confirmation(), Some(expected));
    }

    #[test]
    fn test_status_request_has_no_target() {
        assert_eq!(Command::StatusRequest.target(), None);
        assert_eq!(Command::StatusRequest.confirmation(), None);
    }

    #[test]
    fn test_every_action_target_is_operational() {
        for category in CommandCategory::ALL {
            for payload in [
                "available", "reserved", "booked", "broken", "maintained", "unavailable", "book",
                "claim", "release", "reserve", "cancel", "start", "complete",
            ] {
                if let Ok(command) = Command::parse(category, payload) {
                    assert!(command.target().is_none_or(DeviceState::is_operational));
                }
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Command::Booking(BookingAction::Book).to_string(),
            "booking/book"
        );
        assert_eq!(
            ProtocolError::UnknownPayload {
                category: CommandCategory::Booking,
                payload: "rent".to_string()
            }
            .to_string(),
            "Unknown booking command: rent"
        );
    }
}
