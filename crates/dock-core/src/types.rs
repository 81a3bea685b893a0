use crate::constants::RESERVED_DEVICE_IDS;
use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds of monotonic time since boot.
pub type Millis = u64;

/// Milliseconds elapsed between `since` and `now`, saturating at zero.
#[inline]
#[must_use]
pub fn elapsed(now: Millis, since: Millis) -> Millis {
    now.saturating_sub(since)
}

/// Hardware identifier of the station, used to namespace its topics.
///
/// Typically derived from the radio MAC address. Only ASCII alphanumerics,
/// `-` and `_` are accepted so the identifier can be used as a topic level.
/// Command category names are rejected, see [`RESERVED_DEVICE_IDS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device ID with validation.
    ///
    /// # Errors
    /// Returns `Error::Config` if the identifier is empty, contains characters
    /// that are not valid inside a topic level or names a command category.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::Config("Device ID must not be empty".to_string()));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Config(format!("Invalid device ID: {id}")));
        }
        if RESERVED_DEVICE_IDS.contains(&id) {
            return Err(Error::Config(format!(
                "Device ID {id} collides with a command category topic"
            )));
        }
        Ok(DeviceId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DeviceId::new(s)
    }
}

/// Lifecycle state of the station.
///
/// `Init`, `ConnectingWifi` and `Connected` form the bootstrap path and are
/// driven by link status. `Error` is the recoverable fault state. The six
/// remaining states are operational and are entered through commands.
///
/// The `u32` discriminants are the persisted representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum DeviceState {
    Init = 0,
    ConnectingWifi = 1,
    Connected = 2,
    Error = 3,
    Reserved = 4,
    Available = 5,
    Booked = 6,
    Broken = 7,
    Maintained = 8,
    Unavailable = 9,
}

impl DeviceState {
    /// Number of states.
    pub const COUNT: usize = 10;

    /// Every state, in discriminant order.
    pub const ALL: [DeviceState; Self::COUNT] = [
        DeviceState::Init,
        DeviceState::ConnectingWifi,
        DeviceState::Connected,
        DeviceState::Error,
        DeviceState::Reserved,
        DeviceState::Available,
        DeviceState::Booked,
        DeviceState::Broken,
        DeviceState::Maintained,
        DeviceState::Unavailable,
    ];

    /// The six states a station can be commanded into.
    pub const OPERATIONAL: [DeviceState; 6] = [
        DeviceState::Reserved,
        DeviceState::Available,
        DeviceState::Booked,
        DeviceState::Broken,
        DeviceState::Maintained,
        DeviceState::Unavailable,
    ];

    /// Check if transition to target state is valid from this state.
    ///
    /// This is the static transition table consulted before any command-driven
    /// state change. The bootstrap states `Init` and `ConnectingWifi` accept
    /// no requested transitions at all.
    ///
    /// # Examples
    ///
    /// ```
    /// use dock_core::DeviceState;
    ///
    /// assert!(DeviceState::Available.can_transition_to(DeviceState::Booked));
    /// assert!(!DeviceState::Booked.can_transition_to(DeviceState::Reserved));
    /// assert!(!DeviceState::Init.can_transition_to(DeviceState::Available));
    /// ```
    #[must_use]
    pub fn can_transition_to(self, target: DeviceState) -> bool {
        use DeviceState::*;
        matches!(
            (self, target),
            (Reserved, Available | Booked)
                | (Available, Reserved | Booked | Broken | Maintained | Unavailable)
                | (Booked, Available | Broken | Maintained | Unavailable)
                | (Broken, Maintained | Unavailable)
                | (Maintained, Available | Unavailable)
                | (Unavailable, Available | Maintained)
                | (Connected | Error, Available | Maintained | Unavailable)
        )
    }

    /// Returns `true` for the six command-driven states.
    #[inline]
    #[must_use]
    pub fn is_operational(self) -> bool {
        Self::OPERATIONAL.contains(&self)
    }

    /// Returns `true` for states that require the wireless link to stay up.
    ///
    /// Losing the link in any of these forces the station into `Error`.
    #[inline]
    #[must_use]
    pub fn requires_link(self) -> bool {
        self == DeviceState::Connected || self.is_operational()
    }

    /// Lowercase name used as the retained status payload.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceState::Init => "init",
            DeviceState::ConnectingWifi => "connecting_wifi",
            DeviceState::Connected => "connected",
            DeviceState::Error => "error",
            DeviceState::Reserved => "reserved",
            DeviceState::Available => "available",
            DeviceState::Booked => "booked",
            DeviceState::Broken => "broken",
            DeviceState::Maintained => "maintained",
            DeviceState::Unavailable => "unavailable",
        }
    }

    /// Position of the state in [`DeviceState::ALL`].
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Persisted representation.
    #[inline]
    #[must_use]
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    /// Decode a persisted value.
    ///
    /// # Errors
    /// Returns `Error::InvalidStateValue` for values outside `0..=9`.
    pub fn from_u32(value: u32) -> Result<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(Error::InvalidStateValue(value))
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity of a telemetry log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogSeverity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl LogSeverity {
    /// Label used in the rendered remote log line.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Verbose => "VERBOSE",
            LogSeverity::Info => "INFO",
            LogSeverity::Warning => "WARNING",
            LogSeverity::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Where a log line goes.
///
/// `Local` writes straight to the local log and is never buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogDestination {
    Local,
    Remote,
    Both,
}

impl LogDestination {
    #[inline]
    #[must_use]
    pub fn is_local(self) -> bool {
        matches!(self, LogDestination::Local | LogDestination::Both)
    }

    #[inline]
    #[must_use]
    pub fn is_remote(self) -> bool {
        matches!(self, LogDestination::Remote | LogDestination::Both)
    }
}

/// One buffered telemetry line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    timestamp: Millis,
    severity: LogSeverity,
    message: String,
}

impl LogEntry {
    pub fn new(timestamp: Millis, severity: LogSeverity, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            severity,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> Millis {
        self.timestamp
    }

    #[must_use]
    pub fn severity(&self) -> LogSeverity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render the entry as published on the log topic.
    ///
    /// ```
    /// use dock_core::{LogEntry, LogSeverity};
    ///
    /// let entry = LogEntry::new(1500, LogSeverity::Warning, "link lost");
    /// assert_eq!(entry.render(), "1500 WARNING: link lost");
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        format!("{} {}: {}", self.timestamp, self.severity.label(), self.message)
    }
}

/// Inbound message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub topic: String,
    pub payload: String,
}

impl CommandEnvelope {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn allowed_targets(from: DeviceState) -> &'static [DeviceState] {
        use DeviceState::*;
        match from {
            Reserved => &[Available, Booked],
            Available => &[Reserved, Booked, Broken, Maintained, Unavailable],
            Booked => &[Available, Broken, Maintained, Unavailable],
            Broken => &[Maintained, Unavailable],
            Maintained => &[Available, Unavailable],
            Unavailable => &[Available, Maintained],
            Connected | Error => &[Available, Maintained, Unavailable],
            Init | ConnectingWifi => &[],
        }
    }

    #[test]
    fn test_transition_table_full_grid() {
        for from in DeviceState::ALL {
            for to in DeviceState::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed_targets(from).contains(&to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[rstest]
    #[case(DeviceState::Init)]
    #[case(DeviceState::ConnectingWifi)]
    fn test_bootstrap_states_reject_everything(#[case] from: DeviceState) {
        assert!(DeviceState::ALL.iter().all(|to| !from.can_transition_to(*to)));
    }

    #[rstest]
    #[case(DeviceState::Available, DeviceState::Booked, true)]
    #[case(DeviceState::Reserved, DeviceState::Booked, true)]
    #[case(DeviceState::Booked, DeviceState::Booked, false)]
    #[case(DeviceState::Broken, DeviceState::Available, false)]
    #[case(DeviceState::Error, DeviceState::Maintained, true)]
    #[case(DeviceState::Error, DeviceState::Connected, false)]
    #[case(DeviceState::Connected, DeviceState::Reserved, false)]
    fn test_transition_spot_checks(
        #[case] from: DeviceState,
        #[case] to: DeviceState,
        #[case] expected: bool,
    ) {
        assert_eq!(from.can_transition_to(to), expected);
    }

    #[test]
    fn test_no_state_transitions_to_itself() {
        for state in DeviceState::ALL {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_no_transition_into_bootstrap_or_error() {
        for from in DeviceState::ALL {
            for to in [
                DeviceState::Init,
                DeviceState::ConnectingWifi,
                DeviceState::Connected,
                DeviceState::Error,
            ] {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_state_index_matches_all_order() {
        for (index, state) in DeviceState::ALL.iter().enumerate() {
            assert_eq!(state.index(), index);
        }
    }

    #[test]
    fn test_state_from_u32_rejects_unknown_values() {
        assert_eq!(DeviceState::from_u32(6).unwrap(), DeviceState::Booked);
        assert!(matches!(
            DeviceState::from_u32(10),
            Err(Error::InvalidStateValue(10))
        ));
        assert!(DeviceState::from_u32(u32::MAX).is_err());
    }

    #[rstest]
    #[case(DeviceState::Available, "available")]
    #[case(DeviceState::ConnectingWifi, "connecting_wifi")]
    #[case(DeviceState::Maintained, "maintained")]
    fn test_state_names(#[case] state: DeviceState, #[case] name: &str) {
        assert_eq!(state.as_str(), name);
        assert_eq!(state.to_string(), name);
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            format!("\"{name}\"")
        );
    }

    #[test]
    fn test_operational_and_link_requirements() {
        assert!(DeviceState::Booked.is_operational());
        assert!(!DeviceState::Connected.is_operational());
        assert!(DeviceState::Connected.requires_link());
        assert!(!DeviceState::Error.requires_link());
        assert!(!DeviceState::ConnectingWifi.requires_link());
    }

    #[rstest]
    #[case("a4cf12b3c9d0", true)]
    #[case("dock-07_b", true)]
    #[case("", false)]
    #[case("dock/07", false)]
    #[case("dock 07", false)]
    #[case("dock+", false)]
    #[case("booking", false)]
    #[case("status", false)]
    #[case("state", false)]
    #[case("booking-2", true)]
    #[case("Booking", true)]
    fn test_device_id_validation(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(DeviceId::new(input).is_ok(), valid);
    }

    #[test]
    fn test_log_destinations() {
        assert!(LogDestination::Local.is_local());
        assert!(!LogDestination::Local.is_remote());
        assert!(LogDestination::Remote.is_remote());
        assert!(LogDestination::Both.is_local() && LogDestination::Both.is_remote());
    }

    #[test]
    fn test_elapsed_saturates() {
        assert_eq!(elapsed(100, 40), 60);
        assert_eq!(elapsed(40, 100), 0);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn persisted_value_decodes_to_same_state(index in 0usize..DeviceState::COUNT) {
                let state = DeviceState::ALL[index];
                prop_assert_eq!(DeviceState::from_u32(state.to_u32()).unwrap(), state);
            }

            #[test]
            fn only_operational_targets_are_ever_allowed(
                from in 0usize..DeviceState::COUNT,
                to in 0usize..DeviceState::COUNT,
            ) {
                let (from, to) = (DeviceState::ALL[from], DeviceState::ALL[to]);
                if from.can_transition_to(to) {
                    prop_assert!(to.is_operational());
                }
            }
        }
    }
}
