//! Device lifecycle state machine.
//!
//! [`DeviceLifecycle`] is the single owner of the station's [`DeviceState`].
//! Two paths change it:
//!
//! - [`DeviceLifecycle::change_state`] validates the request against the
//!   transition table and is used for remote commands.
//! - [`DeviceLifecycle::enter`] is reserved for the firmware itself: the
//!   bootstrap sequence, link loss, transport escalation and recovery. These
//!   moves are driven by connectivity, not by the table.
//!
//! Both paths clear every per-state "entry published" flag and restart the
//! time-in-state clock, so the status driver announces each new state exactly
//! once and then falls back to heartbeats.
//!
//! # Examples
//!
//! ```
//! use dock_core::DeviceState;
//! use dock_firmware::{DeviceLifecycle, TransitionCause};
//!
//! let mut lifecycle = DeviceLifecycle::new(32);
//! lifecycle.enter(DeviceState::Connected, TransitionCause::LinkUp, 0);
//!
//! // Connected may be promoted by command
//! lifecycle
//!     .change_state(DeviceState::Available, TransitionCause::Command, 10)
//!     .unwrap();
//!
//! // but the bootstrap states are never a valid target.
//! assert!(
//!     lifecycle
//!         .change_state(DeviceState::Init, TransitionCause::Command, 20)
//!         .is_err()
//! );
//! assert_eq!(lifecycle.history().len(), 2);
//! ```

use std::collections::VecDeque;
use std::fmt;

use dock_core::{DeviceState, Error, Millis, Result, elapsed};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Why the state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Leaving `Init` at the start of the control loop.
    Boot,
    /// The wireless link came up while connecting.
    LinkUp,
    /// The stabilisation window in `Connected` elapsed.
    Stabilized,
    /// The wireless link dropped.
    LinkLost,
    /// The transport retry budget ran out.
    TransportExhausted,
    /// Link and transport came back while in `Error`.
    Recovered,
    /// A remote command was accepted.
    Command,
}

impl TransitionCause {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionCause::Boot => "boot",
            TransitionCause::LinkUp => "link_up",
            TransitionCause::Stabilized => "stabilized",
            TransitionCause::LinkLost => "link_lost",
            TransitionCause::TransportExhausted => "transport_exhausted",
            TransitionCause::Recovered => "recovered",
            TransitionCause::Command => "command",
        }
    }
}

impl fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: DeviceState,
    pub to: DeviceState,
    pub cause: TransitionCause,
    /// Monotonic milliseconds at which the change happened.
    pub at: Millis,
}

impl fmt::Display for StateTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.cause)
    }
}

/// Authoritative holder of the device state.
#[derive(Debug, Clone)]
pub struct DeviceLifecycle {
    state: DeviceState,
    entered_at: Millis,
    entry_published: [bool; DeviceState::COUNT],
    last_heartbeat_at: Millis,
    history: VecDeque<StateTransition>,
    history_size: usize,
    transition_count: u64,
}

impl DeviceLifecycle {
    /// Create a lifecycle in `Init` keeping up to `history_size` transitions.
    pub fn new(history_size: usize) -> Self {
        Self {
            state: DeviceState::Init,
            entered_at: 0,
            entry_published: [false; DeviceState::COUNT],
            last_heartbeat_at: 0,
            history: VecDeque::with_capacity(history_size),
            history_size,
            transition_count: 0,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// When the current state was entered.
    pub fn entered_at(&self) -> Millis {
        self.entered_at
    }

    pub fn time_in_state(&self, now: Millis) -> Millis {
        elapsed(now, self.entered_at)
    }

    /// Move to `target` if the transition table allows it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] and leaves the state, the
    /// entry flags and the history untouched when the move is not allowed.
    pub fn change_state(
        &mut self,
        target: DeviceState,
        cause: TransitionCause,
        now: Millis,
    ) -> Result<StateTransition> {
        if !self.state.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        Ok(self.apply(target, cause, now))
    }

    /// Move to `target` without consulting the transition table.
    ///
    /// Returns `None` if the device is already in `target`.
    pub fn enter(
        &mut self,
        target: DeviceState,
        cause: TransitionCause,
        now: Millis,
    ) -> Option<StateTransition> {
        if self.state == target {
            return None;
        }
        Some(self.apply(target, cause, now))
    }

    fn apply(
        &mut self,
        target: DeviceState,
        cause: TransitionCause,
        now: Millis,
    ) -> StateTransition {
        let transition = StateTransition {
            from: self.state,
            to: target,
            cause,
            at: now,
        };
        info!(from = %transition.from, to = %transition.to, %cause, "State change");

        self.state = target;
        self.entered_at = now;
        self.entry_published = [false; DeviceState::COUNT];
        self.transition_count += 1;

        if self.history_size > 0 {
            if self.history.len() == self.history_size {
                self.history.pop_front();
            }
            self.history.push_back(transition);
        }
        transition
    }

    /// Whether the current state's status has been announced since entry.
    pub fn entry_published(&self) -> bool {
        self.entry_published[self.state.index()]
    }

    /// Whether any state is flagged as announced.
    pub fn any_entry_published(&self) -> bool {
        self.entry_published.iter().any(|published| *published)
    }

    /// Record the entry announcement of the current state.
    pub fn mark_entry_published(&mut self, now: Millis) {
        self.entry_published[self.state.index()] = true;
        self.last_heartbeat_at = now;
    }

    /// Whether a heartbeat is due, measured from the last announcement.
    pub fn heartbeat_due(&self, now: Millis, interval_ms: Millis) -> bool {
        self.entry_published() && elapsed(now, self.last_heartbeat_at) >= interval_ms
    }

    pub fn mark_heartbeat(&mut self, now: Millis) {
        self.last_heartbeat_at = now;
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Total number of transitions since start, including those no longer in
    /// the history.
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.history.back()
    }
}

impl Default for DeviceLifecycle {
    fn default() -> Self {
        Self::new(dock_core::constants::MAX_TRANSITION_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn lifecycle_in(state: DeviceState) -> DeviceLifecycle {
        let mut lifecycle = DeviceLifecycle::default();
        lifecycle.enter(state, TransitionCause::Boot, 0);
        lifecycle
    }

    #[test]
    fn test_starts_in_init() {
        let lifecycle = DeviceLifecycle::default();
        assert_eq!(lifecycle.state(), DeviceState::Init);
        assert!(lifecycle.history().is_empty());
        assert!(!lifecycle.any_entry_published());
    }

    #[rstest]
    #[case(DeviceState::Available, DeviceState::Booked)]
    #[case(DeviceState::Reserved, DeviceState::Booked)]
    #[case(DeviceState::Booked, DeviceState::Available)]
    #[case(DeviceState::Broken, DeviceState::Maintained)]
    #[case(DeviceState::Error, DeviceState::Unavailable)]
    #[case(DeviceState::Connected, DeviceState::Maintained)]
    fn test_allowed_change(#[case] from: DeviceState, #[case] to: DeviceState) {
        let mut lifecycle = lifecycle_in(from);
        let transition = lifecycle
            .change_state(to, TransitionCause::Command, 100)
            .unwrap();

        assert_eq!(transition.from, from);
        assert_eq!(transition.to, to);
        assert_eq!(lifecycle.state(), to);
        assert_eq!(lifecycle.entered_at(), 100);
    }

    #[rstest]
    #[case(DeviceState::Booked, DeviceState::Booked)]
    #[case(DeviceState::Broken, DeviceState::Available)]
    #[case(DeviceState::Reserved, DeviceState::Broken)]
    #[case(DeviceState::Init, DeviceState::Available)]
    #[case(DeviceState::ConnectingWifi, DeviceState::Connected)]
    fn test_refused_change_leaves_state(#[case] from: DeviceState, #[case] to: DeviceState) {
        let mut lifecycle = lifecycle_in(from);
        lifecycle.mark_entry_published(50);
        let history = lifecycle.history().len();

        let err = lifecycle
            .change_state(to, TransitionCause::Command, 100)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(lifecycle.state(), from);
        assert!(lifecycle.entry_published());
        assert_eq!(lifecycle.history().len(), history);
    }

    #[test]
    fn test_enter_same_state_is_noop() {
        let mut lifecycle = lifecycle_in(DeviceState::Error);
        assert!(
            lifecycle
                .enter(DeviceState::Error, TransitionCause::LinkLost, 10)
                .is_none()
        );
        assert_eq!(lifecycle.entered_at(), 0);
    }

    #[test]
    fn test_heartbeat_due_after_interval() {
        let mut lifecycle = lifecycle_in(DeviceState::Available);
        assert!(!lifecycle.heartbeat_due(50_000, 10_000));

        lifecycle.mark_entry_published(1_000);
        assert!(!lifecycle.heartbeat_due(10_999, 10_000));
        assert!(lifecycle.heartbeat_due(11_000, 10_000));

        lifecycle.mark_heartbeat(11_000);
        assert!(!lifecycle.heartbeat_due(11_010, 10_000));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut lifecycle = DeviceLifecycle::new(4);
        lifecycle.enter(DeviceState::Available, TransitionCause::Boot, 0);
        for i in 1..=10 {
            let target = if i % 2 == 0 {
                DeviceState::Available
            } else {
                DeviceState::Booked
            };
            lifecycle
                .change_state(target, TransitionCause::Command, i)
                .unwrap();
        }

        assert_eq!(lifecycle.history().len(), 4);
        assert_eq!(lifecycle.transition_count(), 11);
        assert_eq!(lifecycle.last_transition().map(|t| t.at), Some(10));
        assert_eq!(lifecycle.history().front().map(|t| t.at), Some(7));
    }

    #[test]
    fn test_zero_history_keeps_nothing() {
        let mut lifecycle = DeviceLifecycle::new(0);
        lifecycle.enter(DeviceState::Available, TransitionCause::Boot, 0);
        assert!(lifecycle.history().is_empty());
        assert_eq!(lifecycle.transition_count(), 1);
    }

    fn any_state() -> impl Strategy<Value = DeviceState> {
        (0usize..DeviceState::COUNT).prop_map(|i| DeviceState::ALL[i])
    }

    proptest! {
        #[test]
        fn prop_successful_change_clears_every_entry_flag(
            start in any_state(),
            requests in proptest::collection::vec(any_state(), 1..20),
        ) {
            let mut lifecycle = lifecycle_in(start);
            for (i, target) in requests.into_iter().enumerate() {
                lifecycle.mark_entry_published(i as Millis);
                let before = lifecycle.state();
                match lifecycle.change_state(target, TransitionCause::Command, i as Millis) {
                    Ok(_) => prop_assert!(!lifecycle.any_entry_published()),
                    Err(_) => {
                        prop_assert_eq!(lifecycle.state(), before);
                        prop_assert!(lifecycle.entry_published());
                    }
                }
            }
        }

        #[test]
        fn prop_change_agrees_with_table(from in any_state(), to in any_state()) {
            let mut lifecycle = lifecycle_in(from);
            let applied = lifecycle.change_state(to, TransitionCause::Command, 1).is_ok();
            prop_assert_eq!(applied, from.can_transition_to(to));
        }
    }
}
