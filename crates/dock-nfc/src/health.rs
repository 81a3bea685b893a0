//! NFC reader health supervision and staged recovery.
//!
//! The reader chip occasionally stops answering on its bus. While it is
//! healthy, its firmware version is probed periodically. When a probe fails
//! the supervisor schedules a recovery attempt, which walks through five timed
//! steps, one step per tick at most:
//!
//! | step | action | wait before next step |
//! |---|---|---|
//! | 0 | stop the bus | `bus_restart_delay_ms` (10 ms) |
//! | 1 | restart the bus with fixed settings | `bus_restart_delay_ms` (10 ms) |
//! | 2 | drive the reset line low | `reset_low_ms` (30 ms) |
//! | 3 | release the reset line | `reset_stabilize_ms` (150 ms) |
//! | 4 | reinitialise and confirm the chip answers | |
//!
//! A failed attempt doubles the backoff before the next one, up to
//! `backoff_max_ms`. A successful one resets it.
//!
//! ```text
//!             probe fails              backoff elapsed
//!   Healthy ──────────────> Unhealthy ─────────────────> Recovering(step 0..4)
//!      ^                        ^                               │
//!      │                        └──────── reinit fails ─────────┤
//!      └──────────────────────────────── reinit succeeds ───────┘
//! ```

use dock_core::config::NfcConfig;
use dock_core::{Millis, elapsed};
use dock_hardware::{BusSettings, FirmwareVersion, NfcHardware, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// One step of a recovery attempt, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryStep {
    StopBus,
    RestartBus,
    AssertReset,
    ReleaseReset,
    Reinitialize,
}

impl RecoveryStep {
    /// Zero-based position of the step.
    pub fn index(self) -> u8 {
        match self {
            RecoveryStep::StopBus => 0,
            RecoveryStep::RestartBus => 1,
            RecoveryStep::AssertReset => 2,
            RecoveryStep::ReleaseReset => 3,
            RecoveryStep::Reinitialize => 4,
        }
    }
}

impl fmt::Display for RecoveryStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RecoveryStep::StopBus => "stop bus",
            RecoveryStep::RestartBus => "restart bus",
            RecoveryStep::AssertReset => "assert reset",
            RecoveryStep::ReleaseReset => "release reset",
            RecoveryStep::Reinitialize => "reinitialize",
        };
        write!(f, "{name}")
    }
}

/// Health of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NfcHealth {
    Healthy,
    Unhealthy,
    /// A recovery attempt is in progress; the step is the next one to run.
    Recovering(RecoveryStep),
}

impl fmt::Display for NfcHealth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NfcHealth::Healthy => write!(f, "healthy"),
            NfcHealth::Unhealthy => write!(f, "unhealthy"),
            NfcHealth::Recovering(step) => write!(f, "recovering ({step})"),
        }
    }
}

/// Noteworthy result of one supervisor tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcEvent {
    /// The periodic probe failed; recovery is scheduled.
    HealthCheckFailed,
    RecoveryStarted { attempt: u32 },
    StepCompleted(RecoveryStep),
    Recovered {
        attempt: u32,
        duration_ms: Millis,
        version: FirmwareVersion,
    },
    RecoveryFailed { attempt: u32, next_backoff_ms: Millis },
}

/// Owner of the reader's health state and recovery bookkeeping.
///
/// # Examples
///
/// ```
/// use dock_core::config::NfcConfig;
/// use dock_hardware::mock::MockNfc;
/// use dock_nfc::{NfcEvent, NfcHealth, NfcHealthSupervisor};
///
/// #[tokio::main]
/// async fn main() {
///     let (mut reader, _handle) = MockNfc::unresponsive();
///     let mut supervisor = NfcHealthSupervisor::new(&NfcConfig::default());
///
///     assert!(supervisor.begin(&mut reader, 0).await.is_err());
///     assert_eq!(supervisor.health(), NfcHealth::Unhealthy);
///
///     // The first attempt is eligible straight away.
///     let event = supervisor.tick(&mut reader, 1).await;
///     assert_eq!(event, Some(NfcEvent::RecoveryStarted { attempt: 1 }));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct NfcHealthSupervisor {
    config: NfcConfig,
    health: NfcHealth,
    backoff_ms: Millis,
    attempt_count: u32,
    recovery_started_at: Millis,
    /// `None` makes the next attempt eligible immediately.
    last_attempt_at: Option<Millis>,
    next_action_at: Millis,
    last_health_check_at: Millis,
}

impl NfcHealthSupervisor {
    /// Create a supervisor for a reader that has not been initialised yet.
    pub fn new(config: &NfcConfig) -> Self {
        Self {
            config: config.clone(),
            health: NfcHealth::Unhealthy,
            backoff_ms: config.backoff_initial_ms,
            attempt_count: 0,
            recovery_started_at: 0,
            last_attempt_at: None,
            next_action_at: 0,
            last_health_check_at: 0,
        }
    }

    /// Initialise the reader at boot.
    ///
    /// On failure the reader stays unhealthy and the first recovery attempt is
    /// eligible on the next tick.
    ///
    /// # Errors
    ///
    /// Returns the hardware error if the chip did not answer.
    pub async fn begin<N: NfcHardware>(
        &mut self,
        hw: &mut N,
        now: Millis,
    ) -> Result<FirmwareVersion> {
        hw.release_reset();
        hw.start_bus(self.bus_settings());

        match hw.reinitialize().await {
            Ok(version) => {
                info!(%version, "NFC reader found");
                self.reset_to_healthy(now);
                Ok(version)
            }
            Err(e) => {
                error!(error = %e, "NFC reader not found, check wiring");
                self.health = NfcHealth::Unhealthy;
                self.last_attempt_at = None;
                Err(e)
            }
        }
    }

    /// Advance health supervision by at most one action.
    pub async fn tick<N: NfcHardware>(&mut self, hw: &mut N, now: Millis) -> Option<NfcEvent> {
        match self.health {
            NfcHealth::Healthy => {
                if elapsed(now, self.last_health_check_at) < self.config.health_check_interval_ms {
                    return None;
                }
                if self.health_check(hw, now).await {
                    None
                } else {
                    Some(NfcEvent::HealthCheckFailed)
                }
            }
            NfcHealth::Unhealthy => {
                let eligible = self
                    .last_attempt_at
                    .is_none_or(|last| elapsed(now, last) >= self.backoff_ms);
                if !eligible {
                    return None;
                }
                Some(self.start_recovery(now))
            }
            NfcHealth::Recovering(step) => {
                if now < self.next_action_at {
                    return None;
                }
                Some(self.run_step(hw, step, now).await)
            }
        }
    }

    /// Probe the chip if it is believed healthy.
    ///
    /// Returns `false` without probing when the reader is not healthy. A
    /// failed probe marks the reader unhealthy.
    pub async fn health_check<N: NfcHardware>(&mut self, hw: &mut N, now: Millis) -> bool {
        if self.health != NfcHealth::Healthy {
            return false;
        }
        self.last_health_check_at = now;

        match hw.probe_firmware_version().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "NFC health check failed");
                self.mark_unhealthy();
                false
            }
        }
    }

    /// Schedule recovery after an observed fault.
    ///
    /// Has no effect while a recovery attempt is already running. Otherwise
    /// recovery bookkeeping is cleared and a fresh attempt becomes eligible
    /// immediately, with the current backoff kept.
    pub fn mark_unhealthy(&mut self) {
        if self.is_recovering() {
            return;
        }
        self.health = NfcHealth::Unhealthy;
        self.next_action_at = 0;
        self.attempt_count = 0;
        self.recovery_started_at = 0;
        self.last_attempt_at = None;
        warn!("NFC reader marked unhealthy, scheduling recovery");
    }

    fn start_recovery(&mut self, now: Millis) -> NfcEvent {
        self.attempt_count += 1;
        self.last_attempt_at = Some(now);
        self.recovery_started_at = now;
        self.next_action_at = now;
        self.health = NfcHealth::Recovering(RecoveryStep::StopBus);
        warn!(attempt = self.attempt_count, "NFC recovery attempt starting");
        NfcEvent::RecoveryStarted {
            attempt: self.attempt_count,
        }
    }

    async fn run_step<N: NfcHardware>(
        &mut self,
        hw: &mut N,
        step: RecoveryStep,
        now: Millis,
    ) -> NfcEvent {
        let next = match step {
            RecoveryStep::StopBus => {
                warn!("NFC recovery: restarting bus");
                hw.stop_bus();
                (RecoveryStep::RestartBus, self.config.bus_restart_delay_ms)
            }
            RecoveryStep::RestartBus => {
                hw.start_bus(self.bus_settings());
                (RecoveryStep::AssertReset, self.config.bus_restart_delay_ms)
            }
            RecoveryStep::AssertReset => {
                hw.assert_reset();
                (RecoveryStep::ReleaseReset, self.config.reset_low_ms)
            }
            RecoveryStep::ReleaseReset => {
                hw.release_reset();
                (RecoveryStep::Reinitialize, self.config.reset_stabilize_ms)
            }
            RecoveryStep::Reinitialize => return self.finish_recovery(hw, now).await,
        };

        let (next_step, delay) = next;
        debug!(%step, delay_ms = delay, "NFC recovery step done");
        self.health = NfcHealth::Recovering(next_step);
        self.next_action_at = now.saturating_add(delay);
        NfcEvent::StepCompleted(step)
    }

    async fn finish_recovery<N: NfcHardware>(&mut self, hw: &mut N, now: Millis) -> NfcEvent {
        let attempt = self.attempt_count;
        match hw.reinitialize().await {
            Ok(version) => {
                let duration_ms = elapsed(now, self.recovery_started_at);
                info!(attempt, duration_ms, %version, "NFC recovery successful");
                self.reset_to_healthy(now);
                NfcEvent::Recovered {
                    attempt,
                    duration_ms,
                    version,
                }
            }
            Err(e) => {
                self.health = NfcHealth::Unhealthy;
                self.last_attempt_at = Some(now);
                self.backoff_ms = self
                    .backoff_ms
                    .saturating_mul(2)
                    .min(self.config.backoff_max_ms);
                error!(
                    attempt,
                    error = %e,
                    next_backoff_ms = self.backoff_ms,
                    "NFC recovery failed"
                );
                NfcEvent::RecoveryFailed {
                    attempt,
                    next_backoff_ms: self.backoff_ms,
                }
            }
        }
    }

    fn reset_to_healthy(&mut self, now: Millis) {
        self.health = NfcHealth::Healthy;
        self.backoff_ms = self.config.backoff_initial_ms;
        self.attempt_count = 0;
        self.recovery_started_at = 0;
        self.last_attempt_at = None;
        self.next_action_at = 0;
        self.last_health_check_at = now;
    }

    fn bus_settings(&self) -> BusSettings {
        BusSettings::new(self.config.bus_clock_hz, self.config.bus_timeout_ms)
    }

    pub fn health(&self) -> NfcHealth {
        self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health == NfcHealth::Healthy
    }

    pub fn is_recovering(&self) -> bool {
        matches!(self.health, NfcHealth::Recovering(_))
    }

    /// Delay required between the end of a failed attempt and the next one.
    pub fn backoff_ms(&self) -> Millis {
        self.backoff_ms
    }

    /// Attempts since the last success or the last fresh fault.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn next_action_at(&self) -> Millis {
        self.next_action_at
    }

    pub fn last_attempt_at(&self) -> Option<Millis> {
        self.last_attempt_at
    }
}
