//! Cooperative control loop.
//!
//! A [`Station`] owns every supervisor and every device. Each call to
//! [`Station::run_once`] services the transport and then ticks the components
//! in a fixed order:
//!
//! 1. inbound commands received since the last iteration
//! 2. connectivity supervision
//! 3. the lifecycle driver
//! 4. NFC health supervision
//! 5. card-tap debouncing (only while the reader is healthy)
//! 6. telemetry flush
//!
//! The device state is persisted at the end of the iteration when it differs
//! from the last stored value. Nothing inside an iteration waits on a timer;
//! the only blocking wait is link acquisition in [`Station::boot`].

use std::time::Duration;

use dock_core::{
    CommandEnvelope, DeviceId, DeviceState, LogDestination, LogSeverity, Millis, StationConfig,
};
use dock_hardware::{Clock, FirmwareVersion, NfcHardware, Transport, WirelessLink};
use dock_network::{ConnectivityEvent, ConnectivityStatus, ConnectivitySupervisor};
use dock_nfc::{CardTapDebouncer, NfcEvent, NfcHealthSupervisor, TapEvent, TapState};
use dock_protocol::TopicSet;
use dock_storage::StateStore;
use dock_telemetry::{FlushOutcome, TelemetryBuffer};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::commands::{CommandAuthority, CommandOutcome};
use crate::driver::{DriverContext, DriverReport, StatusDriver};
use crate::error::Result;
use crate::lifecycle::{DeviceLifecycle, TransitionCause};

/// Devices a station runs against.
pub struct Peripherals<C, W, T, N> {
    pub clock: C,
    pub wifi: W,
    pub transport: T,
    pub nfc: N,
}

/// What happened during [`Station::boot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    pub link_up: bool,
    pub transport_connected: bool,
    pub nfc_version: Option<FirmwareVersion>,
    pub restart_hint: Option<DeviceState>,
}

/// What happened during one [`Station::run_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    pub at: Millis,
    /// State at the end of the iteration.
    pub state: DeviceState,
    pub commands: Vec<CommandOutcome>,
    pub connectivity: Option<ConnectivityEvent>,
    pub driver: DriverReport,
    pub nfc: Option<NfcEvent>,
    pub tap: Option<TapEvent>,
    pub flush: FlushOutcome,
    /// Whether the state was written to the store.
    pub persisted: bool,
}

/// The dock station firmware.
pub struct Station<C, W, T, N, S> {
    config: StationConfig,
    device_id: DeviceId,
    topics: TopicSet,
    clock: C,
    wifi: W,
    transport: T,
    nfc: N,
    store: S,
    inbound: mpsc::Receiver<CommandEnvelope>,
    lifecycle: DeviceLifecycle,
    driver: StatusDriver,
    authority: CommandAuthority,
    connectivity: ConnectivitySupervisor,
    nfc_health: NfcHealthSupervisor,
    taps: CardTapDebouncer,
    telemetry: TelemetryBuffer,
    persisted: Option<DeviceState>,
    restart_hint: Option<DeviceState>,
    iterations: u64,
}

impl<C, W, T, N, S> Station<C, W, T, N, S>
where
    C: Clock,
    W: WirelessLink,
    T: Transport,
    N: NfcHardware,
    S: StateStore,
{
    /// Assemble a station and register its inbound command sink.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate or the device id is
    /// unusable in topic names.
    pub fn new(
        config: StationConfig,
        peripherals: Peripherals<C, W, T, N>,
        store: S,
    ) -> Result<Self> {
        config.validate()?;
        let device_id = config.device_id()?;
        let topics = TopicSet::new(&config.topic_prefix, &device_id);

        let Peripherals {
            clock,
            wifi,
            mut transport,
            nfc,
        } = peripherals;
        let (sink, inbound) = mpsc::channel(config.connectivity.inbound_queue_capacity.max(1));
        transport.set_inbound(sink);

        Ok(Self {
            device_id,
            clock,
            wifi,
            transport,
            nfc,
            store,
            inbound,
            lifecycle: DeviceLifecycle::new(config.lifecycle.history_size),
            driver: StatusDriver::new(&config.lifecycle),
            authority: CommandAuthority::new(topics.clone()),
            connectivity: ConnectivitySupervisor::new(&config.connectivity),
            nfc_health: NfcHealthSupervisor::new(&config.nfc),
            taps: CardTapDebouncer::new(&config.tap),
            telemetry: TelemetryBuffer::from_config(topics.logs(), &config.telemetry),
            topics,
            config,
            persisted: None,
            restart_hint: None,
            iterations: 0,
        })
    }

    /// Bring the station up before the control loop starts.
    ///
    /// Reads the restart hint, waits for the wireless link, connects the
    /// transport and initialises the NFC reader. Every failure here is
    /// recoverable from the loop, so boot itself never fails.
    pub async fn boot(&mut self) -> BootReport {
        info!(device = %self.device_id, version = dock_core::VERSION, "Dock station booting");

        match self.load_restart_hint().await {
            Ok(hint) => {
                self.restart_hint = hint;
                self.persisted = hint;
                match hint {
                    Some(state) => info!(%state, "Last persisted state"),
                    None => debug!("No persisted state"),
                }
            }
            Err(e) => warn!(error = %e, "Restart hint unavailable"),
        }

        let link_up = self.connectivity.acquire_link(&mut self.wifi).await;
        let now = self.clock.now_millis();

        let mut transport_connected = false;
        if link_up {
            let health = self
                .connectivity
                .ensure_transport_connected(&mut self.transport, &self.topics, now)
                .await;
            transport_connected = self.transport.is_connected();
            debug!(?health, "Transport at boot");
        }

        let nfc_version = match self.nfc_health.begin(&mut self.nfc, now).await {
            Ok(version) => {
                self.telemetry.log(
                    LogSeverity::Info,
                    LogDestination::Both,
                    format!("NFC reader ready, firmware {version}"),
                    now,
                );
                Some(version)
            }
            Err(e) => {
                self.telemetry.log(
                    LogSeverity::Error,
                    LogDestination::Both,
                    format!("NFC reader not found: {e}"),
                    now,
                );
                None
            }
        };

        BootReport {
            link_up,
            transport_connected,
            nfc_version,
            restart_hint: self.restart_hint,
        }
    }

    async fn load_restart_hint(&self) -> Result<Option<DeviceState>> {
        let Some(raw) = self.store.load(&self.config.storage.state_key).await? else {
            return Ok(None);
        };
        Ok(Some(DeviceState::from_u32(raw)?))
    }

    /// Run one iteration of the control loop.
    pub async fn run_once(&mut self) -> IterationReport {
        let now = self.clock.now_millis();
        self.iterations += 1;

        if let Err(e) = self.transport.poll().await {
            debug!(error = %e, "Transport poll failed");
        }

        let mut commands = Vec::new();
        while let Ok(envelope) = self.inbound.try_recv() {
            let outcome = self
                .authority
                .handle(
                    &envelope,
                    &mut self.lifecycle,
                    &mut self.telemetry,
                    &mut self.transport,
                    now,
                )
                .await;
            commands.push(outcome);
        }

        let connectivity = self.supervise_connectivity(now).await;

        let driver = {
            let mut ctx = DriverContext {
                lifecycle: &mut self.lifecycle,
                connectivity: &mut self.connectivity,
                telemetry: &mut self.telemetry,
                wifi: &mut self.wifi,
                transport: &mut self.transport,
                topics: &self.topics,
            };
            self.driver.tick(&mut ctx, now).await
        };

        let nfc = self.nfc_health.tick(&mut self.nfc, now).await;
        if let Some(event) = nfc {
            self.report_nfc_event(event, now);
        }

        let tap = if self.nfc_health.is_healthy() {
            self.taps.tick(&mut self.nfc, now).await
        } else {
            None
        };
        if let Some(tap) = &tap {
            self.telemetry.log(
                LogSeverity::Info,
                LogDestination::Both,
                format!("Card tap: {}", tap.identity),
                now,
            );
        }

        let flush = self.telemetry.tick(&mut self.transport, now).await;
        let persisted = self.persist_state().await;

        IterationReport {
            at: now,
            state: self.lifecycle.state(),
            commands,
            connectivity,
            driver,
            nfc,
            tap,
            flush,
            persisted,
        }
    }

    /// Run `iterations` loop iterations, sleeping the loop period between
    /// them.
    pub async fn run_until(&mut self, iterations: u64) -> Vec<IterationReport> {
        let period = Duration::from_millis(self.config.loop_period_ms);
        let mut reports = Vec::new();
        for i in 0..iterations {
            reports.push(self.run_once().await);
            if i + 1 < iterations {
                tokio::time::sleep(period).await;
            }
        }
        reports
    }

    async fn supervise_connectivity(&mut self, now: Millis) -> Option<ConnectivityEvent> {
        let state = self.lifecycle.state();
        let event = self
            .connectivity
            .tick(state, &mut self.wifi, &mut self.transport, &self.topics, now)
            .await?;

        match event {
            ConnectivityEvent::LinkLost => {
                self.telemetry.log(
                    LogSeverity::Error,
                    LogDestination::Both,
                    format!("WiFi lost in {state}, entering error state"),
                    now,
                );
                self.lifecycle
                    .enter(DeviceState::Error, TransitionCause::LinkLost, now);
            }
            ConnectivityEvent::RecoveryFailed {
                attempt,
                wifi_retries,
                transport_retries,
                reconnect_attempted,
            } => {
                let message = if reconnect_attempted {
                    format!(
                        "Recovery attempt {wifi_retries}/{} failed (transport retries {transport_retries})",
                        self.config.connectivity.max_wifi_retries
                    )
                } else {
                    format!("Max recovery attempts reached (attempt {attempt}), staying in error state")
                };
                self.telemetry
                    .log(LogSeverity::Warning, LogDestination::Both, message, now);
            }
            ConnectivityEvent::Recovered { subscribed } => {
                self.telemetry.log(
                    LogSeverity::Info,
                    LogDestination::Both,
                    format!("Recovered from error, {subscribed} command topics subscribed"),
                    now,
                );
                self.lifecycle
                    .enter(DeviceState::Connected, TransitionCause::Recovered, now);
            }
        }
        Some(event)
    }

    fn report_nfc_event(&mut self, event: NfcEvent, now: Millis) {
        let (severity, message) = match event {
            NfcEvent::HealthCheckFailed => (
                LogSeverity::Warning,
                "NFC health check failed, scheduling recovery".to_string(),
            ),
            NfcEvent::RecoveryStarted { attempt } => (
                LogSeverity::Warning,
                format!("NFC recovery attempt {attempt} starting"),
            ),
            NfcEvent::StepCompleted(_) => return,
            NfcEvent::Recovered {
                attempt,
                duration_ms,
                version,
            } => (
                LogSeverity::Info,
                format!(
                    "NFC recovered after {attempt} attempt(s) in {duration_ms} ms, firmware {version}"
                ),
            ),
            NfcEvent::RecoveryFailed {
                attempt,
                next_backoff_ms,
            } => (
                LogSeverity::Error,
                format!("NFC recovery attempt {attempt} failed, next try in {next_backoff_ms} ms"),
            ),
        };
        self.telemetry
            .log(severity, LogDestination::Both, message, now);
    }

    async fn persist_state(&mut self) -> bool {
        let state = self.lifecycle.state();
        if self.persisted == Some(state) {
            return false;
        }
        match self
            .store
            .store(&self.config.storage.state_key, state.to_u32())
            .await
        {
            Ok(()) => {
                self.persisted = Some(state);
                true
            }
            Err(e) => {
                warn!(%state, error = %e, "Persisting state failed, retrying next iteration");
                false
            }
        }
    }

    pub fn state(&self) -> DeviceState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &DeviceLifecycle {
        &self.lifecycle
    }

    /// State read from the store at boot. Informational only.
    pub fn restart_hint(&self) -> Option<DeviceState> {
        self.restart_hint
    }

    pub fn connectivity_status(&self) -> ConnectivityStatus {
        self.connectivity.status()
    }

    pub fn nfc_health(&self) -> &NfcHealthSupervisor {
        &self.nfc_health
    }

    pub fn tap_state(&self) -> &TapState {
        self.taps.state()
    }

    pub fn telemetry(&self) -> &TelemetryBuffer {
        &self.telemetry
    }

    pub fn command_authority(&self) -> &CommandAuthority {
        &self.authority
    }

    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}
