//! Wireless link and transport supervision.
//!
//! The supervisor owns every retry counter and attempt timestamp of the
//! station's two connections. It never changes the lifecycle state itself:
//! each call reports what happened and the caller decides which transition to
//! apply.
//!
//! # Retry policy
//!
//! - **Boot**: while connecting for the first time, the wireless link is asked
//!   to reconnect at most once per boot retry interval (3000 ms).
//! - **Link loss**: losing the link in a state that needs it is reported at
//!   once and both retry counters are reset.
//! - **Error recovery**: at most one attempt per `recovery_interval_ms`
//!   (5000 ms). An attempt reconnects the link, then the transport, then
//!   re-subscribes every command topic.
//! - **Transport**: at most one reconnect per `transport_retry_interval_ms`
//!   (5000 ms). The failure that exhausts `max_transport_retries` (3)
//!   escalates.

use dock_core::config::ConnectivityConfig;
use dock_core::{DeviceState, Millis, elapsed};
use dock_hardware::{Transport, WirelessLink};
use dock_protocol::TopicSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Snapshot of both connections and their retry bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    pub wifi_connected: bool,
    pub transport_connected: bool,
    pub wifi_retry_count: u32,
    pub transport_retry_count: u32,
    pub last_wifi_attempt: Option<Millis>,
    pub last_transport_attempt: Option<Millis>,
}

/// Lifecycle-relevant outcome of [`ConnectivitySupervisor::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The link dropped in a state that requires it. Counters were reset.
    LinkLost,
    /// A recovery attempt ran and the station is still offline.
    RecoveryFailed {
        /// Failed recovery attempts since the last success, not capped.
        attempt: u32,
        /// Wireless retries, capped at `max_wifi_retries`.
        wifi_retries: u32,
        transport_retries: u32,
        /// `false` once the wireless retry cap is reached.
        reconnect_attempted: bool,
    },
    /// Link and transport are back and command topics re-subscribed.
    Recovered { subscribed: usize },
}

/// Outcome of [`ConnectivitySupervisor::ensure_transport_connected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportHealth {
    /// Session already up.
    Connected,
    /// Session down, next reconnect not due yet.
    Waiting,
    /// Session re-established and command topics re-subscribed.
    Reconnected { subscribed: usize },
    /// Reconnect failed; `retries` consecutive failures so far.
    Failed { retries: u32 },
    /// Retry budget exhausted. The counter was reset.
    Escalate,
}

/// Outcome of [`ConnectivitySupervisor::poll_boot_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootLink {
    Up,
    /// A reconnect was just requested.
    Retried { attempt: u32 },
    /// Link down, next reconnect not due yet.
    Pending,
}

/// Owner of connectivity retry state.
///
/// # Examples
///
/// ```
/// use dock_core::config::ConnectivityConfig;
/// use dock_core::{DeviceId, DeviceState};
/// use dock_hardware::mock::{MockTransport, MockWireless};
/// use dock_network::{ConnectivityEvent, ConnectivitySupervisor};
/// use dock_protocol::TopicSet;
///
/// #[tokio::main]
/// async fn main() {
///     let (mut link, link_handle) = MockWireless::connected();
///     let (mut transport, _) = MockTransport::connected();
///     let topics = TopicSet::new("esp", &DeviceId::new("d1").unwrap());
///     let mut supervisor = ConnectivitySupervisor::new(&ConnectivityConfig::default());
///
///     link_handle.go_down();
///     let event = supervisor
///         .tick(DeviceState::Available, &mut link, &mut transport, &topics, 0)
///         .await;
///     assert_eq!(event, Some(ConnectivityEvent::LinkLost));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectivitySupervisor {
    config: ConnectivityConfig,
    status: ConnectivityStatus,
    last_recovery_attempt: Option<Millis>,
    failed_recoveries: u32,
}

impl ConnectivitySupervisor {
    pub fn new(config: &ConnectivityConfig) -> Self {
        Self {
            config: config.clone(),
            status: ConnectivityStatus::default(),
            last_recovery_attempt: None,
            failed_recoveries: 0,
        }
    }

    /// Supervise connections for the current lifecycle state.
    ///
    /// Detects link loss in states that need the link and runs recovery while
    /// in `Error`. Returns `None` when nothing the lifecycle cares about
    /// happened.
    pub async fn tick<W, T>(
        &mut self,
        state: DeviceState,
        wifi: &mut W,
        transport: &mut T,
        topics: &TopicSet,
        now: Millis,
    ) -> Option<ConnectivityEvent>
    where
        W: WirelessLink,
        T: Transport,
    {
        self.observe(wifi, transport);

        if state.requires_link() && !self.status.wifi_connected {
            error!(%state, "Wireless link lost, entering error state");
            self.reset_retry_counters();
            return Some(ConnectivityEvent::LinkLost);
        }

        if state == DeviceState::Error {
            return self.recover(wifi, transport, topics, now).await;
        }

        None
    }

    /// Ask the link to come up while bootstrapping.
    pub async fn poll_boot_link<W: WirelessLink>(
        &mut self,
        wifi: &mut W,
        now: Millis,
        retry_interval_ms: Millis,
    ) -> BootLink {
        self.status.wifi_connected = wifi.is_connected();
        if self.status.wifi_connected {
            info!("Wireless link up");
            self.status.wifi_retry_count = 0;
            return BootLink::Up;
        }

        if self
            .status
            .last_wifi_attempt
            .is_some_and(|last| elapsed(now, last) < retry_interval_ms)
        {
            return BootLink::Pending;
        }

        self.status.last_wifi_attempt = Some(now);
        self.status.wifi_retry_count = self.status.wifi_retry_count.saturating_add(1);
        info!(attempt = self.status.wifi_retry_count, "Attempting wireless connection");
        if let Err(e) = wifi.reconnect().await {
            debug!(error = %e, "Wireless reconnect request failed");
        }
        BootLink::Retried {
            attempt: self.status.wifi_retry_count,
        }
    }

    /// Wait for the link once at boot, before the control loop starts.
    ///
    /// Issues one reconnect, then polls every `boot_link_poll_ms` for up to
    /// `boot_link_timeout_ms`. This is the only blocking wait of the firmware.
    pub async fn acquire_link<W: WirelessLink>(&mut self, wifi: &mut W) -> bool {
        if wifi.is_connected() {
            self.status.wifi_connected = true;
            return true;
        }

        info!(
            timeout_ms = self.config.boot_link_timeout_ms,
            "Waiting for wireless link"
        );
        if let Err(e) = wifi.reconnect().await {
            debug!(error = %e, "Wireless reconnect request failed");
        }

        let poll_ms = self.config.boot_link_poll_ms.max(1);
        let polls = self.config.boot_link_timeout_ms / poll_ms;
        for _ in 0..polls {
            if wifi.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(poll_ms)).await;
        }

        self.status.wifi_connected = wifi.is_connected();
        if self.status.wifi_connected {
            info!("Wireless link acquired");
        } else {
            warn!("Wireless link not available at boot, continuing offline");
        }
        self.status.wifi_connected
    }

    /// Keep the transport session up.
    ///
    /// Called from every operational-state driver tick.
    pub async fn ensure_transport_connected<T: Transport>(
        &mut self,
        transport: &mut T,
        topics: &TopicSet,
        now: Millis,
    ) -> TransportHealth {
        if transport.is_connected() {
            self.status.transport_connected = true;
            self.status.transport_retry_count = 0;
            return TransportHealth::Connected;
        }
        self.status.transport_connected = false;

        if self.status.last_transport_attempt.is_some_and(|last| {
            elapsed(now, last) < self.config.transport_retry_interval_ms
        }) {
            return TransportHealth::Waiting;
        }

        match self.connect_transport(transport, topics, now).await {
            Some(subscribed) => TransportHealth::Reconnected { subscribed },
            None if self.status.transport_retry_count >= self.config.max_transport_retries => {
                error!(
                    retries = self.status.transport_retry_count,
                    "Transport retry budget exhausted"
                );
                self.status.transport_retry_count = 0;
                TransportHealth::Escalate
            }
            None => TransportHealth::Failed {
                retries: self.status.transport_retry_count,
            },
        }
    }

    /// Subscribe to every command topic. Returns how many succeeded.
    pub async fn subscribe_all<T: Transport>(&self, transport: &mut T, topics: &TopicSet) -> usize {
        let mut subscribed = 0;
        for topic in topics.command_topics() {
            match transport.subscribe(topic).await {
                Ok(()) => subscribed += 1,
                Err(e) => warn!(topic, error = %e, "Subscribe failed"),
            }
        }
        debug!(subscribed, "Command topics subscribed");
        subscribed
    }

    pub fn reset_retry_counters(&mut self) {
        self.status.wifi_retry_count = 0;
        self.status.transport_retry_count = 0;
        self.failed_recoveries = 0;
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.status
    }

    fn observe<W: WirelessLink, T: Transport>(&mut self, wifi: &W, transport: &T) {
        self.status.wifi_connected = wifi.is_connected();
        self.status.transport_connected = transport.is_connected();
    }

    async fn recover<W, T>(
        &mut self,
        wifi: &mut W,
        transport: &mut T,
        topics: &TopicSet,
        now: Millis,
    ) -> Option<ConnectivityEvent>
    where
        W: WirelessLink,
        T: Transport,
    {
        if self
            .last_recovery_attempt
            .is_some_and(|last| elapsed(now, last) < self.config.recovery_interval_ms)
        {
            return None;
        }
        self.last_recovery_attempt = Some(now);

        let reconnect_attempted = self.status.wifi_retry_count < self.config.max_wifi_retries;
        if reconnect_attempted {
            self.status.last_wifi_attempt = Some(now);
            if let Err(e) = wifi.reconnect().await {
                debug!(error = %e, "Wireless reconnect request failed");
            }
        }
        self.status.wifi_connected = wifi.is_connected();

        if !self.status.wifi_connected {
            self.status.wifi_retry_count = self
                .status
                .wifi_retry_count
                .saturating_add(1)
                .min(self.config.max_wifi_retries);
            if reconnect_attempted {
                info!(
                    attempt = self.status.wifi_retry_count,
                    max = self.config.max_wifi_retries,
                    "Recovery attempt failed, link still down"
                );
            } else {
                error!(
                    attempt = self.failed_recoveries.saturating_add(1),
                    "Max recovery attempts reached, staying in error state"
                );
            }
            return Some(self.recovery_failed(reconnect_attempted));
        }

        let subscribed = if transport.is_connected() {
            self.status.transport_connected = true;
            self.subscribe_all(transport, topics).await
        } else {
            match self.connect_transport(transport, topics, now).await {
                Some(subscribed) => subscribed,
                None => return Some(self.recovery_failed(reconnect_attempted)),
            }
        };

        info!("Recovered, link and transport up");
        self.reset_retry_counters();
        Some(ConnectivityEvent::Recovered { subscribed })
    }

    /// One transport reconnect. Returns the subscription count on success.
    async fn connect_transport<T: Transport>(
        &mut self,
        transport: &mut T,
        topics: &TopicSet,
        now: Millis,
    ) -> Option<usize> {
        self.status.last_transport_attempt = Some(now);
        match transport.connect().await {
            Ok(()) => {
                info!("Transport connected");
                self.status.transport_connected = true;
                self.status.transport_retry_count = 0;
                Some(self.subscribe_all(transport, topics).await)
            }
            Err(e) => {
                self.status.transport_connected = false;
                self.status.transport_retry_count =
                    self.status.transport_retry_count.saturating_add(1);
                warn!(
                    retries = self.status.transport_retry_count,
                    error = %e,
                    "Transport reconnect failed"
                );
                None
            }
        }
    }

    fn recovery_failed(&mut self, reconnect_attempted: bool) -> ConnectivityEvent {
        self.failed_recoveries = self.failed_recoveries.saturating_add(1);
        ConnectivityEvent::RecoveryFailed {
            attempt: self.failed_recoveries,
            wifi_retries: self.status.wifi_retry_count,
            transport_retries: self.status.transport_retry_count,
            reconnect_attempted,
        }
    }
}
