//! Per-state lifecycle driver.
//!
//! One driver serves every state. The bootstrap states walk the device from
//! `Init` to `Available`; the operational states share a single routine that
//! checks connectivity and announces the state on the retained status topic,
//! first on entry and then on every heartbeat.

use dock_core::config::LifecycleConfig;
use dock_core::{DeviceState, LogDestination, LogSeverity, Millis};
use dock_hardware::{Transport, WirelessLink};
use dock_network::{BootLink, ConnectivitySupervisor, TransportHealth};
use dock_protocol::TopicSet;
use dock_telemetry::TelemetryBuffer;
use tracing::debug;

use crate::lifecycle::{DeviceLifecycle, StateTransition, TransitionCause};

/// Status announcement made by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    Entry(DeviceState),
    Heartbeat(DeviceState),
}

/// What one driver tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub transition: Option<StateTransition>,
    pub announcement: Option<Announcement>,
}

/// Everything a driver tick reads or writes besides its own settings.
pub struct DriverContext<'a, W, T> {
    pub lifecycle: &'a mut DeviceLifecycle,
    pub connectivity: &'a mut ConnectivitySupervisor,
    pub telemetry: &'a mut TelemetryBuffer,
    pub wifi: &'a mut W,
    pub transport: &'a mut T,
    pub topics: &'a TopicSet,
}

/// Parameterised state driver.
#[derive(Debug, Clone)]
pub struct StatusDriver {
    config: LifecycleConfig,
}

impl StatusDriver {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run the current state's behaviour once.
    pub async fn tick<W, T>(&self, ctx: &mut DriverContext<'_, W, T>, now: Millis) -> DriverReport
    where
        W: WirelessLink,
        T: Transport,
    {
        match ctx.lifecycle.state() {
            DeviceState::Init => DriverReport {
                transition: ctx
                    .lifecycle
                    .enter(DeviceState::ConnectingWifi, TransitionCause::Boot, now),
                announcement: None,
            },
            DeviceState::ConnectingWifi => self.connecting(ctx, now).await,
            DeviceState::Connected => self.stabilizing(ctx, now),
            DeviceState::Error => DriverReport::default(),
            state => self.operational(ctx, state, now).await,
        }
    }

    async fn connecting<W, T>(&self, ctx: &mut DriverContext<'_, W, T>, now: Millis) -> DriverReport
    where
        W: WirelessLink,
        T: Transport,
    {
        let link = ctx
            .connectivity
            .poll_boot_link(ctx.wifi, now, self.config.boot_retry_interval_ms)
            .await;

        match link {
            BootLink::Up => DriverReport {
                transition: ctx
                    .lifecycle
                    .enter(DeviceState::Connected, TransitionCause::LinkUp, now),
                announcement: None,
            },
            BootLink::Retried { attempt } => {
                ctx.telemetry.log(
                    LogSeverity::Info,
                    LogDestination::Local,
                    format!("Attempting WiFi connection (attempt {attempt})"),
                    now,
                );
                DriverReport::default()
            }
            BootLink::Pending => DriverReport::default(),
        }
    }

    fn stabilizing<W: WirelessLink, T>(
        &self,
        ctx: &mut DriverContext<'_, W, T>,
        now: Millis,
    ) -> DriverReport {
        if !ctx.wifi.is_connected()
            || ctx.lifecycle.time_in_state(now) < self.config.stabilization_window_ms
        {
            return DriverReport::default();
        }

        ctx.telemetry.log(
            LogSeverity::Info,
            LogDestination::Both,
            "Status -> available (from CONNECTED)",
            now,
        );
        DriverReport {
            transition: ctx
                .lifecycle
                .enter(DeviceState::Available, TransitionCause::Stabilized, now),
            announcement: None,
        }
    }

    async fn operational<W, T>(
        &self,
        ctx: &mut DriverContext<'_, W, T>,
        state: DeviceState,
        now: Millis,
    ) -> DriverReport
    where
        W: WirelessLink,
        T: Transport,
    {
        if !ctx.wifi.is_connected() {
            ctx.connectivity.reset_retry_counters();
            ctx.telemetry.log(
                LogSeverity::Error,
                LogDestination::Both,
                format!("WiFi lost in {state}, entering error state"),
                now,
            );
            return DriverReport {
                transition: ctx.lifecycle.enter(DeviceState::Error, TransitionCause::LinkLost, now),
                announcement: None,
            };
        }

        match ctx
            .connectivity
            .ensure_transport_connected(ctx.transport, ctx.topics, now)
            .await
        {
            TransportHealth::Connected | TransportHealth::Reconnected { .. } => {}
            TransportHealth::Waiting => return DriverReport::default(),
            TransportHealth::Failed { retries } => {
                ctx.telemetry.log(
                    LogSeverity::Warning,
                    LogDestination::Local,
                    format!("Transport reconnect failed in {state} (retry {retries})"),
                    now,
                );
                return DriverReport::default();
            }
            TransportHealth::Escalate => {
                ctx.telemetry.log(
                    LogSeverity::Error,
                    LogDestination::Both,
                    format!("Transport retries exhausted in {state}, entering error state"),
                    now,
                );
                return DriverReport {
                    transition: ctx.lifecycle.enter(
                        DeviceState::Error,
                        TransitionCause::TransportExhausted,
                        now,
                    ),
                    announcement: None,
                };
            }
        }

        let announcement = if !ctx.lifecycle.entry_published() {
            Announcement::Entry(state)
        } else if ctx
            .lifecycle
            .heartbeat_due(now, self.config.heartbeat_interval_ms)
        {
            Announcement::Heartbeat(state)
        } else {
            return DriverReport::default();
        };

        let published = ctx
            .transport
            .publish(ctx.topics.status(), state.as_str(), true)
            .await;

        // A failed announcement still counts, the next one waits a full heartbeat.
        match announcement {
            Announcement::Entry(_) => ctx.lifecycle.mark_entry_published(now),
            Announcement::Heartbeat(_) => ctx.lifecycle.mark_heartbeat(now),
        }

        if let Err(e) = published {
            ctx.telemetry.log(
                LogSeverity::Warning,
                LogDestination::Both,
                format!(
                    "Status publish of {state} on {} failed: {e}",
                    ctx.topics.status()
                ),
                now,
            );
            return DriverReport::default();
        }

        match announcement {
            Announcement::Entry(_) => {
                ctx.telemetry.log(
                    LogSeverity::Info,
                    LogDestination::Both,
                    format!("Status -> {state}"),
                    now,
                );
            }
            Announcement::Heartbeat(_) => {
                ctx.telemetry.log(
                    LogSeverity::Info,
                    LogDestination::Remote,
                    format!("Status heartbeat: {state}"),
                    now,
                );
            }
        }
        debug!(?announcement, "Status published");

        DriverReport {
            transition: None,
            announcement: Some(announcement),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dock_core::DeviceId;
    use dock_core::config::ConnectivityConfig;
    use dock_hardware::mock::{MockTransport, MockTransportHandle, MockWireless, MockWirelessHandle};

    struct Rig {
        lifecycle: DeviceLifecycle,
        connectivity: ConnectivitySupervisor,
        telemetry: TelemetryBuffer,
        wifi: MockWireless,
        wifi_handle: MockWirelessHandle,
        transport: MockTransport,
        transport_handle: MockTransportHandle,
        topics: TopicSet,
        driver: StatusDriver,
    }

    impl Rig {
        fn new(state: DeviceState) -> Self {
            let (wifi, wifi_handle) = MockWireless::connected();
            let (transport, transport_handle) = MockTransport::connected();
            let mut lifecycle = DeviceLifecycle::default();
            lifecycle.enter(state, TransitionCause::Boot, 0);
            Self {
                lifecycle,
                connectivity: ConnectivitySupervisor::new(&ConnectivityConfig::default()),
                telemetry: TelemetryBuffer::new("esp/logs/d1", 10, 5_000),
                wifi,
                wifi_handle,
                transport,
                transport_handle,
                topics: TopicSet::new("esp", &DeviceId::new("d1").unwrap()),
                driver: StatusDriver::new(&LifecycleConfig::default()),
            }
        }

        async fn tick(&mut self, now: Millis) -> DriverReport {
            let mut ctx = DriverContext {
                lifecycle: &mut self.lifecycle,
                connectivity: &mut self.connectivity,
                telemetry: &mut self.telemetry,
                wifi: &mut self.wifi,
                transport: &mut self.transport,
                topics: &self.topics,
            };
            self.driver.tick(&mut ctx, now).await
        }

        fn remote_lines(&self) -> Vec<String> {
            self.telemetry
                .entries()
                .map(|entry| entry.message().to_string())
                .collect()
        }
    }

    #[tokio::test]
    async fn test_init_moves_to_connecting() {
        let mut rig = Rig::new(DeviceState::Init);
        let report = rig.tick(0).await;
        assert_eq!(report.transition.map(|t| t.to), Some(DeviceState::ConnectingWifi));
    }

    #[tokio::test]
    async fn test_connecting_waits_for_link() {
        let mut rig = Rig::new(DeviceState::ConnectingWifi);
        rig.wifi_handle.go_down();

        rig.tick(0).await;
        rig.tick(1_000).await;
        rig.tick(3_000).await;
        assert_eq!(rig.wifi_handle.reconnect_attempts(), 2);
        assert_eq!(rig.lifecycle.state(), DeviceState::ConnectingWifi);

        rig.wifi_handle.set_connected(true);
        let report = rig.tick(3_010).await;
        assert_eq!(report.transition.map(|t| t.to), Some(DeviceState::Connected));
    }

    #[tokio::test]
    async fn test_connected_promotes_after_window() {
        let mut rig = Rig::new(DeviceState::Connected);

        assert_eq!(rig.tick(1_999).await, DriverReport::default());
        let report = rig.tick(2_000).await;

        assert_eq!(report.transition.map(|t| t.to), Some(DeviceState::Available));
        assert_eq!(rig.lifecycle.state(), DeviceState::Available);
        assert_eq!(
            rig.remote_lines(),
            vec!["Status -> available (from CONNECTED)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_entry_then_heartbeat() {
        let mut rig = Rig::new(DeviceState::Available);

        let entry = rig.tick(100).await;
        assert_eq!(
            entry.announcement,
            Some(Announcement::Entry(DeviceState::Available))
        );
        let published = rig.transport_handle.last_published_to("esp/status/d1").unwrap();
        assert_eq!(published.payload, "available");
        assert!(published.retained);

        assert_eq!(rig.tick(10_099).await.announcement, None);
        assert_eq!(
            rig.tick(10_100).await.announcement,
            Some(Announcement::Heartbeat(DeviceState::Available))
        );
        assert_eq!(rig.transport_handle.published_to("esp/status/d1").len(), 2);
        assert_eq!(
            rig.remote_lines(),
            vec![
                "Status -> available".to_string(),
                "Status heartbeat: available".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_state_change_triggers_new_entry_publish() {
        let mut rig = Rig::new(DeviceState::Available);
        rig.tick(0).await;

        rig.lifecycle
            .change_state(DeviceState::Booked, TransitionCause::Command, 10)
            .unwrap();
        let report = rig.tick(20).await;

        assert_eq!(report.announcement, Some(Announcement::Entry(DeviceState::Booked)));
        assert_eq!(
            rig.transport_handle
                .last_published_to("esp/status/d1")
                .map(|p| p.payload),
            Some("booked".to_string())
        );
    }

    #[tokio::test]
    async fn test_link_down_forces_error_without_publishing() {
        let mut rig = Rig::new(DeviceState::Booked);
        rig.wifi_handle.go_down();

        let report = rig.tick(0).await;

        assert_eq!(report.transition.map(|t| t.cause), Some(TransitionCause::LinkLost));
        assert_eq!(rig.lifecycle.state(), DeviceState::Error);
        assert!(rig.transport_handle.published().is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_waits_for_next_heartbeat() {
        let mut rig = Rig::new(DeviceState::Available);
        rig.transport_handle.set_reject_publishes(true);

        for now in (0..1_000).step_by(10) {
            assert_eq!(rig.tick(now).await.announcement, None);
        }
        assert_eq!(rig.transport_handle.publish_attempts(), 1);
        assert!(rig.lifecycle.entry_published());
        assert!(
            rig.remote_lines()
                .iter()
                .any(|line| line.contains("Status publish of available") && line.contains("failed"))
        );

        rig.transport_handle.set_reject_publishes(false);
        assert_eq!(rig.tick(9_990).await.announcement, None);
        assert_eq!(
            rig.tick(10_000).await.announcement,
            Some(Announcement::Heartbeat(DeviceState::Available))
        );
        assert_eq!(rig.transport_handle.publish_attempts(), 2);
    }

    #[tokio::test]
    async fn test_transport_exhaustion_enters_error() {
        let mut rig = Rig::new(DeviceState::Available);
        rig.transport_handle.drop_connection();

        rig.tick(0).await;
        rig.tick(5_000).await;
        assert_eq!(rig.lifecycle.state(), DeviceState::Available);

        let report = rig.tick(10_000).await;
        assert_eq!(
            report.transition.map(|t| t.cause),
            Some(TransitionCause::TransportExhausted)
        );
        assert_eq!(rig.connectivity.status().transport_retry_count, 0);
    }

    #[tokio::test]
    async fn test_error_state_is_left_to_connectivity() {
        let mut rig = Rig::new(DeviceState::Error);
        assert_eq!(rig.tick(0).await, DriverReport::default());
        assert_eq!(rig.wifi_handle.reconnect_attempts(), 0);
    }
}
