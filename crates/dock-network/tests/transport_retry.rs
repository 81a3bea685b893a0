//! Integration tests for transport retry pacing and escalation.

use dock_core::DeviceId;
use dock_core::config::ConnectivityConfig;
use dock_hardware::mock::MockTransport;
use dock_network::{ConnectivitySupervisor, TransportHealth};
use dock_protocol::TopicSet;

fn topics() -> TopicSet {
    TopicSet::new("esp", &DeviceId::new("dock-01").unwrap())
}

/// Three failed reconnects spaced by the retry interval escalate on the third
/// and leave the counter at zero.
#[tokio::test]
async fn test_third_failure_escalates() {
    let (mut transport, handle) = MockTransport::new();
    handle.set_accept_connect(false);
    let mut supervisor = ConnectivitySupervisor::new(&ConnectivityConfig::default());
    let topics = topics();

    let first = supervisor
        .ensure_transport_connected(&mut transport, &topics, 0)
        .await;
    let second = supervisor
        .ensure_transport_connected(&mut transport, &topics, 5_000)
        .await;
    let third = supervisor
        .ensure_transport_connected(&mut transport, &topics, 10_000)
        .await;

    assert_eq!(first, TransportHealth::Failed { retries: 1 });
    assert_eq!(second, TransportHealth::Failed { retries: 2 });
    assert_eq!(third, TransportHealth::Escalate);
    assert_eq!(supervisor.status().transport_retry_count, 0);
    assert_eq!(handle.connect_attempts(), 3);
}

/// Calls between attempts do not touch the transport.
#[tokio::test]
async fn test_attempts_are_rate_limited() {
    let (mut transport, handle) = MockTransport::new();
    handle.set_accept_connect(false);
    let mut supervisor = ConnectivitySupervisor::new(&ConnectivityConfig::default());
    let topics = topics();

    supervisor
        .ensure_transport_connected(&mut transport, &topics, 0)
        .await;
    for now in (10..5_000).step_by(10) {
        assert_eq!(
            supervisor
                .ensure_transport_connected(&mut transport, &topics, now)
                .await,
            TransportHealth::Waiting
        );
    }

    assert_eq!(handle.connect_attempts(), 1);
    assert_eq!(supervisor.status().transport_retry_count, 1);
}

/// A successful reconnect after failures clears the counter and subscribes
/// every command topic again.
#[tokio::test]
async fn test_reconnect_after_failures() {
    let (mut transport, handle) = MockTransport::new();
    handle.set_accept_connect(false);
    let mut supervisor = ConnectivitySupervisor::new(&ConnectivityConfig::default());
    let topics = topics();

    supervisor
        .ensure_transport_connected(&mut transport, &topics, 0)
        .await;
    handle.set_accept_connect(true);
    let health = supervisor
        .ensure_transport_connected(&mut transport, &topics, 5_000)
        .await;

    assert_eq!(health, TransportHealth::Reconnected { subscribed: 12 });
    assert_eq!(supervisor.status().transport_retry_count, 0);
    assert!(
        handle
            .subscriptions()
            .contains(&"esp/commands/booking/dock-01".to_string())
    );
}

/// A dropped session is noticed on the next call.
#[tokio::test]
async fn test_dropped_session_is_reconnected() {
    let (mut transport, handle) = MockTransport::connected();
    let mut supervisor = ConnectivitySupervisor::new(&ConnectivityConfig::default());
    let topics = topics();

    assert_eq!(
        supervisor
            .ensure_transport_connected(&mut transport, &topics, 0)
            .await,
        TransportHealth::Connected
    );

    handle.drop_connection();
    handle.set_accept_connect(true);
    assert!(matches!(
        supervisor
            .ensure_transport_connected(&mut transport, &topics, 10)
            .await,
        TransportHealth::Reconnected { .. }
    ));
}
