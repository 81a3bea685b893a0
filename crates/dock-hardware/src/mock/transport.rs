//! Mock publish/subscribe transport.

use super::lock;
use crate::{HardwareError, Result, traits::Transport};
use dock_core::CommandEnvelope;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One message accepted by the mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retained: bool,
}

#[derive(Debug, Default)]
struct TransportState {
    connected: bool,
    accept_connect: bool,
    connect_attempts: u32,
    reject_publishes: bool,
    publish_script: VecDeque<bool>,
    publish_attempts: u32,
    published: Vec<Published>,
    subscriptions: Vec<String>,
    inbound: Option<mpsc::Sender<CommandEnvelope>>,
}

/// Simulated broker session.
///
/// Accepted publishes and subscriptions are recorded for inspection. Publish
/// outcomes can be scripted one call at a time, which makes partial flush
/// failures reproducible.
///
/// # Examples
///
/// ```
/// use dock_hardware::mock::MockTransport;
/// use dock_hardware::traits::Transport;
///
/// #[tokio::main]
/// async fn main() {
///     let (mut transport, handle) = MockTransport::connected();
///
///     handle.script_publish_results([true, false]);
///     assert!(transport.publish("esp/logs/d1", "one", false).await.is_ok());
///     assert!(transport.publish("esp/logs/d1", "two", false).await.is_err());
///
///     assert_eq!(handle.published_to("esp/logs/d1"), vec!["one".to_string()]);
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    /// Create a disconnected transport that accepts connection attempts.
    pub fn new() -> (Self, MockTransportHandle) {
        let state = Arc::new(Mutex::new(TransportState {
            accept_connect: true,
            ..TransportState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockTransportHandle { state },
        )
    }

    /// Create a transport with an established session.
    pub fn connected() -> (Self, MockTransportHandle) {
        let (transport, handle) = Self::new();
        handle.set_connected(true);
        (transport, handle)
    }
}

impl Transport for MockTransport {
    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    async fn connect(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.connect_attempts += 1;
        if state.accept_connect {
            state.connected = true;
            Ok(())
        } else {
            Err(HardwareError::communication("broker refused connection"))
        }
    }

    async fn publish(&mut self, topic: &str, payload: &str, retained: bool) -> Result<()> {
        let mut state = lock(&self.state);
        state.publish_attempts += 1;
        if !state.connected {
            return Err(HardwareError::NotConnected);
        }
        let scripted = state.publish_script.pop_front().unwrap_or(true);
        if !scripted || state.reject_publishes {
            return Err(HardwareError::publish_failed(topic));
        }
        state.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retained,
        });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(HardwareError::subscribe_failed(topic));
        }
        state.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn set_inbound(&mut self, sink: mpsc::Sender<CommandEnvelope>) {
        lock(&self.state).inbound = Some(sink);
    }
}

/// Handle for controlling a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransportHandle {
    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }

    /// Whether future `connect` calls succeed.
    pub fn set_accept_connect(&self, accept: bool) {
        lock(&self.state).accept_connect = accept;
    }

    /// Drop the session and refuse reconnects.
    pub fn drop_connection(&self) {
        let mut state = lock(&self.state);
        state.connected = false;
        state.accept_connect = false;
    }

    /// Queue outcomes for the next publish calls, `false` meaning failure.
    ///
    /// Once the script runs out, publishes succeed again.
    pub fn script_publish_results(&self, results: impl IntoIterator<Item = bool>) {
        lock(&self.state).publish_script.extend(results);
    }

    /// Make every publish fail until reset.
    pub fn set_reject_publishes(&self, reject: bool) {
        lock(&self.state).reject_publishes = reject;
    }

    /// Push an inbound message into the registered sink.
    ///
    /// # Errors
    ///
    /// Returns an error if no sink was registered or the sink is full.
    pub fn deliver(&self, topic: &str, payload: &str) -> Result<()> {
        let state = lock(&self.state);
        let sink = state
            .inbound
            .as_ref()
            .ok_or_else(|| HardwareError::other("no inbound sink registered"))?;
        sink.try_send(CommandEnvelope::new(topic, payload))
            .map_err(|e| HardwareError::other(format!("inbound delivery failed: {e}")))
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn connect_attempts(&self) -> u32 {
        lock(&self.state).connect_attempts
    }

    pub fn publish_attempts(&self) -> u32 {
        lock(&self.state).publish_attempts
    }

    /// Every accepted publish, oldest first.
    pub fn published(&self) -> Vec<Published> {
        lock(&self.state).published.clone()
    }

    /// Payloads accepted on one topic, oldest first.
    pub fn published_to(&self, topic: &str) -> Vec<String> {
        lock(&self.state)
            .published
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.clone())
            .collect()
    }

    pub fn last_published_to(&self, topic: &str) -> Option<Published> {
        lock(&self.state)
            .published
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .cloned()
    }

    pub fn clear_published(&self) {
        lock(&self.state).published.clear();
    }

    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.state).subscriptions.clone()
    }

    pub fn clear_subscriptions(&self) {
        lock(&self.state).subscriptions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_requires_session() {
        let (mut transport, handle) = MockTransport::new();

        let result = transport.publish("esp/status/d1", "available", true).await;
        assert!(matches!(result, Err(HardwareError::NotConnected)));

        transport.connect().await.unwrap();
        transport
            .publish("esp/status/d1", "available", true)
            .await
            .unwrap();

        assert_eq!(
            handle.last_published_to("esp/status/d1"),
            Some(Published {
                topic: "esp/status/d1".to_string(),
                payload: "available".to_string(),
                retained: true,
            })
        );
        assert_eq!(handle.publish_attempts(), 2);
    }

    #[tokio::test]
    async fn test_refused_connect() {
        let (mut transport, handle) = MockTransport::new();
        handle.drop_connection();

        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
        assert_eq!(handle.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_scripted_publish_failures() {
        let (mut transport, handle) = MockTransport::connected();
        handle.script_publish_results([true, false, true]);

        let mut outcomes = Vec::new();
        for payload in ["a", "b", "c", "d"] {
            outcomes.push(transport.publish("t", payload, false).await.is_ok());
        }

        assert_eq!(outcomes, vec![true, false, true, true]);
        assert_eq!(handle.published_to("t"), vec!["a", "c", "d"]);
    }

    #[tokio::test]
    async fn test_subscriptions_recorded() {
        let (mut transport, handle) = MockTransport::connected();
        transport.subscribe("esp/commands").await.unwrap();
        transport.subscribe("esp/commands/booking").await.unwrap();

        assert_eq!(
            handle.subscriptions(),
            vec!["esp/commands", "esp/commands/booking"]
        );

        handle.set_connected(false);
        assert!(transport.subscribe("esp/commands/status").await.is_err());
    }

    #[tokio::test]
    async fn test_inbound_delivery() {
        let (mut transport, handle) = MockTransport::connected();
        assert!(handle.deliver("esp/commands", "available").is_err());

        let (tx, mut rx) = mpsc::channel(4);
        transport.set_inbound(tx);
        handle.deliver("esp/commands/booking", "book").unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope, CommandEnvelope::new("esp/commands/booking", "book"));
    }
}
