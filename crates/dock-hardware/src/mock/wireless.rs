//! Mock wireless link.

use super::lock;
use crate::{HardwareError, Result, traits::WirelessLink};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct LinkState {
    connected: bool,
    reconnect_succeeds: bool,
    reconnect_attempts: u32,
}

/// Simulated station-mode radio.
///
/// The link starts down. A reconnect attempt brings it up only when the
/// handle allows it with [`MockWirelessHandle::set_reconnect_succeeds`].
///
/// # Examples
///
/// ```
/// use dock_hardware::mock::MockWireless;
/// use dock_hardware::traits::WirelessLink;
///
/// #[tokio::main]
/// async fn main() {
///     let (mut link, handle) = MockWireless::new();
///
///     assert!(link.reconnect().await.is_err());
///     handle.set_reconnect_succeeds(true);
///     link.reconnect().await.unwrap();
///
///     assert!(link.is_connected());
///     assert_eq!(handle.reconnect_attempts(), 2);
/// }
/// ```
#[derive(Debug)]
pub struct MockWireless {
    state: Arc<Mutex<LinkState>>,
}

impl MockWireless {
    /// Create a disconnected link whose reconnects fail.
    pub fn new() -> (Self, MockWirelessHandle) {
        let state = Arc::new(Mutex::new(LinkState {
            connected: false,
            reconnect_succeeds: false,
            reconnect_attempts: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockWirelessHandle { state },
        )
    }

    /// Create a link that is up and reconnects successfully.
    pub fn connected() -> (Self, MockWirelessHandle) {
        let (link, handle) = Self::new();
        handle.set_reconnect_succeeds(true);
        handle.set_connected(true);
        (link, handle)
    }
}

impl WirelessLink for MockWireless {
    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.reconnect_attempts += 1;
        if state.reconnect_succeeds {
            state.connected = true;
            Ok(())
        } else {
            Err(HardwareError::disconnected("wireless link"))
        }
    }
}

/// Handle for controlling a [`MockWireless`].
#[derive(Debug, Clone)]
pub struct MockWirelessHandle {
    state: Arc<Mutex<LinkState>>,
}

impl MockWirelessHandle {
    /// Force the link up or down, as if the access point appeared or vanished.
    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }

    pub fn set_reconnect_succeeds(&self, succeeds: bool) {
        lock(&self.state).reconnect_succeeds = succeeds;
    }

    /// Drop the link and make reconnects fail.
    pub fn go_down(&self) {
        let mut state = lock(&self.state);
        state.connected = false;
        state.reconnect_succeeds = false;
    }

    pub fn reconnect_attempts(&self) -> u32 {
        lock(&self.state).reconnect_attempts
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}
