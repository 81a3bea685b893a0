//! Collaborator trait definitions.
//!
//! The firmware core never touches a radio, a broker client or a reader chip
//! directly. It drives them through the traits below, which the board support
//! code implements for real hardware and [`crate::mock`] implements for tests
//! and simulation.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro. Status getters stay
//! synchronous: they report cached link state and never perform I/O.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{BusSettings, CardUid, FirmwareVersion};
use dock_core::{CommandEnvelope, Millis};
use tokio::sync::mpsc;

/// Monotonic millisecond clock.
///
/// Every supervisor compares this clock against stored deadlines instead of
/// sleeping, so one source of time is read per scheduler iteration.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin. Never decreases.
    fn now_millis(&self) -> Millis;
}

/// Wireless network link (station mode radio).
///
/// # Examples
///
/// ```no_run
/// use dock_hardware::traits::WirelessLink;
/// use dock_hardware::Result;
///
/// async fn ensure_up<W: WirelessLink>(link: &mut W) -> Result<()> {
///     if !link.is_connected() {
///         link.reconnect().await?;
///     }
///     Ok(())
/// }
/// ```
pub trait WirelessLink: Send + Sync {
    /// Whether the link currently has an association and an address.
    fn is_connected(&self) -> bool;

    /// Start one reconnect attempt.
    ///
    /// A successful return means the attempt was issued. The link may still
    /// come up later, so callers check [`WirelessLink::is_connected`]
    /// afterwards.
    async fn reconnect(&mut self) -> Result<()>;
}

/// Publish/subscribe message transport (broker session).
///
/// Inbound messages are not pulled by the firmware. They are pushed into the
/// channel registered with [`Transport::set_inbound`] by whatever drives the
/// session, which may be [`Transport::poll`] itself.
pub trait Transport: Send + Sync {
    /// Whether the broker session is established.
    fn is_connected(&self) -> bool;

    /// Open a broker session.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker could not be reached or refused the
    /// session.
    async fn connect(&mut self) -> Result<()>;

    /// Publish one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is down or the message was not
    /// accepted.
    async fn publish(&mut self, topic: &str, payload: &str, retained: bool) -> Result<()>;

    /// Subscribe to one topic.
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Register the sink that receives inbound messages.
    fn set_inbound(&mut self, sink: mpsc::Sender<CommandEnvelope>);

    /// Service the session (keepalives, inbound delivery).
    ///
    /// Called once per scheduler iteration. The default does nothing.
    async fn poll(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Contactless card reader with a controllable bus and reset line.
///
/// Only the operations needed for card detection and health recovery are
/// exposed; protocol framing lives below this trait.
pub trait NfcHardware: Send + Sync {
    /// Look for a card in the field for at most `timeout_ms`.
    ///
    /// Returns `Ok(None)` when no card answered in time.
    async fn scan_for_card(&mut self, timeout_ms: Millis) -> Result<Option<CardUid>>;

    /// Ask the chip for its firmware version. Used as a liveness probe.
    async fn probe_firmware_version(&mut self) -> Result<FirmwareVersion>;

    /// Re-run the chip's init sequence and confirm it answers.
    async fn reinitialize(&mut self) -> Result<FirmwareVersion>;

    /// Stop the bus the reader is attached to.
    fn stop_bus(&mut self);

    /// (Re)start the bus with the given settings.
    fn start_bus(&mut self, settings: BusSettings);

    /// Drive the reset line low.
    fn assert_reset(&mut self);

    /// Release the reset line.
    fn release_reset(&mut self);
}

/// [`Clock`] backed by the tokio monotonic clock.
///
/// Using tokio's clock lets tests pause and advance time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        Millis::try_from(self.origin.elapsed().as_millis()).unwrap_or(Millis::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_follows_tokio_time() {
        let clock = SystemClock::new();
        assert_eq!(clock.now_millis(), 0);

        tokio::time::advance(Duration::from_millis(1_250)).await;
        assert_eq!(clock.now_millis(), 1_250);
    }
}
