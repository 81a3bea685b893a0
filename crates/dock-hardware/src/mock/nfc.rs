//! Mock NFC reader.

use super::lock;
use crate::{
    HardwareError, Result,
    traits::NfcHardware,
    types::{BusSettings, CardUid, FirmwareVersion},
};
use dock_core::Millis;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Firmware word reported by the simulated chip (IC 0x32, version 1.6).
const MOCK_FIRMWARE_WORD: u32 = 0x3201_0607;

/// Operation performed on a [`MockNfc`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NfcCall {
    Scan { timeout_ms: Millis },
    Probe,
    Reinitialize,
    StopBus,
    StartBus(BusSettings),
    AssertReset,
    ReleaseReset,
}

#[derive(Debug)]
struct ReaderState {
    responsive: bool,
    reinit_script: VecDeque<bool>,
    card: Option<CardUid>,
    scan_script: VecDeque<Option<CardUid>>,
    reset_asserted: bool,
    bus_running: bool,
    calls: Vec<NfcCall>,
}

/// Simulated reader chip with a bus and a reset line.
///
/// A card placed with [`MockNfcHandle::present_card`] answers every scan until
/// removed. Individual scan results can also be queued. When the chip is
/// unresponsive, scans time out and probes fail until a reinitialisation
/// succeeds.
///
/// # Examples
///
/// ```
/// use dock_hardware::mock::MockNfc;
/// use dock_hardware::traits::NfcHardware;
/// use dock_hardware::CardUid;
///
/// #[tokio::main]
/// async fn main() {
///     let (mut reader, handle) = MockNfc::new();
///
///     assert_eq!(reader.scan_for_card(50).await.unwrap(), None);
///
///     let uid = CardUid::new(vec![0x04, 0xAB, 0xCD, 0xEF]).unwrap();
///     handle.present_card(uid.clone());
///     assert_eq!(reader.scan_for_card(50).await.unwrap(), Some(uid));
/// }
/// ```
#[derive(Debug)]
pub struct MockNfc {
    state: Arc<Mutex<ReaderState>>,
}

impl MockNfc {
    /// Create a responsive reader with an empty field.
    pub fn new() -> (Self, MockNfcHandle) {
        let state = Arc::new(Mutex::new(ReaderState {
            responsive: true,
            reinit_script: VecDeque::new(),
            card: None,
            scan_script: VecDeque::new(),
            reset_asserted: false,
            bus_running: true,
            calls: Vec::new(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockNfcHandle { state },
        )
    }

    /// Create a reader that does not answer until reinitialised successfully.
    pub fn unresponsive() -> (Self, MockNfcHandle) {
        let (reader, handle) = Self::new();
        handle.set_responsive(false);
        (reader, handle)
    }
}

fn firmware() -> Result<FirmwareVersion> {
    FirmwareVersion::from_raw(MOCK_FIRMWARE_WORD)
}

impl NfcHardware for MockNfc {
    async fn scan_for_card(&mut self, timeout_ms: Millis) -> Result<Option<CardUid>> {
        let mut state = lock(&self.state);
        state.calls.push(NfcCall::Scan { timeout_ms });
        if !state.responsive || !state.bus_running || state.reset_asserted {
            return Err(HardwareError::timeout(timeout_ms));
        }
        match state.scan_script.pop_front() {
            Some(result) => Ok(result),
            None => Ok(state.card.clone()),
        }
    }

    async fn probe_firmware_version(&mut self) -> Result<FirmwareVersion> {
        let mut state = lock(&self.state);
        state.calls.push(NfcCall::Probe);
        if state.responsive && state.bus_running && !state.reset_asserted {
            firmware()
        } else {
            FirmwareVersion::from_raw(0)
        }
    }

    async fn reinitialize(&mut self) -> Result<FirmwareVersion> {
        let mut state = lock(&self.state);
        state.calls.push(NfcCall::Reinitialize);
        let succeeds = state.reinit_script.pop_front().unwrap_or(state.responsive);
        if succeeds && state.bus_running && !state.reset_asserted {
            state.responsive = true;
            firmware()
        } else {
            Err(HardwareError::initialization_failed(
                "reader did not answer after reinitialisation",
            ))
        }
    }

    fn stop_bus(&mut self) {
        let mut state = lock(&self.state);
        state.calls.push(NfcCall::StopBus);
        state.bus_running = false;
    }

    fn start_bus(&mut self, settings: BusSettings) {
        let mut state = lock(&self.state);
        state.calls.push(NfcCall::StartBus(settings));
        state.bus_running = true;
    }

    fn assert_reset(&mut self) {
        let mut state = lock(&self.state);
        state.calls.push(NfcCall::AssertReset);
        state.reset_asserted = true;
    }

    fn release_reset(&mut self) {
        let mut state = lock(&self.state);
        state.calls.push(NfcCall::ReleaseReset);
        state.reset_asserted = false;
    }
}

/// Handle for controlling a [`MockNfc`].
#[derive(Debug, Clone)]
pub struct MockNfcHandle {
    state: Arc<Mutex<ReaderState>>,
}

impl MockNfcHandle {
    /// Place a card in the field. It answers every scan until removed.
    pub fn present_card(&self, uid: CardUid) {
        lock(&self.state).card = Some(uid);
    }

    pub fn remove_card(&self) {
        lock(&self.state).card = None;
    }

    /// Queue explicit results for the next scans, ahead of the held card.
    pub fn queue_scans(&self, results: impl IntoIterator<Item = Option<CardUid>>) {
        lock(&self.state).scan_script.extend(results);
    }

    /// Make the chip answer or stop answering.
    pub fn set_responsive(&self, responsive: bool) {
        lock(&self.state).responsive = responsive;
    }

    /// Queue outcomes for the next reinitialisations.
    ///
    /// Without a script, reinitialisation succeeds when the chip is responsive.
    pub fn script_reinit_results(&self, results: impl IntoIterator<Item = bool>) {
        lock(&self.state).reinit_script.extend(results);
    }

    pub fn is_reset_asserted(&self) -> bool {
        lock(&self.state).reset_asserted
    }

    pub fn is_bus_running(&self) -> bool {
        lock(&self.state).bus_running
    }

    /// Every operation performed on the reader, oldest first.
    pub fn calls(&self) -> Vec<NfcCall> {
        lock(&self.state).calls.clone()
    }

    /// Operations other than scans and probes, oldest first.
    pub fn recovery_calls(&self) -> Vec<NfcCall> {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| !matches!(call, NfcCall::Scan { .. } | NfcCall::Probe))
            .cloned()
            .collect()
    }

    pub fn scan_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| matches!(call, NfcCall::Scan { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(last: u8) -> CardUid {
        CardUid::new(vec![0x04, 0x11, 0x22, last]).unwrap()
    }

    #[tokio::test]
    async fn test_scan_script_takes_precedence() {
        let (mut reader, handle) = MockNfc::new();
        handle.present_card(uid(1));
        handle.queue_scans([None, Some(uid(2))]);

        assert_eq!(reader.scan_for_card(50).await.unwrap(), None);
        assert_eq!(reader.scan_for_card(50).await.unwrap(), Some(uid(2)));
        assert_eq!(reader.scan_for_card(50).await.unwrap(), Some(uid(1)));
        assert_eq!(handle.scan_count(), 3);
    }

    #[tokio::test]
    async fn test_unresponsive_reader() {
        let (mut reader, handle) = MockNfc::unresponsive();
        handle.present_card(uid(1));

        assert!(matches!(
            reader.scan_for_card(50).await,
            Err(HardwareError::Timeout { duration_ms: 50 })
        ));
        assert!(reader.probe_firmware_version().await.is_err());
        assert!(reader.reinitialize().await.is_err());

        handle.set_responsive(true);
        let version = reader.reinitialize().await.unwrap();
        assert_eq!(version.to_string(), "1.6");
    }

    #[tokio::test]
    async fn test_scripted_reinit_recovers_chip() {
        let (mut reader, handle) = MockNfc::unresponsive();
        handle.script_reinit_results([false, true]);

        assert!(reader.reinitialize().await.is_err());
        assert!(reader.reinitialize().await.is_ok());
        assert!(reader.probe_firmware_version().await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_line_blocks_chip() {
        let (mut reader, handle) = MockNfc::new();

        reader.assert_reset();
        assert!(handle.is_reset_asserted());
        assert!(reader.probe_firmware_version().await.is_err());

        reader.release_reset();
        assert!(reader.probe_firmware_version().await.is_ok());
    }

    #[test]
    fn test_recovery_call_log() {
        let (mut reader, handle) = MockNfc::new();
        let settings = BusSettings::default();

        reader.stop_bus();
        assert!(!handle.is_bus_running());
        reader.start_bus(settings);
        reader.assert_reset();
        reader.release_reset();

        assert_eq!(
            handle.recovery_calls(),
            vec![
                NfcCall::StopBus,
                NfcCall::StartBus(settings),
                NfcCall::AssertReset,
                NfcCall::ReleaseReset,
            ]
        );
    }
}
