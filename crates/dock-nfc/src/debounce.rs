//! Card-tap debouncing.
//!
//! A card resting on the reader answers every scan, and a card held at the
//! edge of the field flickers in and out. The debouncer turns that raw scan
//! stream into one [`TapEvent`] per deliberate tap.

use dock_core::config::TapConfig;
use dock_core::{Millis, elapsed};
use dock_hardware::{CardUid, NfcHardware};
use tracing::{debug, trace};

/// A debounced card tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapEvent {
    pub uid: CardUid,
    /// Comparable identity of the card, see [`CardUid::identity`].
    pub identity: String,
    pub at: Millis,
}

/// What the debouncer currently believes is on the reader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapState {
    pub card_present: bool,
    pub last_uid: Option<String>,
    pub last_emit_at: Millis,
    pub consecutive_misses: u8,
    /// At least one scan missed since the last successful read.
    missed_since_read: bool,
}

/// Turns raw scans into tap events.
///
/// A read emits a tap when:
/// - no card was considered present,
/// - the UID differs from the last one, or
/// - the same UID comes back after at least one missed scan and at least
///   `debounce_window_ms` after its last tap.
///
/// Up to `max_misses - 1` consecutive misses are tolerated; the miss that
/// reaches `max_misses` clears presence.
///
/// # Examples
///
/// ```
/// use dock_core::config::TapConfig;
/// use dock_hardware::CardUid;
/// use dock_nfc::CardTapDebouncer;
///
/// let mut debouncer = CardTapDebouncer::new(&TapConfig::default());
/// let card = CardUid::new(vec![0x04, 0xAB, 0xCD, 0xEF]).unwrap();
///
/// assert!(debouncer.observe(Some(card.clone()), 0).is_some());
/// assert!(debouncer.observe(Some(card), 80).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CardTapDebouncer {
    config: TapConfig,
    state: TapState,
    last_poll_at: Option<Millis>,
}

impl CardTapDebouncer {
    pub fn new(config: &TapConfig) -> Self {
        Self {
            config: config.clone(),
            state: TapState::default(),
            last_poll_at: None,
        }
    }

    /// Scan the reader if the poll interval has elapsed.
    ///
    /// Scan errors count as misses.
    pub async fn tick<N: NfcHardware>(&mut self, hw: &mut N, now: Millis) -> Option<TapEvent> {
        if let Some(last) = self.last_poll_at
            && elapsed(now, last) < self.config.poll_interval_ms
        {
            return None;
        }
        self.last_poll_at = Some(now);

        let scan = match hw.scan_for_card(self.config.scan_timeout_ms).await {
            Ok(scan) => scan,
            Err(e) => {
                trace!(error = %e, "Card scan failed");
                None
            }
        };
        self.observe(scan, now)
    }

    /// Feed one scan result.
    pub fn observe(&mut self, scan: Option<CardUid>, now: Millis) -> Option<TapEvent> {
        let Some(uid) = scan else {
            self.record_miss();
            return None;
        };

        let identity = uid.identity();
        let state = &mut self.state;
        let same_card = state.last_uid.as_deref() == Some(identity.as_str());
        let reappeared = state.missed_since_read
            && elapsed(now, state.last_emit_at) >= self.config.debounce_window_ms;
        let emit = !state.card_present || !same_card || reappeared;

        state.card_present = true;
        state.consecutive_misses = 0;
        state.missed_since_read = false;

        if !emit {
            return None;
        }

        state.last_uid = Some(identity.clone());
        state.last_emit_at = now;
        debug!(card = %identity, "Card tap");
        Some(TapEvent { uid, identity, at: now })
    }

    fn record_miss(&mut self) {
        let state = &mut self.state;
        if !state.card_present {
            return;
        }
        state.missed_since_read = true;
        state.consecutive_misses = state.consecutive_misses.saturating_add(1);
        if state.consecutive_misses >= self.config.max_misses {
            trace!("Card left the field");
            state.card_present = false;
            state.consecutive_misses = 0;
        }
    }

    pub fn state(&self) -> &TapState {
        &self.state
    }

    pub fn is_card_present(&self) -> bool {
        self.state.card_present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dock_hardware::mock::MockNfc;

    fn card(last: u8) -> CardUid {
        CardUid::new(vec![0x04, 0xAB, 0xCD, last]).unwrap()
    }

    fn debouncer() -> CardTapDebouncer {
        CardTapDebouncer::new(&TapConfig::default())
    }

    #[test]
    fn test_held_card_emits_once() {
        let mut debouncer = debouncer();
        let events: Vec<_> = (0..10)
            .filter_map(|i| debouncer.observe(Some(card(1)), i * 80))
            .collect();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].at, 0);
        assert_eq!(events[0].identity, card(1).identity());
    }

    #[test]
    fn test_card_held_for_a_long_time_emits_once() {
        let mut debouncer = debouncer();
        let count = (0..100)
            .filter_map(|i| debouncer.observe(Some(card(1)), i * 80))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_reappearing_card_after_window_emits_again() {
        let mut debouncer = debouncer();
        assert!(debouncer.observe(Some(card(1)), 0).is_some());
        assert!(debouncer.observe(None, 80).is_none());
        assert!(debouncer.observe(None, 160).is_none());
        assert!(debouncer.is_card_present());

        let event = debouncer.observe(Some(card(1)), 720);
        assert_eq!(event.map(|e| e.at), Some(720));
    }

    #[test]
    fn test_reappearing_card_within_window_is_suppressed() {
        let mut debouncer = debouncer();
        debouncer.observe(Some(card(1)), 0);
        debouncer.observe(None, 80);
        assert!(debouncer.observe(Some(card(1)), 160).is_none());
        assert!(debouncer.observe(Some(card(1)), 720).is_none());
    }

    #[test]
    fn test_removed_card_emits_on_return() {
        let mut debouncer = debouncer();
        debouncer.observe(Some(card(1)), 0);
        for t in [80, 160, 240] {
            debouncer.observe(None, t);
        }
        assert!(!debouncer.is_card_present());
        assert_eq!(debouncer.state().consecutive_misses, 0);

        assert!(debouncer.observe(Some(card(1)), 320).is_some());
    }

    #[test]
    fn test_different_card_emits_immediately() {
        let mut debouncer = debouncer();
        assert!(debouncer.observe(Some(card(1)), 0).is_some());
        let event = debouncer.observe(Some(card(2)), 80).unwrap();
        assert_eq!(event.uid, card(2));
        assert_eq!(debouncer.state().last_uid, Some(card(2).identity()));
    }

    #[test]
    fn test_misses_without_card_are_ignored() {
        let mut debouncer = debouncer();
        for t in 0..5 {
            assert!(debouncer.observe(None, t * 80).is_none());
        }
        assert_eq!(debouncer.state(), &TapState::default());
    }

    #[tokio::test]
    async fn test_tick_respects_poll_interval() {
        let (mut reader, handle) = MockNfc::new();
        handle.present_card(card(7));
        let mut debouncer = debouncer();

        assert!(debouncer.tick(&mut reader, 1_000).await.is_some());
        assert!(debouncer.tick(&mut reader, 1_079).await.is_none());
        assert_eq!(handle.scan_count(), 1);

        assert!(debouncer.tick(&mut reader, 1_080).await.is_none());
        assert_eq!(handle.scan_count(), 2);
    }

    #[tokio::test]
    async fn test_tick_ten_scans_one_event() {
        let (mut reader, handle) = MockNfc::new();
        handle.present_card(card(7));
        let mut debouncer = debouncer();

        let mut events = 0;
        for i in 0..10 {
            if debouncer.tick(&mut reader, i * 80).await.is_some() {
                events += 1;
            }
        }

        assert_eq!(events, 1);
        assert_eq!(handle.scan_count(), 10);
    }

    #[tokio::test]
    async fn test_tick_scan_errors_count_as_misses() {
        let (mut reader, handle) = MockNfc::new();
        handle.present_card(card(7));
        let mut debouncer = debouncer();
        debouncer.tick(&mut reader, 0).await;

        handle.set_responsive(false);
        for t in [80, 160, 240] {
            debouncer.tick(&mut reader, t).await;
        }
        assert!(!debouncer.is_card_present());

        handle.set_responsive(true);
        assert!(debouncer.tick(&mut reader, 320).await.is_some());
    }

    #[tokio::test]
    async fn test_tick_passes_scan_timeout() {
        let (mut reader, handle) = MockNfc::new();
        let mut debouncer = debouncer();
        debouncer.tick(&mut reader, 0).await;
        assert_eq!(
            handle.calls(),
            vec![dock_hardware::mock::NfcCall::Scan { timeout_ms: 50 }]
        );
    }
}
