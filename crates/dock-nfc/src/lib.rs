//! NFC reader supervision for the dock station.
//!
//! - [`NfcHealthSupervisor`] keeps the reader chip alive: periodic liveness
//!   probes and a staged, timed hardware-reset recovery with exponential
//!   backoff.
//! - [`CardTapDebouncer`] polls the reader and turns raw scans into stable
//!   [`TapEvent`]s.
//!
//! Both are driven by explicit `now` timestamps and never sleep; the longest
//! call made inside a tick is a single short-timeout scan.

pub mod debounce;
pub mod health;

pub use debounce::{CardTapDebouncer, TapEvent, TapState};
pub use health::{NfcEvent, NfcHealth, NfcHealthSupervisor, RecoveryStep};
