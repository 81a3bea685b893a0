//! Bounded telemetry buffer with periodic flush.
//!
//! Log lines meant for the backend are queued in memory and published to the
//! log topic in batches. Delivery is at-least-once: an entry leaves the buffer
//! only after its publish succeeded, and a failed flush keeps the failing entry
//! and everything queued after it for the next attempt.

use dock_core::config::TelemetryConfig;
use dock_core::{LogDestination, LogEntry, LogSeverity, Millis, elapsed};
use dock_hardware::Transport;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, error, info, trace, warn};

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to do: empty buffer or flush not due yet.
    Idle,
    /// Flush was due but the transport is down.
    Skipped,
    /// Every buffered entry was published.
    Flushed { published: usize },
    /// A publish failed; `pending` entries remain buffered.
    Partial { published: usize, pending: usize },
}

/// Running counters of the buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryStats {
    /// Entries published successfully.
    pub published: u64,
    /// Publish attempts that failed.
    pub failed: u64,
    /// Entries dropped because the buffer was full.
    pub evicted: u64,
}

/// Buffered logger for the station's remote log topic.
///
/// # Examples
///
/// ```
/// use dock_core::{LogDestination, LogSeverity};
/// use dock_telemetry::TelemetryBuffer;
///
/// let mut telemetry = TelemetryBuffer::new("esp/logs/d1", 3, 5_000);
///
/// for i in 0..4 {
///     telemetry.log(LogSeverity::Info, LogDestination::Remote, format!("m{i}"), 100);
/// }
///
/// let messages: Vec<_> = telemetry.entries().map(|e| e.message()).collect();
/// assert_eq!(messages, vec!["m1", "m2", "m3"]);
/// assert_eq!(telemetry.stats().evicted, 1);
/// ```
#[derive(Debug)]
pub struct TelemetryBuffer {
    topic: String,
    entries: VecDeque<LogEntry>,
    capacity: usize,
    flush_interval_ms: Millis,
    last_flush: Option<Millis>,
    stats: TelemetryStats,
}

impl TelemetryBuffer {
    /// Create a buffer publishing to `topic`.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(topic: impl Into<String>, capacity: usize, flush_interval_ms: Millis) -> Self {
        let capacity = capacity.max(1);
        Self {
            topic: topic.into(),
            entries: VecDeque::with_capacity(capacity),
            capacity,
            flush_interval_ms,
            last_flush: None,
            stats: TelemetryStats::default(),
        }
    }

    pub fn from_config(topic: impl Into<String>, config: &TelemetryConfig) -> Self {
        Self::new(topic, config.capacity, config.flush_interval_ms)
    }

    /// Record a message.
    ///
    /// `Local` and `Both` write through to the local log immediately. `Remote`
    /// and `Both` queue an entry stamped with `now`, evicting the oldest entry
    /// when the buffer is over capacity.
    pub fn log(
        &mut self,
        severity: LogSeverity,
        destination: LogDestination,
        message: impl Into<String>,
        now: Millis,
    ) {
        let message = message.into();

        if destination.is_local() {
            match severity {
                LogSeverity::Verbose => trace!("{message}"),
                LogSeverity::Info => info!("{message}"),
                LogSeverity::Warning => warn!("{message}"),
                LogSeverity::Error => error!("{message}"),
            }
        }

        if destination.is_remote() {
            self.entries.push_back(LogEntry::new(now, severity, message));
            while self.entries.len() > self.capacity {
                self.entries.pop_front();
                self.stats.evicted += 1;
            }
        }
    }

    /// Whether a flush is due at `now`.
    ///
    /// The interval is measured from the last successful flush, or from the
    /// first tick that saw a non-empty buffer.
    pub fn should_flush(&self, now: Millis) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let since = self.last_flush.unwrap_or(now);
        elapsed(now, since) >= self.flush_interval_ms || self.entries.len() >= self.capacity
    }

    /// Flush if due.
    pub async fn tick<T: Transport>(&mut self, transport: &mut T, now: Millis) -> FlushOutcome {
        if self.entries.is_empty() {
            return FlushOutcome::Idle;
        }
        self.last_flush.get_or_insert(now);

        if !self.should_flush(now) {
            return FlushOutcome::Idle;
        }
        self.flush(transport, now).await
    }

    /// Publish buffered entries in order until one fails.
    pub async fn flush<T: Transport>(&mut self, transport: &mut T, now: Millis) -> FlushOutcome {
        if self.entries.is_empty() {
            return FlushOutcome::Idle;
        }
        if !transport.is_connected() {
            debug!(pending = self.entries.len(), "Telemetry flush skipped, transport down");
            return FlushOutcome::Skipped;
        }

        let mut published = 0;
        while let Some(entry) = self.entries.front() {
            let payload = entry.render();
            if let Err(e) = transport.publish(&self.topic, &payload, false).await {
                self.stats.failed += 1;
                warn!(topic = %self.topic, error = %e, "Telemetry publish failed");
                return FlushOutcome::Partial {
                    published,
                    pending: self.entries.len(),
                };
            }
            self.entries.pop_front();
            self.stats.published += 1;
            published += 1;
        }

        self.last_flush = Some(now);
        trace!(topic = %self.topic, published, "Telemetry flushed");
        FlushOutcome::Flushed { published }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffered entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn stats(&self) -> TelemetryStats {
        self.stats
    }
}
