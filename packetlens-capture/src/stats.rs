//! Capture session statistics

use packetlens_core::SessionStats;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Thread-safe statistics accumulator for one capture session
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    packets_captured: Arc<AtomicU64>,
    bytes_captured: Arc<AtomicU64>,
    start_time: Instant,
    /// Elapsed milliseconds frozen at stop; `u64::MAX` while running
    frozen_ms: Arc<AtomicU64>,
}

const RUNNING: u64 = u64::MAX;

impl StatsAccumulator {
    /// Create a new statistics accumulator, starting the clock now
    pub fn new() -> Self {
        Self {
            packets_captured: Arc::new(AtomicU64::new(0)),
            bytes_captured: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
            frozen_ms: Arc::new(AtomicU64::new(RUNNING)),
        }
    }

    /// Record an appended packet
    pub fn record_packet(&self, size: usize) {
        self.packets_captured.fetch_add(1, Ordering::Relaxed);
        self.bytes_captured.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Stop the clock. Later calls keep the first recorded duration.
    pub fn freeze(&self) {
        let ms = duration_ms(self.start_time.elapsed());
        let _ = self
            .frozen_ms
            .compare_exchange(RUNNING, ms, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Get packets captured count
    pub fn packets_captured(&self) -> u64 {
        self.packets_captured.load(Ordering::Relaxed)
    }

    /// Get elapsed time since start, or the session duration once frozen
    pub fn elapsed(&self) -> Duration {
        match self.frozen_ms.load(Ordering::Acquire) {
            RUNNING => self.start_time.elapsed(),
            ms => Duration::from_millis(ms),
        }
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            packets_captured: self.packets_captured(),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            elapsed_ms: duration_ms(self.elapsed()),
        }
    }
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(RUNNING - 1)
}
