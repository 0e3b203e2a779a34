//! Per-scanner counters and timers.
//!
//! A scanner owns one [`ScanMetrics`] and hands out [`ScanMetricsSnapshot`]
//! copies, so callers can aggregate across fragments without sharing state.

use std::time::Duration;

/// Mutable metrics owned by a single scanner.
#[derive(Default, Debug)]
pub struct ScanMetrics {
    /// Rows fetched from the remote side.
    pub rows_read: u64,
    /// Remote scanners opened, one per key range visited.
    pub ranges_opened: u64,
    /// Time spent building the remote scan specification.
    pub scan_setup: Duration,
    /// Time spent waiting on remote row fetches.
    pub read_time: Duration,
}

impl ScanMetrics {
    /// Record a fetched row.
    pub fn record_row(&mut self) {
        self.rows_read = self.rows_read.saturating_add(1);
    }

    /// Record a freshly opened key range.
    pub fn record_range_opened(&mut self) {
        self.ranges_opened = self.ranges_opened.saturating_add(1);
    }

    /// Accumulate scan setup time.
    pub fn record_setup(&mut self, elapsed: Duration) {
        self.scan_setup += elapsed;
    }

    /// Accumulate remote fetch time.
    pub fn record_read(&mut self, elapsed: Duration) {
        self.read_time += elapsed;
    }

    /// Copy the current values into a snapshot.
    ///
    /// Decoded byte counts live with the cell decoder and are passed in.
    pub fn snapshot(&self, bytes_read: u64) -> ScanMetricsSnapshot {
        ScanMetricsSnapshot {
            rows_read: self.rows_read,
            bytes_read,
            ranges_opened: self.ranges_opened,
            scan_setup_us: self.scan_setup.as_micros() as u64,
            read_time_us: self.read_time.as_micros() as u64,
        }
    }
}

/// Point-in-time copy of [`ScanMetrics`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ScanMetricsSnapshot {
    /// Rows fetched from the remote side.
    pub rows_read: u64,
    /// Bytes copied out of remote cell buffers.
    pub bytes_read: u64,
    /// Remote scanners opened.
    pub ranges_opened: u64,
    /// Scan setup time in microseconds.
    pub scan_setup_us: u64,
    /// Remote fetch time in microseconds.
    pub read_time_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_values() {
        let mut metrics = ScanMetrics::default();
        metrics.record_row();
        metrics.record_row();
        metrics.record_range_opened();
        metrics.record_setup(Duration::from_micros(7));
        metrics.record_read(Duration::from_micros(3));
        metrics.record_read(Duration::from_micros(4));

        let snapshot = metrics.snapshot(12);
        assert_eq!(snapshot.rows_read, 2);
        assert_eq!(snapshot.bytes_read, 12);
        assert_eq!(snapshot.ranges_opened, 1);
        assert_eq!(snapshot.scan_setup_us, 7);
        assert_eq!(snapshot.read_time_us, 7);
    }
}
