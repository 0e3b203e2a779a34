//! Walks an ordered list of key ranges as one row stream.

use crate::{
    bridge::Bridge,
    error::{BridgeError, ScanError},
    metrics::ScanMetrics,
    observability::log_debug,
    scan::ScanRange,
    spec::ScanSpec,
};

/// Opens one remote scanner per key range, in order, and hides the range
/// boundaries from callers.
///
/// Ranges are only ever visited forward. At most one remote scanner is open at
/// a time; the previous one is closed before the next range opens. A failed
/// open or read ends the iteration: every later call returns
/// [`ScanError::Failed`].
pub struct RangeIterator<B: Bridge> {
    ranges: Vec<ScanRange>,
    next_range: usize,
    scanner: Option<B::Scanner>,
    failed: bool,
}

impl<B: Bridge> RangeIterator<B> {
    /// Iterator over `ranges`; nothing is opened yet.
    ///
    /// # Errors
    /// Returns [`ScanError::NoRanges`] if `ranges` is empty.
    pub fn new(ranges: Vec<ScanRange>) -> Result<Self, ScanError> {
        if ranges.is_empty() {
            return Err(ScanError::NoRanges);
        }
        Ok(Self {
            ranges,
            next_range: 0,
            scanner: None,
            failed: false,
        })
    }

    /// Number of ranges; never zero.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Range the open scanner reads, if any.
    pub fn current(&self) -> Option<&ScanRange> {
        self.scanner
            .as_ref()
            .and_then(|_| self.ranges.get(self.next_range.checked_sub(1)?))
    }

    /// Whether every range has been read to the end.
    pub fn is_exhausted(&self) -> bool {
        !self.failed && self.scanner.is_none() && self.next_range >= self.ranges.len()
    }

    /// Whether an open or read failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Close the current scanner and open the next range.
    ///
    /// Returns `false` once no range is left.
    pub fn open_next(
        &mut self,
        bridge: &B,
        table: &B::Table,
        spec: &mut ScanSpec<B>,
        metrics: &mut ScanMetrics,
    ) -> Result<bool, ScanError> {
        self.ensure_healthy()?;
        let opened = self.open_range(bridge, table, spec, metrics);
        self.failed = opened.is_err();
        opened
    }

    /// Next row across ranges, or `None` after the last range.
    pub fn next_row(
        &mut self,
        bridge: &B,
        table: &B::Table,
        spec: &mut ScanSpec<B>,
        metrics: &mut ScanMetrics,
    ) -> Result<Option<B::Row>, ScanError> {
        self.ensure_healthy()?;
        let row = self.read_row(bridge, table, spec, metrics);
        self.failed = row.is_err();
        row
    }

    /// Close the open scanner, if any, and stop iterating.
    pub fn close(&mut self, bridge: &B) -> Result<(), BridgeError> {
        self.next_range = self.ranges.len();
        self.close_current(bridge)
    }

    fn open_range(
        &mut self,
        bridge: &B,
        table: &B::Table,
        spec: &mut ScanSpec<B>,
        metrics: &mut ScanMetrics,
    ) -> Result<bool, ScanError> {
        self.close_current(bridge)?;
        let Some(range) = self.ranges.get(self.next_range) else {
            return Ok(false);
        };
        spec.set_bounds(bridge, range)?;
        let scanner = bridge.open_scanner(table, spec.remote())?;
        self.scanner = Some(scanner);
        self.next_range += 1;
        metrics.record_range_opened();
        log_debug!(
            component = "range",
            event = "range_opened",
            index = self.next_range - 1,
            range = %range,
        );
        Ok(true)
    }

    fn read_row(
        &mut self,
        bridge: &B,
        table: &B::Table,
        spec: &mut ScanSpec<B>,
        metrics: &mut ScanMetrics,
    ) -> Result<Option<B::Row>, ScanError> {
        loop {
            let Some(scanner) = self.scanner.as_mut() else {
                return Ok(None);
            };
            if let Some(row) = bridge.next_row(scanner)? {
                return Ok(Some(row));
            }
            if !self.open_range(bridge, table, spec, metrics)? {
                log_debug!(
                    component = "range",
                    event = "scan_exhausted",
                    ranges = self.ranges.len(),
                );
                return Ok(None);
            }
        }
    }

    fn ensure_healthy(&self) -> Result<(), ScanError> {
        if self.failed {
            return Err(ScanError::Failed);
        }
        Ok(())
    }

    fn close_current(&mut self, bridge: &B) -> Result<(), BridgeError> {
        match self.scanner.take() {
            Some(mut scanner) => bridge.close_scanner(&mut scanner),
            None => Ok(()),
        }
    }
}
