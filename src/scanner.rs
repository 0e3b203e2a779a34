//! Table scan orchestration.
//!
//! A [`TableScanner`] is driven strictly sequentially:
//!
//! ```text
//! start_scan -> (next -> row_key / value*)* -> close
//! ```
//!
//! Values are pulled in projection order. Pulling a column that is present
//! consumes its cell; pulling one that is absent yields `None` and leaves the
//! cursor where it was.

use std::time::Instant;

use crate::{
    arena::ValueArena,
    bridge::{registry, registry::BridgeRegistry, Bridge, CellField, TableFactory},
    cursor::RowCursor,
    decode::CellDecoder,
    error::{BridgeError, ScanError},
    metrics::{ScanMetrics, ScanMetricsSnapshot},
    observability::{log_error, log_info, log_warn},
    option::ScanOptions,
    range::RangeIterator,
    scan::ScanRange,
    schema::{ColumnFilter, SlotDescriptor, TupleDescriptor},
    spec::{ScanPlan, ScanSpec, ScanSpecBuilder},
    tuple::{Tuple, TupleWriter},
};

/// Scans one table over an ordered list of key ranges.
///
/// Every remote handle the scanner holds is released by [`TableScanner::close`],
/// which also runs on drop.
pub struct TableScanner<'a, B: Bridge, F: TableFactory<B>> {
    bridge: &'a B,
    tables: &'a F,
    registry: &'a BridgeRegistry,
    options: ScanOptions,
    table: Option<B::Table>,
    spec: Option<ScanSpec<B>>,
    ranges: Option<RangeIterator<B>>,
    cells: Option<B::Cells>,
    cursor: RowCursor,
    arena: ValueArena,
    decoder: CellDecoder<'a, B>,
    writer: TupleWriter,
    metrics: ScanMetrics,
    failed: bool,
    closed: bool,
}

impl<'a, B: Bridge, F: TableFactory<B>> TableScanner<'a, B, F> {
    /// Scanner resolving comparators through `registry`.
    pub fn new(
        bridge: &'a B,
        tables: &'a F,
        registry: &'a BridgeRegistry,
        options: ScanOptions,
    ) -> Self {
        Self {
            bridge,
            tables,
            registry,
            options,
            table: None,
            spec: None,
            ranges: None,
            cells: None,
            cursor: RowCursor::default(),
            arena: ValueArena::new(),
            decoder: CellDecoder::new(bridge),
            writer: TupleWriter,
            metrics: ScanMetrics::default(),
            failed: false,
            closed: false,
        }
    }

    /// Scanner using the process-wide registry.
    ///
    /// # Errors
    /// Returns [`ScanError::NotInitialized`] before [`registry::init`].
    pub fn with_global_registry(
        bridge: &'a B,
        tables: &'a F,
        options: ScanOptions,
    ) -> Result<Self, ScanError> {
        Ok(Self::new(bridge, tables, registry::registry()?, options))
    }

    /// Build the scan for `desc` and open the first of `ranges`.
    ///
    /// A scanner that already ran a scan releases it first. If the first
    /// range cannot be opened, the scan is failed and [`TableScanner::next`]
    /// returns [`ScanError::Failed`].
    pub fn start_scan(
        &mut self,
        desc: &TupleDescriptor,
        ranges: Vec<ScanRange>,
        filters: &[ColumnFilter],
    ) -> Result<(), ScanError> {
        self.ensure_open()?;
        self.release()?;
        self.failed = false;
        let mut ranges = RangeIterator::new(ranges)?;
        let started = Instant::now();

        let table = self
            .table
            .insert(self.tables.table(self.bridge, &desc.table_name)?);
        let spec = self.spec.insert(
            ScanSpecBuilder::new(self.registry, &self.options).build(self.bridge, desc, filters)?,
        );

        let plan = spec.plan();
        log_info!(
            component = "scanner",
            event = "scan_started",
            table = %desc.table_name,
            requested_columns = plan.num_requested(),
            extra_columns = plan.extra_filter_columns(),
            filters = plan.filters().len(),
            caching = plan.caching(),
            cache_blocks = plan.cache_blocks(),
            ranges = ranges.len(),
        );

        let opened = ranges.open_next(self.bridge, table, spec, &mut self.metrics);
        self.ranges = Some(ranges);
        if let Err(err) = opened {
            self.fail(&err);
            return Err(err);
        }
        self.metrics.record_setup(started.elapsed());
        Ok(())
    }

    /// Fetch the next row, moving to the next key range when one runs out.
    ///
    /// Returns `false` once every range is exhausted.
    ///
    /// # Errors
    /// Returns [`ScanError::TooManyCells`] when the row carries more cells than
    /// the scan requested. After that or any remote failure the scan cannot
    /// continue: every later call returns [`ScanError::Failed`].
    pub fn next(&mut self) -> Result<bool, ScanError> {
        self.ensure_open()?;
        if self.ranges.is_none() {
            return Err(ScanError::NotStarted);
        }
        if self.failed {
            return Err(ScanError::Failed);
        }
        let fetched = self.fetch_row();
        if let Err(err) = &fetched {
            self.fail(err);
        }
        fetched
    }

    fn fetch_row(&mut self) -> Result<bool, ScanError> {
        let (Some(table), Some(spec), Some(ranges)) =
            (self.table.as_ref(), self.spec.as_mut(), self.ranges.as_mut())
        else {
            return Err(ScanError::NotStarted);
        };

        // The previous row's cells and decoded values go away first.
        self.cells = None;
        self.cursor = RowCursor::default();
        self.arena.clear();

        let started = Instant::now();
        let row = ranges.next_row(self.bridge, table, spec, &mut self.metrics);
        self.metrics.record_read(started.elapsed());
        let Some(row) = row? else {
            return Ok(false);
        };

        let cells = self.bridge.raw_cells(&row)?;
        let num_cells = self.bridge.cell_count(&cells);
        let plan = spec.plan();
        let expected = plan.max_cells();
        if expected != 0 && num_cells > expected {
            log_error!(
                component = "scanner",
                event = "too_many_cells",
                fetched = num_cells,
                expected,
            );
            return Err(ScanError::TooManyCells {
                fetched: num_cells,
                expected,
            });
        }

        let all_present = num_cells == plan.num_requested() && plan.extra_filter_columns() == 0;
        self.cursor = RowCursor::new(num_cells, all_present);
        self.cells = Some(cells);
        self.metrics.record_row();
        Ok(true)
    }

    /// Row key of the current row.
    pub fn row_key(&mut self) -> Result<&[u8], ScanError> {
        self.ensure_open()?;
        let cells = self.cells.as_ref().ok_or(ScanError::NoCurrentRow)?;
        if self.cursor.num_cells() == 0 {
            return Err(ScanError::EmptyRow);
        }
        let cell = self.bridge.cell_at(cells, 0)?;
        Ok(self.decoder.decode(&cell, CellField::Row, &mut self.arena)?)
    }

    /// Write the current row key into `slot` of `tuple`.
    pub fn write_row_key(
        &mut self,
        slot: &SlotDescriptor,
        tuple: &mut Tuple,
    ) -> Result<(), ScanError> {
        let writer = self.writer;
        let key = self.row_key()?;
        writer.write_slot(slot, tuple, key);
        Ok(())
    }

    /// Value of `family:qualifier` in the current row, or `None` if the row
    /// has no such cell at this point.
    ///
    /// A returned value consumes its cell.
    pub fn value(&mut self, family: &str, qualifier: &str) -> Result<Option<&[u8]>, ScanError> {
        self.ensure_open()?;
        let cells = self.cells.as_ref().ok_or(ScanError::NoCurrentRow)?;
        let value = self.decoder.current_value(
            cells,
            &self.cursor,
            family,
            qualifier,
            &mut self.arena,
        )?;
        if value.is_some() {
            self.cursor.advance();
        }
        Ok(value)
    }

    /// Write `family:qualifier` into `slot` of `tuple`, or mark the slot null
    /// when the row has no such cell.
    pub fn write_value(
        &mut self,
        family: &str,
        qualifier: &str,
        slot: &SlotDescriptor,
        tuple: &mut Tuple,
    ) -> Result<(), ScanError> {
        let writer = self.writer;
        match self.value(family, qualifier)? {
            Some(bytes) => writer.write_slot(slot, tuple, bytes),
            None => tuple.set_null(slot.null_indicator),
        }
        Ok(())
    }

    /// Cursor over the current row's cells.
    pub fn cursor(&self) -> RowCursor {
        self.cursor
    }

    /// Plan of the running scan.
    pub fn plan(&self) -> Option<&ScanPlan> {
        self.spec.as_ref().map(ScanSpec::plan)
    }

    /// Current metrics.
    pub fn metrics(&self) -> ScanMetricsSnapshot {
        self.metrics.snapshot(self.decoder.bytes_read())
    }

    /// Whether the running scan stopped on a failure.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Whether [`TableScanner::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release every remote handle and the value arena.
    ///
    /// The whole release sequence runs even when a step fails; the first
    /// failure is returned. Later calls do nothing.
    pub fn close(&mut self) -> Result<(), ScanError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.release();
        self.arena.free_all();
        result
    }

    fn release(&mut self) -> Result<(), ScanError> {
        let mut first = None;
        if let Some(mut ranges) = self.ranges.take() {
            if let Err(err) = ranges.close(self.bridge) {
                note_failure(&mut first, "scanner", err);
            }
        }
        self.cells = None;
        self.cursor = RowCursor::default();
        self.spec = None;
        if let Some(table) = self.table.take() {
            if let Err(err) = self.bridge.close_table(table) {
                note_failure(&mut first, "table", err);
            }
        }
        self.arena.clear();
        first.map_or(Ok(()), Err)
    }

    fn fail(&mut self, err: &ScanError) {
        self.failed = true;
        self.cells = None;
        self.cursor = RowCursor::default();
        log_error!(
            component = "scanner",
            event = "scan_failed",
            error = %err,
        );
    }

    fn ensure_open(&self) -> Result<(), ScanError> {
        if self.closed {
            return Err(ScanError::Closed);
        }
        Ok(())
    }
}

fn note_failure(first: &mut Option<ScanError>, resource: &'static str, err: BridgeError) {
    log_warn!(
        component = "scanner",
        event = "close_failed",
        resource,
        error = %err,
    );
    first.get_or_insert(ScanError::Bridge(err));
}

impl<'a, B: Bridge, F: TableFactory<B>> Drop for TableScanner<'a, B, F> {
    fn drop(&mut self) {
        // Failures were already logged.
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::DataType;

    use super::*;
    use crate::{
        bridge::memory::{Fault, HandleKind, MemoryBridge, MemoryTable, MemoryTables},
        schema::{ColumnRef, NullIndicatorOffset},
    };

    fn tables() -> MemoryTables {
        let mut table = MemoryTable::new();
        table
            .put("r1", "cf", "a", 1i32.to_be_bytes())
            .put("r1", "cf", "b", 2i32.to_be_bytes())
            .put("r2", "cf", "b", 3i32.to_be_bytes());
        let mut tables = MemoryTables::new();
        tables.insert("t", table);
        tables
    }

    fn desc() -> TupleDescriptor {
        TupleDescriptor::new(
            "t",
            9,
            vec![
                SlotDescriptor::new(
                    ColumnRef::new("cf", "a"),
                    DataType::Int32,
                    1,
                    NullIndicatorOffset::new(0, 0),
                ),
                SlotDescriptor::new(
                    ColumnRef::new("cf", "b"),
                    DataType::Int32,
                    5,
                    NullIndicatorOffset::new(0, 1),
                ),
            ],
        )
    }

    #[test]
    fn reads_rows_into_tuples() {
        let bridge = MemoryBridge::new();
        let tables = tables();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let mut scanner = TableScanner::new(&bridge, &tables, &registry, ScanOptions::default());
        let desc = desc();
        scanner.start_scan(&desc, vec![ScanRange::all()], &[]).unwrap();

        let mut rows = Vec::new();
        while scanner.next().unwrap() {
            let key = scanner.row_key().unwrap().to_vec();
            let mut tuple = Tuple::new(desc.byte_size);
            for slot in &desc.slots {
                scanner
                    .write_value(&slot.column.family, &slot.column.qualifier, slot, &mut tuple)
                    .unwrap();
            }
            rows.push((key, tuple));
        }

        assert_eq!(rows.len(), 2);
        let (key, tuple) = &rows[0];
        assert_eq!(key, b"r1");
        assert_eq!(tuple.get_i32(1), 1);
        assert_eq!(tuple.get_i32(5), 2);

        let (key, tuple) = &rows[1];
        assert_eq!(key, b"r2");
        assert!(tuple.is_null(desc.slots[0].null_indicator));
        assert_eq!(tuple.get_i32(5), 3);

        let metrics = scanner.metrics();
        assert_eq!(metrics.rows_read, 2);
        assert_eq!(metrics.ranges_opened, 1);
        assert!(metrics.bytes_read > 0);
    }

    #[test]
    fn accessors_need_a_row() {
        let bridge = MemoryBridge::new();
        let tables = tables();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let mut scanner = TableScanner::new(&bridge, &tables, &registry, ScanOptions::default());
        assert!(matches!(scanner.next(), Err(ScanError::NotStarted)));

        scanner.start_scan(&desc(), vec![ScanRange::all()], &[]).unwrap();
        assert!(matches!(scanner.row_key(), Err(ScanError::NoCurrentRow)));
        assert!(matches!(scanner.value("cf", "a"), Err(ScanError::NoCurrentRow)));

        while scanner.next().unwrap() {}
        assert!(matches!(scanner.row_key(), Err(ScanError::NoCurrentRow)));
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let bridge = MemoryBridge::new();
        let tables = tables();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let mut scanner = TableScanner::new(&bridge, &tables, &registry, ScanOptions::default());
        scanner.start_scan(&desc(), vec![ScanRange::all()], &[]).unwrap();
        assert!(scanner.next().unwrap());

        scanner.close().unwrap();
        scanner.close().unwrap();
        assert!(scanner.is_closed());
        assert!(matches!(scanner.next(), Err(ScanError::Closed)));
        assert_eq!(bridge.scanners_closed(), 1);
        assert_eq!(bridge.tables_closed(), 1);
        assert!(bridge.leaked().is_empty());
    }

    #[test]
    fn drop_releases_handles() {
        let bridge = MemoryBridge::new();
        let tables = tables();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        {
            let mut scanner =
                TableScanner::new(&bridge, &tables, &registry, ScanOptions::default());
            scanner.start_scan(&desc(), vec![ScanRange::all()], &[]).unwrap();
            assert!(scanner.next().unwrap());
            assert_eq!(bridge.live(HandleKind::Scanner), 1);
        }
        assert_eq!(bridge.tables_closed(), 1);
        assert!(bridge.leaked().is_empty());
    }

    #[test]
    fn close_runs_every_step_and_reports_first_failure() {
        let bridge = MemoryBridge::new();
        let tables = tables();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let mut scanner = TableScanner::new(&bridge, &tables, &registry, ScanOptions::default());
        scanner.start_scan(&desc(), vec![ScanRange::all()], &[]).unwrap();

        bridge.fail(Fault::CloseScanner);
        bridge.fail(Fault::CloseTable);
        let err = scanner.close().unwrap_err();
        assert!(matches!(err, ScanError::Bridge(BridgeError::Exception { .. })));
        // Handles are gone even though the remote closes failed.
        assert!(bridge.leaked().is_empty());
        assert!(scanner.close().is_ok());
    }

    #[test]
    fn unknown_table_still_closes_cleanly() {
        let bridge = MemoryBridge::new();
        let tables = MemoryTables::new();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let mut scanner = TableScanner::new(&bridge, &tables, &registry, ScanOptions::default());
        assert!(matches!(
            scanner.start_scan(&desc(), vec![ScanRange::all()], &[]),
            Err(ScanError::Bridge(_))
        ));
        scanner.close().unwrap();
        assert_eq!(bridge.tables_closed(), 0);
    }

    #[test]
    fn restarting_releases_the_previous_scan() {
        let bridge = MemoryBridge::new();
        let tables = tables();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let mut scanner = TableScanner::new(&bridge, &tables, &registry, ScanOptions::default());
        scanner.start_scan(&desc(), vec![ScanRange::all()], &[]).unwrap();
        scanner.start_scan(&desc(), vec![ScanRange::new("r2", "")], &[]).unwrap();
        assert_eq!(bridge.tables_closed(), 1);
        assert_eq!(bridge.live(HandleKind::Scanner), 1);

        assert!(scanner.next().unwrap());
        assert_eq!(scanner.row_key().unwrap(), b"r2");
        assert!(!scanner.next().unwrap());
    }
}
