//! In-memory [`Bridge`] for tests and local tooling.
//!
//! Rows are kept sorted by key and cells sorted by family then qualifier, the
//! order the real store returns them in. Every cell is laid out in one
//! key-value style buffer, so the offset/length accessors behave like the real
//! ones.
//!
//! Column value filters only see the columns a scan selects. This mirrors a
//! store defect where a filter on a column the scan does not return is silently
//! ignored.
//!
//! Every handle registers with a ledger on creation and deregisters on drop, so
//! tests can assert that a scanner released exactly what it acquired.

use std::{
    cell::{Cell as StdCell, RefCell},
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    ops::Bound,
    rc::Rc,
};

use bytes::{BufMut, Bytes, BytesMut};

use super::{registry::CELL, Bridge, CellField, CompareOp, RemoteSymbol, TableFactory};
use crate::error::BridgeError;

const COMPARE_OP_NAMES: [&str; 7] = [
    "LESS",
    "LESS_OR_EQUAL",
    "EQUAL",
    "NOT_EQUAL",
    "GREATER_OR_EQUAL",
    "GREATER",
    "NO_OP",
];

const OUT_OF_BOUNDS: &str = "java.lang.ArrayIndexOutOfBoundsException";
const IO_EXCEPTION: &str = "java.io.IOException";

/// Kinds of remote handle tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Byte array built by the scanner.
    ByteArray,
    /// Scan specification.
    Scan,
    /// Filter or filter list.
    Filter,
    /// Table connection.
    Table,
    /// Open scanner.
    Scanner,
    /// Fetched row.
    Row,
    /// Cell array of a row.
    Cells,
    /// Single cell.
    Cell,
    /// Backing array returned by a cell accessor.
    CellArray,
}

/// Remote operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Byte array allocation.
    ByteArray,
    /// Scan construction.
    NewScan,
    /// Filter construction.
    NewFilter,
    /// Opening a scanner.
    OpenScanner,
    /// Fetching the next row.
    Next,
    /// Reading a row's cell array.
    RawCells,
    /// Copying bytes out of a cell buffer.
    ReadRegion,
    /// Closing a scanner.
    CloseScanner,
    /// Closing a table.
    CloseTable,
}

#[derive(Debug, Default)]
struct Ledger {
    live: RefCell<HashMap<HandleKind, usize>>,
    acquired: RefCell<HashMap<HandleKind, usize>>,
    scanners_closed: StdCell<usize>,
    tables_closed: StdCell<usize>,
    round_trips: StdCell<usize>,
}

fn acquire(ledger: &Rc<Ledger>, kind: HandleKind) -> Tracked {
    *ledger.live.borrow_mut().entry(kind).or_default() += 1;
    *ledger.acquired.borrow_mut().entry(kind).or_default() += 1;
    Tracked {
        kind,
        ledger: Rc::clone(ledger),
    }
}

#[derive(Debug)]
struct Tracked {
    kind: HandleKind,
    ledger: Rc<Ledger>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        if let Some(live) = self.ledger.live.borrow_mut().get_mut(&self.kind) {
            *live -= 1;
        }
    }
}

#[derive(Debug, Clone)]
struct CellData {
    buffer: Bytes,
    spans: [(usize, usize); 4],
}

impl CellData {
    fn encode(row: &[u8], family: &[u8], qualifier: &[u8], value: &[u8]) -> Self {
        let parts = [row, family, qualifier, value];
        let key_len: usize = parts[..3].iter().map(|part| part.len()).sum();
        let mut buf = BytesMut::with_capacity(8 + key_len + value.len());
        buf.put_u32(key_len as u32);
        buf.put_u32(value.len() as u32);
        let mut spans = [(0, 0); 4];
        for (span, part) in spans.iter_mut().zip(parts) {
            *span = (buf.len(), part.len());
            buf.put_slice(part);
        }
        Self {
            buffer: buf.freeze(),
            spans,
        }
    }

    fn span(&self, field: CellField) -> &[u8] {
        let (offset, len) = self.spans[field.index()];
        &self.buffer[offset..offset + len]
    }
}

/// A filter as the in-memory store evaluates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// Every member must pass.
    MustPassAll(Vec<FilterSpec>),
    /// `family:qualifier <op> value`; rows without the column pass.
    ColumnValue {
        /// Column family.
        family: Bytes,
        /// Column qualifier.
        qualifier: Bytes,
        /// Comparison.
        op: CompareOp,
        /// Constant compared against.
        value: Bytes,
    },
}

impl FilterSpec {
    fn accepts(&self, cells: &[CellData]) -> bool {
        match self {
            FilterSpec::MustPassAll(filters) => filters.iter().all(|filter| filter.accepts(cells)),
            FilterSpec::ColumnValue {
                family,
                qualifier,
                op,
                value,
            } => cells
                .iter()
                .find(|cell| {
                    cell.span(CellField::Family) == family.as_ref()
                        && cell.span(CellField::Qualifier) == qualifier.as_ref()
                })
                .map_or(true, |cell| {
                    op.accepts(cell.span(CellField::Value).cmp(value.as_ref()))
                }),
        }
    }
}

/// Sorted rows of sorted `(family, qualifier) -> value` cells.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: BTreeMap<Vec<u8>, BTreeMap<(Vec<u8>, Vec<u8>), Vec<u8>>>,
}

impl MemoryTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one cell.
    pub fn put(
        &mut self,
        row: impl Into<Vec<u8>>,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.rows
            .entry(row.into())
            .or_default()
            .insert((family.into(), qualifier.into()), value.into());
        self
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn scan(&self, scan: &MemoryScan, honor_columns: bool) -> VecDeque<Rc<[CellData]>> {
        if let (Some(start), Some(stop)) = (&scan.start, &scan.stop) {
            if start >= stop {
                return VecDeque::new();
            }
        }
        let lower = scan
            .start
            .as_ref()
            .map_or(Bound::Unbounded, |key| Bound::Included(key.to_vec()));
        let upper = scan
            .stop
            .as_ref()
            .map_or(Bound::Unbounded, |key| Bound::Excluded(key.to_vec()));

        let mut out = VecDeque::new();
        for (key, cells) in self.rows.range((lower, upper)) {
            let selected: Vec<CellData> = cells
                .iter()
                .filter(|((family, qualifier), _)| {
                    !honor_columns || scan.selects(family, qualifier)
                })
                .map(|((family, qualifier), value)| {
                    CellData::encode(key, family, qualifier, value)
                })
                .collect();
            // The store never returns empty rows.
            if selected.is_empty() {
                continue;
            }
            if let Some(filter) = &scan.filter {
                if !filter.accepts(&selected) {
                    continue;
                }
            }
            out.push_back(selected.into());
        }
        out
    }
}

/// Named tables served to scanners.
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    tables: HashMap<String, Rc<MemoryTable>>,
}

impl MemoryTables {
    /// No tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` under `name`.
    pub fn insert(&mut self, name: impl Into<String>, table: MemoryTable) -> &mut Self {
        self.tables.insert(name.into(), Rc::new(table));
        self
    }
}

impl TableFactory<MemoryBridge> for MemoryTables {
    fn table(&self, bridge: &MemoryBridge, name: &str) -> Result<MemoryTableHandle, BridgeError> {
        let rows = self.tables.get(name).cloned().ok_or_else(|| {
            BridgeError::exception("org.apache.hadoop.hbase.TableNotFoundException", name)
        })?;
        Ok(MemoryTableHandle {
            rows,
            _handle: acquire(&bridge.ledger, HandleKind::Table),
        })
    }
}

/// Remote byte array.
#[derive(Debug)]
pub struct MemoryBytes {
    data: Bytes,
    empty_row: bool,
    _handle: Option<Tracked>,
}

impl MemoryBytes {
    /// Array contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether this is the reserved empty-row constant.
    pub fn is_empty_row(&self) -> bool {
        self.empty_row
    }
}

/// Remote scan specification.
#[derive(Debug)]
pub struct MemoryScan {
    columns: Vec<(Bytes, Bytes)>,
    max_versions: i32,
    caching: i32,
    cache_blocks: bool,
    filter: Option<FilterSpec>,
    start: Option<Bytes>,
    stop: Option<Bytes>,
    _handle: Tracked,
}

impl MemoryScan {
    fn selects(&self, family: &[u8], qualifier: &[u8]) -> bool {
        self.columns.is_empty()
            || self
                .columns
                .iter()
                .any(|(f, q)| f.as_ref() == family && q.as_ref() == qualifier)
    }

    /// Selected `(family, qualifier)` pairs in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.columns.iter().map(|(f, q)| (f.as_ref(), q.as_ref()))
    }

    /// Versions returned per cell.
    pub fn max_versions(&self) -> i32 {
        self.max_versions
    }

    /// Rows fetched per round trip.
    pub fn caching(&self) -> i32 {
        self.caching
    }

    /// Block cache flag.
    pub fn cache_blocks(&self) -> bool {
        self.cache_blocks
    }

    /// Attached filter, if any.
    pub fn filter(&self) -> Option<&FilterSpec> {
        self.filter.as_ref()
    }

    /// Start row, `None` when unbounded.
    pub fn start_row(&self) -> Option<&[u8]> {
        self.start.as_deref()
    }

    /// Stop row, `None` when unbounded.
    pub fn stop_row(&self) -> Option<&[u8]> {
        self.stop.as_deref()
    }
}

/// Remote filter.
#[derive(Debug)]
pub struct MemoryFilter {
    spec: FilterSpec,
    _handle: Tracked,
}

/// Remote table connection.
#[derive(Debug)]
pub struct MemoryTableHandle {
    rows: Rc<MemoryTable>,
    _handle: Tracked,
}

/// Open scanner; rows are snapshotted when it opens.
#[derive(Debug)]
pub struct MemoryScanner {
    rows: VecDeque<Rc<[CellData]>>,
    caching: usize,
    buffered: usize,
    closed: bool,
    _handle: Tracked,
}

/// Fetched row.
#[derive(Debug)]
pub struct MemoryRow {
    cells: Rc<[CellData]>,
    _handle: Tracked,
}

/// Cell array of a row.
#[derive(Debug)]
pub struct MemoryCells {
    cells: Rc<[CellData]>,
    _handle: Tracked,
}

/// One cell.
#[derive(Debug)]
pub struct MemoryCell {
    data: CellData,
    _handle: Tracked,
}

/// In-memory stand-in for the foreign runtime.
#[derive(Debug, Default)]
pub struct MemoryBridge {
    legacy: bool,
    missing: RefCell<HashSet<RemoteSymbol>>,
    faults: RefCell<HashSet<Fault>>,
    ignore_columns: StdCell<bool>,
    ledger: Rc<Ledger>,
}

impl MemoryBridge {
    /// Bridge exposing the current cell interface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge exposing only the legacy key-value cell type.
    pub fn legacy() -> Self {
        Self {
            legacy: true,
            ..Self::default()
        }
    }

    /// Make `symbol` unresolvable.
    pub fn remove_symbol(&self, symbol: RemoteSymbol) {
        self.missing.borrow_mut().insert(symbol);
    }

    /// Make every later call of `fault`'s operation raise.
    pub fn fail(&self, fault: Fault) {
        self.faults.borrow_mut().insert(fault);
    }

    /// Undo [`MemoryBridge::fail`].
    pub fn heal(&self, fault: Fault) {
        self.faults.borrow_mut().remove(&fault);
    }

    /// Return every cell of a row regardless of the columns a scan selects,
    /// like a server that ignores column selection.
    pub fn ignore_column_selection(&self) {
        self.ignore_columns.set(true);
    }

    /// Handles of `kind` currently alive.
    pub fn live(&self, kind: HandleKind) -> usize {
        self.ledger.live.borrow().get(&kind).copied().unwrap_or(0)
    }

    /// Handles of `kind` ever created.
    pub fn acquired(&self, kind: HandleKind) -> usize {
        self.ledger.acquired.borrow().get(&kind).copied().unwrap_or(0)
    }

    /// Kinds with live handles and their counts.
    pub fn leaked(&self) -> Vec<(HandleKind, usize)> {
        let mut leaked: Vec<_> = self
            .ledger
            .live
            .borrow()
            .iter()
            .filter(|(_, live)| **live > 0)
            .map(|(kind, live)| (*kind, *live))
            .collect();
        leaked.sort_by_key(|(kind, _)| format!("{kind:?}"));
        leaked
    }

    /// Successful scanner closes.
    pub fn scanners_closed(&self) -> usize {
        self.ledger.scanners_closed.get()
    }

    /// Successful table closes.
    pub fn tables_closed(&self) -> usize {
        self.ledger.tables_closed.get()
    }

    /// Batches fetched across all scanners, `caching` rows at a time.
    pub fn round_trips(&self) -> usize {
        self.ledger.round_trips.get()
    }

    /// Standalone cell array, for exercising decoders without a scan.
    pub fn cells<'a>(
        &self,
        cells: impl IntoIterator<Item = (&'a [u8], &'a [u8], &'a [u8], &'a [u8])>,
    ) -> MemoryCells {
        let cells: Vec<CellData> = cells
            .into_iter()
            .map(|(row, family, qualifier, value)| CellData::encode(row, family, qualifier, value))
            .collect();
        MemoryCells {
            cells: cells.into(),
            _handle: acquire(&self.ledger, HandleKind::Cells),
        }
    }

    fn check(&self, fault: Fault) -> Result<(), BridgeError> {
        if self.faults.borrow().contains(&fault) {
            return Err(BridgeError::exception(
                IO_EXCEPTION,
                format!("injected failure: {fault:?}"),
            ));
        }
        Ok(())
    }

    fn track(&self, kind: HandleKind) -> Tracked {
        acquire(&self.ledger, kind)
    }
}

fn is_cell_symbol(symbol: &RemoteSymbol) -> bool {
    match symbol {
        RemoteSymbol::Type(name) => *name == CELL,
        RemoteSymbol::Method { owner, .. } | RemoteSymbol::StaticField { owner, .. } => {
            *owner == CELL
        }
    }
}

impl Bridge for MemoryBridge {
    type Bytes = MemoryBytes;
    type Scan = MemoryScan;
    type Filter = MemoryFilter;
    type Table = MemoryTableHandle;
    type Scanner = MemoryScanner;
    type Row = MemoryRow;
    type Cells = MemoryCells;
    type Cell = MemoryCell;

    fn resolve(&self, symbol: &RemoteSymbol) -> Result<(), BridgeError> {
        if self.missing.borrow().contains(symbol) || (self.legacy && is_cell_symbol(symbol)) {
            return Err(symbol.not_found());
        }
        Ok(())
    }

    fn compare_op_names(&self) -> Result<Vec<String>, BridgeError> {
        Ok(COMPARE_OP_NAMES.iter().map(|name| name.to_string()).collect())
    }

    fn new_byte_array(&self, data: &[u8]) -> Result<MemoryBytes, BridgeError> {
        if self.faults.borrow().contains(&Fault::ByteArray) {
            return Err(BridgeError::Allocation { len: data.len() });
        }
        Ok(MemoryBytes {
            data: Bytes::copy_from_slice(data),
            empty_row: false,
            _handle: Some(self.track(HandleKind::ByteArray)),
        })
    }

    fn empty_row(&self) -> MemoryBytes {
        MemoryBytes {
            data: Bytes::new(),
            empty_row: true,
            _handle: None,
        }
    }

    fn new_scan(&self) -> Result<MemoryScan, BridgeError> {
        self.check(Fault::NewScan)?;
        Ok(MemoryScan {
            columns: Vec::new(),
            max_versions: 1,
            caching: -1,
            cache_blocks: true,
            filter: None,
            start: None,
            stop: None,
            _handle: self.track(HandleKind::Scan),
        })
    }

    fn set_max_versions(&self, scan: &mut MemoryScan, versions: i32) -> Result<(), BridgeError> {
        scan.max_versions = versions;
        Ok(())
    }

    fn set_caching(&self, scan: &mut MemoryScan, rows: i32) -> Result<(), BridgeError> {
        scan.caching = rows;
        Ok(())
    }

    fn set_cache_blocks(
        &self,
        scan: &mut MemoryScan,
        cache_blocks: bool,
    ) -> Result<(), BridgeError> {
        scan.cache_blocks = cache_blocks;
        Ok(())
    }

    fn add_column(
        &self,
        scan: &mut MemoryScan,
        family: &MemoryBytes,
        qualifier: &MemoryBytes,
    ) -> Result<(), BridgeError> {
        if !scan
            .columns
            .iter()
            .any(|(f, q)| f == &family.data && q == &qualifier.data)
        {
            scan.columns.push((family.data.clone(), qualifier.data.clone()));
        }
        Ok(())
    }

    fn set_filter(&self, scan: &mut MemoryScan, filter: &MemoryFilter) -> Result<(), BridgeError> {
        scan.filter = Some(filter.spec.clone());
        Ok(())
    }

    fn set_start_row(&self, scan: &mut MemoryScan, row: &MemoryBytes) -> Result<(), BridgeError> {
        scan.start = (!row.data.is_empty()).then(|| row.data.clone());
        Ok(())
    }

    fn set_stop_row(&self, scan: &mut MemoryScan, row: &MemoryBytes) -> Result<(), BridgeError> {
        scan.stop = (!row.data.is_empty()).then(|| row.data.clone());
        Ok(())
    }

    fn new_filter_list(&self) -> Result<MemoryFilter, BridgeError> {
        self.check(Fault::NewFilter)?;
        Ok(MemoryFilter {
            spec: FilterSpec::MustPassAll(Vec::new()),
            _handle: self.track(HandleKind::Filter),
        })
    }

    fn new_column_value_filter(
        &self,
        family: &MemoryBytes,
        qualifier: &MemoryBytes,
        op: CompareOp,
        value: &MemoryBytes,
    ) -> Result<MemoryFilter, BridgeError> {
        self.check(Fault::NewFilter)?;
        Ok(MemoryFilter {
            spec: FilterSpec::ColumnValue {
                family: family.data.clone(),
                qualifier: qualifier.data.clone(),
                op,
                value: value.data.clone(),
            },
            _handle: self.track(HandleKind::Filter),
        })
    }

    fn add_filter(
        &self,
        list: &mut MemoryFilter,
        filter: &MemoryFilter,
    ) -> Result<(), BridgeError> {
        match &mut list.spec {
            FilterSpec::MustPassAll(filters) => {
                filters.push(filter.spec.clone());
                Ok(())
            }
            FilterSpec::ColumnValue { .. } => Err(BridgeError::exception(
                "java.lang.ClassCastException",
                "filter is not a filter list",
            )),
        }
    }

    fn open_scanner(
        &self,
        table: &MemoryTableHandle,
        scan: &MemoryScan,
    ) -> Result<MemoryScanner, BridgeError> {
        self.check(Fault::OpenScanner)?;
        Ok(MemoryScanner {
            rows: table.rows.scan(scan, !self.ignore_columns.get()),
            caching: usize::try_from(scan.caching).unwrap_or(1).max(1),
            buffered: 0,
            closed: false,
            _handle: self.track(HandleKind::Scanner),
        })
    }

    fn next_row(&self, scanner: &mut MemoryScanner) -> Result<Option<MemoryRow>, BridgeError> {
        self.check(Fault::Next)?;
        if scanner.closed {
            return Err(BridgeError::exception(IO_EXCEPTION, "scanner is closed"));
        }
        let Some(cells) = scanner.rows.pop_front() else {
            return Ok(None);
        };
        if scanner.buffered == 0 {
            let trips = &self.ledger.round_trips;
            trips.set(trips.get() + 1);
            scanner.buffered = scanner.caching.min(scanner.rows.len() + 1);
        }
        scanner.buffered -= 1;
        Ok(Some(MemoryRow {
            cells,
            _handle: self.track(HandleKind::Row),
        }))
    }

    fn close_scanner(&self, scanner: &mut MemoryScanner) -> Result<(), BridgeError> {
        self.check(Fault::CloseScanner)?;
        scanner.closed = true;
        scanner.rows.clear();
        let closed = &self.ledger.scanners_closed;
        closed.set(closed.get() + 1);
        Ok(())
    }

    fn raw_cells(&self, row: &MemoryRow) -> Result<MemoryCells, BridgeError> {
        self.check(Fault::RawCells)?;
        Ok(MemoryCells {
            cells: Rc::clone(&row.cells),
            _handle: self.track(HandleKind::Cells),
        })
    }

    fn cell_count(&self, cells: &MemoryCells) -> usize {
        cells.cells.len()
    }

    fn cell_at(&self, cells: &MemoryCells, index: usize) -> Result<MemoryCell, BridgeError> {
        let data = cells.cells.get(index).cloned().ok_or_else(|| {
            BridgeError::exception(
                OUT_OF_BOUNDS,
                format!("index {index} out of bounds for length {}", cells.cells.len()),
            )
        })?;
        Ok(MemoryCell {
            data,
            _handle: self.track(HandleKind::Cell),
        })
    }

    fn cell_array(&self, cell: &MemoryCell, _field: CellField) -> Result<MemoryBytes, BridgeError> {
        // Both cell interfaces share one backing buffer here.
        Ok(MemoryBytes {
            data: cell.data.buffer.clone(),
            empty_row: false,
            _handle: Some(self.track(HandleKind::CellArray)),
        })
    }

    fn cell_offset(&self, cell: &MemoryCell, field: CellField) -> Result<usize, BridgeError> {
        Ok(cell.data.spans[field.index()].0)
    }

    fn cell_length(&self, cell: &MemoryCell, field: CellField) -> Result<usize, BridgeError> {
        Ok(cell.data.spans[field.index()].1)
    }

    fn read_region(
        &self,
        array: &MemoryBytes,
        offset: usize,
        dst: &mut [u8],
    ) -> Result<(), BridgeError> {
        self.check(Fault::ReadRegion)?;
        let end = offset + dst.len();
        let src = array.data.get(offset..end).ok_or_else(|| {
            BridgeError::exception(
                OUT_OF_BOUNDS,
                format!("region {offset}..{end} out of bounds for length {}", array.data.len()),
            )
        })?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn close_table(&self, table: MemoryTableHandle) -> Result<(), BridgeError> {
        drop(table);
        self.check(Fault::CloseTable)?;
        let closed = &self.ledger.tables_closed;
        closed.set(closed.get() + 1);
        Ok(())
    }
}
