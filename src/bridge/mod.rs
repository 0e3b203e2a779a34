//! Seam between the scanner and the foreign runtime that owns the store client.
//!
//! Every remote object the scanner touches (byte arrays, the scan
//! specification, filters, the open scanner, fetched rows and their cells) is
//! an associated handle type of [`Bridge`]. Dropping a handle releases the
//! remote reference it holds, so call-local temporaries are released at the end
//! of the scope that created them and long-lived handles are released when the
//! scanner replaces or closes them.
//!
//! The rest of the crate only talks to the store through this trait, which keeps
//! it testable against [`memory::MemoryBridge`].

pub mod memory;
pub mod registry;

use std::{cmp::Ordering, fmt};

use crate::error::BridgeError;

/// Logical part of a cell addressed by the offset/length accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellField {
    /// Row key; identical for every cell of a row.
    Row,
    /// Column family.
    Family,
    /// Column qualifier.
    Qualifier,
    /// Cell value.
    Value,
}

impl CellField {
    pub(crate) fn index(self) -> usize {
        match self {
            CellField::Row => 0,
            CellField::Family => 1,
            CellField::Qualifier => 2,
            CellField::Value => 3,
        }
    }
}

/// Comparison applied by a single-column value filter, in remote ordinal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `value < constant`
    Less,
    /// `value <= constant`
    LessOrEqual,
    /// `value == constant`
    Equal,
    /// `value != constant`
    NotEqual,
    /// `value >= constant`
    GreaterOrEqual,
    /// `value > constant`
    Greater,
    /// Matches nothing.
    NoOp,
}

impl CompareOp {
    /// Map a remote enumeration constant name to an operator.
    pub fn from_remote_name(name: &str) -> Option<Self> {
        let op = match name {
            "LESS" => CompareOp::Less,
            "LESS_OR_EQUAL" => CompareOp::LessOrEqual,
            "EQUAL" => CompareOp::Equal,
            "NOT_EQUAL" => CompareOp::NotEqual,
            "GREATER_OR_EQUAL" => CompareOp::GreaterOrEqual,
            "GREATER" => CompareOp::Greater,
            "NO_OP" => CompareOp::NoOp,
            _ => return None,
        };
        Some(op)
    }

    /// Remote enumeration constant name.
    pub fn remote_name(self) -> &'static str {
        match self {
            CompareOp::Less => "LESS",
            CompareOp::LessOrEqual => "LESS_OR_EQUAL",
            CompareOp::Equal => "EQUAL",
            CompareOp::NotEqual => "NOT_EQUAL",
            CompareOp::GreaterOrEqual => "GREATER_OR_EQUAL",
            CompareOp::Greater => "GREATER",
            CompareOp::NoOp => "NO_OP",
        }
    }

    /// Whether a value ordered `ordering` relative to the constant passes.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessOrEqual => ordering != Ordering::Greater,
            CompareOp::Equal => ordering == Ordering::Equal,
            CompareOp::NotEqual => ordering != Ordering::Equal,
            CompareOp::GreaterOrEqual => ordering != Ordering::Less,
            CompareOp::Greater => ordering == Ordering::Greater,
            CompareOp::NoOp => false,
        }
    }
}

/// A remote type or member that must resolve before any scan can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteSymbol {
    /// A class/type, by slash-separated qualified name.
    Type(&'static str),
    /// An instance or static operation on `owner`.
    Method {
        /// Owning type.
        owner: &'static str,
        /// Operation name (`<init>` for constructors).
        name: &'static str,
    },
    /// A static field on `owner`.
    StaticField {
        /// Owning type.
        owner: &'static str,
        /// Field name.
        name: &'static str,
    },
}

impl RemoteSymbol {
    /// Kind label used in resolution errors.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteSymbol::Type(_) => "type",
            RemoteSymbol::Method { .. } => "method",
            RemoteSymbol::StaticField { .. } => "field",
        }
    }

    /// Error reporting that this symbol is missing.
    pub fn not_found(&self) -> BridgeError {
        BridgeError::NotFound {
            kind: self.kind(),
            name: self.to_string(),
        }
    }
}

impl fmt::Display for RemoteSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSymbol::Type(name) => write!(f, "{name}"),
            RemoteSymbol::Method { owner, name } | RemoteSymbol::StaticField { owner, name } => {
                write!(f, "{owner}.{name}")
            }
        }
    }
}

/// Operations the scanner needs from the foreign runtime.
///
/// Every fallible call reports a pending remote exception as a [`BridgeError`];
/// callers propagate it immediately.
pub trait Bridge {
    /// Remote byte array.
    type Bytes;
    /// Remote scan specification.
    type Scan;
    /// Remote filter (a single-column filter or a conjunction of filters).
    type Filter;
    /// Remote table connection.
    type Table;
    /// Open remote scanner over one key range.
    type Scanner;
    /// One fetched row.
    type Row;
    /// Cell array of a fetched row.
    type Cells;
    /// One cell of a row.
    type Cell;

    /// Check that a type or member exists in the remote runtime.
    fn resolve(&self, symbol: &RemoteSymbol) -> Result<(), BridgeError>;

    /// Names of the comparison operator enumeration, in ordinal order.
    fn compare_op_names(&self) -> Result<Vec<String>, BridgeError>;

    /// Copy `data` into a new remote byte array.
    fn new_byte_array(&self, data: &[u8]) -> Result<Self::Bytes, BridgeError>;

    /// The store's reserved empty-row constant, meaning "no bound".
    fn empty_row(&self) -> Self::Bytes;

    /// Construct an empty scan specification.
    fn new_scan(&self) -> Result<Self::Scan, BridgeError>;

    /// Limit the number of versions returned per cell.
    fn set_max_versions(&self, scan: &mut Self::Scan, versions: i32) -> Result<(), BridgeError>;

    /// Rows fetched per remote round trip.
    fn set_caching(&self, scan: &mut Self::Scan, rows: i32) -> Result<(), BridgeError>;

    /// Whether scanned blocks enter the store's block cache.
    fn set_cache_blocks(&self, scan: &mut Self::Scan, cache_blocks: bool)
        -> Result<(), BridgeError>;

    /// Restrict the scan to include `family:qualifier`.
    fn add_column(
        &self,
        scan: &mut Self::Scan,
        family: &Self::Bytes,
        qualifier: &Self::Bytes,
    ) -> Result<(), BridgeError>;

    /// Attach a filter to the scan.
    fn set_filter(&self, scan: &mut Self::Scan, filter: &Self::Filter) -> Result<(), BridgeError>;

    /// Inclusive start row.
    fn set_start_row(&self, scan: &mut Self::Scan, row: &Self::Bytes) -> Result<(), BridgeError>;

    /// Exclusive stop row.
    fn set_stop_row(&self, scan: &mut Self::Scan, row: &Self::Bytes) -> Result<(), BridgeError>;

    /// Construct an empty filter list whose members must all pass.
    fn new_filter_list(&self) -> Result<Self::Filter, BridgeError>;

    /// Construct a filter passing rows where `family:qualifier <op> value`.
    fn new_column_value_filter(
        &self,
        family: &Self::Bytes,
        qualifier: &Self::Bytes,
        op: CompareOp,
        value: &Self::Bytes,
    ) -> Result<Self::Filter, BridgeError>;

    /// Append `filter` to a filter list.
    fn add_filter(&self, list: &mut Self::Filter, filter: &Self::Filter) -> Result<(), BridgeError>;

    /// Open a scanner for `scan` over `table`.
    fn open_scanner(
        &self,
        table: &Self::Table,
        scan: &Self::Scan,
    ) -> Result<Self::Scanner, BridgeError>;

    /// Fetch the next row, or `None` once the scanner's range is exhausted.
    fn next_row(&self, scanner: &mut Self::Scanner) -> Result<Option<Self::Row>, BridgeError>;

    /// Close the scanner, releasing its server-side lease.
    fn close_scanner(&self, scanner: &mut Self::Scanner) -> Result<(), BridgeError>;

    /// The row's cells, ordered by family then qualifier.
    fn raw_cells(&self, row: &Self::Row) -> Result<Self::Cells, BridgeError>;

    /// Number of cells in a cell array.
    fn cell_count(&self, cells: &Self::Cells) -> usize;

    /// Cell at `index`.
    fn cell_at(&self, cells: &Self::Cells, index: usize) -> Result<Self::Cell, BridgeError>;

    /// Backing array holding `field`.
    fn cell_array(&self, cell: &Self::Cell, field: CellField) -> Result<Self::Bytes, BridgeError>;

    /// Offset of `field` inside its backing array.
    fn cell_offset(&self, cell: &Self::Cell, field: CellField) -> Result<usize, BridgeError>;

    /// Length of `field` in bytes.
    fn cell_length(&self, cell: &Self::Cell, field: CellField) -> Result<usize, BridgeError>;

    /// Copy `dst.len()` bytes starting at `offset` out of `array`.
    fn read_region(
        &self,
        array: &Self::Bytes,
        offset: usize,
        dst: &mut [u8],
    ) -> Result<(), BridgeError>;

    /// Return a table connection so it is not kept around.
    fn close_table(&self, table: Self::Table) -> Result<(), BridgeError>;
}

/// Provider of table connections, usually backed by a connection cache.
pub trait TableFactory<B: Bridge> {
    /// Connection for table `name`.
    fn table(&self, bridge: &B, name: &str) -> Result<B::Table, BridgeError>;
}
