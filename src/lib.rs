#![deny(missing_docs)]
//! Table-scan adapter for an HBase-style wide-column store reached through a
//! foreign-call bridge.
//!
//! A [`TableScanner`] turns a projection ([`TupleDescriptor`]) and pushed-down
//! predicates ([`ColumnFilter`]) into a remote scan, walks an ordered list of
//! [`ScanRange`]s as one row stream, and decodes cells into fixed-layout
//! [`Tuple`]s. All remote access goes through the [`Bridge`] trait;
//! [`bridge::memory`] provides an in-memory implementation.
//!
//! ```
//! use arrow::datatypes::DataType;
//! use hbase_scan::{
//!     bridge::memory::{MemoryBridge, MemoryTable, MemoryTables},
//!     registry, ColumnRef, NullIndicatorOffset, ScanOptions, ScanRange, SlotDescriptor,
//!     TableScanner, Tuple, TupleDescriptor,
//! };
//!
//! let bridge = MemoryBridge::new();
//! let mut table = MemoryTable::new();
//! table.put("row1", "cf", "n", 7i32.to_be_bytes());
//! let mut tables = MemoryTables::new();
//! tables.insert("t", table);
//!
//! let registry = registry::BridgeRegistry::resolve(&bridge)?;
//! let slot = SlotDescriptor::new(
//!     ColumnRef::new("cf", "n"),
//!     DataType::Int32,
//!     1,
//!     NullIndicatorOffset::new(0, 0),
//! );
//! let desc = TupleDescriptor::new("t", 5, vec![slot.clone()]);
//!
//! let mut scanner = TableScanner::new(&bridge, &tables, &registry, ScanOptions::default());
//! scanner.start_scan(&desc, vec![ScanRange::all()], &[])?;
//! while scanner.next()? {
//!     let mut tuple = Tuple::new(desc.byte_size);
//!     scanner.write_value("cf", "n", &slot, &mut tuple)?;
//!     assert_eq!(tuple.get_i32(1), 7);
//! }
//! scanner.close()?;
//! # Ok::<(), hbase_scan::ScanError>(())
//! ```

mod observability;

/// Bump allocator for decoded values.
pub mod arena;

/// Remote runtime seam, process-wide registry and in-memory bridge.
pub mod bridge;

/// Cursor over the cells of the current row.
pub mod cursor;

/// Cell field decoding.
pub mod decode;

/// Error types.
pub mod error;

/// Scanner metrics.
pub mod metrics;

/// Scan configuration.
pub mod option;

/// Multi-range row stream.
pub mod range;

/// Key ranges.
pub mod scan;

/// Scan orchestration.
pub mod scanner;

/// Projection and filter descriptors.
pub mod schema;

/// Scan specification building.
pub mod spec;

/// Output tuples and slot writing.
pub mod tuple;

pub use crate::{
    arena::ValueArena,
    bridge::{registry, Bridge, CellField, CompareOp, RemoteSymbol, TableFactory},
    cursor::RowCursor,
    decode::CellDecoder,
    error::{BridgeError, ScanError},
    metrics::ScanMetricsSnapshot,
    option::{ScanOptions, DEFAULT_ROWS_CACHED},
    range::RangeIterator,
    scan::ScanRange,
    scanner::TableScanner,
    schema::{ColumnFilter, ColumnRef, NullIndicatorOffset, SlotDescriptor, TupleDescriptor},
    spec::{ScanPlan, ScanSpec, ScanSpecBuilder},
    tuple::{Tuple, TupleWriter},
};
