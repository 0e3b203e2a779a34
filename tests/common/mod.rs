//! Common test utilities for integration tests.
#![allow(dead_code)]

use arrow::datatypes::DataType;
use hbase_scan::{
    bridge::memory::{MemoryBridge, MemoryTable, MemoryTables},
    registry::BridgeRegistry,
    ColumnRef, NullIndicatorOffset, ScanError, SlotDescriptor, TableFactory, TableScanner,
    TupleDescriptor,
};

pub const TABLE: &str = "events";

/// Descriptor with one `Int32` slot per column, after the null-indicator bytes.
pub fn int_desc(columns: &[(&str, &str)]) -> TupleDescriptor {
    let null_bytes = columns.len().div_ceil(8);
    let slots = columns
        .iter()
        .enumerate()
        .map(|(i, (family, qualifier))| {
            SlotDescriptor::new(
                ColumnRef::new(*family, *qualifier),
                DataType::Int32,
                null_bytes + i * 4,
                NullIndicatorOffset::new(i / 8, (i % 8) as u8),
            )
        })
        .collect::<Vec<_>>();
    TupleDescriptor::new(TABLE, null_bytes + columns.len() * 4, slots)
}

/// One `cf:v` cell per key, holding the key's position as a big-endian `i32`.
pub fn keyed_table<K: AsRef<[u8]>>(keys: &[K]) -> MemoryTable {
    let mut table = MemoryTable::new();
    for (i, key) in keys.iter().enumerate() {
        table.put(key.as_ref(), "cf", "v", (i as i32).to_be_bytes());
    }
    table
}

/// Factory serving `table` as [`TABLE`].
pub fn tables_with(table: MemoryTable) -> MemoryTables {
    let mut tables = MemoryTables::new();
    tables.insert(TABLE, table);
    tables
}

pub fn resolve(bridge: &MemoryBridge) -> BridgeRegistry {
    BridgeRegistry::resolve(bridge).expect("in-memory bridge resolves")
}

/// Drain the scanner, collecting row keys.
pub fn collect_keys<F: TableFactory<MemoryBridge>>(
    scanner: &mut TableScanner<'_, MemoryBridge, F>,
) -> Result<Vec<Vec<u8>>, ScanError> {
    let mut keys = Vec::new();
    while scanner.next()? {
        keys.push(scanner.row_key()?.to_vec());
    }
    Ok(keys)
}
