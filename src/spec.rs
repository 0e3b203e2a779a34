//! Scan specification: which columns to fetch, how to filter, how to batch.
//!
//! [`ScanPlan`] is the logical column/filter plan and needs no remote calls.
//! [`ScanSpecBuilder`] turns a plan into a remote scan object, which is then
//! reused for every key range of the scan.

use std::collections::HashSet;

use crate::{
    bridge::{registry::BridgeRegistry, Bridge},
    error::ScanError,
    option::ScanOptions,
    scan::ScanRange,
    schema::{ColumnFilter, ColumnRef, TupleDescriptor},
};

/// Columns, filters and batching of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    columns: Vec<ColumnRef>,
    num_requested: usize,
    filters: Vec<ColumnFilter>,
    caching: i32,
    cache_blocks: bool,
}

impl ScanPlan {
    /// Plan the scan of `desc` under `filters`.
    ///
    /// Materialized non-row-key slots become requested columns. A filter on a
    /// column that is not requested adds that column as an extra: the store
    /// does not evaluate filters on columns it does not return.
    pub fn new(desc: &TupleDescriptor, filters: &[ColumnFilter], options: &ScanOptions) -> Self {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for slot in desc.materialized_slots() {
            if !slot.column.is_row_key() && seen.insert(slot.column.clone()) {
                columns.push(slot.column.clone());
            }
        }
        let num_requested = columns.len();
        for filter in filters {
            let column = filter.column();
            if seen.insert(column.clone()) {
                columns.push(column);
            }
        }

        Self {
            columns,
            num_requested,
            filters: filters.to_vec(),
            caching: options.rows_cached(),
            cache_blocks: options.cache_blocks_enabled(),
        }
    }

    /// Every column fetched, requested ones first.
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Columns the projection asked for.
    pub fn requested_columns(&self) -> &[ColumnRef] {
        &self.columns[..self.num_requested]
    }

    /// Columns fetched only so their filters are evaluated.
    pub fn extra_columns(&self) -> &[ColumnRef] {
        &self.columns[self.num_requested..]
    }

    /// Number of requested columns.
    pub fn num_requested(&self) -> usize {
        self.num_requested
    }

    /// Number of filter-only columns.
    pub fn extra_filter_columns(&self) -> usize {
        self.columns.len() - self.num_requested
    }

    /// Upper bound on cells per row, or zero when the scan selects every
    /// column.
    pub fn max_cells(&self) -> usize {
        self.columns.len()
    }

    /// Predicates pushed to the store.
    pub fn filters(&self) -> &[ColumnFilter] {
        &self.filters
    }

    /// Rows fetched per round trip.
    pub fn caching(&self) -> i32 {
        self.caching
    }

    /// Block cache flag.
    pub fn cache_blocks(&self) -> bool {
        self.cache_blocks
    }
}

/// A remote scan object and the plan it was built from.
pub struct ScanSpec<B: Bridge> {
    scan: B::Scan,
    plan: ScanPlan,
}

impl<B: Bridge> ScanSpec<B> {
    /// The logical plan.
    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    /// The remote scan object.
    pub fn remote(&self) -> &B::Scan {
        &self.scan
    }

    /// Point the scan at `range`.
    pub fn set_bounds(&mut self, bridge: &B, range: &ScanRange) -> Result<(), ScanError> {
        let start = row_bound(bridge, range.start_key())?;
        bridge.set_start_row(&mut self.scan, &start)?;
        let stop = row_bound(bridge, range.stop_key())?;
        bridge.set_stop_row(&mut self.scan, &stop)?;
        Ok(())
    }
}

/// Builds [`ScanSpec`]s from projections and filters.
#[derive(Debug, Clone, Copy)]
pub struct ScanSpecBuilder<'a> {
    registry: &'a BridgeRegistry,
    options: &'a ScanOptions,
}

impl<'a> ScanSpecBuilder<'a> {
    /// Builder resolving comparators through `registry`.
    pub fn new(registry: &'a BridgeRegistry, options: &'a ScanOptions) -> Self {
        Self { registry, options }
    }

    /// Build the remote scan for `desc` under `filters`.
    ///
    /// # Errors
    /// Fails on the first remote call that fails, on a byte array that cannot
    /// be built, or on a comparator ordinal the registry does not know.
    pub fn build<B: Bridge>(
        &self,
        bridge: &B,
        desc: &TupleDescriptor,
        filters: &[ColumnFilter],
    ) -> Result<ScanSpec<B>, ScanError> {
        let plan = ScanPlan::new(desc, filters, self.options);

        let mut scan = bridge.new_scan()?;
        bridge.set_max_versions(&mut scan, 1)?;
        bridge.set_caching(&mut scan, plan.caching())?;
        bridge.set_cache_blocks(&mut scan, plan.cache_blocks())?;

        for column in plan.columns() {
            let family = byte_array(bridge, column.family.as_bytes())?;
            let qualifier = byte_array(bridge, column.qualifier.as_bytes())?;
            bridge.add_column(&mut scan, &family, &qualifier)?;
        }

        if !plan.filters().is_empty() {
            let mut list = bridge.new_filter_list()?;
            for filter in plan.filters() {
                let op = self.registry.compare_op(filter.op_ordinal)?;
                let family = byte_array(bridge, filter.family.as_bytes())?;
                let qualifier = byte_array(bridge, filter.qualifier.as_bytes())?;
                let constant = byte_array(bridge, &filter.constant)?;
                let single = bridge.new_column_value_filter(&family, &qualifier, op, &constant)?;
                bridge.add_filter(&mut list, &single)?;
            }
            bridge.set_filter(&mut scan, &list)?;
        }

        Ok(ScanSpec { scan, plan })
    }
}

fn byte_array<B: Bridge>(bridge: &B, data: &[u8]) -> Result<B::Bytes, ScanError> {
    bridge
        .new_byte_array(data)
        .map_err(|source| ScanError::ByteArray {
            key: String::from_utf8_lossy(data).into_owned(),
            source,
        })
}

// An empty key is the store's "no bound" constant, not an empty array.
fn row_bound<B: Bridge>(bridge: &B, key: &[u8]) -> Result<B::Bytes, ScanError> {
    if key.is_empty() {
        Ok(bridge.empty_row())
    } else {
        byte_array(bridge, key)
    }
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::DataType;

    use super::*;
    use crate::{
        bridge::{
            memory::{Fault, FilterSpec, HandleKind, MemoryBridge},
            CompareOp,
        },
        schema::{NullIndicatorOffset, SlotDescriptor},
    };

    fn desc(columns: &[(&str, &str)]) -> TupleDescriptor {
        let slots = columns
            .iter()
            .enumerate()
            .map(|(i, (family, qualifier))| {
                SlotDescriptor::new(
                    ColumnRef::new(*family, *qualifier),
                    DataType::Int32,
                    1 + i * 4,
                    NullIndicatorOffset::new(0, i as u8),
                )
            })
            .collect::<Vec<_>>();
        TupleDescriptor::new("t", 1 + slots.len() * 4, slots)
    }

    fn filter(family: &str, qualifier: &str, op_ordinal: usize, constant: &[u8]) -> ColumnFilter {
        ColumnFilter::new(family, qualifier, op_ordinal, constant.to_vec())
    }

    #[test]
    fn unprojected_filter_column_is_fetched_as_extra() {
        let plan = ScanPlan::new(
            &desc(&[("cf", "a")]),
            &[filter("cf", "b", 2, b"x")],
            &ScanOptions::default(),
        );
        assert_eq!(plan.requested_columns(), &[ColumnRef::new("cf", "a")]);
        assert_eq!(plan.extra_columns(), &[ColumnRef::new("cf", "b")]);
        assert_eq!(plan.extra_filter_columns(), 1);
        assert_eq!(plan.max_cells(), 2);
    }

    #[test]
    fn row_key_and_unmaterialized_slots_are_not_requested() {
        let mut desc = desc(&[("", ""), ("cf", "a"), ("cf", "b")]);
        desc.slots[2] = desc.slots[2].clone().unmaterialized();
        let plan = ScanPlan::new(&desc, &[], &ScanOptions::default());
        assert_eq!(plan.columns(), &[ColumnRef::new("cf", "a")]);
    }

    #[test]
    fn duplicates_are_counted_once() {
        let plan = ScanPlan::new(
            &desc(&[("cf", "a"), ("cf", "a")]),
            &[filter("cf", "a", 0, b"1"), filter("cf", "b", 0, b"1"), filter("cf", "b", 5, b"9")],
            &ScanOptions::default(),
        );
        assert_eq!(plan.num_requested(), 1);
        assert_eq!(plan.extra_filter_columns(), 1);
        assert_eq!(plan.filters().len(), 3);
    }

    #[test]
    fn builds_remote_scan() {
        let bridge = MemoryBridge::new();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let options = ScanOptions::default().caching(10).cache_blocks(true);
        let spec = ScanSpecBuilder::new(&registry, &options)
            .build(
                &bridge,
                &desc(&[("cf", "a")]),
                &[filter("cf", "b", 5, b"7")],
            )
            .unwrap();

        let scan = spec.remote();
        assert_eq!(scan.max_versions(), 1);
        assert_eq!(scan.caching(), 10);
        assert!(scan.cache_blocks());
        let columns: Vec<_> = scan.columns().collect();
        assert_eq!(columns, vec![(&b"cf"[..], &b"a"[..]), (&b"cf"[..], &b"b"[..])]);
        match scan.filter() {
            Some(FilterSpec::MustPassAll(filters)) => {
                assert_eq!(filters.len(), 1);
                assert!(matches!(
                    &filters[0],
                    FilterSpec::ColumnValue {
                        op: CompareOp::Greater,
                        value,
                        ..
                    } if &value[..] == b"7"
                ));
            }
            other => panic!("unexpected filter: {other:?}"),
        }
        // Call-local byte arrays and filters are released once built.
        assert_eq!(bridge.live(HandleKind::ByteArray), 0);
        assert_eq!(bridge.live(HandleKind::Filter), 0);
        assert_eq!(bridge.live(HandleKind::Scan), 1);
    }

    #[test]
    fn no_filters_leaves_scan_unfiltered() {
        let bridge = MemoryBridge::new();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let options = ScanOptions::default();
        let spec = ScanSpecBuilder::new(&registry, &options)
            .build(&bridge, &desc(&[("cf", "a")]), &[])
            .unwrap();
        assert!(spec.remote().filter().is_none());
        assert_eq!(spec.remote().caching(), 1024);
    }

    #[test]
    fn unknown_ordinal_fails() {
        let bridge = MemoryBridge::new();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let options = ScanOptions::default();
        let result = ScanSpecBuilder::new(&registry, &options).build(
            &bridge,
            &desc(&[("cf", "a")]),
            &[filter("cf", "a", 42, b"1")],
        );
        assert!(matches!(
            result,
            Err(ScanError::UnknownCompareOp { ordinal: 42, .. })
        ));
    }

    #[test]
    fn byte_array_failure_names_the_key() {
        let bridge = MemoryBridge::new();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let options = ScanOptions::default();
        bridge.fail(Fault::ByteArray);
        let result = ScanSpecBuilder::new(&registry, &options).build(
            &bridge,
            &desc(&[("cf", "a")]),
            &[],
        );
        match result {
            Err(ScanError::ByteArray { key, .. }) => assert_eq!(key, "cf"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("build should fail"),
        }
    }

    #[test]
    fn empty_bounds_use_the_sentinel() {
        let bridge = MemoryBridge::new();
        let registry = BridgeRegistry::resolve(&bridge).unwrap();
        let options = ScanOptions::default();
        let mut spec = ScanSpecBuilder::new(&registry, &options)
            .build(&bridge, &desc(&[("cf", "a")]), &[])
            .unwrap();

        spec.set_bounds(&bridge, &ScanRange::new("", "m")).unwrap();
        assert_eq!(spec.remote().start_row(), None);
        assert_eq!(spec.remote().stop_row(), Some(&b"m"[..]));

        spec.set_bounds(&bridge, &ScanRange::new("m", "")).unwrap();
        assert_eq!(spec.remote().start_row(), Some(&b"m"[..]));
        assert_eq!(spec.remote().stop_row(), None);
        assert_eq!(bridge.acquired(HandleKind::ByteArray), 2 + 2);
    }
}
