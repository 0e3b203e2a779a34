//! One-time resolution of the remote types and operations the scanner calls.
//!
//! Resolution is process-wide: [`init`] resolves once and every later call
//! returns the same registry. There is no teardown before process exit.

use once_cell::sync::OnceCell;

use super::{Bridge, CompareOp, RemoteSymbol};
use crate::{
    error::{BridgeError, ScanError},
    observability::log_info,
};

pub(crate) const SCAN: &str = "org/apache/hadoop/hbase/client/Scan";
pub(crate) const RESULT_SCANNER: &str = "org/apache/hadoop/hbase/client/ResultScanner";
pub(crate) const RESULT: &str = "org/apache/hadoop/hbase/client/Result";
pub(crate) const HCONSTANTS: &str = "org/apache/hadoop/hbase/HConstants";
pub(crate) const FILTER_LIST: &str = "org/apache/hadoop/hbase/filter/FilterList";
pub(crate) const FILTER_LIST_OPERATOR: &str = "org/apache/hadoop/hbase/filter/FilterList$Operator";
pub(crate) const SINGLE_COLUMN_VALUE_FILTER: &str =
    "org/apache/hadoop/hbase/filter/SingleColumnValueFilter";
pub(crate) const COMPARE_OP: &str = "org/apache/hadoop/hbase/filter/CompareFilter$CompareOp";
pub(crate) const CELL: &str = "org/apache/hadoop/hbase/Cell";
pub(crate) const KEY_VALUE: &str = "org/apache/hadoop/hbase/KeyValue";

const REQUIRED_TYPES: [&str; 8] = [
    SCAN,
    RESULT_SCANNER,
    RESULT,
    HCONSTANTS,
    FILTER_LIST,
    FILTER_LIST_OPERATOR,
    SINGLE_COLUMN_VALUE_FILTER,
    COMPARE_OP,
];

const fn method(owner: &'static str, name: &'static str) -> RemoteSymbol {
    RemoteSymbol::Method { owner, name }
}

const fn field(owner: &'static str, name: &'static str) -> RemoteSymbol {
    RemoteSymbol::StaticField { owner, name }
}

const REQUIRED_MEMBERS: [RemoteSymbol; 17] = [
    method(SCAN, "<init>"),
    method(SCAN, "setMaxVersions"),
    method(SCAN, "setCaching"),
    method(SCAN, "setCacheBlocks"),
    method(SCAN, "addColumn"),
    method(SCAN, "setFilter"),
    method(SCAN, "setStartRow"),
    method(SCAN, "setStopRow"),
    method(RESULT_SCANNER, "next"),
    method(RESULT_SCANNER, "close"),
    method(RESULT, "raw"),
    field(HCONSTANTS, "EMPTY_START_ROW"),
    method(FILTER_LIST, "<init>"),
    method(FILTER_LIST, "addFilter"),
    field(FILTER_LIST_OPERATOR, "MUST_PASS_ALL"),
    method(SINGLE_COLUMN_VALUE_FILTER, "<init>"),
    method(COMPARE_OP, "values"),
];

const SPAN_ACCESSORS: [&str; 8] = [
    "getRowOffset",
    "getRowLength",
    "getFamilyOffset",
    "getFamilyLength",
    "getQualifierOffset",
    "getQualifierLength",
    "getValueOffset",
    "getValueLength",
];

/// Which cell interface the remote runtime exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellApi {
    /// Separate row/family/qualifier/value arrays.
    Cell,
    /// Legacy key-value type; every field lives in one backing buffer.
    KeyValue,
}

impl CellApi {
    fn owner(self) -> &'static str {
        match self {
            CellApi::Cell => CELL,
            CellApi::KeyValue => KEY_VALUE,
        }
    }

    fn accessors(self) -> Vec<RemoteSymbol> {
        let owner = self.owner();
        let arrays: &[&'static str] = match self {
            CellApi::Cell => &[
                "getRowArray",
                "getFamilyArray",
                "getQualifierArray",
                "getValueArray",
            ],
            CellApi::KeyValue => &["getBuffer"],
        };
        arrays
            .iter()
            .chain(SPAN_ACCESSORS.iter())
            .map(|name| method(owner, *name))
            .collect()
    }
}

/// Resolved remote surface shared by every scanner in the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRegistry {
    cell_api: CellApi,
    compare_ops: Vec<CompareOp>,
}

impl BridgeRegistry {
    /// Resolve every required symbol through `bridge`.
    ///
    /// # Errors
    /// Returns [`ScanError::Resolution`] naming the first symbol or comparator
    /// that could not be resolved.
    pub fn resolve<B: Bridge>(bridge: &B) -> Result<Self, ScanError> {
        for name in REQUIRED_TYPES {
            bridge
                .resolve(&RemoteSymbol::Type(name))
                .map_err(ScanError::Resolution)?;
        }

        // Older runtimes only ship the key-value type.
        let cell_api = match bridge.resolve(&RemoteSymbol::Type(CELL)) {
            Ok(()) => CellApi::Cell,
            Err(_) => {
                bridge
                    .resolve(&RemoteSymbol::Type(KEY_VALUE))
                    .map_err(ScanError::Resolution)?;
                CellApi::KeyValue
            }
        };

        for symbol in REQUIRED_MEMBERS.iter().copied().chain(cell_api.accessors()) {
            bridge.resolve(&symbol).map_err(ScanError::Resolution)?;
        }

        let compare_ops = bridge
            .compare_op_names()
            .map_err(ScanError::Resolution)?
            .iter()
            .map(|name| {
                CompareOp::from_remote_name(name).ok_or_else(|| {
                    ScanError::Resolution(BridgeError::NotFound {
                        kind: "comparator",
                        name: name.clone(),
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log_info!(
            component = "bridge",
            event = "bridge_resolved",
            cell_api = ?cell_api,
            comparators = compare_ops.len(),
        );
        Ok(Self {
            cell_api,
            compare_ops,
        })
    }

    /// Cell interface detected during resolution.
    pub fn cell_api(&self) -> CellApi {
        self.cell_api
    }

    /// Resolved comparators in ordinal order.
    pub fn compare_ops(&self) -> &[CompareOp] {
        &self.compare_ops
    }

    /// Comparator at `ordinal` of the remote enumeration.
    pub fn compare_op(&self, ordinal: usize) -> Result<CompareOp, ScanError> {
        self.compare_ops
            .get(ordinal)
            .copied()
            .ok_or(ScanError::UnknownCompareOp {
                ordinal,
                available: self.compare_ops.len(),
            })
    }
}

static REGISTRY: OnceCell<BridgeRegistry> = OnceCell::new();

/// Resolve the process-wide registry, or return the one already resolved.
pub fn init<B: Bridge>(bridge: &B) -> Result<&'static BridgeRegistry, ScanError> {
    REGISTRY.get_or_try_init(|| BridgeRegistry::resolve(bridge))
}

/// The process-wide registry.
///
/// # Errors
/// Returns [`ScanError::NotInitialized`] before a successful [`init`].
pub fn registry() -> Result<&'static BridgeRegistry, ScanError> {
    REGISTRY.get().ok_or(ScanError::NotInitialized)
}
