use thiserror::Error;

/// Failure reported by the foreign runtime behind a [`Bridge`](crate::bridge::Bridge).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// A remote type, operation or field could not be resolved.
    #[error("remote {kind} not found: {name}")]
    NotFound {
        /// What was being looked up (`type`, `method`, `field`).
        kind: &'static str,
        /// Fully qualified remote name.
        name: String,
    },
    /// The remote runtime raised an exception after a call.
    #[error("{class}: {message}")]
    Exception {
        /// Remote exception class.
        class: String,
        /// Exception message.
        message: String,
    },
    /// The runtime could not allocate a byte buffer of the requested size.
    #[error("could not allocate remote byte buffer of {len} bytes")]
    Allocation {
        /// Requested buffer length.
        len: usize,
    },
}

impl BridgeError {
    /// Shorthand for an [`BridgeError::Exception`].
    pub fn exception(class: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Exception {
            class: class.into(),
            message: message.into(),
        }
    }
}

/// Error returned by every scanner operation.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A call into the remote runtime failed.
    #[error("remote call failed: {0}")]
    Bridge(#[from] BridgeError),
    /// The bridge registry could not resolve a required remote symbol.
    #[error("bridge resolution failed: {0}")]
    Resolution(BridgeError),
    /// The process-wide bridge registry has not been initialized.
    #[error("bridge registry is not initialized")]
    NotInitialized,
    /// A byte buffer destined for the remote side could not be built.
    #[error("couldn't construct remote byte array for key {key}")]
    ByteArray {
        /// Text of the key or column name being converted.
        key: String,
        /// Underlying bridge failure.
        #[source]
        source: BridgeError,
    },
    /// A filter referenced a comparator ordinal outside the resolved enumeration.
    #[error("unknown comparator ordinal {ordinal}, {available} comparators resolved")]
    UnknownCompareOp {
        /// Requested ordinal.
        ordinal: usize,
        /// Number of comparators known to the registry.
        available: usize,
    },
    /// The store returned more cells for a row than the scan asked for.
    #[error("encountered more cells than expected: fetched {fetched}, expected at most {expected}")]
    TooManyCells {
        /// Cells in the fetched row.
        fetched: usize,
        /// Requested columns plus filter-only columns.
        expected: usize,
    },
    /// `start_scan` was called without any key range.
    #[error("scan requires at least one key range")]
    NoRanges,
    /// An earlier failure ended the scan; only `close` or a new `start_scan`
    /// can follow.
    #[error("scan stopped after an earlier failure")]
    Failed,
    /// An operation that needs an open scan ran before `start_scan`.
    #[error("scan has not been started")]
    NotStarted,
    /// A row accessor ran before a successful `next`.
    #[error("no current row")]
    NoCurrentRow,
    /// The current row carries no cells, so it has no row key.
    #[error("current row has no cells")]
    EmptyRow,
    /// The scanner was already closed.
    #[error("scanner is closed")]
    Closed,
}
