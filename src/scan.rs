//! Key ranges a table scan walks through, in order.

use std::fmt;

/// A half-open row-key range `[start_key, stop_key)`.
///
/// An empty key leaves that side unbounded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScanRange {
    start_key: Vec<u8>,
    stop_key: Vec<u8>,
}

impl ScanRange {
    /// Create a range from explicit keys.
    pub fn new(start_key: impl Into<Vec<u8>>, stop_key: impl Into<Vec<u8>>) -> Self {
        Self {
            start_key: start_key.into(),
            stop_key: stop_key.into(),
        }
    }

    /// Create an unbounded range (all rows).
    pub fn all() -> Self {
        Self::default()
    }

    /// Inclusive start key; empty when unbounded.
    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    /// Exclusive stop key; empty when unbounded.
    pub fn stop_key(&self) -> &[u8] {
        &self.stop_key
    }

    /// Whether `key` falls inside this range.
    pub fn contains(&self, key: &[u8]) -> bool {
        let start_ok = self.start_key.is_empty() || key >= self.start_key.as_slice();
        let stop_ok = self.stop_key.is_empty() || key < self.stop_key.as_slice();
        start_ok && stop_ok
    }
}

impl fmt::Display for ScanRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if !self.start_key.is_empty() {
            write!(f, "start_key={}", String::from_utf8_lossy(&self.start_key))?;
            sep = " ";
        }
        if !self.stop_key.is_empty() {
            write!(f, "{sep}stop_key={}", String::from_utf8_lossy(&self.stop_key))?;
        }
        Ok(())
    }
}
