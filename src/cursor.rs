//! Position inside the cells of the current row.
//!
//! Reading a value is a pull that may consume a cell: the cursor only moves
//! forward when a requested column matched the cell under it.

use std::cmp::Ordering;

/// Cursor over the cells of the most recently fetched row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCursor {
    cell_index: usize,
    num_cells: usize,
    all_present: bool,
}

impl RowCursor {
    /// Cursor at the first of `num_cells` cells.
    ///
    /// `all_present` means the row holds exactly the requested columns in
    /// request order, so cells can be consumed without checking their names.
    pub fn new(num_cells: usize, all_present: bool) -> Self {
        Self {
            cell_index: 0,
            num_cells,
            all_present,
        }
    }

    /// Index of the next unconsumed cell.
    pub fn cell_index(&self) -> usize {
        self.cell_index
    }

    /// Cells in the current row.
    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Whether name checks can be skipped for this row.
    pub fn all_present(&self) -> bool {
        self.all_present
    }

    /// Whether every cell of the row has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.cell_index >= self.num_cells
    }

    /// Consume the cell under the cursor.
    pub fn advance(&mut self) {
        debug_assert!(self.cell_index < self.num_cells);
        self.cell_index += 1;
    }
}

/// Order a requested family or qualifier against decoded cell bytes.
///
/// Empty sorts before non-empty, then bytes compare up to the shorter length
/// and the shorter side wins a tie.
pub fn compare_name(requested: &str, decoded: &[u8]) -> Ordering {
    let requested = requested.as_bytes();
    match (requested.is_empty(), decoded.is_empty()) {
        (true, true) => Ordering::Equal,
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (false, false) => {
            let shared = requested.len().min(decoded.len());
            requested[..shared]
                .cmp(&decoded[..shared])
                .then(requested.len().cmp(&decoded.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_moves_forward_to_exhaustion() {
        let mut cursor = RowCursor::new(2, false);
        assert_eq!(cursor.cell_index(), 0);
        assert!(!cursor.is_exhausted());
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.cell_index(), 2);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn empty_row_starts_exhausted() {
        assert!(RowCursor::new(0, true).is_exhausted());
        assert!(RowCursor::default().is_exhausted());
    }

    #[test]
    fn name_ordering() {
        assert_eq!(compare_name("", b""), Ordering::Equal);
        assert_eq!(compare_name("a", b""), Ordering::Greater);
        assert_eq!(compare_name("", b"a"), Ordering::Less);
        assert_eq!(compare_name("abc", b"abc"), Ordering::Equal);
        assert_eq!(compare_name("ab", b"abc"), Ordering::Less);
        assert_eq!(compare_name("abc", b"ab"), Ordering::Greater);
        assert_eq!(compare_name("abd", b"abc"), Ordering::Greater);
        assert_eq!(compare_name("b", b"abc"), Ordering::Greater);
    }
}
