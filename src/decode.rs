//! Copies cell fields out of remote buffers into the value arena.

use std::cmp::Ordering;

use crate::{
    arena::ValueArena,
    bridge::{Bridge, CellField},
    cursor::{compare_name, RowCursor},
    error::BridgeError,
};

/// Decodes cell fields into arena-owned bytes.
///
/// Decoded slices never point into remote memory; they stay valid until the
/// arena is cleared.
pub struct CellDecoder<'a, B: Bridge> {
    bridge: &'a B,
    bytes_read: u64,
}

impl<'a, B: Bridge> CellDecoder<'a, B> {
    /// Decoder reading through `bridge`.
    pub fn new(bridge: &'a B) -> Self {
        Self {
            bridge,
            bytes_read: 0,
        }
    }

    /// Bytes copied out of remote buffers so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Copy `field` of `cell` into a region of `arena` sized to the field.
    pub fn decode<'r>(
        &mut self,
        cell: &B::Cell,
        field: CellField,
        arena: &'r mut ValueArena,
    ) -> Result<&'r [u8], BridgeError> {
        let offset = self.bridge.cell_offset(cell, field)?;
        let len = self.bridge.cell_length(cell, field)?;
        let array = self.bridge.cell_array(cell, field)?;
        let dst = arena.allocate(len);
        self.bridge.read_region(&array, offset, dst)?;
        self.bytes_read += len as u64;
        Ok(dst)
    }

    /// Value of `family:qualifier` at the cursor, or `None` when the row has
    /// no such cell there.
    ///
    /// Outside the accelerated path the cell's family and qualifier are checked
    /// first; a mismatch means the column is absent from this row. The cursor is
    /// never moved here, callers advance it when they consume the value.
    pub fn current_value<'r>(
        &mut self,
        cells: &B::Cells,
        cursor: &RowCursor,
        family: &str,
        qualifier: &str,
        arena: &'r mut ValueArena,
    ) -> Result<Option<&'r [u8]>, BridgeError> {
        if cursor.is_exhausted() {
            return Ok(None);
        }
        let cell = self.bridge.cell_at(cells, cursor.cell_index())?;
        if !cursor.all_present() {
            let decoded = self.decode(&cell, CellField::Family, arena)?;
            if compare_name(family, decoded) != Ordering::Equal {
                return Ok(None);
            }
            let decoded = self.decode(&cell, CellField::Qualifier, arena)?;
            if compare_name(qualifier, decoded) != Ordering::Equal {
                return Ok(None);
            }
        }
        self.decode(&cell, CellField::Value, arena).map(Some)
    }
}
