//! Projection schema and filter descriptors handed to the scanner by the planner.

use arrow::datatypes::DataType;

/// A store column addressed by family and qualifier.
///
/// An empty qualifier denotes the row-key pseudo-column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    /// Column family.
    pub family: String,
    /// Column qualifier; empty for the row key.
    pub qualifier: String,
}

impl ColumnRef {
    /// Column `family:qualifier`.
    pub fn new(family: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
        }
    }

    /// The row-key pseudo-column.
    pub fn row_key() -> Self {
        Self::new("", "")
    }

    /// Whether this is the row-key pseudo-column.
    pub fn is_row_key(&self) -> bool {
        self.qualifier.is_empty()
    }
}

/// Location of a slot's null bit inside a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullIndicatorOffset {
    /// Byte holding the bit.
    pub byte_offset: usize,
    /// Mask selecting the bit.
    pub bit_mask: u8,
}

impl NullIndicatorOffset {
    /// Bit `bit` of byte `byte_offset`.
    pub fn new(byte_offset: usize, bit: u8) -> Self {
        debug_assert!(bit < 8);
        Self {
            byte_offset,
            bit_mask: 1 << bit,
        }
    }
}

/// One output column of the scan and where it lands inside a tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDescriptor {
    /// Store column this slot reads.
    pub column: ColumnRef,
    /// Logical type of the slot.
    pub data_type: DataType,
    /// Byte offset of the slot inside the tuple.
    pub tuple_offset: usize,
    /// Null indicator for the slot.
    pub null_indicator: NullIndicatorOffset,
    /// Whether the planner needs this slot populated.
    pub materialized: bool,
}

impl SlotDescriptor {
    /// Materialized slot for `column`.
    pub fn new(
        column: ColumnRef,
        data_type: DataType,
        tuple_offset: usize,
        null_indicator: NullIndicatorOffset,
    ) -> Self {
        Self {
            column,
            data_type,
            tuple_offset,
            null_indicator,
            materialized: true,
        }
    }

    /// Mark the slot as not materialized.
    pub fn unmaterialized(self) -> Self {
        Self {
            materialized: false,
            ..self
        }
    }

    /// Fixed byte size of the slot, or `None` for variable-width types.
    pub fn byte_size(&self) -> Option<usize> {
        slot_byte_size(&self.data_type)
    }
}

/// Fixed byte size of a slot of `data_type`.
pub fn slot_byte_size(data_type: &DataType) -> Option<usize> {
    match data_type {
        DataType::Boolean => Some(1),
        DataType::FixedSizeBinary(width) => usize::try_from(*width).ok(),
        other => other.primitive_width(),
    }
}

/// Row layout plus the table it is read from.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleDescriptor {
    /// Store table name.
    pub table_name: String,
    /// Total tuple size in bytes, null indicators included.
    pub byte_size: usize,
    /// Slots in projection order.
    pub slots: Vec<SlotDescriptor>,
}

impl TupleDescriptor {
    /// Descriptor for `table_name`.
    pub fn new(
        table_name: impl Into<String>,
        byte_size: usize,
        slots: Vec<SlotDescriptor>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            byte_size,
            slots,
        }
    }

    /// Materialized slots, in projection order.
    pub fn materialized_slots(&self) -> impl Iterator<Item = &SlotDescriptor> {
        self.slots.iter().filter(|slot| slot.materialized)
    }
}

/// Predicate pushed to the store: `family:qualifier <op> constant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    /// Column family.
    pub family: String,
    /// Column qualifier.
    pub qualifier: String,
    /// Ordinal into the store's comparator enumeration.
    pub op_ordinal: usize,
    /// Constant the column value is compared with.
    pub constant: Vec<u8>,
}

impl ColumnFilter {
    /// Filter `family:qualifier <op_ordinal> constant`.
    pub fn new(
        family: impl Into<String>,
        qualifier: impl Into<String>,
        op_ordinal: usize,
        constant: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
            op_ordinal,
            constant: constant.into(),
        }
    }

    /// Column the filter reads.
    pub fn column(&self) -> ColumnRef {
        ColumnRef::new(self.family.clone(), self.qualifier.clone())
    }
}
