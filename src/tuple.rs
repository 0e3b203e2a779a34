//! Fixed-layout output rows and the slot writer that fills them.

use arrow::datatypes::{DataType, IntervalUnit};

use crate::schema::{NullIndicatorOffset, SlotDescriptor};

/// An output row: a zeroed byte buffer addressed by slot offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    data: Vec<u8>,
}

impl Tuple {
    /// Zeroed tuple of `byte_size` bytes; every slot starts non-null.
    pub fn new(byte_size: usize) -> Self {
        Self {
            data: vec![0; byte_size],
        }
    }

    /// Raw tuple bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Bytes of the slot at `offset`.
    pub fn slot(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    fn slot_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.data[offset..offset + len]
    }

    /// Mark a slot null.
    pub fn set_null(&mut self, indicator: NullIndicatorOffset) {
        self.data[indicator.byte_offset] |= indicator.bit_mask;
    }

    /// Whether a slot is null.
    pub fn is_null(&self, indicator: NullIndicatorOffset) -> bool {
        self.data[indicator.byte_offset] & indicator.bit_mask != 0
    }

    /// Reset every slot and null bit for reuse.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Read a 4-byte signed slot in native order.
    pub fn get_i32(&self, offset: usize) -> i32 {
        let mut buf = [0; 4];
        buf.copy_from_slice(self.slot(offset, 4));
        i32::from_ne_bytes(buf)
    }

    /// Read an 8-byte signed slot in native order.
    pub fn get_i64(&self, offset: usize) -> i64 {
        let mut buf = [0; 8];
        buf.copy_from_slice(self.slot(offset, 8));
        i64::from_ne_bytes(buf)
    }

    /// Read an 8-byte float slot in native order.
    pub fn get_f64(&self, offset: usize) -> f64 {
        f64::from_bits(self.get_i64(offset) as u64)
    }
}

/// Writes decoded cell bytes into tuple slots.
///
/// The store keeps fixed-width numbers big-endian; tuples hold them in native
/// order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TupleWriter;

impl TupleWriter {
    /// Copy `bytes` into `slot` of `tuple`, normalizing byte order.
    ///
    /// # Panics
    /// Panics if the slot type has no fixed width or if `bytes` is not exactly
    /// the slot's width; both mean the schema and the stored data disagree.
    pub fn write_slot(&self, slot: &SlotDescriptor, tuple: &mut Tuple, bytes: &[u8]) {
        let width = slot
            .byte_size()
            .unwrap_or_else(|| panic!("slot of type {} has no fixed width", slot.data_type));
        assert_eq!(
            bytes.len(),
            width,
            "value for {}:{} does not match slot width",
            slot.column.family,
            slot.column.qualifier
        );
        let dst = tuple.slot_mut(slot.tuple_offset, width);
        dst.copy_from_slice(bytes);
        if cfg!(target_endian = "little") {
            swap_to_native(&slot.data_type, dst);
        }
    }
}

/// Reverse each big-endian scalar packed into `dst`.
///
/// Multi-field intervals are swapped field by field so the field order stays
/// as stored.
fn swap_to_native(data_type: &DataType, dst: &mut [u8]) {
    match data_type {
        DataType::Interval(IntervalUnit::DayTime) => {
            dst.chunks_exact_mut(4).for_each(<[u8]>::reverse);
        }
        DataType::Interval(IntervalUnit::MonthDayNano) => {
            let (months_days, nanos) = dst.split_at_mut(8);
            months_days.chunks_exact_mut(4).for_each(<[u8]>::reverse);
            nanos.reverse();
        }
        other if other.is_numeric() || other.is_temporal() => dst.reverse(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnRef;

    fn slot(data_type: DataType, offset: usize) -> SlotDescriptor {
        SlotDescriptor::new(
            ColumnRef::new("cf", "q"),
            data_type,
            offset,
            NullIndicatorOffset::new(0, 0),
        )
    }

    #[test]
    fn big_endian_int_becomes_native() {
        let mut tuple = Tuple::new(5);
        TupleWriter.write_slot(&slot(DataType::Int32, 1), &mut tuple, &[0, 0, 0, 1]);
        assert_eq!(tuple.get_i32(1), 1);

        TupleWriter.write_slot(
            &slot(DataType::Int32, 1),
            &mut tuple,
            &(-42i32).to_be_bytes(),
        );
        assert_eq!(tuple.get_i32(1), -42);
    }

    #[test]
    fn wide_and_float_values() {
        let mut tuple = Tuple::new(17);
        TupleWriter.write_slot(
            &slot(DataType::Int64, 1),
            &mut tuple,
            &0x0102_0304_0506_0708i64.to_be_bytes(),
        );
        TupleWriter.write_slot(&slot(DataType::Float64, 9), &mut tuple, &2.5f64.to_be_bytes());
        assert_eq!(tuple.get_i64(1), 0x0102_0304_0506_0708);
        assert_eq!(tuple.get_f64(9), 2.5);
    }

    #[test]
    fn interval_fields_keep_their_order() {
        let mut tuple = Tuple::new(25);
        let day_time = [3i32.to_be_bytes(), 500i32.to_be_bytes()].concat();
        TupleWriter.write_slot(
            &slot(DataType::Interval(IntervalUnit::DayTime), 1),
            &mut tuple,
            &day_time,
        );
        assert_eq!(
            tuple.slot(1, 8),
            [3i32.to_ne_bytes(), 500i32.to_ne_bytes()].concat()
        );

        let month_day_nano = [
            &2i32.to_be_bytes()[..],
            &7i32.to_be_bytes()[..],
            &1_000i64.to_be_bytes()[..],
        ]
        .concat();
        TupleWriter.write_slot(
            &slot(DataType::Interval(IntervalUnit::MonthDayNano), 9),
            &mut tuple,
            &month_day_nano,
        );
        let expected = [
            &2i32.to_ne_bytes()[..],
            &7i32.to_ne_bytes()[..],
            &1_000i64.to_ne_bytes()[..],
        ]
        .concat();
        assert_eq!(tuple.slot(9, 16), expected);
    }

    #[test]
    fn fixed_binary_is_copied_verbatim() {
        let mut tuple = Tuple::new(4);
        TupleWriter.write_slot(&slot(DataType::FixedSizeBinary(3), 1), &mut tuple, b"abc");
        assert_eq!(tuple.slot(1, 3), b"abc");
    }

    #[test]
    fn null_bits() {
        let mut tuple = Tuple::new(2);
        let a = NullIndicatorOffset::new(0, 0);
        let b = NullIndicatorOffset::new(0, 3);
        tuple.set_null(b);
        assert!(!tuple.is_null(a));
        assert!(tuple.is_null(b));
        tuple.clear();
        assert!(!tuple.is_null(b));
    }

    #[test]
    #[should_panic(expected = "does not match slot width")]
    fn width_mismatch_panics() {
        let mut tuple = Tuple::new(5);
        TupleWriter.write_slot(&slot(DataType::Int32, 1), &mut tuple, &[0, 1]);
    }

    #[test]
    #[should_panic(expected = "no fixed width")]
    fn variable_width_slot_panics() {
        let mut tuple = Tuple::new(5);
        TupleWriter.write_slot(&slot(DataType::Utf8, 1), &mut tuple, b"ab");
    }
}
