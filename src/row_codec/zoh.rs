//! `RowCodecZoH001`: Zero-Order-Hold delta row codec.
//!
//! Wire layout: `[change_bitset][changed_data...]`. The change bitset is
//! column-count sized: BOOL columns carry their *value* in the bit; every
//! other column carries a *changed* flag. Changed-data is grouped by type
//! in `ZOH_TYPE_ORDER`, not schema order, so same-width values stay
//! contiguous on the wire.

use crate::bitset::Bitset;
use crate::byte_buffer::ByteBuffer;
use crate::definitions::ZOH_TYPE_ORDER;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::row::{Row, Value};

#[derive(Debug)]
pub struct RowCodecZoH001 {
    /// Snapshot of the BOOL-column bits as of the last emitted row, used to
    /// detect a bool-only change (the row's own bits never distinguish a
    /// bool "change" from a bool "value", so equality has to be checked
    /// against what was last actually written to the wire).
    previous_bool_bits: Bitset,
    first_row_in_packet: bool,
}

impl RowCodecZoH001 {
    pub fn new(layout: &Layout) -> Self {
        Self { previous_bool_bits: Bitset::with_len(layout.column_count()), first_row_in_packet: true }
    }

    pub fn reset(&mut self) {
        self.first_row_in_packet = true;
    }

    /// Returns `Ok(false)` when nothing changed (ZoH repeat) — the caller
    /// must write a zero-length row for that case; `buffer` is left empty.
    pub fn serialize(
        &mut self,
        row: &mut Row,
        layout: &Layout,
        buffer: &mut ByteBuffer,
    ) -> Result<bool> {
        let any_changed = self.first_row_in_packet || self.has_any_change(row, layout);

        if !any_changed {
            return Ok(false);
        }

        buffer.clear();
        let mut bytes = Vec::new();

        if self.first_row_in_packet {
            row.mark_all_changed(layout);
        }

        bytes.extend_from_slice(row.bits().as_bytes());

        for &column_type in ZOH_TYPE_ORDER {
            for (i, col) in layout.columns().iter().enumerate() {
                if col.column_type != column_type || !row.bits().get(i) {
                    continue;
                }
                write_value(&mut bytes, row.get(i))?;
            }
        }

        buffer.extend_from_slice(&bytes);

        self.snapshot_bool_bits(row, layout);
        row.clear_change_flags(layout);
        self.first_row_in_packet = false;
        Ok(true)
    }

    pub fn deserialize(&self, data: &[u8], layout: &Layout, row: &mut Row) -> Result<()> {
        let bits_len = (layout.column_count() + 7) / 8;
        if data.len() < bits_len {
            return Err(Error::BufferTooShort { needed: bits_len, available: data.len() });
        }
        let header = Bitset::from_bytes(layout.column_count(), &data[..bits_len]);
        let mut cursor = bits_len;

        for (i, col) in layout.columns().iter().enumerate() {
            if col.column_type.is_bool() {
                row.set(i, Value::Bool(header.get(i)))?;
            }
        }

        for &column_type in ZOH_TYPE_ORDER {
            for (i, col) in layout.columns().iter().enumerate() {
                if col.column_type != column_type || !header.get(i) {
                    continue;
                }
                let (value, consumed) = read_value(column_type, &data[cursor..])?;
                cursor += consumed;
                row.set(i, value)?;
            }
        }

        Ok(())
    }

    fn has_any_change(&self, row: &Row, layout: &Layout) -> bool {
        for (i, col) in layout.columns().iter().enumerate() {
            if col.column_type.is_bool() {
                if row.bits().get(i) != self.previous_bool_bits.get(i) {
                    return true;
                }
            } else if row.bits().get(i) {
                return true;
            }
        }
        false
    }

    fn snapshot_bool_bits(&mut self, row: &Row, layout: &Layout) {
        for (i, col) in layout.columns().iter().enumerate() {
            if col.column_type.is_bool() {
                self.previous_bool_bits.set(i, row.bits().get(i));
            }
        }
    }
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Uint8(v) => out.push(*v),
        Value::Uint16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Uint32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Uint64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Int8(v) => out.push(*v as u8),
        Value::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::String(s) => {
            out.extend_from_slice(&(s.len() as u16).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bool(_) => return Err(Error::Schema("bool values live in the change header".into())),
    }
    Ok(())
}

fn read_value(column_type: crate::definitions::ColumnType, data: &[u8]) -> Result<(Value, usize)> {
    use crate::definitions::ColumnType;
    Ok(match column_type {
        ColumnType::Uint8 => (Value::Uint8(*data.first().ok_or(short(1, data.len()))?), 1),
        ColumnType::Uint16 => (Value::Uint16(read_u16(data)?), 2),
        ColumnType::Uint32 => (Value::Uint32(read_u32(data)?), 4),
        ColumnType::Uint64 => (Value::Uint64(read_u64(data)?), 8),
        ColumnType::Int8 => (Value::Int8(*data.first().ok_or(short(1, data.len()))? as i8), 1),
        ColumnType::Int16 => (Value::Int16(read_u16(data)? as i16), 2),
        ColumnType::Int32 => (Value::Int32(read_u32(data)? as i32), 4),
        ColumnType::Int64 => (Value::Int64(read_u64(data)? as i64), 8),
        ColumnType::Float => (Value::Float(f32::from_bits(read_u32(data)?)), 4),
        ColumnType::Double => (Value::Double(f64::from_bits(read_u64(data)?)), 8),
        ColumnType::String => {
            let len = read_u16(data)? as usize;
            if data.len() < 2 + len {
                return Err(short(2 + len, data.len()));
            }
            let s = std::str::from_utf8(&data[2..2 + len])
                .map_err(|_| Error::CorruptedFile("string is not valid UTF-8".into()))?
                .to_string();
            (Value::String(s), 2 + len)
        }
        ColumnType::Bool => return Err(Error::Schema("bool values live in the change header".into())),
    })
}

fn short(needed: usize, available: usize) -> Error {
    Error::BufferTooShort { needed, available }
}

fn read_u16(data: &[u8]) -> Result<u16> {
    data.get(0..2).map(|b| u16::from_le_bytes(b.try_into().unwrap())).ok_or(short(2, data.len()))
}

fn read_u32(data: &[u8]) -> Result<u32> {
    data.get(0..4).map(|b| u32::from_le_bytes(b.try_into().unwrap())).ok_or(short(4, data.len()))
}

fn read_u64(data: &[u8]) -> Result<u64> {
    data.get(0..8).map(|b| u64::from_le_bytes(b.try_into().unwrap())).ok_or(short(8, data.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::ColumnType;
    use crate::layout::ColumnDefinition;

    fn sample_layout() -> Layout {
        Layout::new(vec![
            ColumnDefinition::new("active", ColumnType::Bool),
            ColumnDefinition::new("count", ColumnType::Uint32),
            ColumnDefinition::new("name", ColumnType::String),
        ])
        .unwrap()
    }

    #[test]
    fn first_row_is_full_emit() {
        let layout = sample_layout();
        let mut row = Row::new(&layout);
        row.set(1, Value::Uint32(7)).unwrap();
        let mut codec = RowCodecZoH001::new(&layout);
        let mut buf = ByteBuffer::new();
        let changed = codec.serialize(&mut row, &layout, &mut buf).unwrap();
        assert!(changed);
        assert!(!buf.is_empty());
    }

    #[test]
    fn identical_second_row_is_a_repeat() {
        let layout = sample_layout();
        let mut row = Row::new(&layout);
        row.set(1, Value::Uint32(7)).unwrap();
        let mut codec = RowCodecZoH001::new(&layout);
        let mut buf = ByteBuffer::new();
        codec.serialize(&mut row, &layout, &mut buf).unwrap();

        // Re-set the same value: Row::set sees no change, bit stays clear.
        row.set(1, Value::Uint32(7)).unwrap();
        let changed = codec.serialize(&mut row, &layout, &mut buf).unwrap();
        assert!(!changed);
    }

    #[test]
    fn bool_only_change_is_detected() {
        let layout = sample_layout();
        let mut row = Row::new(&layout);
        let mut codec = RowCodecZoH001::new(&layout);
        let mut buf = ByteBuffer::new();
        codec.serialize(&mut row, &layout, &mut buf).unwrap(); // first row, full emit

        row.set(0, Value::Bool(true)).unwrap();
        let changed = codec.serialize(&mut row, &layout, &mut buf).unwrap();
        assert!(changed, "flipping a bool with no other changes must still emit");
    }

    #[test]
    fn round_trips_partial_update() {
        let layout = sample_layout();
        let mut row = Row::new(&layout);
        row.set(1, Value::Uint32(1)).unwrap();
        row.set(2, Value::String("a".into())).unwrap();

        let mut codec = RowCodecZoH001::new(&layout);
        let mut buf = ByteBuffer::new();
        codec.serialize(&mut row, &layout, &mut buf).unwrap();

        let mut decoded = Row::new(&layout);
        codec.deserialize(buf.as_slice(), &layout, &mut decoded).unwrap();
        assert_eq!(decoded.get(1), &Value::Uint32(1));
        assert_eq!(decoded.get(2).as_str(), Some("a"));

        // Second row only changes the string; count must survive untouched
        // in the decoder state (caller does not clear the row between
        // deserialize calls).
        row.set(2, Value::String("b".into())).unwrap();
        buf.clear();
        let changed = codec.serialize(&mut row, &layout, &mut buf).unwrap();
        assert!(changed);
        codec.deserialize(buf.as_slice(), &layout, &mut decoded).unwrap();
        assert_eq!(decoded.get(1), &Value::Uint32(1));
        assert_eq!(decoded.get(2).as_str(), Some("b"));
    }
}
