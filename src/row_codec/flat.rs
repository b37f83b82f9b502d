//! `RowCodecFlat001`: fixed, non-delta row wire format.
//!
//! Wire layout, in order: BOOL bitset, fixed-scalar section (packed offsets
//! from the layout), string-length section, string-payload section.

use crate::byte_buffer::ByteBuffer;
use crate::definitions::{ColumnType, MAX_STRING_LENGTH};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::row::{Row, Value};

#[derive(Debug, Default)]
pub struct RowCodecFlat001;

impl RowCodecFlat001 {
    pub fn new() -> Self {
        Self
    }

    pub fn reset(&mut self) {
        // Flat encoding is stateless between rows.
    }

    pub fn serialize(&mut self, row: &Row, layout: &Layout, buffer: &mut ByteBuffer) -> Result<()> {
        buffer.clear();
        let mut bytes = Vec::with_capacity(layout.fixed_payload_size() + 16);

        let bool_bitset_len = (layout.bool_count() + 7) / 8;
        let mut bool_bytes = vec![0u8; bool_bitset_len];
        let mut bool_index = 0usize;
        for (i, col) in layout.columns().iter().enumerate() {
            if col.column_type.is_bool() {
                if row.bits().get(i) {
                    bool_bytes[bool_index / 8] |= 1 << (bool_index % 8);
                }
                bool_index += 1;
            }
        }
        bytes.extend_from_slice(&bool_bytes);

        for (i, col) in layout.columns().iter().enumerate() {
            if col.column_type.is_bool() || col.column_type.is_string() {
                continue;
            }
            write_scalar(&mut bytes, row.get(i))?;
        }

        for (i, col) in layout.columns().iter().enumerate() {
            if !col.column_type.is_string() {
                continue;
            }
            let s = row.get(i).as_str().unwrap_or("");
            if s.len() > MAX_STRING_LENGTH {
                return Err(Error::Overflow(format!(
                    "string column {i} length {} exceeds MAX_STRING_LENGTH",
                    s.len()
                )));
            }
            bytes.extend_from_slice(&(s.len() as u16).to_le_bytes());
        }
        for (i, col) in layout.columns().iter().enumerate() {
            if !col.column_type.is_string() {
                continue;
            }
            let s = row.get(i).as_str().unwrap_or("");
            bytes.extend_from_slice(s.as_bytes());
        }

        buffer.extend_from_slice(&bytes);
        Ok(())
    }

    pub fn deserialize(&self, data: &[u8], layout: &Layout, row: &mut Row) -> Result<()> {
        let bool_bitset_len = (layout.bool_count() + 7) / 8;
        if data.len() < bool_bitset_len {
            return Err(Error::BufferTooShort { needed: bool_bitset_len, available: data.len() });
        }
        let mut cursor = bool_bitset_len;

        let mut bool_index = 0usize;
        for (i, col) in layout.columns().iter().enumerate() {
            if col.column_type.is_bool() {
                let byte = data[bool_index / 8];
                let value = (byte >> (bool_index % 8)) & 1 != 0;
                row.set(i, Value::Bool(value))?;
                bool_index += 1;
            }
        }

        for (i, col) in layout.columns().iter().enumerate() {
            if col.column_type.is_bool() || col.column_type.is_string() {
                continue;
            }
            let value = read_scalar(col.column_type, &data[cursor..])?;
            cursor += col.column_type.wire_size();
            row.set(i, value)?;
        }

        let string_indices: Vec<usize> = layout
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.column_type.is_string())
            .map(|(i, _)| i)
            .collect();

        let mut lengths = Vec::with_capacity(string_indices.len());
        for _ in &string_indices {
            if data.len() < cursor + 2 {
                return Err(Error::BufferTooShort { needed: cursor + 2, available: data.len() });
            }
            let len = u16::from_le_bytes(data[cursor..cursor + 2].try_into().unwrap()) as usize;
            lengths.push(len);
            cursor += 2;
        }

        for (&i, len) in string_indices.iter().zip(lengths) {
            if data.len() < cursor + len {
                return Err(Error::BufferTooShort { needed: cursor + len, available: data.len() });
            }
            let s = std::str::from_utf8(&data[cursor..cursor + len])
                .map_err(|_| Error::CorruptedFile(format!("column {i} string is not valid UTF-8")))?
                .to_string();
            row.set(i, Value::String(s))?;
            cursor += len;
        }

        Ok(())
    }
}

fn write_scalar(out: &mut Vec<u8>, value: &Value) -> Result<()> {
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
        Value::Bool(_) | Value::String(_) => {
            return Err(Error::Schema("write_scalar called on non-scalar column".into()))
        }
    }
    Ok(())
}

fn read_scalar(column_type: ColumnType, data: &[u8]) -> Result<Value> {
    let size = column_type.wire_size();
    if data.len() < size {
        return Err(Error::BufferTooShort { needed: size, available: data.len() });
    }
    Ok(match column_type {
        ColumnType::Uint8 => Value::Uint8(data[0]),
        ColumnType::Uint16 => Value::Uint16(u16::from_le_bytes(data[0..2].try_into().unwrap())),
        ColumnType::Uint32 => Value::Uint32(u32::from_le_bytes(data[0..4].try_into().unwrap())),
        ColumnType::Uint64 => Value::Uint64(u64::from_le_bytes(data[0..8].try_into().unwrap())),
        ColumnType::Int8 => Value::Int8(data[0] as i8),
        ColumnType::Int16 => Value::Int16(i16::from_le_bytes(data[0..2].try_into().unwrap())),
        ColumnType::Int32 => Value::Int32(i32::from_le_bytes(data[0..4].try_into().unwrap())),
        ColumnType::Int64 => Value::Int64(i64::from_le_bytes(data[0..8].try_into().unwrap())),
        ColumnType::Float => Value::Float(f32::from_le_bytes(data[0..4].try_into().unwrap())),
        ColumnType::Double => Value::Double(f64::from_le_bytes(data[0..8].try_into().unwrap())),
        ColumnType::Bool | ColumnType::String => {
            return Err(Error::Schema("read_scalar called on non-scalar column".into()))
        }
    })
}
