//! `Row`: one value per column, plus the change-tracking bitset the ZoH
//! codec reads and writes directly.

use crate::bitset::Bitset;
use crate::definitions::ColumnType;
use crate::error::{Error, Result};
use crate::layout::Layout;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Bool(_) => ColumnType::Bool,
            Value::Uint8(_) => ColumnType::Uint8,
            Value::Uint16(_) => ColumnType::Uint16,
            Value::Uint32(_) => ColumnType::Uint32,
            Value::Uint64(_) => ColumnType::Uint64,
            Value::Int8(_) => ColumnType::Int8,
            Value::Int16(_) => ColumnType::Int16,
            Value::Int32(_) => ColumnType::Int32,
            Value::Int64(_) => ColumnType::Int64,
            Value::Float(_) => ColumnType::Float,
            Value::Double(_) => ColumnType::Double,
            Value::String(_) => ColumnType::String,
        }
    }

    pub fn default_for(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Bool => Value::Bool(false),
            ColumnType::Uint8 => Value::Uint8(0),
            ColumnType::Uint16 => Value::Uint16(0),
            ColumnType::Uint32 => Value::Uint32(0),
            ColumnType::Uint64 => Value::Uint64(0),
            ColumnType::Int8 => Value::Int8(0),
            ColumnType::Int16 => Value::Int16(0),
            ColumnType::Int32 => Value::Int32(0),
            ColumnType::Int64 => Value::Int64(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Double => Value::Double(0.0),
            ColumnType::String => Value::String(String::new()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One row of column values, plus the change-tracking bitset.
///
/// `bits` is column-count sized: for BOOL columns the bit *is* the value;
/// for every other column the bit is "changed since the last row emitted
/// through a ZoH codec" so the ZoH codec can use this bitset directly as
/// the wire change header with no copy.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    bits: Bitset,
}

impl Row {
    pub fn new(layout: &Layout) -> Self {
        let values = layout.columns().iter().map(|c| Value::default_for(c.column_type)).collect();
        let mut bits = Bitset::with_len(layout.column_count());
        // Every column is "changed" until a codec marks otherwise — first
        // row after reset is always a full emit.
        for i in 0..layout.column_count() {
            bits.set(i, false);
        }
        Self { values, bits }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let expected = self.values[index].column_type();
        if value.column_type() != expected {
            return Err(Error::Schema(format!(
                "column {index} expects {}, got {}",
                expected.name(),
                value.column_type().name()
            )));
        }
        let changed = self.values[index] != value;
        if expected.is_bool() {
            self.bits.set(index, value.as_bool().unwrap_or(false));
        } else if changed {
            self.bits.set(index, true);
        }
        self.values[index] = value;
        Ok(())
    }

    pub fn bits(&self) -> &Bitset {
        &self.bits
    }

    pub fn bits_mut(&mut self) -> &mut Bitset {
        &mut self.bits
    }

    /// Clears non-bool change flags after a row has been emitted. BOOL bits
    /// are left untouched since they hold values, not change flags.
    pub fn clear_change_flags(&mut self, layout: &Layout) {
        for (i, col) in layout.columns().iter().enumerate() {
            if !col.column_type.is_bool() {
                self.bits.set(i, false);
            }
        }
    }

    /// Marks every non-bool column as changed, used when a packet boundary
    /// forces the next row to be a full emit.
    pub fn mark_all_changed(&mut self, layout: &Layout) {
        for (i, col) in layout.columns().iter().enumerate() {
            if !col.column_type.is_bool() {
                self.bits.set(i, true);
            }
        }
    }
}
