//! Row codec dispatch: picks Flat or ZoH wire format per the file's flags.

mod flat;
mod zoh;

pub use flat::RowCodecFlat001;
pub use zoh::RowCodecZoH001;

use crate::byte_buffer::ByteBuffer;
use crate::error::Result;
use crate::layout::Layout;
use crate::row::Row;

#[derive(Debug)]
pub enum RowCodecDispatch {
    Flat(RowCodecFlat001),
    ZoH(RowCodecZoH001),
}

impl RowCodecDispatch {
    pub fn new(layout: &Layout, zoh_enabled: bool) -> Self {
        if zoh_enabled {
            Self::ZoH(RowCodecZoH001::new(layout))
        } else {
            Self::Flat(RowCodecFlat001::new())
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Flat(c) => c.reset(),
            Self::ZoH(c) => c.reset(),
        }
    }

    /// Serializes `row` into `buffer`, returning whether any bytes were
    /// produced. Flat rows always produce bytes; ZoH rows may collapse to
    /// an empty span when nothing changed since the last emit.
    pub fn serialize(&mut self, row: &mut Row, layout: &Layout, buffer: &mut ByteBuffer) -> Result<bool> {
        match self {
            Self::Flat(c) => {
                c.serialize(row, layout, buffer)?;
                Ok(true)
            }
            Self::ZoH(c) => c.serialize(row, layout, buffer),
        }
    }

    pub fn deserialize(&mut self, data: &[u8], layout: &Layout, row: &mut Row) -> Result<()> {
        match self {
            Self::Flat(c) => c.deserialize(data, layout, row),
            Self::ZoH(c) => c.deserialize(data, layout, row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::ColumnType;
    use crate::layout::ColumnDefinition;
    use crate::row::Value;

    fn sample_layout() -> Layout {
        Layout::new(vec![
            ColumnDefinition::new("n", ColumnType::Uint32),
            ColumnDefinition::new("s", ColumnType::String),
        ])
        .unwrap()
    }

    #[test]
    fn flat_dispatch_round_trips() {
        let layout = sample_layout();
        let mut codec = RowCodecDispatch::new(&layout, false);
        let mut row = Row::new(&layout);
        row.set(0, Value::Uint32(5)).unwrap();
        let mut buf = ByteBuffer::new();
        assert!(codec.serialize(&mut row, &layout, &mut buf).unwrap());

        let mut decoded = Row::new(&layout);
        codec.deserialize(buf.as_slice(), &layout, &mut decoded).unwrap();
        assert_eq!(decoded.get(0), &Value::Uint32(5));
    }

    #[test]
    fn zoh_dispatch_collapses_repeats() {
        let layout = sample_layout();
        let mut codec = RowCodecDispatch::new(&layout, true);
        let mut row = Row::new(&layout);
        row.set(0, Value::Uint32(5)).unwrap();
        let mut buf = ByteBuffer::new();
        assert!(codec.serialize(&mut row, &layout, &mut buf).unwrap());

        row.set(0, Value::Uint32(5)).unwrap();
        assert!(!codec.serialize(&mut row, &layout, &mut buf).unwrap());
    }
}
