//! `FileCodecStream001`: simplest file codec, no packet structure.
//!
//! Wire format, per row: `BLE(row_len) | row_bytes | xxh32(row_bytes)`, or
//! `BLE(0)` alone for a ZoH repeat. No footer, no random access — readers
//! detect end of file from a failed length read.

use std::io::{Read, Write};

use crate::checksum::checksum32;
use crate::definitions::MAX_ROW_LENGTH;
use crate::error::{Error, Result};
use crate::vle::{ble_decode, ble_write};

#[derive(Debug, Default)]
pub struct FileCodecStream001 {
    read_buffer: Vec<u8>,
}

impl FileCodecStream001 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {}

    pub fn packet_boundary_crossed(&self) -> bool {
        false
    }

    pub fn write_row<W: Write>(&mut self, writer: &mut W, row_data: &[u8]) -> Result<()> {
        if row_data.is_empty() {
            ble_write(0, writer)?;
            return Ok(());
        }
        ble_write(row_data.len() as u64, writer)?;
        writer.write_all(row_data)?;
        let hash = checksum32(row_data, 0);
        writer.write_all(&hash.to_le_bytes())?;
        Ok(())
    }

    pub fn finalize<W: Write>(&mut self, _writer: &mut W, _total_rows: u64) -> Result<()> {
        Ok(())
    }

    /// Returns `Ok(None)` on clean EOF, `Ok(Some(&[]))` for a ZoH repeat
    /// (caller keeps the previous row), `Ok(Some(bytes))` otherwise.
    pub fn read_row<R: Read>(&mut self, reader: &mut R) -> Result<Option<&[u8]>> {
        let mut first = [0u8; 1];
        match reader.read_exact(&mut first) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let num_bytes = (first[0] & 0x07) as usize + 1;
        let mut len_bytes = [0u8; 8];
        len_bytes[0] = first[0];
        if num_bytes > 1 {
            reader.read_exact(&mut len_bytes[1..num_bytes])?;
        }
        let (row_len, _) = ble_decode(&len_bytes[..num_bytes])?;

        if row_len == 0 {
            self.read_buffer.clear();
            return Ok(Some(&[]));
        }
        if row_len > MAX_ROW_LENGTH {
            return Err(Error::CorruptedFile(format!(
                "row length {row_len} exceeds MAX_ROW_LENGTH {MAX_ROW_LENGTH}"
            )));
        }

        self.read_buffer.resize(row_len as usize, 0);
        reader.read_exact(&mut self.read_buffer)?;

        let mut expected = [0u8; 4];
        reader.read_exact(&mut expected)?;
        let expected = u32::from_le_bytes(expected);
        let actual = checksum32(&self.read_buffer, 0);
        if actual != expected {
            return Err(Error::ChecksumMismatch { expected: expected as u64, computed: actual as u64 });
        }

        Ok(Some(&self.read_buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_row_and_a_repeat() {
        let mut codec = FileCodecStream001::new();
        let mut buf = Vec::new();
        codec.write_row(&mut buf, b"hello").unwrap();
        codec.write_row(&mut buf, &[]).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let row = codec.read_row(&mut cursor).unwrap().unwrap().to_vec();
        assert_eq!(row, b"hello");
        let repeat = codec.read_row(&mut cursor).unwrap().unwrap();
        assert!(repeat.is_empty());
        assert!(codec.read_row(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn detects_corrupted_row_checksum() {
        let mut codec = FileCodecStream001::new();
        let mut buf = Vec::new();
        codec.write_row(&mut buf, b"hello").unwrap();
        *buf.last_mut().unwrap() ^= 0xFF;

        let mut cursor = std::io::Cursor::new(buf);
        assert!(codec.read_row(&mut cursor).is_err());
    }
}
