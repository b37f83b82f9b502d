//! `FileCodecStreamLz4001`: streaming LZ4 compression, no packet structure.
//!
//! Wire format, per row: `BLE(compressed_len) | lz4_block | xxh32(lz4_block)`,
//! or `BLE(0)` for a ZoH repeat. The compressed size is self-describing
//! (`lz4_flex`'s prepend-size framing), so there is no separate context to
//! reset at row boundaries — compression never resets across the file.

use std::io::{Read, Write};

use crate::checksum::checksum32;
use crate::definitions::MAX_ROW_LENGTH;
use crate::error::{Error, Result};
use crate::vle::{ble_decode, ble_write};

#[derive(Debug, Default)]
pub struct FileCodecStreamLz4001 {
    read_buffer: Vec<u8>,
    decompressed: Vec<u8>,
}

impl FileCodecStreamLz4001 {
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
        let compressed = lz4_flex::compress_prepend_size(row_data);
        ble_write(compressed.len() as u64, writer)?;
        writer.write_all(&compressed)?;
        let hash = checksum32(&compressed, 0);
        writer.write_all(&hash.to_le_bytes())?;
        Ok(())
    }

    pub fn finalize<W: Write>(&mut self, _writer: &mut W, _total_rows: u64) -> Result<()> {
        Ok(())
    }

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
        let (compressed_len, _) = ble_decode(&len_bytes[..num_bytes])?;

        if compressed_len == 0 {
            self.decompressed.clear();
            return Ok(Some(&[]));
        }
        if compressed_len > MAX_ROW_LENGTH {
            return Err(Error::CorruptedFile(format!(
                "compressed row length {compressed_len} exceeds MAX_ROW_LENGTH {MAX_ROW_LENGTH}"
            )));
        }

        self.read_buffer.resize(compressed_len as usize, 0);
        reader.read_exact(&mut self.read_buffer)?;

        let mut expected = [0u8; 4];
        reader.read_exact(&mut expected)?;
        let expected = u32::from_le_bytes(expected);
        let actual = checksum32(&self.read_buffer, 0);
        if actual != expected {
            return Err(Error::ChecksumMismatch { expected: expected as u64, computed: actual as u64 });
        }

        self.decompressed = lz4_flex::decompress_size_prepended(&self.read_buffer)
            .map_err(|e| Error::CorruptedFile(format!("lz4 decompression failed: {e}")))?;
        Ok(Some(&self.decompressed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_row_and_a_repeat() {
        let mut codec = FileCodecStreamLz4001::new();
        let mut buf = Vec::new();
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(4);
        codec.write_row(&mut buf, &payload).unwrap();
        codec.write_row(&mut buf, &[]).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let row = codec.read_row(&mut cursor).unwrap().unwrap().to_vec();
        assert_eq!(row, payload);
        let repeat = codec.read_row(&mut cursor).unwrap().unwrap();
        assert!(repeat.is_empty());
        assert!(codec.read_row(&mut cursor).unwrap().is_none());
    }
}
