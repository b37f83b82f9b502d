//! `FileCodecPacket001`: packet-framed file codec, no compression.
//!
//! Wire format per packet:
//! ```text
//! PacketHeader (16 bytes)
//! BLE(row_len) | row_bytes     ← repeated
//! BLE(PCKT_TERMINATOR)
//! u64 payload checksum (xxHash64 of the VLE lengths + row payloads)
//! ```
//! Gives crash recovery (read up to the last fully-written packet) and
//! random access via the packet index / file footer, at no compression
//! CPU cost.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::checksum::StreamingChecksum64;
use crate::definitions::{FileFlags, PCKT_TERMINATOR};
use crate::error::{Error, Result};
use crate::footer::{FileFooter, PacketIndexEntry};
use crate::header::FileHeader;
use crate::packet_header::PacketHeader;
use crate::vle::ble_decode;

#[derive(Debug, Default)]
pub struct FileCodecPacket001 {
    read_buffer: Vec<u8>,
    packet_hash: StreamingChecksum64,
    packet_open: bool,
    packet_boundary_crossed: bool,
    packet_size: usize,
    packet_size_limit: usize,
    build_index: bool,
    packet_index: Vec<PacketIndexEntry>,
    packet_pos: u64,
}

impl FileCodecPacket001 {
    pub fn new() -> Self {
        Self { packet_hash: StreamingChecksum64::new(0), ..Self::default() }
    }

    pub fn setup_write(&mut self, header: &FileHeader) {
        self.packet_size_limit = header.packet_size() as usize;
        self.build_index = !header.has_flag(FileFlags::NO_FILE_INDEX);
        self.packet_index.clear();
    }

    pub fn setup_read<R: Read + Seek>(&mut self, reader: &mut R, header: &FileHeader) -> Result<()> {
        self.packet_size_limit = header.packet_size() as usize;
        self.packet_open = self.open_packet_read(reader)?;
        Ok(())
    }

    pub fn into_packet_index(self) -> Vec<PacketIndexEntry> {
        self.packet_index
    }

    /// Called before each `write_row`. Returns true if a packet boundary was
    /// crossed (caller must reset the row codec).
    pub fn begin_write<W: Write + Seek>(&mut self, writer: &mut W, row_count: u64) -> Result<bool> {
        if self.packet_open && self.packet_size >= self.packet_size_limit {
            self.close_packet(writer)?;
        }
        if !self.packet_open {
            self.open_packet(writer, row_count)?;
            return Ok(row_count > 0);
        }
        Ok(false)
    }

    pub fn write_row<W: Write>(&mut self, writer: &mut W, row_data: &[u8]) -> Result<()> {
        if row_data.is_empty() {
            self.write_row_length_checksummed(writer, 0)?;
            return Ok(());
        }
        self.write_row_length_checksummed(writer, row_data.len() as u64)?;
        writer.write_all(row_data)?;
        self.packet_hash.update(row_data);
        self.packet_size += row_data.len();
        Ok(())
    }

    pub fn finalize<W: Write + Seek>(&mut self, writer: &mut W, total_rows: u64) -> Result<()> {
        if self.packet_open {
            self.close_packet(writer)?;
        }
        let footer = FileFooter::new(std::mem::take(&mut self.packet_index), total_rows);
        footer.write(writer)?;
        Ok(())
    }

    /// Returns `Ok(None)` at end of data, `Ok(Some(&[]))` for a ZoH repeat,
    /// `Ok(Some(bytes))` otherwise. Packet-terminator rows transparently
    /// open the next packet; check `packet_boundary_crossed()` afterwards.
    pub fn read_row<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Option<&[u8]>> {
        self.packet_boundary_crossed = false;

        if !self.packet_open {
            return Ok(None);
        }

        let mut row_len = self.read_length_checksummed(reader)?;
        while row_len == PCKT_TERMINATOR {
            self.close_packet_read(reader)?;
            self.packet_open = self.open_packet_read(reader)?;
            if !self.packet_open {
                return Ok(None);
            }
            self.packet_boundary_crossed = true;
            row_len = self.read_length_checksummed(reader)?;
        }

        if row_len == 0 {
            self.read_buffer.clear();
            return Ok(Some(&[]));
        }
        if row_len > crate::definitions::MAX_ROW_LENGTH {
            return Err(Error::CorruptedFile(format!(
                "row length {row_len} exceeds MAX_ROW_LENGTH"
            )));
        }

        self.read_buffer.resize(row_len as usize, 0);
        reader.read_exact(&mut self.read_buffer)?;
        self.packet_hash.update(&self.read_buffer);

        Ok(Some(&self.read_buffer))
    }

    pub fn packet_boundary_crossed(&self) -> bool {
        self.packet_boundary_crossed
    }

    pub fn reset(&mut self) {
        self.packet_hash.reset(0);
        self.packet_size = 0;
    }

    fn open_packet<W: Write + Seek>(&mut self, writer: &mut W, first_row_index: u64) -> Result<()> {
        debug_assert!(!self.packet_open);
        if self.build_index {
            let offset = writer.stream_position()?;
            self.packet_index.push(PacketIndexEntry { byte_offset: offset, first_row: first_row_index });
        }
        PacketHeader::write(writer, first_row_index)?;
        self.packet_size = 0;
        self.packet_hash.reset(0);
        self.packet_open = true;
        Ok(())
    }

    fn close_packet<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        if !self.packet_open {
            return Ok(());
        }
        self.write_row_length_checksummed(writer, PCKT_TERMINATOR)?;
        let hash = std::mem::replace(&mut self.packet_hash, StreamingChecksum64::new(0)).finalize();
        writer.write_all(&hash.to_le_bytes())?;
        self.packet_open = false;
        Ok(())
    }

    fn write_row_length_checksummed<W: Write>(&mut self, writer: &mut W, length: u64) -> Result<()> {
        let mut buf = Vec::with_capacity(8);
        crate::vle::ble_encode_to(length, &mut buf)?;
        writer.write_all(&buf)?;
        self.packet_hash.update(&buf);
        self.packet_size += buf.len();
        Ok(())
    }

    fn read_length_checksummed<R: Read>(&mut self, reader: &mut R) -> Result<u64> {
        let mut first = [0u8; 1];
        reader.read_exact(&mut first)?;
        let num_bytes = (first[0] & 0x07) as usize + 1;
        let mut raw = [0u8; 8];
        raw[0] = first[0];
        if num_bytes > 1 {
            reader.read_exact(&mut raw[1..num_bytes])?;
        }
        self.packet_hash.update(&raw[..num_bytes]);
        let (value, _) = ble_decode(&raw[..num_bytes])?;
        Ok(value)
    }

    /// Opens the next packet for sequential reading. Returns `false` at the
    /// footer or clean EOF, restoring the stream position in both cases.
    fn open_packet_read<R: Read + Seek>(&mut self, reader: &mut R) -> Result<bool> {
        self.packet_pos = reader.stream_position()?;
        self.packet_hash.reset(0);

        match PacketHeader::read(reader)? {
            Some(_) => Ok(true),
            None => {
                reader.seek(SeekFrom::Start(self.packet_pos))?;
                Ok(false)
            }
        }
    }

    fn close_packet_read<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut expected = [0u8; 8];
        reader.read_exact(&mut expected)?;
        let expected = u64::from_le_bytes(expected);
        let computed = std::mem::replace(&mut self.packet_hash, StreamingChecksum64::new(0)).finalize();
        if computed != expected {
            return Err(Error::ChecksumMismatch { expected, computed });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> FileHeader {
        let mut header = FileHeader::new(1, 0);
        header.set_packet_size(128);
        header
    }

    #[test]
    fn round_trips_rows_across_a_packet_boundary() {
        let header = sample_header();
        let mut codec = FileCodecPacket001::new();
        codec.setup_write(&header);

        let mut buf = std::io::Cursor::new(Vec::new());
        for i in 0..3u64 {
            codec.begin_write(&mut buf, i).unwrap();
            codec.write_row(&mut buf, format!("row-{i}").as_bytes()).unwrap();
        }
        codec.finalize(&mut buf, 3).unwrap();

        let mut reader = std::io::Cursor::new(buf.into_inner());
        let mut read_codec = FileCodecPacket001::new();
        read_codec.setup_read(&mut reader, &header).unwrap();

        let row0 = read_codec.read_row(&mut reader).unwrap().unwrap().to_vec();
        assert_eq!(row0, b"row-0");
        let row1 = read_codec.read_row(&mut reader).unwrap().unwrap().to_vec();
        assert_eq!(row1, b"row-1");
        let row2 = read_codec.read_row(&mut reader).unwrap().unwrap().to_vec();
        assert_eq!(row2, b"row-2");
        assert!(read_codec.read_row(&mut reader).unwrap().is_none());
    }

    #[test]
    fn builds_packet_index_for_random_access() {
        let header = sample_header();
        let mut codec = FileCodecPacket001::new();
        codec.setup_write(&header);

        let mut buf = std::io::Cursor::new(Vec::new());
        codec.begin_write(&mut buf, 0).unwrap();
        codec.write_row(&mut buf, b"only-row").unwrap();
        codec.finalize(&mut buf, 1).unwrap();

        let index = codec.into_packet_index();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].first_row, 0);
        assert_eq!(index[0].byte_offset, 0);
    }
}
