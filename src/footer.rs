//! `FileFooter`: packet index written at EOF for packet-structured files.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::checksum::StreamingChecksum64;
use crate::definitions::{FOOTER_EIDX_MAGIC, MAGIC_BYTES_BIDX};
use crate::error::{Error, Result};

pub const PACKET_INDEX_ENTRY_SIZE: usize = 16;
const CONST_SECTION_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketIndexEntry {
    pub byte_offset: u64,
    pub first_row: u64,
}

#[derive(Debug, Clone, Default)]
pub struct FileFooter {
    packet_index: Vec<PacketIndexEntry>,
    row_count: u64,
}

impl FileFooter {
    pub fn new(packet_index: Vec<PacketIndexEntry>, row_count: u64) -> Self {
        Self { packet_index, row_count }
    }

    pub fn packet_index(&self) -> &[PacketIndexEntry] {
        &self.packet_index
    }

    pub fn add_entry(&mut self, byte_offset: u64, first_row: u64) {
        self.packet_index.push(PacketIndexEntry { byte_offset, first_row });
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn set_row_count(&mut self, row_count: u64) {
        self.row_count = row_count;
    }

    pub fn has_valid_index(&self) -> bool {
        !self.packet_index.is_empty() && self.row_count > 0
    }

    pub fn encoded_size(&self) -> usize {
        4 + self.packet_index.len() * PACKET_INDEX_ENTRY_SIZE + CONST_SECTION_SIZE
    }

    pub fn clear(&mut self) {
        self.packet_index.clear();
        self.row_count = 0;
    }

    /// Binary-searches the packet index (sorted by `first_row`, ascending)
    /// for the packet that should contain `row_index`.
    pub fn find_packet_for_row(&self, row_index: u64) -> Option<&PacketIndexEntry> {
        match self.packet_index.binary_search_by_key(&row_index, |e| e.first_row) {
            Ok(i) => Some(&self.packet_index[i]),
            Err(0) => None,
            Err(i) => Some(&self.packet_index[i - 1]),
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let start_offset = self.encoded_size() as u32;

        let mut hasher = StreamingChecksum64::new(0);
        hasher.update(MAGIC_BYTES_BIDX);
        for entry in &self.packet_index {
            hasher.update(&entry.byte_offset.to_le_bytes());
            hasher.update(&entry.first_row.to_le_bytes());
        }
        hasher.update(&FOOTER_EIDX_MAGIC.to_le_bytes());
        hasher.update(&start_offset.to_le_bytes());
        hasher.update(&self.row_count.to_le_bytes());
        let checksum = hasher.finalize();

        writer.write_all(MAGIC_BYTES_BIDX)?;
        for entry in &self.packet_index {
            writer.write_all(&entry.byte_offset.to_le_bytes())?;
            writer.write_all(&entry.first_row.to_le_bytes())?;
        }
        writer.write_all(&FOOTER_EIDX_MAGIC.to_le_bytes())?;
        writer.write_all(&start_offset.to_le_bytes())?;
        writer.write_all(&self.row_count.to_le_bytes())?;
        writer.write_all(&checksum.to_le_bytes())?;
        Ok(())
    }

    /// Reads the footer from a stream positioned anywhere; seeks to EOF-24
    /// to find the const section, then back by `start_offset` to validate
    /// the "BIDX" magic and read the index entries. Restores the stream's
    /// original position on failure.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let original_pos = reader.stream_position()?;
        match Self::try_read(reader) {
            Ok(footer) => Ok(footer),
            Err(e) => {
                reader.seek(SeekFrom::Start(original_pos))?;
                Err(e)
            }
        }
    }

    fn try_read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::End(-(CONST_SECTION_SIZE as i64)))?;

        let mut const_section = [0u8; CONST_SECTION_SIZE];
        reader.read_exact(&mut const_section)?;
        let start_magic = u32::from_le_bytes(const_section[0..4].try_into().unwrap());
        let start_offset = u32::from_le_bytes(const_section[4..8].try_into().unwrap());
        let row_count = u64::from_le_bytes(const_section[8..16].try_into().unwrap());
        let expected_checksum = u64::from_le_bytes(const_section[16..24].try_into().unwrap());

        if start_magic != FOOTER_EIDX_MAGIC {
            return Err(Error::CorruptedFile("footer EIDX magic mismatch".into()));
        }

        reader.seek(SeekFrom::End(-(start_offset as i64)))?;
        let mut start_magic_bytes = [0u8; 4];
        reader.read_exact(&mut start_magic_bytes)?;
        if &start_magic_bytes != MAGIC_BYTES_BIDX {
            return Err(Error::CorruptedFile("footer BIDX magic mismatch".into()));
        }

        let index_size = (start_offset as usize)
            .checked_sub(CONST_SECTION_SIZE + 4)
            .ok_or_else(|| Error::CorruptedFile("footer start_offset too small".into()))?;
        if index_size % PACKET_INDEX_ENTRY_SIZE != 0 {
            return Err(Error::CorruptedFile("footer index size misaligned".into()));
        }
        let entry_count = index_size / PACKET_INDEX_ENTRY_SIZE;

        let mut entry_bytes = vec![0u8; index_size];
        reader.read_exact(&mut entry_bytes)?;

        let mut hasher = StreamingChecksum64::new(0);
        hasher.update(MAGIC_BYTES_BIDX);
        hasher.update(&entry_bytes);
        hasher.update(&const_section[0..16]);
        let computed = hasher.finalize();
        if computed != expected_checksum {
            return Err(Error::ChecksumMismatch { expected: expected_checksum, computed });
        }

        let mut packet_index = Vec::with_capacity(entry_count);
        for chunk in entry_bytes.chunks_exact(PACKET_INDEX_ENTRY_SIZE) {
            packet_index.push(PacketIndexEntry {
                byte_offset: u64::from_le_bytes(chunk[0..8].try_into().unwrap()),
                first_row: u64::from_le_bytes(chunk[8..16].try_into().unwrap()),
            });
        }

        Ok(Self { packet_index, row_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_validates_checksum() {
        let mut footer = FileFooter::new(Vec::new(), 300);
        footer.add_entry(16, 0);
        footer.add_entry(1040, 100);
        footer.add_entry(2064, 200);

        let mut buf = Vec::new();
        footer.write(&mut buf).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        cursor.seek(SeekFrom::End(0)).unwrap();
        let read_back = FileFooter::read(&mut cursor).unwrap();

        assert_eq!(read_back.row_count(), 300);
        assert_eq!(read_back.packet_index().len(), 3);
        assert_eq!(read_back.packet_index()[1].first_row, 100);
    }

    #[test]
    fn detects_corruption() {
        let mut footer = FileFooter::new(Vec::new(), 1);
        footer.add_entry(16, 0);
        let mut buf = Vec::new();
        footer.write(&mut buf).unwrap();
        buf[5] ^= 0xFF;

        let mut cursor = std::io::Cursor::new(buf);
        cursor.seek(SeekFrom::End(0)).unwrap();
        assert!(FileFooter::read(&mut cursor).is_err());
    }

    #[test]
    fn binary_search_finds_containing_packet() {
        let mut footer = FileFooter::new(Vec::new(), 300);
        footer.add_entry(16, 0);
        footer.add_entry(1040, 100);
        footer.add_entry(2064, 200);

        assert_eq!(footer.find_packet_for_row(0).unwrap().byte_offset, 16);
        assert_eq!(footer.find_packet_for_row(150).unwrap().byte_offset, 1040);
        assert_eq!(footer.find_packet_for_row(299).unwrap().byte_offset, 2064);
    }
}
