//! `FileCodecPacketLz4001`: packet framing plus per-row LZ4 compression.
//!
//! Wraps [`FileCodecPacket001`] for framing/checksums/packet lifecycle and
//! LZ4-compresses each row's bytes before handing them to it. This is the
//! default codec for newly written files.

use std::io::{Read, Seek, Write};

use crate::error::{Error, Result};
use crate::file_codec::packet::FileCodecPacket001;
use crate::footer::PacketIndexEntry;
use crate::header::FileHeader;

#[derive(Debug, Default)]
pub struct FileCodecPacketLz4001 {
    packet: FileCodecPacket001,
    decompressed: Vec<u8>,
}

impl FileCodecPacketLz4001 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup_write(&mut self, header: &FileHeader) {
        self.packet.setup_write(header);
    }

    pub fn setup_read<R: Read + Seek>(&mut self, reader: &mut R, header: &FileHeader) -> Result<()> {
        self.packet.setup_read(reader, header)
    }

    pub fn into_packet_index(self) -> Vec<PacketIndexEntry> {
        self.packet.into_packet_index()
    }

    pub fn begin_write<W: Write + Seek>(&mut self, writer: &mut W, row_count: u64) -> Result<bool> {
        self.packet.begin_write(writer, row_count)
    }

    pub fn write_row<W: Write>(&mut self, writer: &mut W, row_data: &[u8]) -> Result<()> {
        if row_data.is_empty() {
            return self.packet.write_row(writer, row_data);
        }
        let compressed = lz4_flex::compress_prepend_size(row_data);
        self.packet.write_row(writer, &compressed)
    }

    pub fn finalize<W: Write + Seek>(&mut self, writer: &mut W, total_rows: u64) -> Result<()> {
        self.packet.finalize(writer, total_rows)
    }

    pub fn read_row<R: Read + Seek>(&mut self, reader: &mut R) -> Result<Option<&[u8]>> {
        let compressed = match self.packet.read_row(reader)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        if compressed.is_empty() {
            self.decompressed.clear();
            return Ok(Some(&[]));
        }
        self.decompressed = lz4_flex::decompress_size_prepended(compressed)
            .map_err(|e| Error::CorruptedFile(format!("lz4 decompression failed: {e}")))?;
        Ok(Some(&self.decompressed))
    }

    pub fn packet_boundary_crossed(&self) -> bool {
        self.packet.packet_boundary_crossed()
    }

    pub fn reset(&mut self) {
        self.packet.reset();
    }
}
