//! `ReaderDirectAccess<S>`: random access to a row by index via the packet
//! index, without replaying the whole file.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::definitions::FileFlags;
use crate::error::{Error, Result};
use crate::file_codec::FileCodecDispatch;
use crate::footer::{FileFooter, PacketIndexEntry};
use crate::header::FileHeader;
use crate::layout::Layout;
use crate::packet_header::PacketHeader;
use crate::row::Row;
use crate::row_codec::RowCodecDispatch;

/// Maximum distance scanned per gap while rebuilding a missing/corrupt
/// index. A reasonably large multiple of the default packet size so a
/// single dropped packet header doesn't make recovery give up early.
const MAX_SCAN_BYTES: u64 = 64 * crate::definitions::DEFAULT_PACKET_SIZE as u64;

pub struct ReaderDirectAccess<S: Read + Write + Seek + Send + 'static> {
    dispatch: Option<FileCodecDispatch<S>>,
    header: FileHeader,
    layout: Layout,
    row_codec: RowCodecDispatch,
    row: Row,
    footer: FileFooter,
    current_row: u64,
}

impl<S: Read + Write + Seek + Send + 'static> ReaderDirectAccess<S> {
    /// Opens a packet-structured file for random-row access. Streaming
    /// files have no packet index and aren't supported here; use
    /// [`crate::reader::Reader`] for those.
    pub fn open(mut stream: S) -> Result<Self> {
        let (header, layout) = FileHeader::read_from(&mut stream)?;
        if header.has_flag(FileFlags::STREAMING) {
            return Err(Error::Schema("direct access requires a packet-structured file, not a streaming one".into()));
        }

        let footer = match FileFooter::read(&mut stream) {
            Ok(footer) if footer.has_valid_index() => footer,
            Ok(_) => {
                tracing::warn!("packet index empty or row count zero, rebuilding by scanning");
                Self::rebuild_index(&mut stream)?
            }
            Err(e) => {
                tracing::warn!(error = %e, "footer missing or corrupt, rebuilding packet index by scanning");
                Self::rebuild_index(&mut stream)?
            }
        };

        let zoh_enabled = header.has_flag(FileFlags::ZOH_ENABLED);
        let row_codec = RowCodecDispatch::new(&layout, zoh_enabled);
        let row = Row::new(&layout);

        let first_offset = footer.packet_index().first().map(|e| e.byte_offset);
        let dispatch = match first_offset {
            Some(offset) => {
                stream.seek(SeekFrom::Start(offset))?;
                Some(FileCodecDispatch::new_for_read(stream, &header)?)
            }
            None => None,
        };

        Ok(Self { dispatch, header, layout, row_codec, row, footer, current_row: 0 })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn packet_count(&self) -> usize {
        self.footer.packet_index().len()
    }

    /// Scans the whole file for valid packet headers, ignoring whatever the
    /// footer (if any) says. Used when the footer can't be trusted.
    fn rebuild_index(stream: &mut S) -> Result<FileFooter> {
        let mut entries = Vec::new();
        let mut pos = 0u64;
        loop {
            match PacketHeader::scan_next(stream, pos, MAX_SCAN_BYTES)? {
                Some((found, offset)) => {
                    entries.push(PacketIndexEntry { byte_offset: offset, first_row: found.first_row_index });
                    pos = offset + crate::packet_header::PACKET_HEADER_SIZE as u64;
                }
                None => break,
            }
        }
        if entries.is_empty() {
            return Err(Error::CorruptedFile("no valid packet headers found while rebuilding index".into()));
        }
        // Row count can't be recovered without reading every packet to its
        // terminator; direct access only needs the index for seeking.
        Ok(FileFooter::new(entries, 0))
    }

    /// Seeks to `row_index` and returns it, re-opening packet/row-codec
    /// state at the containing packet's start and reading forward to the
    /// target row. Never starts mid-packet, since ZoH and LZ4 block state
    /// both assume a packet boundary means "fresh start".
    pub fn seek_to_row(&mut self, row_index: u64) -> Result<&Row> {
        let entry = *self
            .footer
            .find_packet_for_row(row_index)
            .ok_or_else(|| Error::NotFound(format!("row {row_index} is not covered by the packet index")))?;

        let dispatch = self.dispatch.take().ok_or_else(|| Error::NotFound("file has no packets".into()))?;
        let mut stream = dispatch.into_stream().expect("reader-mode dispatch always returns its stream");
        stream.seek(SeekFrom::Start(entry.byte_offset))?;

        self.dispatch = Some(FileCodecDispatch::new_for_read(stream, &self.header)?);
        self.row_codec.reset();
        self.row = Row::new(&self.layout);
        self.current_row = entry.first_row;

        loop {
            let data: Vec<u8> = self
                .dispatch
                .as_mut()
                .unwrap()
                .read_row()?
                .map(|d| d.to_vec())
                .ok_or_else(|| Error::NotFound(format!("row {row_index} not reached before end of file")))?;

            if self.dispatch.as_ref().unwrap().packet_boundary_crossed() {
                self.row_codec.reset();
            }
            if !data.is_empty() {
                self.row_codec.deserialize(&data, &self.layout, &mut self.row)?;
            }

            if self.current_row == row_index {
                return Ok(&self.row);
            }
            self.current_row += 1;
        }
    }

    pub fn close(self) -> Option<S> {
        self.dispatch.and_then(|d| d.into_stream())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::ColumnType;
    use crate::layout::ColumnDefinition;
    use crate::row::Value;
    use crate::writer::{Writer, WriterOptions};

    fn sample_layout() -> Layout {
        Layout::new(vec![
            ColumnDefinition::new("id", ColumnType::Uint32),
            ColumnDefinition::new("name", ColumnType::String),
        ])
        .unwrap()
    }

    fn write_sample(rows: u32, packet_size: u32) -> Vec<u8> {
        let layout = sample_layout();
        let options = WriterOptions { packet_size, ..WriterOptions::default() };
        let mut writer = Writer::create(std::io::Cursor::new(Vec::new()), layout.clone(), options).unwrap();
        for i in 0..rows {
            let mut row = Row::new(&layout);
            row.set(0, Value::Uint32(i)).unwrap();
            row.set(1, Value::String(format!("row-{i}"))).unwrap();
            writer.write_row(&mut row).unwrap();
        }
        writer.close().unwrap().into_inner()
    }

    #[test]
    fn seeks_to_arbitrary_rows_across_packets() {
        let bytes = write_sample(500, crate::definitions::MIN_PACKET_SIZE as u32);
        let mut direct = ReaderDirectAccess::open(std::io::Cursor::new(bytes)).unwrap();
        assert!(direct.packet_count() >= 1);

        for &i in &[0u32, 1, 250, 499] {
            let row = direct.seek_to_row(i as u64).unwrap();
            assert_eq!(row.get(0), &Value::Uint32(i));
            assert_eq!(row.get(1).as_str(), Some(format!("row-{i}").as_str()));
        }
    }

    #[test]
    fn rebuilds_index_when_footer_has_no_entries() {
        let layout = sample_layout();
        let options = WriterOptions {
            packet_size: crate::definitions::MIN_PACKET_SIZE as u32,
            build_index: false,
            ..WriterOptions::default()
        };
        let mut writer = Writer::create(std::io::Cursor::new(Vec::new()), layout.clone(), options).unwrap();
        for i in 0..200u32 {
            let mut row = Row::new(&layout);
            row.set(0, Value::Uint32(i)).unwrap();
            row.set(1, Value::String(format!("row-{i}"))).unwrap();
            writer.write_row(&mut row).unwrap();
        }
        let bytes = writer.close().unwrap().into_inner();

        let mut direct = ReaderDirectAccess::open(std::io::Cursor::new(bytes)).unwrap();
        assert!(direct.packet_count() >= 1);
        let row = direct.seek_to_row(150).unwrap();
        assert_eq!(row.get(0), &Value::Uint32(150));
    }
}
