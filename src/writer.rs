//! `Writer<S>`: opens a new BCSV file, appends rows, closes it.

use std::io::{Read, Seek, Write};

use crate::byte_buffer::ByteBuffer;
use crate::definitions::FileFlags;
use crate::error::Result;
use crate::file_codec::FileCodecDispatch;
use crate::header::FileHeader;
use crate::layout::Layout;
use crate::row::Row;
use crate::row_codec::RowCodecDispatch;

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub compression_level: u8,
    pub zoh_enabled: bool,
    pub streaming: bool,
    pub batch_compression: bool,
    pub packet_size: u32,
    pub build_index: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression_level: 1,
            zoh_enabled: false,
            streaming: false,
            batch_compression: false,
            packet_size: crate::definitions::DEFAULT_PACKET_SIZE,
            build_index: true,
        }
    }
}

pub struct Writer<S: Read + Write + Seek + Send + 'static> {
    dispatch: Option<FileCodecDispatch<S>>,
    layout: Layout,
    row_codec: RowCodecDispatch,
    buffer: ByteBuffer,
    row_count: u64,
}

impl<S: Read + Write + Seek + Send + 'static> Writer<S> {
    /// Writes the file header and schema, then opens the file codec chosen
    /// by `options`.
    pub fn create(mut stream: S, layout: Layout, options: WriterOptions) -> Result<Self> {
        let mut header = FileHeader::new(layout.column_count(), options.compression_level);
        let packet_size = options.packet_size.max(crate::definitions::MIN_PACKET_SIZE as u32);
        header.set_packet_size(packet_size);

        let mut flags = FileFlags::empty();
        flags.set(FileFlags::ZOH_ENABLED, options.zoh_enabled);
        flags.set(FileFlags::STREAMING, options.streaming);
        flags.set(FileFlags::BATCH_COMPRESSION, options.batch_compression && !options.streaming);
        flags.set(FileFlags::NO_FILE_INDEX, !options.build_index);
        header.set_flags(flags);

        header.write_to(&mut stream, &layout)?;
        tracing::debug!(columns = layout.column_count(), flags = ?header.flags(), "opened BCSV file for writing");

        let row_codec = RowCodecDispatch::new(&layout, options.zoh_enabled);
        let dispatch = FileCodecDispatch::new_for_write(stream, &header);

        Ok(Self { dispatch: Some(dispatch), layout, row_codec, buffer: ByteBuffer::new(), row_count: 0 })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Serializes and appends one row. On a packet boundary the row codec
    /// resets so the new packet starts with a full (non-delta) emit.
    pub fn write_row(&mut self, row: &mut Row) -> Result<()> {
        let dispatch = self.dispatch.as_mut().expect("writer already closed");

        if dispatch.begin_write(self.row_count)? {
            self.row_codec.reset();
        }

        let produced = self.row_codec.serialize(row, &self.layout, &mut self.buffer)?;
        if produced {
            dispatch.write_row(self.buffer.as_slice())?;
        } else {
            dispatch.write_row(&[])?;
        }
        self.row_count += 1;
        Ok(())
    }

    /// Flushes the last packet and footer, returning the stream.
    pub fn close(mut self) -> Result<S> {
        let dispatch = self.dispatch.take().expect("writer already closed");
        let row_count = self.row_count;
        dispatch.finalize(row_count)
    }
}

impl<S: Read + Write + Seek + Send + 'static> Drop for Writer<S> {
    fn drop(&mut self) {
        if let Some(dispatch) = self.dispatch.take() {
            if let Err(e) = dispatch.finalize(self.row_count) {
                tracing::error!(error = %e, "failed to finalize BCSV file on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::ColumnType;
    use crate::layout::ColumnDefinition;
    use crate::reader::Reader;
    use crate::row::Value;

    fn sample_layout() -> Layout {
        Layout::new(vec![
            ColumnDefinition::new("id", ColumnType::Uint32),
            ColumnDefinition::new("name", ColumnType::String),
        ])
        .unwrap()
    }

    #[test]
    fn writes_and_reads_back_flat_rows() {
        let layout = sample_layout();
        let mut writer = Writer::create(std::io::Cursor::new(Vec::new()), layout.clone(), WriterOptions::default()).unwrap();

        for i in 0..5u32 {
            let mut row = Row::new(&layout);
            row.set(0, Value::Uint32(i)).unwrap();
            row.set(1, Value::String(format!("row-{i}"))).unwrap();
            writer.write_row(&mut row).unwrap();
        }
        let stream = writer.close().unwrap();

        let mut reader = Reader::open(std::io::Cursor::new(stream.into_inner())).unwrap();
        for i in 0..5u32 {
            let row = reader.read_row().unwrap().unwrap();
            assert_eq!(row.get(0), &Value::Uint32(i));
            assert_eq!(row.get(1).as_str(), Some(format!("row-{i}").as_str()));
        }
        assert!(reader.read_row().unwrap().is_none());
    }

    #[test]
    fn zoh_enabled_round_trips_repeats() {
        let layout = sample_layout();
        let options = WriterOptions { zoh_enabled: true, ..WriterOptions::default() };
        let mut writer = Writer::create(std::io::Cursor::new(Vec::new()), layout.clone(), options).unwrap();

        let mut row = Row::new(&layout);
        row.set(0, Value::Uint32(1)).unwrap();
        row.set(1, Value::String("same".into())).unwrap();
        writer.write_row(&mut row).unwrap();
        writer.write_row(&mut row).unwrap();
        row.set(0, Value::Uint32(2)).unwrap();
        writer.write_row(&mut row).unwrap();
        let stream = writer.close().unwrap();

        let mut reader = Reader::open(std::io::Cursor::new(stream.into_inner())).unwrap();
        let r0 = reader.read_row().unwrap().unwrap();
        assert_eq!(r0.get(0), &Value::Uint32(1));
        let r1 = reader.read_row().unwrap().unwrap();
        assert_eq!(r1.get(0), &Value::Uint32(1));
        assert_eq!(r1.get(1).as_str(), Some("same"));
        let r2 = reader.read_row().unwrap().unwrap();
        assert_eq!(r2.get(0), &Value::Uint32(2));
        assert!(reader.read_row().unwrap().is_none());
    }
}
