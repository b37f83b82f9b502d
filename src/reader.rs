//! `Reader<S>`: opens an existing BCSV file and yields rows sequentially.

use std::io::{Read, Seek, Write};

use crate::definitions::FileFlags;
use crate::error::Result;
use crate::file_codec::FileCodecDispatch;
use crate::header::FileHeader;
use crate::layout::Layout;
use crate::row::Row;
use crate::row_codec::RowCodecDispatch;

pub struct Reader<S: Read + Write + Seek + Send + 'static> {
    dispatch: FileCodecDispatch<S>,
    layout: Layout,
    row_codec: RowCodecDispatch,
    row: Row,
    rows_read: u64,
}

impl<S: Read + Write + Seek + Send + 'static> Reader<S> {
    /// Reads the header and schema, then opens the file codec the header's
    /// flags select.
    pub fn open(mut stream: S) -> Result<Self> {
        let (header, layout) = FileHeader::read_from(&mut stream)?;
        tracing::debug!(columns = layout.column_count(), flags = ?header.flags(), "opened BCSV file for reading");

        let zoh_enabled = header.has_flag(FileFlags::ZOH_ENABLED);
        let row_codec = RowCodecDispatch::new(&layout, zoh_enabled);
        let row = Row::new(&layout);
        let dispatch = FileCodecDispatch::new_for_read(stream, &header)?;

        Ok(Self { dispatch, layout, row_codec, row, rows_read: 0 })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Returns `Ok(Some(&row))` with the next row's values, or `Ok(None)` at
    /// end of file. A ZoH repeat leaves unchanged columns holding the
    /// previous row's values, which is the point of the encoding.
    pub fn read_row(&mut self) -> Result<Option<&Row>> {
        // Copied out of the codec's internal buffer immediately so the
        // borrow on `self.dispatch` ends here, freeing us to call
        // `packet_boundary_crossed()` and touch `self.row`/`self.row_codec`
        // below without fighting the borrow checker over one field.
        let data: Vec<u8> = match self.dispatch.read_row()? {
            Some(data) => data.to_vec(),
            None => return Ok(None),
        };

        if self.dispatch.packet_boundary_crossed() {
            self.row_codec.reset();
        }

        if !data.is_empty() {
            self.row_codec.deserialize(&data, &self.layout, &mut self.row)?;
        }
        self.rows_read += 1;
        Ok(Some(&self.row))
    }

    /// Recovers the stream without writing anything (no footer is written
    /// on close for a reader).
    pub fn close(self) -> Option<S> {
        self.dispatch.into_stream()
    }
}
