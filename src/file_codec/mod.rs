//! Runtime dispatch across the five file codecs.
//!
//! Which codec applies is decided entirely by [`FileHeader`] flags and its
//! `compression_level` field — no codec id is stored on disk. "Compressed"
//! is not a flag bit; it's `compression_level() > 0`.
//!
//! | `STREAMING` | compressed | `BATCH_COMPRESSION` | codec |
//! |---|---|---|---|
//! | yes | no  | -   | [`FileCodecStream001`] |
//! | yes | yes | -   | [`FileCodecStreamLz4001`] |
//! | no  | no  | -   | [`FileCodecPacket001`] |
//! | no  | yes | no  | [`FileCodecPacketLz4001`] |
//! | no  | yes | yes | [`FileCodecPacketLz4Batch001`] |
//!
//! The dispatch owns the underlying stream uniformly across all five
//! variants (rather than borrowing it per call) so that the batch-LZ4
//! variant's background thread can hold it for the codec's lifetime;
//! [`crate::writer::Writer`] and [`crate::reader::Reader`] hand the stream
//! over at open and get it back at close.

mod packet;
mod packet_lz4;
mod packet_lz4_batch;
mod stream;
mod stream_lz4;

pub use packet::FileCodecPacket001;
pub use packet_lz4::FileCodecPacketLz4001;
pub use packet_lz4_batch::FileCodecPacketLz4Batch001;
pub use stream::FileCodecStream001;
pub use stream_lz4::FileCodecStreamLz4001;

use std::io::{Read, Seek, Write};

use crate::error::Result;
use crate::footer::PacketIndexEntry;
use crate::header::FileHeader;

pub enum FileCodecDispatch<S: Read + Write + Seek + Send + 'static> {
    Stream(FileCodecStream001, S),
    StreamLz4(FileCodecStreamLz4001, S),
    Packet(FileCodecPacket001, S),
    PacketLz4(FileCodecPacketLz4001, S),
    PacketLz4Batch(FileCodecPacketLz4Batch001<S>),
}

impl<S: Read + Write + Seek + Send + 'static> FileCodecDispatch<S> {
    pub fn new_for_write(stream: S, header: &FileHeader) -> Self {
        use crate::definitions::FileFlags;

        let streaming = header.has_flag(FileFlags::STREAMING);
        let compressed = header.compression_level() > 0;
        let batch = header.has_flag(FileFlags::BATCH_COMPRESSION);

        if streaming {
            if compressed {
                Self::StreamLz4(FileCodecStreamLz4001::new(), stream)
            } else {
                Self::Stream(FileCodecStream001::new(), stream)
            }
        } else if compressed && batch {
            let mut codec = FileCodecPacketLz4Batch001::new();
            codec.setup_write(stream, header);
            Self::PacketLz4Batch(codec)
        } else if compressed {
            let mut codec = FileCodecPacketLz4001::new();
            codec.setup_write(header);
            Self::PacketLz4(codec, stream)
        } else {
            let mut codec = FileCodecPacket001::new();
            codec.setup_write(header);
            Self::Packet(codec, stream)
        }
    }

    pub fn new_for_read(mut stream: S, header: &FileHeader) -> Result<Self> {
        use crate::definitions::FileFlags;

        let streaming = header.has_flag(FileFlags::STREAMING);
        let compressed = header.compression_level() > 0;
        let batch = header.has_flag(FileFlags::BATCH_COMPRESSION);

        Ok(if streaming {
            if compressed {
                Self::StreamLz4(FileCodecStreamLz4001::new(), stream)
            } else {
                Self::Stream(FileCodecStream001::new(), stream)
            }
        } else if compressed && batch {
            let mut codec = FileCodecPacketLz4Batch001::new();
            codec.setup_read(stream, header)?;
            Self::PacketLz4Batch(codec)
        } else if compressed {
            let mut codec = FileCodecPacketLz4001::new();
            codec.setup_read(&mut stream, header)?;
            Self::PacketLz4(codec, stream)
        } else {
            let mut codec = FileCodecPacket001::new();
            codec.setup_read(&mut stream, header)?;
            Self::Packet(codec, stream)
        })
    }

    /// Called before every `write_row`; returns whether a packet boundary
    /// was crossed (the caller must reset the row codec in that case).
    pub fn begin_write(&mut self, row_count: u64) -> Result<bool> {
        match self {
            Self::Stream(..) | Self::StreamLz4(..) => Ok(false),
            Self::Packet(codec, stream) => codec.begin_write(stream, row_count),
            Self::PacketLz4(codec, stream) => codec.begin_write(stream, row_count),
            Self::PacketLz4Batch(codec) => codec.begin_write(row_count),
        }
    }

    pub fn write_row(&mut self, row_data: &[u8]) -> Result<()> {
        match self {
            Self::Stream(codec, stream) => codec.write_row(stream, row_data),
            Self::StreamLz4(codec, stream) => codec.write_row(stream, row_data),
            Self::Packet(codec, stream) => codec.write_row(stream, row_data),
            Self::PacketLz4(codec, stream) => codec.write_row(stream, row_data),
            Self::PacketLz4Batch(codec) => codec.write_row(row_data),
        }
    }

    /// Writes any trailing data (packet terminator, footer) and returns the
    /// stream, consuming the dispatch.
    pub fn finalize(self, total_rows: u64) -> Result<S> {
        match self {
            Self::Stream(mut codec, mut stream) => {
                codec.finalize(&mut stream, total_rows)?;
                Ok(stream)
            }
            Self::StreamLz4(mut codec, mut stream) => {
                codec.finalize(&mut stream, total_rows)?;
                Ok(stream)
            }
            Self::Packet(mut codec, mut stream) => {
                codec.finalize(&mut stream, total_rows)?;
                Ok(stream)
            }
            Self::PacketLz4(mut codec, mut stream) => {
                codec.finalize(&mut stream, total_rows)?;
                Ok(stream)
            }
            Self::PacketLz4Batch(mut codec) => codec.finalize(total_rows),
        }
    }

    /// Returns `Ok(None)` at end of data, `Ok(Some(&[]))` for a ZoH repeat.
    pub fn read_row(&mut self) -> Result<Option<&[u8]>> {
        match self {
            Self::Stream(codec, stream) => codec.read_row(stream),
            Self::StreamLz4(codec, stream) => codec.read_row(stream),
            Self::Packet(codec, stream) => codec.read_row(stream),
            Self::PacketLz4(codec, stream) => codec.read_row(stream),
            Self::PacketLz4Batch(codec) => codec.read_row(),
        }
    }

    pub fn packet_boundary_crossed(&self) -> bool {
        match self {
            Self::Stream(codec, _) => codec.packet_boundary_crossed(),
            Self::StreamLz4(codec, _) => codec.packet_boundary_crossed(),
            Self::Packet(codec, _) => codec.packet_boundary_crossed(),
            Self::PacketLz4(codec, _) => codec.packet_boundary_crossed(),
            Self::PacketLz4Batch(codec) => codec.packet_boundary_crossed(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Self::Stream(codec, _) => codec.reset(),
            Self::StreamLz4(codec, _) => codec.reset(),
            Self::Packet(codec, _) => codec.reset(),
            Self::PacketLz4(codec, _) => codec.reset(),
            Self::PacketLz4Batch(codec) => codec.reset(),
        }
    }

    /// Packet index built so far, for writing into the footer or handing to
    /// a direct-access reader. Empty for the streaming codecs.
    pub fn into_packet_index(self) -> Vec<PacketIndexEntry> {
        match self {
            Self::Stream(..) | Self::StreamLz4(..) => Vec::new(),
            Self::Packet(codec, _) => codec.into_packet_index(),
            Self::PacketLz4(codec, _) => codec.into_packet_index(),
            Self::PacketLz4Batch(_) => Vec::new(),
        }
    }

    /// Recovers the underlying stream from a reader without writing a
    /// footer, unlike [`Self::finalize`] (write-mode only).
    pub fn into_stream(self) -> Option<S> {
        match self {
            Self::Stream(_, s) => Some(s),
            Self::StreamLz4(_, s) => Some(s),
            Self::Packet(_, s) => Some(s),
            Self::PacketLz4(_, s) => Some(s),
            Self::PacketLz4Batch(mut codec) => codec.teardown_read(),
        }
    }
}
