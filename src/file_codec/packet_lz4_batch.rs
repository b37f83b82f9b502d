//! `FileCodecPacketLz4Batch001`: async double-buffered batch-LZ4 codec.
//!
//! A background thread owns the underlying stream and performs all
//! compression/decompression and I/O, keeping `write_row`/`read_row` on the
//! calling thread down to a memcpy and a VLE decode respectively. The only
//! stall point is when the background thread has not yet finished the
//! previous packet (back-pressure), enforced by waiting for it to go idle
//! before handing off the next one.
//!
//! Unlike the other file codecs, this one must *own* the stream for the
//! lifetime of its background thread rather than borrow it per call — a
//! consequence of `std::thread::spawn` requiring `'static` captures. The
//! stream is handed back from [`FileCodecPacketLz4Batch001::finalize`] /
//! [`FileCodecPacketLz4Batch001::teardown_read`].
//!
//! Wire format per packet:
//! ```text
//! PacketHeader (16 bytes)
//! u32 uncompressed_size
//! u32 compressed_size
//! LZ4 block (compressed_size bytes)
//! u64 payload checksum (xxHash64 of the uncompressed payload)
//! ```
//! Inner uncompressed payload: `BLE(row_len) | row_bytes`, repeated, then
//! `BLE(PCKT_TERMINATOR)`.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::byte_buffer::ByteBuffer;
use crate::checksum::StreamingChecksum64;
use crate::definitions::{FileFlags, MAX_PACKET_SIZE, MAX_ROW_LENGTH, PCKT_TERMINATOR};
use crate::error::{Error, Result};
use crate::footer::{FileFooter, PacketIndexEntry};
use crate::header::FileHeader;
use crate::packet_header::PacketHeader;
use crate::vle::ble_decode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BgTask {
    Idle,
    CompressWrite,
    ReadDecompress,
    Shutdown,
}

struct WriteShared<S> {
    stream: S,
    task: BgTask,
    raw_bg: ByteBuffer,
    bg_first_row: u64,
    build_index: bool,
    packet_index: Vec<PacketIndexEntry>,
    error: Option<String>,
}

struct WriteRole<S> {
    state: Arc<(Mutex<WriteShared<S>>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl<S: Write + Seek + Send + 'static> WriteRole<S> {
    fn spawn(stream: S, build_index: bool) -> Self {
        let state = Arc::new((
            Mutex::new(WriteShared {
                stream,
                task: BgTask::Idle,
                raw_bg: ByteBuffer::new(),
                bg_first_row: 0,
                build_index,
                packet_index: Vec::new(),
                error: None,
            }),
            Condvar::new(),
        ));
        let worker_state = Arc::clone(&state);
        let handle = std::thread::spawn(move || Self::bg_loop(worker_state));
        Self { state, handle: Some(handle) }
    }

    fn bg_loop(state: Arc<(Mutex<WriteShared<S>>, Condvar)>) {
        let (lock, cv) = &*state;
        loop {
            let mut guard = lock.lock().unwrap();
            while guard.task == BgTask::Idle {
                guard = cv.wait(guard).unwrap();
            }
            let task = guard.task;
            if task == BgTask::Shutdown {
                return;
            }
            if task == BgTask::CompressWrite {
                if let Err(e) = Self::compress_and_write(&mut guard) {
                    guard.error = Some(e.to_string());
                }
            }
            guard.task = BgTask::Idle;
            drop(guard);
            cv.notify_one();
        }
    }

    fn compress_and_write(shared: &mut WriteShared<S>) -> Result<()> {
        if shared.build_index {
            let offset = shared.stream.stream_position()?;
            shared.packet_index.push(PacketIndexEntry { byte_offset: offset, first_row: shared.bg_first_row });
        }
        PacketHeader::write(&mut shared.stream, shared.bg_first_row)?;

        let mut hasher = StreamingChecksum64::new(0);
        hasher.update(shared.raw_bg.as_slice());
        let checksum = hasher.finalize();

        let compressed = lz4_flex::compress(shared.raw_bg.as_slice());

        let uncompressed_size = shared.raw_bg.len() as u32;
        let compressed_size = compressed.len() as u32;
        shared.stream.write_all(&uncompressed_size.to_le_bytes())?;
        shared.stream.write_all(&compressed_size.to_le_bytes())?;
        shared.stream.write_all(&compressed)?;
        shared.stream.write_all(&checksum.to_le_bytes())?;

        shared.raw_bg.clear();
        Ok(())
    }

    fn wait_idle_and_check(&self) -> Result<()> {
        let (lock, cv) = &*self.state;
        let mut guard = lock.lock().unwrap();
        while guard.task != BgTask::Idle {
            guard = cv.wait(guard).unwrap();
        }
        if let Some(msg) = guard.error.take() {
            return Err(Error::BackgroundThread(msg));
        }
        Ok(())
    }

    fn hand_off(&self, raw: &mut ByteBuffer, first_row: u64) {
        let (lock, cv) = &*self.state;
        let mut guard = lock.lock().unwrap();
        std::mem::swap(&mut guard.raw_bg, raw);
        guard.bg_first_row = first_row;
        guard.task = BgTask::CompressWrite;
        drop(guard);
        cv.notify_one();
    }

    fn shutdown(mut self) -> Result<(S, Vec<PacketIndexEntry>)> {
        {
            let (lock, cv) = &*self.state;
            let mut guard = lock.lock().unwrap();
            guard.task = BgTask::Shutdown;
            drop(guard);
            cv.notify_one();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let inner = Arc::try_unwrap(self.state)
            .unwrap_or_else(|_| unreachable!("background thread joined, sole owner remains"))
            .0
            .into_inner()
            .unwrap();
        if let Some(msg) = inner.error {
            return Err(Error::BackgroundThread(msg));
        }
        Ok((inner.stream, inner.packet_index))
    }
}

struct ReadShared<S> {
    stream: S,
    task: BgTask,
    read_next: ByteBuffer,
    bg_has_next_packet: bool,
    error: Option<String>,
}

struct ReadRole<S> {
    state: Arc<(Mutex<ReadShared<S>>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl<S: Read + Seek + Send + 'static> ReadRole<S> {
    fn spawn(stream: S) -> Self {
        let state = Arc::new((
            Mutex::new(ReadShared { stream, task: BgTask::Idle, read_next: ByteBuffer::new(), bg_has_next_packet: false, error: None }),
            Condvar::new(),
        ));
        let worker_state = Arc::clone(&state);
        let handle = std::thread::spawn(move || Self::bg_loop(worker_state));
        Self { state, handle: Some(handle) }
    }

    fn bg_loop(state: Arc<(Mutex<ReadShared<S>>, Condvar)>) {
        let (lock, cv) = &*state;
        loop {
            let mut guard = lock.lock().unwrap();
            while guard.task == BgTask::Idle {
                guard = cv.wait(guard).unwrap();
            }
            let task = guard.task;
            if task == BgTask::Shutdown {
                return;
            }
            if task == BgTask::ReadDecompress {
                match read_and_decompress_packet(&mut guard.stream) {
                    Ok(Some(buf)) => {
                        guard.read_next = buf;
                        guard.bg_has_next_packet = true;
                    }
                    Ok(None) => guard.bg_has_next_packet = false,
                    Err(e) => {
                        guard.error = Some(e.to_string());
                        guard.bg_has_next_packet = false;
                    }
                }
            }
            guard.task = BgTask::Idle;
            drop(guard);
            cv.notify_one();
        }
    }

    fn wait_idle_and_check(&self) -> Result<bool> {
        let (lock, cv) = &*self.state;
        let mut guard = lock.lock().unwrap();
        while guard.task != BgTask::Idle {
            guard = cv.wait(guard).unwrap();
        }
        if let Some(msg) = guard.error.take() {
            return Err(Error::BackgroundThread(msg));
        }
        Ok(guard.bg_has_next_packet)
    }

    fn take_next(&self) -> ByteBuffer {
        let (lock, _) = &*self.state;
        let mut guard = lock.lock().unwrap();
        std::mem::take(&mut guard.read_next)
    }

    fn request_read_ahead(&self) {
        let (lock, cv) = &*self.state;
        let mut guard = lock.lock().unwrap();
        guard.task = BgTask::ReadDecompress;
        drop(guard);
        cv.notify_one();
    }

    fn shutdown(mut self) -> S {
        {
            let (lock, cv) = &*self.state;
            let mut guard = lock.lock().unwrap();
            guard.task = BgTask::Shutdown;
            drop(guard);
            cv.notify_one();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        Arc::try_unwrap(self.state)
            .unwrap_or_else(|_| unreachable!("background thread joined, sole owner remains"))
            .0
            .into_inner()
            .unwrap()
            .stream
    }
}

/// Reads and decompresses one packet; `None` means the footer or EOF was
/// reached instead of a packet, and the stream position is restored.
fn read_and_decompress_packet<S: Read + Seek>(stream: &mut S) -> Result<Option<ByteBuffer>> {
    let pos = stream.stream_position()?;
    let header = PacketHeader::read(stream)?;
    let Some(_header) = header else {
        stream.seek(SeekFrom::Start(pos))?;
        return Ok(None);
    };

    let mut sizes = [0u8; 8];
    stream.read_exact(&mut sizes)?;
    let uncompressed_size = u32::from_le_bytes(sizes[0..4].try_into().unwrap());
    let compressed_size = u32::from_le_bytes(sizes[4..8].try_into().unwrap());
    if uncompressed_size as usize > MAX_PACKET_SIZE || compressed_size as usize > MAX_PACKET_SIZE {
        return Err(Error::CorruptedFile("packet size exceeds MAX_PACKET_SIZE".into()));
    }

    let mut compressed = vec![0u8; compressed_size as usize];
    stream.read_exact(&mut compressed)?;

    let mut expected = [0u8; 8];
    stream.read_exact(&mut expected)?;
    let expected = u64::from_le_bytes(expected);

    let decompressed = lz4_flex::decompress(&compressed, uncompressed_size as usize)
        .map_err(|e| Error::CorruptedFile(format!("lz4 decompression failed: {e}")))?;

    let mut hasher = StreamingChecksum64::new(0);
    hasher.update(&decompressed);
    let actual = hasher.finalize();
    if actual != expected {
        return Err(Error::ChecksumMismatch { expected, computed: actual });
    }

    Ok(Some(ByteBuffer::from(decompressed)))
}

enum Role<S> {
    Write(WriteRole<S>),
    Read(ReadRole<S>),
}

pub struct FileCodecPacketLz4Batch001<S: Read + Write + Seek + Send + 'static> {
    role: Option<Role<S>>,
    raw_active: ByteBuffer,
    read_current: ByteBuffer,
    read_cursor: usize,
    packet_size_limit: usize,
    current_packet_first_row: u64,
    packet_open: bool,
    packet_boundary_crossed: bool,
}

impl<S: Read + Write + Seek + Send + 'static> Default for FileCodecPacketLz4Batch001<S> {
    fn default() -> Self {
        Self {
            role: None,
            raw_active: ByteBuffer::new(),
            read_current: ByteBuffer::new(),
            read_cursor: 0,
            packet_size_limit: crate::definitions::MIN_PACKET_SIZE,
            current_packet_first_row: 0,
            packet_open: false,
            packet_boundary_crossed: false,
        }
    }
}

impl<S: Read + Write + Seek + Send + 'static> FileCodecPacketLz4Batch001<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup_write(&mut self, stream: S, header: &FileHeader) {
        self.packet_size_limit = header.packet_size() as usize;
        let build_index = !header.has_flag(FileFlags::NO_FILE_INDEX);
        self.raw_active = ByteBuffer::new();
        self.current_packet_first_row = 0;
        self.role = Some(Role::Write(WriteRole::spawn(stream, build_index)));
    }

    /// Reads the first packet synchronously, then spawns the background
    /// thread and kicks off a read-ahead for the next one.
    pub fn setup_read(&mut self, mut stream: S, header: &FileHeader) -> Result<()> {
        self.packet_size_limit = header.packet_size() as usize;
        self.read_cursor = 0;
        match read_and_decompress_packet(&mut stream)? {
            Some(buf) => {
                self.read_current = buf;
                self.packet_open = true;
                let role = ReadRole::spawn(stream);
                role.request_read_ahead();
                self.role = Some(Role::Read(role));
            }
            None => {
                self.packet_open = false;
                self.role = Some(Role::Read(ReadRole::spawn(stream)));
            }
        }
        Ok(())
    }

    fn write_role(&self) -> &WriteRole<S> {
        match &self.role {
            Some(Role::Write(role)) => role,
            _ => panic!("FileCodecPacketLz4Batch001 not in write mode"),
        }
    }

    fn read_role(&self) -> &ReadRole<S> {
        match &self.role {
            Some(Role::Read(role)) => role,
            _ => panic!("FileCodecPacketLz4Batch001 not in read mode"),
        }
    }

    pub fn begin_write(&mut self, row_count: u64) -> Result<bool> {
        self.write_role().wait_idle_and_check()?;

        if self.raw_active.len() < self.packet_size_limit {
            return Ok(false);
        }

        let mut buf = Vec::new();
        crate::vle::ble_encode_to(PCKT_TERMINATOR, &mut buf)?;
        self.raw_active.extend_from_slice(&buf);

        self.write_role().wait_idle_and_check()?;
        self.write_role().hand_off(&mut self.raw_active, self.current_packet_first_row);
        self.current_packet_first_row = row_count;
        Ok(true)
    }

    pub fn write_row(&mut self, row_data: &[u8]) -> Result<()> {
        let mut buf = Vec::new();
        if row_data.is_empty() {
            crate::vle::ble_encode_to(0, &mut buf)?;
        } else {
            crate::vle::ble_encode_to(row_data.len() as u64, &mut buf)?;
        }
        self.raw_active.extend_from_slice(&buf);
        self.raw_active.extend_from_slice(row_data);
        Ok(())
    }

    /// Flushes the last (possibly partial) packet, shuts the background
    /// thread down and writes the footer, returning the stream for the
    /// caller to keep or close.
    pub fn finalize(&mut self, total_rows: u64) -> Result<S> {
        let role = match self.role.take() {
            Some(Role::Write(role)) => role,
            _ => panic!("finalize() called outside write mode"),
        };

        if !self.raw_active.is_empty() {
            let mut buf = Vec::new();
            crate::vle::ble_encode_to(PCKT_TERMINATOR, &mut buf)?;
            self.raw_active.extend_from_slice(&buf);

            role.wait_idle_and_check()?;
            role.hand_off(&mut self.raw_active, self.current_packet_first_row);
            role.wait_idle_and_check()?;
        }

        let (mut stream, packet_index) = role.shutdown()?;
        let footer = FileFooter::new(packet_index, total_rows);
        footer.write(&mut stream)?;
        Ok(stream)
    }

    /// Returns `Ok(None)` at end of data, `Ok(Some(&[]))` for a ZoH repeat.
    pub fn read_row(&mut self) -> Result<Option<&[u8]>> {
        self.packet_boundary_crossed = false;

        if !self.packet_open {
            return Ok(None);
        }

        let mut remaining = self.read_current.len() - self.read_cursor;
        if remaining == 0 {
            self.packet_open = false;
            return Ok(None);
        }

        let (mut row_len, mut consumed) = ble_decode(&self.read_current.as_slice()[self.read_cursor..])?;
        self.read_cursor += consumed;

        while row_len == PCKT_TERMINATOR {
            let has_next = self.read_role().wait_idle_and_check()?;
            if !has_next {
                self.packet_open = false;
                return Ok(None);
            }
            self.read_current = self.read_role().take_next();
            self.read_cursor = 0;
            self.packet_boundary_crossed = true;
            self.read_role().request_read_ahead();

            remaining = self.read_current.len() - self.read_cursor;
            if remaining == 0 {
                self.packet_open = false;
                return Ok(None);
            }
            let (next_len, next_consumed) = ble_decode(&self.read_current.as_slice()[self.read_cursor..])?;
            row_len = next_len;
            consumed = next_consumed;
            self.read_cursor += consumed;
        }

        if row_len == 0 {
            return Ok(Some(&[]));
        }
        if row_len > MAX_ROW_LENGTH {
            return Err(Error::CorruptedFile(format!("row length {row_len} exceeds MAX_ROW_LENGTH")));
        }

        remaining = self.read_current.len() - self.read_cursor;
        if row_len as usize > remaining {
            return Err(Error::CorruptedFile("row data truncated in decompressed buffer".into()));
        }

        let start = self.read_cursor;
        self.read_cursor += row_len as usize;
        Ok(Some(&self.read_current.as_slice()[start..self.read_cursor]))
    }

    pub fn packet_boundary_crossed(&self) -> bool {
        self.packet_boundary_crossed
    }

    pub fn reset(&mut self) {
        // No streaming LZ4 context: block-mode compression is stateless
        // per packet, so there is nothing to reset between rows.
    }

    /// Shuts the background thread down and returns the stream, discarding
    /// any pending read-ahead. Used when a reader is dropped mid-file.
    pub fn teardown_read(&mut self) -> Option<S> {
        match self.role.take() {
            Some(Role::Read(role)) => Some(role.shutdown()),
            _ => None,
        }
    }
}

impl<S: Read + Write + Seek + Send + 'static> Drop for FileCodecPacketLz4Batch001<S> {
    fn drop(&mut self) {
        match self.role.take() {
            Some(Role::Write(role)) => {
                let _ = role.shutdown();
            }
            Some(Role::Read(role)) => {
                let _ = role.shutdown();
            }
            None => {}
        }
    }
}
