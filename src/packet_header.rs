//! 16-byte per-packet header: magic, first row index, self-checksum.

use std::io::{Read, Write};

use crate::checksum::checksum32;
use crate::definitions::{self, PCKT_MAGIC};
use crate::error::{Error, Result};

pub const PACKET_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub magic: u32,
    pub first_row_index: u64,
    pub checksum: u32,
}

impl PacketHeader {
    pub fn new(first_row_index: u64) -> Self {
        let mut header = Self { magic: PCKT_MAGIC, first_row_index, checksum: 0 };
        header.update_checksum();
        header
    }

    fn checksum_payload(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..12].copy_from_slice(&self.first_row_index.to_le_bytes());
        buf
    }

    pub fn update_checksum(&mut self) {
        self.checksum = checksum32(&self.checksum_payload(), 0);
    }

    pub fn is_valid_magic(&self) -> bool {
        self.magic == PCKT_MAGIC
    }

    pub fn validate_checksum(&self) -> bool {
        checksum32(&self.checksum_payload(), 0) == self.checksum
    }

    pub fn validate(&self) -> bool {
        self.is_valid_magic() && self.validate_checksum()
    }

    /// Reads and validates a packet header. `silent` suppresses the
    /// error-to-caller distinction between "not a packet header" (e.g. the
    /// footer magic) and true read failures, leaving that judgment to the
    /// caller — matching the original's dual use at clean packet opens vs.
    /// footer/EOF detection.
    pub fn read(reader: &mut impl Read) -> Result<Option<Self>> {
        let mut raw = [0u8; PACKET_HEADER_SIZE];
        match reader.read_exact(&mut raw) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let header = Self::from_bytes(&raw);
        if !header.validate() {
            return Ok(None);
        }
        Ok(Some(header))
    }

    pub fn write(writer: &mut impl Write, first_row_index: u64) -> Result<()> {
        let header = Self::new(first_row_index);
        writer.write_all(&header.to_bytes())?;
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut buf = [0u8; PACKET_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..12].copy_from_slice(&self.first_row_index.to_le_bytes());
        buf[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(raw: &[u8; PACKET_HEADER_SIZE]) -> Self {
        Self {
            magic: u32::from_le_bytes(raw[0..4].try_into().unwrap()),
            first_row_index: u64::from_le_bytes(raw[4..12].try_into().unwrap()),
            checksum: u32::from_le_bytes(raw[12..16].try_into().unwrap()),
        }
    }

    /// Scans forward from `start` for the next valid packet header, sliding
    /// an 8 KiB window and checking every "PCKT" occurrence's self-checksum.
    /// Used to rebuild the packet index when the footer is missing/corrupt.
    pub fn scan_next(
        reader: &mut (impl Read + std::io::Seek),
        start: u64,
        max_scan_bytes: u64,
    ) -> Result<Option<(Self, u64)>> {
        use std::io::SeekFrom;

        const CHUNK_SIZE: usize = 8192;
        reader.seek(SeekFrom::Start(start))?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut valid_bytes = 0usize;
        let mut buffer_start = start;
        let mut total_scanned = 0u64;

        loop {
            if max_scan_bytes > 0 && total_scanned >= max_scan_bytes {
                return Ok(None);
            }
            let read = reader.read(&mut buffer[valid_bytes..])?;
            if read == 0 {
                return Ok(None); // true EOF, nothing left to find
            }
            total_scanned += read as u64;
            valid_bytes += read;

            let mut search_from = 0usize;
            let mut slid = false;
            while let Some(rel) = find_subslice(&buffer[search_from..valid_bytes], definitions::PCKT_MAGIC.to_le_bytes().as_slice()) {
                let pos = search_from + rel;
                if pos + PACKET_HEADER_SIZE > valid_bytes {
                    // Not enough trailing bytes yet; slide this candidate to
                    // the front and read more on the next iteration rather
                    // than falling through to the buffer-exhausted check
                    // below (that check is for "nothing found", not this).
                    buffer.copy_within(pos..valid_bytes, 0);
                    valid_bytes -= pos;
                    buffer_start += pos as u64;
                    slid = true;
                    break;
                }
                let mut raw = [0u8; PACKET_HEADER_SIZE];
                raw.copy_from_slice(&buffer[pos..pos + PACKET_HEADER_SIZE]);
                let candidate = Self::from_bytes(&raw);
                if candidate.validate() {
                    return Ok(Some((candidate, buffer_start + pos as u64)));
                }
                search_from = pos + 1;
            }

            if slid {
                continue;
            }

            // No magic found anywhere in the searched region. Keep the last
            // PACKET_HEADER_SIZE - 1 bytes in case a magic number straddles
            // this chunk boundary, discard the rest, and read more.
            if valid_bytes >= PACKET_HEADER_SIZE - 1 {
                let keep = PACKET_HEADER_SIZE - 1;
                buffer.copy_within(valid_bytes - keep..valid_bytes, 0);
                buffer_start += (valid_bytes - keep) as u64;
                valid_bytes = keep;
            }
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn expect_magic(found: u32) -> Result<()> {
    if found != PCKT_MAGIC {
        return Err(Error::InvalidMagic { expected: PCKT_MAGIC, found });
    }
    Ok(())
}
