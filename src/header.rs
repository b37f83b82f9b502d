//! `FileHeader`: fixed 16-byte section plus the variable column schema.

use declio::{Decode, Encode};
use std::io::{Read, Write};

use crate::definitions::{
    ColumnType, FileFlags, ENDIANESS, BCSV_MAGIC, MAX_COLUMN_COUNT, MAX_STRING_LENGTH,
    VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH,
};
use crate::error::{Error, Result};
use crate::layout::{ColumnDefinition, Layout};

/// Fixed 16-byte section of the file header. Mirrors `FileHeader` in the
/// wire-format table: magic, version triple, compression level, flags,
/// packet size, column count — all plain little-endian primitives, so a
/// single derive covers the whole section.
#[derive(Debug, Clone, Copy, Encode, Decode)]
#[declio(ctx_is = "ENDIANESS")]
struct FixedSection {
    magic: u32,
    version_major: u8,
    version_minor: u8,
    version_patch: u8,
    compression_level: u8,
    flags: u16,
    packet_size: u32,
    column_count: u16,
}

pub const FIXED_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone)]
pub struct FileHeader {
    fixed: FixedSection,
}

impl FileHeader {
    pub fn new(column_count: usize, compression_level: u8) -> Self {
        let compression_level = compression_level.min(9);
        let column_count = if column_count > MAX_COLUMN_COUNT {
            tracing::warn!(
                column_count,
                max = MAX_COLUMN_COUNT,
                "column count clamped to MAX_COLUMN_COUNT"
            );
            MAX_COLUMN_COUNT
        } else {
            column_count
        };
        Self {
            fixed: FixedSection {
                magic: BCSV_MAGIC,
                version_major: VERSION_MAJOR,
                version_minor: VERSION_MINOR,
                version_patch: VERSION_PATCH,
                compression_level,
                flags: 0,
                packet_size: crate::definitions::DEFAULT_PACKET_SIZE,
                column_count: column_count as u16,
            },
        }
    }

    pub fn set_version(&mut self, major: u8, minor: u8, patch: u8) {
        self.fixed.version_major = major;
        self.fixed.version_minor = minor;
        self.fixed.version_patch = patch;
    }

    pub fn version_major(&self) -> u8 {
        self.fixed.version_major
    }

    pub fn version_minor(&self) -> u8 {
        self.fixed.version_minor
    }

    pub fn version_patch(&self) -> u8 {
        self.fixed.version_patch
    }

    pub fn set_compression_level(&mut self, level: u8) {
        self.fixed.compression_level = level.min(9);
    }

    pub fn compression_level(&self) -> u8 {
        self.fixed.compression_level
    }

    pub fn flags(&self) -> FileFlags {
        FileFlags::from_bits_truncate(self.fixed.flags)
    }

    pub fn set_flags(&mut self, flags: FileFlags) {
        self.fixed.flags = flags.bits();
    }

    pub fn set_flag(&mut self, flag: FileFlags, value: bool) {
        let mut current = self.flags();
        current.set(flag, value);
        self.set_flags(current);
    }

    pub fn has_flag(&self, flag: FileFlags) -> bool {
        self.flags().contains(flag)
    }

    pub fn packet_size(&self) -> u32 {
        self.fixed.packet_size
    }

    pub fn set_packet_size(&mut self, size: u32) {
        self.fixed.packet_size = size;
    }

    pub fn column_count(&self) -> u16 {
        self.fixed.column_count
    }

    pub fn is_valid_magic(&self) -> bool {
        self.fixed.magic == BCSV_MAGIC
    }

    /// Writes the fixed section followed by the variable schema section
    /// (column types, then name lengths, then concatenated name bytes).
    pub fn write_to<W: Write>(&self, writer: &mut W, layout: &Layout) -> Result<()> {
        let mut fixed = self.fixed;
        fixed.column_count = layout.column_count() as u16;

        let mut buf = Vec::with_capacity(FIXED_HEADER_SIZE);
        fixed.encode(ENDIANESS, &mut buf).map_err(declio_err)?;
        writer.write_all(&buf)?;

        for col in layout.columns() {
            writer.write_all(&col.column_type.as_u16().to_le_bytes())?;
        }
        for col in layout.columns() {
            let len = col.name.len();
            if len > MAX_STRING_LENGTH {
                return Err(Error::Schema(format!(
                    "column name '{}' exceeds MAX_STRING_LENGTH",
                    col.name
                )));
            }
            writer.write_all(&(len as u16).to_le_bytes())?;
        }
        for col in layout.columns() {
            writer.write_all(col.name.as_bytes())?;
        }
        Ok(())
    }

    /// Reads the fixed section and variable schema, returning the header
    /// and the reconstructed `Layout`.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<(Self, Layout)> {
        let mut raw = [0u8; FIXED_HEADER_SIZE];
        reader.read_exact(&mut raw)?;
        let fixed = FixedSection::decode(ENDIANESS, &mut &raw[..]).map_err(declio_err)?;

        if fixed.magic != BCSV_MAGIC {
            return Err(Error::InvalidMagic { expected: BCSV_MAGIC, found: fixed.magic });
        }
        if fixed.version_major != VERSION_MAJOR || fixed.version_minor > VERSION_MINOR {
            return Err(Error::UnsupportedVersion {
                major: fixed.version_major,
                minor: fixed.version_minor,
                patch: fixed.version_patch,
            });
        }

        let column_count = fixed.column_count as usize;
        if column_count > MAX_COLUMN_COUNT {
            return Err(Error::CorruptedFile(format!(
                "column count {column_count} exceeds MAX_COLUMN_COUNT"
            )));
        }

        let mut types = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            let tag = u16::from_le_bytes(buf);
            types.push(ColumnType::from_u16(tag).ok_or_else(|| {
                Error::CorruptedFile(format!("unknown column type tag {tag:#06x}"))
            })?);
        }

        let mut name_lengths = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            let len = u16::from_le_bytes(buf) as usize;
            if len > MAX_STRING_LENGTH {
                return Err(Error::CorruptedFile(format!(
                    "column name length {len} exceeds MAX_STRING_LENGTH"
                )));
            }
            name_lengths.push(len);
        }

        let mut columns = Vec::with_capacity(column_count);
        for (i, (column_type, len)) in types.into_iter().zip(name_lengths).enumerate() {
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            let name = String::from_utf8(bytes)
                .map_err(|_| Error::CorruptedFile(format!("column {i} name is not valid UTF-8")))?;
            columns.push(ColumnDefinition::new(name, column_type));
        }

        let layout = Layout::new(columns)?;
        Ok((Self { fixed }, layout))
    }
}

fn declio_err(e: declio::Error) -> Error {
    Error::CorruptedFile(format!("header encoding error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layout() -> Layout {
        Layout::new(vec![
            ColumnDefinition::new("name", ColumnType::String),
            ColumnDefinition::new("age", ColumnType::Int64),
            ColumnDefinition::new("salary", ColumnType::Double),
        ])
        .unwrap()
    }

    #[test]
    fn header_round_trips_with_schema() {
        let layout = sample_layout();
        let header = FileHeader::new(layout.column_count(), 5);

        let mut buf = Vec::new();
        header.write_to(&mut buf, &layout).unwrap();

        let (read_header, read_layout) = FileHeader::read_from(&mut &buf[..]).unwrap();
        assert!(read_header.is_valid_magic());
        assert_eq!(read_header.compression_level(), 5);
        assert_eq!(read_layout.column_count(), 3);
        assert_eq!(read_layout.columns()[0].name, "name");
        assert_eq!(read_layout.columns()[1].column_type, ColumnType::Int64);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; FIXED_HEADER_SIZE];
        assert!(FileHeader::read_from(&mut &buf[..]).is_err());
    }

    #[test]
    fn flags_round_trip() {
        let mut header = FileHeader::new(0, 0);
        header.set_flag(FileFlags::ZOH_ENABLED, true);
        header.set_flag(FileFlags::BATCH_COMPRESSION, true);
        assert!(header.has_flag(FileFlags::ZOH_ENABLED));
        assert!(header.has_flag(FileFlags::BATCH_COMPRESSION));
        assert!(!header.has_flag(FileFlags::STREAMING));
    }
}
