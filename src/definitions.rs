use declio::ctx::Endian;

pub const ENDIANESS: Endian = Endian::Little;

pub const BCSV_MAGIC: u32 = 0x5653_4342;
pub const PCKT_MAGIC: u32 = 0x544B_4350;
pub const FOOTER_BIDX_MAGIC: u32 = 0x5844_4942;
pub const FOOTER_EIDX_MAGIC: u32 = 0x5844_4945;

pub const MAGIC_BYTES_BIDX: &[u8; 4] = b"BIDX";
pub const MAGIC_BYTES_EIDX: &[u8; 4] = b"EIDX";

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 3;
pub const VERSION_PATCH: u8 = 0;

pub const MAX_COLUMN_COUNT: usize = 65_535;
pub const MAX_STRING_LENGTH: usize = 65_535;
pub const MAX_ROW_LENGTH: u64 = 16 * 1024 * 1024 - 2;
pub const MAX_PACKET_SIZE: usize = 1024 * 1024 * 1024;
pub const MIN_PACKET_SIZE: usize = 64 * 1024;
pub const DEFAULT_PACKET_SIZE: u32 = 8 * 1024 * 1024;

/// Sentinel row length (full-mode VLE) marking the end of a packet's row stream.
pub const PCKT_TERMINATOR: u64 = 0x3FFF_FFFF;

/// Column data type tag, stored as `u16` in the file header's schema section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ColumnType {
    Bool = 0x00,
    Uint8 = 0x01,
    Uint16 = 0x02,
    Uint32 = 0x03,
    Uint64 = 0x04,
    Int8 = 0x05,
    Int16 = 0x06,
    Int32 = 0x07,
    Int64 = 0x08,
    Float = 0x09,
    Double = 0x0A,
    String = 0x0B,
}

impl ColumnType {
    pub fn from_u16(tag: u16) -> Option<Self> {
        Some(match tag {
            0x00 => Self::Bool,
            0x01 => Self::Uint8,
            0x02 => Self::Uint16,
            0x03 => Self::Uint32,
            0x04 => Self::Uint64,
            0x05 => Self::Int8,
            0x06 => Self::Int16,
            0x07 => Self::Int32,
            0x08 => Self::Int64,
            0x09 => Self::Float,
            0x0A => Self::Double,
            0x0B => Self::String,
            _ => return None,
        })
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn is_bool(self) -> bool {
        matches!(self, Self::Bool)
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::String)
    }

    /// Wire size of a fixed-width column. Strings report only their length
    /// prefix here; the payload is accounted for separately.
    pub fn wire_size(self) -> usize {
        match self {
            Self::Bool => 0, // packed into the bitset section, not the fixed section
            Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float => 4,
            Self::Uint64 | Self::Int64 | Self::Double => 8,
            Self::String => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
        }
    }
}

/// Type-grouped serialization order used by the ZoH changed-data section.
/// BOOL and STRING are listed last/first respectively because BOOL never
/// appears in the changed-data section (it lives entirely in the change
/// bitset) and STRING's variable length makes it awkward to interleave
/// with fixed-width groups.
pub const ZOH_TYPE_ORDER: &[ColumnType] = &[
    ColumnType::Uint8,
    ColumnType::Uint16,
    ColumnType::Uint32,
    ColumnType::Uint64,
    ColumnType::Int8,
    ColumnType::Int16,
    ColumnType::Int32,
    ColumnType::Int64,
    ColumnType::Float,
    ColumnType::Double,
    ColumnType::String,
];

bitflags::bitflags! {
    /// 16-bit feature flags stored in the fixed file header. Whether the
    /// file codec compresses is not a flag here; it's derived from
    /// `compression_level > 0` on the same header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileFlags: u16 {
        const ZOH_ENABLED        = 0x0001;
        const NO_FILE_INDEX      = 0x0002;
        const STREAMING          = 0x0004;
        const BATCH_COMPRESSION  = 0x0008;
        /// Reserved, unused by any codec in this crate.
        const DELTA_ENCODING     = 0x0010;
    }
}
