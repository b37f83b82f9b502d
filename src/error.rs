use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid magic number: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic { expected: u32, found: u32 },
    #[error("unsupported format version: {major}.{minor}.{patch}")]
    UnsupportedVersion { major: u8, minor: u8, patch: u8 },
    #[error("checksum mismatch: expected {expected:#x}, computed {computed:#x}")]
    ChecksumMismatch { expected: u64, computed: u64 },
    #[error("corrupted file: {0}")]
    CorruptedFile(String),
    #[error("buffer too short: needed {needed} bytes, have {available}")]
    BufferTooShort { needed: usize, available: usize },
    #[error("value overflow: {0}")]
    Overflow(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("file already open")]
    AlreadyOpen,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("background thread error: {0}")]
    BackgroundThread(String),
}
