use std::path::PathBuf;

use crate::date::Date;

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("bad magic: {}", String::from_utf8_lossy(.0))]
    BadMagic([u8; 10]),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("truncated {what}: expected {expected} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        expected: u64,
        actual: u64,
    },
    #[error("duplicate date: {0}")]
    DuplicateDate(Date),
    #[error("decompress failed: {0}")]
    DecompressFailed(String),
    #[error("block length {len} is not a multiple of the record size")]
    RecordMisalignment { len: u64 },
    #[error("checksum mismatch: {what}")]
    ChecksumMismatch { what: String },
    #[error("block of {size} bytes exceeds limit of {limit} bytes")]
    BlockTooLarge { size: u64, limit: u64 },
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
    #[error("store is read-only")]
    ReadOnly,
    #[error("store is closed")]
    Closed,
    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FormatError>;
