use std::io::Read;

use crate::checksum::{Digest, DIGEST_LEN};
use crate::error::{FormatError, Result};
use crate::record::RecordKind;

pub const HEADER_SIZE: usize = 72;
pub const FORMAT_VERSION: u8 = 1;
pub const TAG_LEN: usize = 10;
pub const SYMBOL_LEN: usize = 12;

pub const TAG_OFFSET: usize = 0;
pub const VERSION_OFFSET: usize = 10;
pub const EXCHANGE_OFFSET: usize = 11;
pub const SYMBOL_OFFSET: usize = 12;
pub const INDEX_CHECKSUM_OFFSET: usize = 24;
pub const INDEX_OFFSET_OFFSET: usize = 56;
pub const INDEX_SIZE_OFFSET: usize = 64;

/// Fixed-size file header. Points at the index region, which sits after the data blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub kind: RecordKind,
    pub version: u8,
    pub exchange: u8,
    pub symbol: [u8; SYMBOL_LEN],
    pub index_checksum: Digest,
    pub index_offset: u64,
    pub index_size: u64,
}

impl FileHeader {
    /// Header for an empty file: no index entries, index region right after the header.
    pub fn new(kind: RecordKind, exchange: u8, symbol: &str) -> Result<Self> {
        Ok(Self {
            kind,
            version: FORMAT_VERSION,
            exchange,
            symbol: symbol_bytes(symbol)?,
            index_checksum: [0u8; DIGEST_LEN],
            index_offset: HEADER_SIZE as u64,
            index_size: 0,
        })
    }

    pub fn symbol_str(&self) -> String {
        let end = self
            .symbol
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SYMBOL_LEN);
        String::from_utf8_lossy(&self.symbol[..end]).trim_end().to_string()
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[TAG_OFFSET..TAG_OFFSET + TAG_LEN].copy_from_slice(&self.kind.tag());
        buf[VERSION_OFFSET] = self.version;
        buf[EXCHANGE_OFFSET] = self.exchange;
        buf[SYMBOL_OFFSET..SYMBOL_OFFSET + SYMBOL_LEN].copy_from_slice(&self.symbol);
        buf[INDEX_CHECKSUM_OFFSET..INDEX_CHECKSUM_OFFSET + DIGEST_LEN]
            .copy_from_slice(&self.index_checksum);
        buf[INDEX_OFFSET_OFFSET..INDEX_OFFSET_OFFSET + 8]
            .copy_from_slice(&self.index_offset.to_le_bytes());
        buf[INDEX_SIZE_OFFSET..INDEX_SIZE_OFFSET + 8]
            .copy_from_slice(&self.index_size.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated {
                what: "header",
                expected: HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[TAG_OFFSET..TAG_OFFSET + TAG_LEN]);
        let kind = RecordKind::from_tag(&tag).ok_or(FormatError::BadMagic(tag))?;

        let version = bytes[VERSION_OFFSET];
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let mut symbol = [0u8; SYMBOL_LEN];
        symbol.copy_from_slice(&bytes[SYMBOL_OFFSET..SYMBOL_OFFSET + SYMBOL_LEN]);
        let mut index_checksum = [0u8; DIGEST_LEN];
        index_checksum
            .copy_from_slice(&bytes[INDEX_CHECKSUM_OFFSET..INDEX_CHECKSUM_OFFSET + DIGEST_LEN]);
        let index_offset = u64::from_le_bytes(
            bytes[INDEX_OFFSET_OFFSET..INDEX_OFFSET_OFFSET + 8]
                .try_into()
                .expect("slice length"),
        );
        let index_size = u64::from_le_bytes(
            bytes[INDEX_SIZE_OFFSET..INDEX_SIZE_OFFSET + 8]
                .try_into()
                .expect("slice length"),
        );

        Ok(Self {
            kind,
            version,
            exchange: bytes[EXCHANGE_OFFSET],
            symbol,
            index_checksum,
            index_offset,
            index_size,
        })
    }

    /// Reads the header with a single read call; a short read is `Truncated`.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        let read = reader.read(&mut buf)?;
        Self::from_bytes(&buf[..read])
    }
}

fn symbol_bytes(symbol: &str) -> Result<[u8; SYMBOL_LEN]> {
    if symbol.is_empty() || symbol.len() > SYMBOL_LEN || symbol.contains('\0') {
        return Err(FormatError::InvalidSymbol(symbol.to_string()));
    }
    let mut buf = [0u8; SYMBOL_LEN];
    buf[..symbol.len()].copy_from_slice(symbol.as_bytes());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> FileHeader {
        let mut header = FileHeader::new(RecordKind::Quotes, 3, "AAPL").expect("header");
        header.index_checksum = [0xAB; DIGEST_LEN];
        header.index_offset = 0x1122_3344_5566;
        header.index_size = 144;
        header
    }

    #[test]
    fn header_round_trip_preserves_fields() {
        let header = sample();
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..10], b"TAS_QUOTES");
        assert_eq!(bytes[10], FORMAT_VERSION);
        assert_eq!(&bytes[12..16], b"AAPL");
        assert_eq!(FileHeader::from_bytes(&bytes).expect("decode"), header);
        assert_eq!(header.symbol_str(), "AAPL");
    }

    #[test]
    fn rejects_unknown_tag() {
        let mut bytes = sample().to_bytes();
        bytes[0..10].copy_from_slice(b"NOT_A_FILE");
        assert!(matches!(
            FileHeader::from_bytes(&bytes),
            Err(FormatError::BadMagic(tag)) if &tag == b"NOT_A_FILE"
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = sample().to_bytes();
        bytes[VERSION_OFFSET] = 2;
        assert!(matches!(
            FileHeader::from_bytes(&bytes),
            Err(FormatError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn short_read_is_truncated() {
        let bytes = sample().to_bytes();
        let mut cursor = Cursor::new(bytes[..40].to_vec());
        assert!(matches!(
            FileHeader::read_from(&mut cursor),
            Err(FormatError::Truncated { expected: 72, actual: 40, .. })
        ));
    }

    #[test]
    fn symbol_must_fit() {
        assert!(FileHeader::new(RecordKind::Trades, 0, "").is_err());
        assert!(FileHeader::new(RecordKind::Trades, 0, "THIRTEENCHARS").is_err());
        assert!(FileHeader::new(RecordKind::Trades, 0, "TWELVE_CHARS").is_ok());
    }
}
