//! Per-day block codec.
//!
//! A block is one day's records in the fixed record layout, compressed as a single
//! opaque stream. The checksum always covers the uncompressed bytes.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::checksum::{sha256, Digest};
use crate::config::{ChecksumPolicy, Codec};
use crate::error::{FormatError, Result};
use crate::record::{decode_records, encode_records, Record};

pub const ZSTD_FRAME_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlock {
    pub data: Vec<u8>,
    pub size_uncompressed: u64,
    pub checksum: Digest,
}

impl EncodedBlock {
    pub fn size_compressed(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Verified,
    /// Mismatch tolerated under `ChecksumPolicy::Warn`.
    Mismatch,
    /// Verification disabled.
    Unchecked,
}

pub fn encode(records: &[Record], codec: Codec, level: i32) -> Result<EncodedBlock> {
    let raw = encode_records(records);
    let checksum = sha256(&raw);
    let data = compress(&raw, codec, level)?;
    Ok(EncodedBlock {
        data,
        size_uncompressed: raw.len() as u64,
        checksum,
    })
}

/// Decompresses one block into exactly `size_uncompressed` bytes, verifies it against
/// `checksum` when `verify` is set, and splits it into records. `what` names the block
/// in log output and errors.
pub fn decode(
    compressed: &[u8],
    size_uncompressed: u64,
    checksum: &Digest,
    verify: Option<ChecksumPolicy>,
    what: &str,
) -> Result<(Vec<Record>, ChecksumStatus)> {
    let raw = decompress(compressed, size_uncompressed)?;
    let status = match verify {
        Some(policy) => {
            if policy.check(what, checksum, &sha256(&raw))? {
                ChecksumStatus::Verified
            } else {
                ChecksumStatus::Mismatch
            }
        }
        None => ChecksumStatus::Unchecked,
    };
    let records = decode_records(&raw)?;
    Ok((records, status))
}

pub fn detect_codec(compressed: &[u8]) -> Codec {
    if compressed.starts_with(&ZSTD_FRAME_MAGIC) {
        Codec::Zstd
    } else {
        Codec::Zlib
    }
}

fn compress(raw: &[u8], codec: Codec, level: i32) -> Result<Vec<u8>> {
    match codec {
        Codec::Zlib => {
            let mut encoder = ZlibEncoder::new(
                Vec::with_capacity(raw.len() / 2 + 16),
                Compression::new(level.clamp(0, 9) as u32),
            );
            encoder.write_all(raw)?;
            Ok(encoder.finish()?)
        }
        Codec::Zstd => Ok(zstd::stream::encode_all(raw, level)?),
    }
}

fn decompress(compressed: &[u8], size_uncompressed: u64) -> Result<Vec<u8>> {
    let expected = usize::try_from(size_uncompressed).map_err(|_| FormatError::BlockTooLarge {
        size: size_uncompressed,
        limit: usize::MAX as u64,
    })?;
    let mut out = Vec::with_capacity(expected);
    // One byte of headroom detects streams that inflate past the declared size.
    let limit = size_uncompressed.saturating_add(1);
    let read = match detect_codec(compressed) {
        Codec::Zlib => ZlibDecoder::new(compressed).take(limit).read_to_end(&mut out),
        Codec::Zstd => zstd::stream::read::Decoder::new(compressed)
            .and_then(|decoder| decoder.take(limit).read_to_end(&mut out)),
    };
    read.map_err(|e| FormatError::DecompressFailed(e.to_string()))?;
    if out.len() != expected {
        return Err(FormatError::DecompressFailed(format!(
            "expected {expected} bytes, got {}",
            out.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RECORD_SIZE;

    fn records() -> Vec<Record> {
        (0..50)
            .map(|i| Record::trade(34_200 + i, 1000 + i, 100, 0, 0, "@F"))
            .collect()
    }

    #[test]
    fn zlib_round_trip() {
        let records = records();
        let block = encode(&records, Codec::Zlib, 6).expect("encode");
        assert_eq!(block.size_uncompressed, (records.len() * RECORD_SIZE) as u64);
        assert_eq!(detect_codec(&block.data), Codec::Zlib);
        let (decoded, status) = decode(
            &block.data,
            block.size_uncompressed,
            &block.checksum,
            Some(ChecksumPolicy::Reject),
            "test",
        )
        .expect("decode");
        assert_eq!(decoded, records);
        assert_eq!(status, ChecksumStatus::Verified);
    }

    #[test]
    fn zstd_round_trip() {
        let records = records();
        let block = encode(&records, Codec::Zstd, 3).expect("encode");
        assert_eq!(detect_codec(&block.data), Codec::Zstd);
        let (decoded, _) =
            decode(&block.data, block.size_uncompressed, &block.checksum, None, "test")
                .expect("decode");
        assert_eq!(decoded, records);
    }

    #[test]
    fn empty_block_round_trips() {
        for codec in [Codec::Zlib, Codec::Zstd] {
            let block = encode(&[], codec, 3).expect("encode");
            assert_eq!(block.size_uncompressed, 0);
            assert!(block.size_compressed() > 0);
            let (decoded, status) = decode(
                &block.data,
                0,
                &block.checksum,
                Some(ChecksumPolicy::Reject),
                "empty",
            )
            .expect("decode");
            assert!(decoded.is_empty());
            assert_eq!(status, ChecksumStatus::Verified);
        }
    }

    #[test]
    fn wrong_declared_size_fails() {
        let block = encode(&records(), Codec::Zlib, 6).expect("encode");
        for size in [block.size_uncompressed - 1, block.size_uncompressed + 28] {
            assert!(matches!(
                decode(&block.data, size, &block.checksum, None, "test"),
                Err(FormatError::DecompressFailed(_))
            ));
        }
    }

    #[test]
    fn garbage_stream_fails() {
        let garbage = vec![0x78, 0x9C, 0xFF, 0xFF, 0xFF, 0x00, 0x12];
        assert!(matches!(
            decode(&garbage, 28, &[0; 32], None, "test"),
            Err(FormatError::DecompressFailed(_))
        ));
    }

    #[test]
    fn checksum_mismatch_is_reported() {
        let block = encode(&records(), Codec::Zlib, 6).expect("encode");
        let wrong = [9u8; 32];
        let (decoded, status) = decode(
            &block.data,
            block.size_uncompressed,
            &wrong,
            Some(ChecksumPolicy::Warn),
            "test",
        )
        .expect("warn keeps data");
        assert_eq!(decoded.len(), 50);
        assert_eq!(status, ChecksumStatus::Mismatch);
        assert!(matches!(
            decode(
                &block.data,
                block.size_uncompressed,
                &wrong,
                Some(ChecksumPolicy::Reject),
                "test"
            ),
            Err(FormatError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn misaligned_payload_is_rejected() {
        let raw = vec![0u8; RECORD_SIZE + 3];
        let data = compress(&raw, Codec::Zlib, 6).expect("compress");
        assert!(matches!(
            decode(&data, raw.len() as u64, &sha256(&raw), None, "test"),
            Err(FormatError::RecordMisalignment { len: 31 })
        ));
    }
}
