//! Store configuration.
//!
//! Controls checksum verification, the allocation ceiling for blocks read from disk,
//! and the codec used when appending.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::checksum::{hex, Digest};
use crate::error::{FormatError, Result};

pub const DEFAULT_MAX_BLOCK_SIZE: u64 = 1024 * 1024 * 1024;

/// What a verified checksum mismatch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumPolicy {
    /// Log a warning and keep the data.
    #[default]
    Warn,
    /// Fail the operation with `ChecksumMismatch`.
    Reject,
}

impl ChecksumPolicy {
    /// Returns `Ok(true)` on match, `Ok(false)` on a tolerated mismatch.
    pub fn check(&self, what: &str, expected: &Digest, actual: &Digest) -> Result<bool> {
        if expected == actual {
            return Ok(true);
        }
        match self {
            ChecksumPolicy::Warn => {
                log::warn!(
                    "checksum mismatch in {what}: expected {} got {}",
                    hex(expected),
                    hex(actual)
                );
                Ok(false)
            }
            ChecksumPolicy::Reject => Err(FormatError::ChecksumMismatch {
                what: what.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    /// zlib stream; the codec of existing TAS files.
    #[default]
    Zlib,
    Zstd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Verify index and block checksums on read.
    /// Default: true
    pub checksums_enabled: bool,

    /// Default: warn and continue
    pub checksum_policy: ChecksumPolicy,

    /// Largest compressed or uncompressed block (and index region) accepted from disk.
    /// Default: 1 GiB
    pub max_block_size: u64,

    /// Codec used by `append`. Reads detect the codec per block.
    /// Default: zlib
    pub codec: Codec,

    /// zlib accepts 0-9, zstd 1-22.
    /// Default: 6
    pub compression_level: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            checksums_enabled: true,
            checksum_policy: ChecksumPolicy::Warn,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            codec: Codec::Zlib,
            compression_level: 6,
        }
    }
}

impl StoreConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| FormatError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_block_size == 0 {
            return Err(FormatError::Config("max_block_size must be > 0".into()));
        }
        let range = match self.codec {
            Codec::Zlib => 0..=9,
            Codec::Zstd => 1..=22,
        };
        if !range.contains(&self.compression_level) {
            return Err(FormatError::Config(format!(
                "compression_level {} out of range for {:?}",
                self.compression_level, self.codec
            )));
        }
        Ok(())
    }

    /// Policy to apply on read, or `None` when verification is off.
    pub fn verification(&self) -> Option<ChecksumPolicy> {
        self.checksums_enabled.then_some(self.checksum_policy)
    }

    pub fn check_block_size(&self, size: u64) -> Result<()> {
        if size > self.max_block_size {
            return Err(FormatError::BlockTooLarge {
                size,
                limit: self.max_block_size,
            });
        }
        Ok(())
    }
}
