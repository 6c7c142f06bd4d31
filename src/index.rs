use std::collections::btree_map::{self, BTreeMap};

use crate::checksum::{sha256, Digest, DIGEST_LEN};
use crate::config::ChecksumPolicy;
use crate::date::{Date, DATE_LEN};
use crate::error::{FormatError, Result};
use crate::record::RECORD_SIZE;

pub const INDEX_ENTRY_SIZE: usize = 72;

pub const DATE_OFFSET: usize = 0;
// 6 bytes of zero padding follow the date so the integers stay 8-byte aligned.
pub const BLOCK_OFFSET_OFFSET: usize = 16;
pub const SIZE_COMPRESSED_OFFSET: usize = 24;
pub const SIZE_UNCOMPRESSED_OFFSET: usize = 32;
pub const CHECKSUM_OFFSET: usize = 40;

/// Locates and validates one day's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub date: Date,
    pub offset: u64,
    pub size_compressed: u64,
    pub size_uncompressed: u64,
    /// SHA-256 of the uncompressed block bytes.
    pub checksum: Digest,
}

impl IndexEntry {
    pub fn new(
        date: Date,
        offset: u64,
        size_compressed: u64,
        size_uncompressed: u64,
        checksum: Digest,
    ) -> Result<Self> {
        if size_uncompressed % RECORD_SIZE as u64 != 0 {
            return Err(FormatError::RecordMisalignment {
                len: size_uncompressed,
            });
        }
        Ok(Self {
            date,
            offset,
            size_compressed,
            size_uncompressed,
            checksum,
        })
    }

    pub fn record_count(&self) -> u64 {
        self.size_uncompressed / RECORD_SIZE as u64
    }

    pub fn to_bytes(&self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        buf[DATE_OFFSET..DATE_OFFSET + DATE_LEN].copy_from_slice(&self.date.to_bytes());
        buf[BLOCK_OFFSET_OFFSET..BLOCK_OFFSET_OFFSET + 8].copy_from_slice(&self.offset.to_le_bytes());
        buf[SIZE_COMPRESSED_OFFSET..SIZE_COMPRESSED_OFFSET + 8]
            .copy_from_slice(&self.size_compressed.to_le_bytes());
        buf[SIZE_UNCOMPRESSED_OFFSET..SIZE_UNCOMPRESSED_OFFSET + 8]
            .copy_from_slice(&self.size_uncompressed.to_le_bytes());
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + DIGEST_LEN].copy_from_slice(&self.checksum);
        buf
    }

    /// Decodes an on-disk entry. Alignment of `size_uncompressed` is checked when the
    /// block is decoded, so a single bad entry does not make the whole file unreadable.
    pub fn from_bytes(bytes: &[u8; INDEX_ENTRY_SIZE]) -> Result<Self> {
        let date = Date::from_bytes(
            bytes[DATE_OFFSET..DATE_OFFSET + DATE_LEN]
                .try_into()
                .expect("slice length"),
        )?;
        let u64_at = |offset: usize| {
            u64::from_le_bytes(bytes[offset..offset + 8].try_into().expect("slice length"))
        };
        let mut checksum = [0u8; DIGEST_LEN];
        checksum.copy_from_slice(&bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + DIGEST_LEN]);
        Ok(Self {
            date,
            offset: u64_at(BLOCK_OFFSET_OFFSET),
            size_compressed: u64_at(SIZE_COMPRESSED_OFFSET),
            size_uncompressed: u64_at(SIZE_UNCOMPRESSED_OFFSET),
            checksum,
        })
    }
}

/// Date-keyed block directory, held in memory for the lifetime of a store handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexTable {
    entries: BTreeMap<Date, IndexEntry>,
}

impl IndexTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a packed index region. With `verify` set, the digest over `bytes` is
    /// compared against `expected_checksum` and the policy decides what a mismatch does.
    pub fn read(
        bytes: &[u8],
        expected_checksum: &Digest,
        verify: Option<ChecksumPolicy>,
    ) -> Result<Self> {
        if let Some(policy) = verify {
            policy.check("index", expected_checksum, &sha256(bytes))?;
        }

        let remainder = bytes.len() % INDEX_ENTRY_SIZE;
        if remainder != 0 {
            return Err(FormatError::Truncated {
                what: "index entry",
                expected: INDEX_ENTRY_SIZE as u64,
                actual: remainder as u64,
            });
        }

        let mut table = Self::new();
        for chunk in bytes.chunks_exact(INDEX_ENTRY_SIZE) {
            let entry = IndexEntry::from_bytes(chunk.try_into().expect("chunk length"))?;
            table.insert(entry)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, entry: IndexEntry) -> Result<()> {
        match self.entries.entry(entry.date) {
            btree_map::Entry::Occupied(_) => Err(FormatError::DuplicateDate(entry.date)),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, date: &Date) -> Option<&IndexEntry> {
        self.entries.get(date)
    }

    pub fn contains(&self, date: &Date) -> bool {
        self.entries.contains_key(date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in date order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> + '_ {
        self.entries.values()
    }

    pub fn dates(&self) -> impl Iterator<Item = Date> + '_ {
        self.entries.keys().copied()
    }

    /// Packed entries in date order; the inverse of `read`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.entries.len() * INDEX_ENTRY_SIZE);
        for entry in self.entries.values() {
            buf.extend_from_slice(&entry.to_bytes());
        }
        buf
    }
}
