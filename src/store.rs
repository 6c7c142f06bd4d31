use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::block::{self, ChecksumStatus};
use crate::checksum::sha256;
use crate::config::{ChecksumPolicy, StoreConfig};
use crate::date::Date;
use crate::error::{FormatError, Result};
use crate::header::{FileHeader, HEADER_SIZE};
use crate::index::{IndexEntry, IndexTable};
use crate::record::{Record, RecordKind};

/// Handle on one TAS file.
///
/// Reads are random access by date. Appends are written after the current end of
/// file and only become visible to other handles after `finalize`, which writes the
/// index past the new blocks and then rewrites the header. Until the header is
/// rewritten the previous header and index still describe a consistent older file.
#[derive(Debug)]
pub struct TasStore {
    path: PathBuf,
    file: Option<File>,
    header: FileHeader,
    index: IndexTable,
    config: StoreConfig,
    writable: bool,
    write_offset: u64,
    dirty: bool,
}

/// Result of `TasStore::verify`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub blocks: usize,
    pub records: u64,
    pub index_ok: bool,
    pub checksum_failures: Vec<Date>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.index_ok && self.checksum_failures.is_empty()
    }
}

impl TasStore {
    /// Creates a new, empty file. Fails if `path` already exists.
    pub fn create(
        path: impl AsRef<Path>,
        kind: RecordKind,
        exchange: u8,
        symbol: &str,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let mut header = FileHeader::new(kind, exchange, symbol)?;
        header.index_checksum = sha256(&[]);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;
        log::debug!("created {} ({:?} {})", path.display(), kind, symbol);

        Ok(Self {
            path,
            file: Some(file),
            header,
            index: IndexTable::new(),
            config,
            writable: true,
            write_offset: HEADER_SIZE as u64,
            dirty: false,
        })
    }

    /// Opens an existing file read-only.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        Self::open_with(path.as_ref(), config, false)
    }

    /// Opens an existing file for appending more dates.
    pub fn open_append(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        Self::open_with(path.as_ref(), config, true)
    }

    fn open_with(path: &Path, config: StoreConfig, writable: bool) -> Result<Self> {
        config.validate()?;
        if !path.exists() {
            return Err(FormatError::NotFound(path.to_path_buf()));
        }
        let mut file = OpenOptions::new().read(true).write(writable).open(path)?;
        let file_len = file.metadata()?.len();

        file.seek(SeekFrom::Start(0))?;
        let header = FileHeader::read_from(&mut file)?;
        if header.index_offset < HEADER_SIZE as u64 {
            return Err(FormatError::Truncated {
                what: "index offset",
                expected: HEADER_SIZE as u64,
                actual: header.index_offset,
            });
        }
        config.check_block_size(header.index_size)?;
        let index_bytes = read_region(&file, header.index_offset, header.index_size, "index")?;
        let index = IndexTable::read(&index_bytes, &header.index_checksum, config.verification())
            .map_err(|err| {
                log::warn!("failed to read index of {}: {err}", path.display());
                err
            })?;

        log::debug!(
            "opened {} ({:?} {}, {} days)",
            path.display(),
            header.kind,
            header.symbol_str(),
            index.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            header,
            index,
            config,
            writable,
            write_offset: file_len,
            dirty: false,
        })
    }

    /// Records stored for `date`, in write order. A date that was never appended
    /// yields an empty vector.
    pub fn get(&self, date: Date) -> Result<Vec<Record>> {
        let file = self.file.as_ref().ok_or(FormatError::Closed)?;
        let Some(entry) = self.index.lookup(&date) else {
            return Ok(Vec::new());
        };
        let (records, _) = self.read_block(file, entry, self.config.verification())?;
        Ok(records)
    }

    /// Compresses `records` as the block for `date` and writes it after the current
    /// end of data. Durable after `finalize`.
    pub fn append(&mut self, date: Date, records: &[Record]) -> Result<()> {
        if !self.writable {
            return Err(FormatError::ReadOnly);
        }
        let file = self.file.as_mut().ok_or(FormatError::Closed)?;
        if self.index.contains(&date) {
            return Err(FormatError::DuplicateDate(date));
        }

        let encoded = block::encode(records, self.config.codec, self.config.compression_level)?;
        self.config.check_block_size(encoded.size_uncompressed)?;
        self.config.check_block_size(encoded.size_compressed())?;
        let entry = IndexEntry::new(
            date,
            self.write_offset,
            encoded.size_compressed(),
            encoded.size_uncompressed,
            encoded.checksum,
        )?;

        file.seek(SeekFrom::Start(self.write_offset))?;
        file.write_all(&encoded.data)?;
        self.write_offset += encoded.size_compressed();
        self.index.insert(entry)?;
        self.dirty = true;

        log::debug!(
            "appended {} records for {date} ({} -> {} bytes)",
            records.len(),
            encoded.size_uncompressed,
            encoded.size_compressed()
        );
        Ok(())
    }

    /// Persists appended blocks: data, then index, then header, each synced before the next.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let file = self.file.as_mut().ok_or(FormatError::Closed)?;
        file.sync_data()?;

        let index_bytes = self.index.serialize();
        let index_offset = self.write_offset;
        file.seek(SeekFrom::Start(index_offset))?;
        file.write_all(&index_bytes)?;
        file.sync_data()?;

        let mut header = self.header;
        header.index_offset = index_offset;
        header.index_size = index_bytes.len() as u64;
        header.index_checksum = sha256(&index_bytes);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;

        self.header = header;
        self.write_offset = index_offset + index_bytes.len() as u64;
        self.dirty = false;
        log::info!(
            "finalized {} with {} days",
            self.path.display(),
            self.index.len()
        );
        Ok(())
    }

    /// Finalizes pending appends and releases the file. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        let result = self.finalize();
        self.file = None;
        self.dirty = false;
        result
    }

    /// Decodes every block with checksum verification, counting mismatches instead of
    /// failing on them. Decompression and alignment errors still propagate.
    pub fn verify(&self) -> Result<VerifyReport> {
        let file = self.file.as_ref().ok_or(FormatError::Closed)?;
        let index_bytes = read_region(file, self.header.index_offset, self.header.index_size, "index")?;
        let mut report = VerifyReport {
            index_ok: sha256(&index_bytes) == self.header.index_checksum,
            ..VerifyReport::default()
        };
        if !report.index_ok {
            log::warn!("index checksum mismatch in {}", self.path.display());
        }

        for entry in self.index.iter() {
            let (records, status) = self.read_block(file, entry, Some(ChecksumPolicy::Warn))?;
            report.blocks += 1;
            report.records += records.len() as u64;
            if status == ChecksumStatus::Mismatch {
                report.checksum_failures.push(entry.date);
            }
        }
        Ok(report)
    }

    fn read_block(
        &self,
        file: &File,
        entry: &IndexEntry,
        verify: Option<ChecksumPolicy>,
    ) -> Result<(Vec<Record>, ChecksumStatus)> {
        self.config.check_block_size(entry.size_uncompressed)?;
        self.config.check_block_size(entry.size_compressed)?;
        let compressed = read_region(file, entry.offset, entry.size_compressed, "block")?;
        let what = format!("{} {}", self.path.display(), entry.date);
        block::decode(
            &compressed,
            entry.size_uncompressed,
            &entry.checksum,
            verify,
            &what,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn kind(&self) -> RecordKind {
        self.header.kind
    }

    pub fn exchange(&self) -> u8 {
        self.header.exchange
    }

    pub fn symbol(&self) -> String {
        self.header.symbol_str()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Dates in the index, ascending.
    pub fn dates(&self) -> impl Iterator<Item = Date> + '_ {
        self.index.dates()
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> + '_ {
        self.index.iter()
    }

    pub fn entry(&self, date: Date) -> Option<&IndexEntry> {
        self.index.lookup(&date)
    }

    pub fn contains(&self, date: Date) -> bool {
        self.index.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn record_count(&self, date: Date) -> u64 {
        self.index.lookup(&date).map_or(0, IndexEntry::record_count)
    }

    pub fn total_records(&self) -> u64 {
        self.index.iter().map(IndexEntry::record_count).sum()
    }
}

impl Drop for TasStore {
    fn drop(&mut self) {
        if self.dirty && self.file.is_some() {
            if let Err(err) = self.finalize() {
                log::warn!("failed to finalize {} on drop: {err}", self.path.display());
            }
        }
    }
}

/// Reads `len` bytes at `offset`; fewer bytes on disk is `Truncated`.
///
/// Positioned reads leave the shared cursor alone, so `get` is safe to call from
/// several threads on one handle.
fn read_region(file: &File, offset: u64, len: u64, what: &'static str) -> Result<Vec<u8>> {
    let capacity = usize::try_from(len).map_err(|_| FormatError::BlockTooLarge {
        size: len,
        limit: usize::MAX as u64,
    })?;
    let mut buf = vec![0u8; capacity];
    let mut filled = 0usize;
    while filled < capacity {
        match read_at(file, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    if filled != capacity {
        return Err(FormatError::Truncated {
            what,
            expected: len,
            actual: filled as u64,
        });
    }
    Ok(buf)
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(s: &str) -> Date {
        Date::parse(s).expect("date")
    }

    #[test]
    fn create_append_get_before_and_after_finalize() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("AAPL_2008_NASDAQ.trades");
        let mut store =
            TasStore::create(&path, RecordKind::Trades, 1, "AAPL", StoreConfig::default())
                .expect("create");
        let records = vec![Record::trade(34_801, 100, 5, 0, 0, "X")];
        store.append(date("2008-01-02"), &records).expect("append");

        assert_eq!(store.get(date("2008-01-02")).expect("get"), records);
        store.finalize().expect("finalize");
        assert_eq!(store.get(date("2008-01-02")).expect("get"), records);
        assert_eq!(store.header().index_size, 72);
    }

    #[test]
    fn append_rejects_duplicate_date() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("dup.trades");
        let mut store =
            TasStore::create(&path, RecordKind::Trades, 1, "AAPL", StoreConfig::default())
                .expect("create");
        store.append(date("2008-01-02"), &[]).expect("append");
        assert!(matches!(
            store.append(date("2008-01-02"), &[]),
            Err(FormatError::DuplicateDate(_))
        ));
    }

    #[test]
    fn read_only_and_closed_handles() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("ro.quotes");
        let mut store =
            TasStore::create(&path, RecordKind::Quotes, 2, "MSFT", StoreConfig::default())
                .expect("create");
        store.close().expect("close");
        store.close().expect("close twice");
        assert!(store.is_closed());
        assert!(matches!(store.get(date("2008-01-02")), Err(FormatError::Closed)));

        let mut reader = TasStore::open(&path, StoreConfig::default()).expect("open");
        assert_eq!(reader.kind(), RecordKind::Quotes);
        assert_eq!(reader.symbol(), "MSFT");
        assert!(reader.is_empty());
        assert!(matches!(
            reader.append(date("2008-01-02"), &[]),
            Err(FormatError::ReadOnly)
        ));
    }

    #[test]
    fn oversized_block_rejected_on_append() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("big.trades");
        let config = StoreConfig {
            max_block_size: 56,
            ..StoreConfig::default()
        };
        let mut store =
            TasStore::create(&path, RecordKind::Trades, 1, "AAPL", config).expect("create");
        let records: Vec<Record> = (0..3).map(|i| Record::trade(i, 1, 1, 0, 0, "")).collect();
        assert!(matches!(
            store.append(date("2008-01-02"), &records),
            Err(FormatError::BlockTooLarge { size: 84, limit: 56 })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn compressed_framing_counts_against_block_limit() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("frame.trades");
        let config = StoreConfig {
            max_block_size: 4,
            ..StoreConfig::default()
        };
        let mut store =
            TasStore::create(&path, RecordKind::Trades, 1, "AAPL", config).expect("create");
        assert!(matches!(
            store.append(date("2008-01-02"), &[]),
            Err(FormatError::BlockTooLarge { limit: 4, .. })
        ));
        assert!(store.is_empty());
        assert!(!store.dirty);
    }

    #[test]
    fn failed_close_leaves_nothing_for_drop() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("fail.trades");
        let mut store =
            TasStore::create(&path, RecordKind::Trades, 1, "AAPL", StoreConfig::default())
                .expect("create");
        store
            .append(date("2008-01-02"), &[Record::trade(34_200, 1, 1, 0, 0, "")])
            .expect("append");
        // Writes through a read-only descriptor fail inside finalize.
        store.file = Some(File::open(&path).expect("reopen read-only"));

        assert!(matches!(store.close(), Err(FormatError::Io(_))));
        assert!(store.is_closed());
        assert!(!store.dirty);
        store.close().expect("second close");
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let result = TasStore::open(dir.path().join("absent.trades"), StoreConfig::default());
        assert!(matches!(result, Err(FormatError::NotFound(_))));
    }
}
